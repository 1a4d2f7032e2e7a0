//! Query identities used as cache keys.

use std::borrow::Cow;
use std::fmt;

/// Identity of a cached query result.
///
/// Mutations declare which keys they affect; the cache invalidates exactly
/// those keys after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Cow<'static, str>);

impl QueryKey {
    /// The todo list.
    pub const TODOS: QueryKey = QueryKey(Cow::Borrowed("todos"));
    /// The backend health check.
    pub const HEALTH: QueryKey = QueryKey(Cow::Borrowed("health"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for QueryKey {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}
