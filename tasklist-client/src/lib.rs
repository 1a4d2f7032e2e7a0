//! Task-list client library exports.

pub mod api_client;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mutation;
pub mod notifications;
pub mod queries;
pub mod state;
