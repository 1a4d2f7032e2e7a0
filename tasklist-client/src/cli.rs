//! Command-line argument parsing.

use tasklist_core::TodoId;

use crate::error::ClientError;

pub const USAGE: &str = "\
usage: tasklist [--config <path>] <command>

commands:
  list            show all todos
  add <title>     create a todo
  toggle <id>     flip a todo between done and not done
  done <id>       mark a todo done
  undo <id>       mark a todo not done
  health          show backend health
  watch           show the list and refresh it until interrupted
  help            show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Add { title: String },
    Toggle { id: TodoId },
    SetCompleted { id: TodoId, completed: bool },
    Health,
    Watch,
    Help,
}

/// Parse arguments, excluding the program name. `--config <path>` is skipped
/// here; config loading reads it separately.
pub fn parse_command<I>(args: I) -> Result<Command, ClientError>
where
    I: IntoIterator<Item = String>,
{
    let mut words = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
            continue;
        }
        words.push(arg);
    }

    let mut words = words.into_iter();
    let Some(name) = words.next() else {
        return Ok(Command::List);
    };
    let rest: Vec<String> = words.collect();

    match name.as_str() {
        "list" | "ls" => no_args(&name, &rest, Command::List),
        "add" => {
            let title = rest.join(" ");
            if title.trim().is_empty() {
                return Err(usage("add needs a title"));
            }
            Ok(Command::Add { title })
        }
        "toggle" => Ok(Command::Toggle {
            id: parse_id(&name, &rest)?,
        }),
        "done" => Ok(Command::SetCompleted {
            id: parse_id(&name, &rest)?,
            completed: true,
        }),
        "undo" => Ok(Command::SetCompleted {
            id: parse_id(&name, &rest)?,
            completed: false,
        }),
        "health" => no_args(&name, &rest, Command::Health),
        "watch" => no_args(&name, &rest, Command::Watch),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(usage(&format!("unknown command '{other}'"))),
    }
}

fn no_args(name: &str, rest: &[String], command: Command) -> Result<Command, ClientError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(usage(&format!("{name} takes no arguments")))
    }
}

fn parse_id(name: &str, rest: &[String]) -> Result<TodoId, ClientError> {
    match rest {
        [raw] => raw
            .parse::<TodoId>()
            .map_err(|_| usage(&format!("{name}: '{raw}' is not a todo id"))),
        _ => Err(usage(&format!("{name} needs exactly one todo id"))),
    }
}

fn usage(message: &str) -> ClientError {
    ClientError::Usage(format!("{message}\n\n{USAGE}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, ClientError> {
        parse_command(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults_to_list() {
        assert_eq!(parse(&[]).unwrap(), Command::List);
        assert_eq!(parse(&["--config", "tasklist.toml"]).unwrap(), Command::List);
    }

    #[test]
    fn test_add_joins_words() {
        assert_eq!(
            parse(&["add", "Buy", "milk"]).unwrap(),
            Command::Add {
                title: "Buy milk".to_string()
            }
        );
        assert!(parse(&["add"]).is_err());
    }

    #[test]
    fn test_id_commands() {
        assert_eq!(parse(&["toggle", "3"]).unwrap(), Command::Toggle { id: 3 });
        assert_eq!(
            parse(&["--config", "c.toml", "done", "4"]).unwrap(),
            Command::SetCompleted {
                id: 4,
                completed: true
            }
        );
        assert_eq!(
            parse(&["undo", "4"]).unwrap(),
            Command::SetCompleted {
                id: 4,
                completed: false
            }
        );
        assert!(parse(&["toggle", "three"]).is_err());
        assert!(parse(&["toggle"]).is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(parse(&["delete", "1"]), Err(ClientError::Usage(_))));
        assert!(parse(&["health", "now"]).is_err());
    }
}
