// Line-oriented store commands

use std::fmt;

/// A single store command as carried over the wire.
///
/// The benchmark only ever sends `ADD`; `GET` and `DEL` exist so the mock
/// store can understand the same command set as a real store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

impl Command {
    /// Build an `ADD` command
    pub fn add(key: impl Into<String>, value: impl Into<String>) -> Self {
        Command::Add {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a wire line. Returns `None` for unknown verbs or missing arguments.
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let verb = parts.next()?;

        let command = match verb {
            "ADD" => {
                let key = parts.next()?;
                let value = parts.next()?;
                Command::add(key, value)
            }
            "GET" => Command::Get {
                key: parts.next()?.to_string(),
            },
            "DEL" => Command::Delete {
                key: parts.next()?.to_string(),
            },
            _ => return None,
        };

        Some(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Add { key, value } => write!(f, "ADD {} {}", key, value),
            Command::Get { key } => write!(f, "GET {}", key),
            Command::Delete { key } => write!(f, "DEL {}", key),
        }
    }
}
