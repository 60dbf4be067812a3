//! Shell commands.
//!
//! This module defines the [`Command`] enum, which encapsulates one line typed into the
//! `tundra` shell. Lines starting with `.` are shell commands acting on the connection;
//! anything else is query text sent to the database as-is.
//!
//! # Overview
//! - `.exit`: Close the connection and leave the shell.
//! - `.ping`: Check that the database answers.
//! - `.use <namespace> <database>`: Switch namespace and database.
//! - `.get <table[:id]>`: Fetch a table or one record.
//! - `.delete <table:id>`: Delete one record.
//! - `.drop <table>`: Delete every record of a table.
//!
//! # Example
//! ```rust
//! use tundra::Command;
//!
//! let cmd: Command = ".use test test".try_into().unwrap();
//! assert_eq!(cmd, Command::Use { namespace: "test".into(), database: "test".into() });
//! ```
use thiserror::Error;

/// List of possible errors when parsing a shell line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("no command provided")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Close the connection and terminate the shell.
    Exit,
    Ping,
    Use { namespace: String, database: String },
    Get(String),
    Delete(String),
    Drop(String),
    /// Raw query text.
    Query(String),
}

fn single_argument(command: &str, args: &[&str], example: &str) -> Result<String, CommandError> {
    match args {
        [arg] => Ok(arg.to_string()),
        _ => Err(CommandError::InvalidCommandArguments {
            command: command.to_string(),
            reason: format!("requires exactly one argument. Example: {command} {example}"),
        }),
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        if !line.starts_with('.') {
            return Ok(Command::Query(line.to_string()));
        }

        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args = parts.collect::<Vec<_>>();

        match name {
            ".exit" => Ok(Command::Exit),
            ".ping" => Ok(Command::Ping),
            ".use" => match args.as_slice() {
                [namespace, database] => Ok(Command::Use {
                    namespace: namespace.to_string(),
                    database: database.to_string(),
                }),
                _ => Err(CommandError::InvalidCommandArguments {
                    command: name.to_string(),
                    reason: "requires namespace and database. Example: .use test test".to_string(),
                }),
            },
            ".get" => single_argument(name, &args, "person:tobie").map(Command::Get),
            ".delete" => single_argument(name, &args, "person:tobie").map(Command::Delete),
            ".drop" => single_argument(name, &args, "person").map(Command::Drop),
            other => Err(CommandError::UnrecognizedCommand(other.to_string())),
        }
    }
}
