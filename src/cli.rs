//! Shell utilities.
//!
//! The utilities in this module drive the `tundra` shell: reading one line at a time and
//! running the resulting [`Command`] against a [`Connection`].
use std::io::{self, BufRead, Write};

use log::debug;
use serde_json::Value;

use crate::{Command, Connection, Result};

/// Prompt for one line. Returns `None` once the reader is exhausted.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> io::Result<Option<String>>
where
    R: BufRead,
    W: Write,
{
    write!(&mut writer, "> ")?;
    writer.flush()?;

    let mut line = String::default();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Run one command. Commands without a result (and `.exit`) yield `None`.
pub fn execute(connection: &mut Connection, command: Command) -> Result<Option<Value>> {
    debug!("shell command {command:?}");
    let value = match command {
        Command::Exit => {
            connection.close()?;
            return Ok(None);
        }
        Command::Ping => {
            connection.ping()?;
            return Ok(None);
        }
        Command::Use {
            namespace,
            database,
        } => {
            connection.use_scope(&namespace, &database)?;
            return Ok(None);
        }
        Command::Get(target) => connection.get(&target, None)?,
        Command::Delete(target) => connection.delete(&target, None)?,
        Command::Drop(table) => connection.drop(&table)?,
        Command::Query(sql) => connection.query(&sql)?,
    };
    Ok(Some(value))
}

/// Pretty JSON for display.
pub fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
