//! Client for a remote record database.
//!
//! Records are addressed as `table:id` and reached over one of two wire protocols: plain
//! HTTP calls or an RPC session over a WebSocket. A [`Connection`] hides which one is in
//! use, and a [`QueryBuilder`] compiles declarative queries to query text.
//!
//! # Example
//! ```rust,no_run
//! use serde_json::json;
//! use tundra::{TransportConfig, TransportKind};
//!
//! let mut conn = tundra::connect(TransportConfig {
//!     host: Some("localhost".into()),
//!     user: Some("root".into()),
//!     password: Some("root".into()),
//!     transport: Some(TransportKind::Http),
//!     ..Default::default()
//! })?;
//!
//! conn.create("person", json!({"id": "tobie", "age": 33}))?;
//! let adults = conn.table("person").and_where(("age", ">=", 18)).get()?;
//! # Ok::<(), tundra::Error>(())
//! ```
pub mod cli;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod query;
pub mod record;
pub mod registry;
pub mod statement;

#[cfg(test)]
mod testing;

pub use cli::prompt;
pub use command::{Command, CommandError};
pub use config::{Config, TransportConfig};
pub use connection::Connection;
pub use error::{ConfigurationError, Error, QueryError, Result, ValidationError};
pub use protocol::{Transport, TransportError, TransportKind};
pub use query::{Filter, QueryBuilder};
pub use record::RecordId;
pub use registry::Registry;

/// Open a connection, announcing every parameter left to its default.
pub fn connect(mut config: TransportConfig) -> Result<Connection> {
    config.apply_defaults(true);
    Connection::connect(&config)
}
