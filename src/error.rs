//! Error taxonomy for Tundra.
//!
//! Every fallible operation in the crate returns [`Error`], which is one of four kinds:
//!
//! - [`ValidationError`]: a request was rejected locally before anything was sent.
//! - [`TransportError`]: the wire failed (refused, bad status, timeout, closed socket).
//! - [`QueryError`]: the engine answered, but a statement did not succeed.
//! - [`ConfigurationError`]: a named connection could not be built from configuration.
//!
//! None of these are retried or swallowed by the crate.
use std::{io, path::PathBuf};

use serde_json::Value;
use thiserror::Error;

pub use crate::protocol::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Problems with the shape of a request, caught before it reaches the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("table '{table}' does not match the table '{id_table}' of the record id")]
    TableMismatch { table: String, id_table: String },

    #[error("id '{table_id}' given with the table does not match id '{id}'")]
    IdMismatch { table_id: String, id: String },

    #[error("no table given")]
    MissingTable,

    #[error("cannot {operation} a record without an id")]
    MissingId { operation: &'static str },

    #[error("upsert key '{key}' not found in data")]
    MissingKey { key: String },

    #[error("'{target}' names a record; upsert keys other than 'id' are not allowed")]
    KeyedTarget { target: String },

    #[error("record data must be an object, got {found}")]
    NotARecord { found: String },

    #[error("query builder is not bound to a connection")]
    Detached,
}

/// A statement reached the engine but did not complete successfully.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("statement failed with status {status}: {detail}")]
    Statement { status: String, detail: Value },

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("create on '{target}' returned no record")]
    Unconfirmed { target: String },
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("connection '{name}' is not configured")]
    UnknownConnection { name: String },

    #[error("failed to read config file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Error {
    /// Engine-reported detail for statement failures, if any.
    pub fn detail(&self) -> Option<&Value> {
        match self {
            Error::Query(QueryError::Statement { detail, .. }) => Some(detail),
            _ => None,
        }
    }
}
