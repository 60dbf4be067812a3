//! Wire protocols spoken to the database.
//!
//! The database is reachable two ways, and this module hides the difference behind the
//! [`Transport`] trait so that a [`Connection`](crate::Connection) never cares which one it
//! is talking through.
//!
//! # Overview
//!
//! - [`HttpTransport`]: stateless. Every operation is one HTTP call. Raw statements go to
//!   `POST /sql`, records are addressed as resources under `/key/{table}[/{id}]`, and the
//!   namespace, database and credentials ride along as headers on every call.
//! - [`SocketTransport`]: one persistent WebSocket at `/rpc`. Namespace and database are
//!   selected once with `use`, credentials once with `signin`, and every operation is an
//!   RPC call tagged with a correlation id whose reply is awaited before the next call.
//!
//! # Result envelopes
//!
//! Raw statements answer with one envelope per statement, each carrying a `status`. Both
//! transports unwrap them the same way (see [`response`]): the first envelope whose status
//! is not `OK` fails the whole call, a single envelope yields its result directly, and
//! several envelopes yield the list of all their results.
//!
//! # Key Components
//!
//! - [`Transport`]: the operation contract shared by both variants.
//! - [`Request`]/[`Reply`]: RPC envelopes used over the socket.
//! - [`StatementResult`]: per-statement envelope used by both.
//! - [`TransportError`]: failures of the wire itself.
mod http;
mod request;
pub mod response;
mod socket;
mod transport;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{RecordId, Result};

pub use http::HttpTransport;
pub use request::{Method, Request, correlation_id};
pub use response::{Reply, RpcError, StatementResult};
pub use socket::SocketTransport;
pub use transport::TransportError;

/// Which wire protocol a connection speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[serde(alias = "https")]
    Http,
    #[default]
    #[serde(alias = "ws", alias = "wss", alias = "socket")]
    Websocket,
}

/// Uniform operation contract over both wire protocols.
///
/// Record bodies are JSON objects. Targets name a table, or a single record when the
/// [`RecordId`] carries an id.
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Run raw query text and return the unwrapped statement result(s).
    fn query(&mut self, statement: &str) -> Result<Value>;

    fn select(&mut self, target: &RecordId) -> Result<Value>;

    fn create(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value>;

    fn update(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value>;

    fn delete(&mut self, target: &RecordId) -> Result<Value>;

    /// Switch namespace and database for subsequent calls.
    fn use_scope(&mut self, namespace: &str, database: &str) -> Result<()>;

    fn ping(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}
