//! Reply envelopes and their unwrapping.
use serde::Deserialize;
use serde_json::Value;

use crate::{Result, error::QueryError};

use super::TransportError;

const STATUS_OK: &str = "OK";

/// Outcome of one statement within a raw query.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StatementResult {
    pub status: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub time: Option<String>,
}

impl StatementResult {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Reply to one RPC call over the socket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Reply {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl Reply {
    pub fn answers(&self, id: &str) -> bool {
        matches!(&self.id, Some(Value::String(s)) if s == id)
    }

    pub fn into_result(self) -> std::result::Result<Value, QueryError> {
        match self.error {
            Some(RpcError { code, message }) => Err(QueryError::Rpc { code, message }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Reads a list of statement envelopes out of a decoded reply body.
pub fn parse_statements(body: Value) -> std::result::Result<Vec<StatementResult>, TransportError> {
    match body {
        Value::Array(_) => Ok(serde_json::from_value(body)?),
        other => Err(TransportError::Malformed(format!(
            "expected a list of statement results, got {other}"
        ))),
    }
}

/// Unwraps statement envelopes into the caller's result.
///
/// The first envelope whose status is not `OK` fails the call and nothing else is looked
/// at. One envelope yields its result as is; several yield the list of all results.
pub fn unwrap_statements(envelopes: Vec<StatementResult>) -> Result<Value> {
    if let Some(failed) = envelopes.iter().find(|e| !e.is_ok()) {
        let detail = failed.detail.clone().unwrap_or_else(|| failed.result.clone());
        return Err(QueryError::Statement {
            status: failed.status.clone(),
            detail,
        }
        .into());
    }

    let mut results = envelopes.into_iter().map(|e| e.result).collect::<Vec<_>>();
    match results.len() {
        0 => Ok(Value::Null),
        1 => Ok(results.remove(0)),
        _ => Ok(Value::Array(results)),
    }
}
