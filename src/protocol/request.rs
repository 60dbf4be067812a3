use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

/// RPC methods understood by the socket endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Use,
    Signin,
    Ping,
    Query,
    Create,
    Update,
    Select,
    Delete,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Request {
    pub id: String,
    pub method: Method,
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(method: Method, params: Vec<Value>) -> Self {
        Self {
            id: correlation_id(),
            method,
            params,
        }
    }
}

/// Millisecond timestamp plus a random suffix.
///
/// Only needs to be unique among the calls outstanding on one socket, which is one.
pub fn correlation_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{millis:x}{:04x}", rand::random::<u16>())
}
