use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(reqwest::Error),
    #[error("websocket failure: {0}")]
    WebSocket(tungstenite::Error),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("timed out waiting for a reply")]
    Timeout,
    #[error("connection closed")]
    Closed,
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed reply: {0}")]
    Malformed(String),
    #[error("invalid endpoint '{0}'")]
    Endpoint(String),
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(err)
        }
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Io(e) if is_timeout(&e) => TransportError::Timeout,
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed
            }
            e => TransportError::WebSocket(e),
        }
    }
}
