//! RPC transport over a persistent WebSocket.
use std::net::TcpStream;

use log::{debug, info, trace, warn};
use serde_json::{Map, Value, json};
use tungstenite::{Message, WebSocket, stream::MaybeTlsStream};

use crate::{RecordId, Result, config::TransportConfig, error::QueryError};

use super::{Method, Reply, Request, Transport, TransportError, TransportKind, response};

const RPC_PATH: &str = "rpc";

pub struct SocketTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    url: String,
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

impl SocketTransport {
    /// Open the socket, select namespace and database, then sign in if a user is set.
    pub fn connect(config: &TransportConfig) -> Result<Self> {
        let url = format!("ws://{}:{}/{RPC_PATH}", config.host(), config.port());
        info!("connecting to {url}");

        let (mut socket, _) = tungstenite::connect(url.as_str()).map_err(TransportError::from)?;
        if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
            stream
                .set_read_timeout(Some(config.timeout()))
                .map_err(TransportError::from)?;
        }

        let mut transport = Self { socket, url };

        transport.use_scope(config.namespace(), config.database())?;
        if let Some(user) = &config.user {
            info!("signing in as {user}");
            let credentials = json!({
                "user": user,
                "pass": config.password.clone().unwrap_or_default(),
            });
            transport.call(Method::Signin, vec![credentials])?;
        }

        info!("connected to {}", transport.url);
        Ok(transport)
    }

    /// Send one call and block until its reply arrives.
    pub fn call(&mut self, method: Method, params: Vec<Value>) -> Result<Value> {
        let request = Request::new(method, params);
        debug!("rpc {:?} id={}", request.method, request.id);

        let text = serde_json::to_string(&request).map_err(TransportError::from)?;
        self.socket
            .send(Message::Text(text))
            .map_err(TransportError::from)?;

        loop {
            let text = match self.socket.read().map_err(TransportError::from)? {
                Message::Text(text) => text,
                Message::Binary(bytes) => String::from_utf8(bytes)
                    .map_err(|e| TransportError::Malformed(e.to_string()))?,
                Message::Close(_) => return Err(TransportError::Closed.into()),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            trace!("reply: {text}");

            let reply: Reply = serde_json::from_str(&text).map_err(TransportError::from)?;
            if !reply.answers(&request.id) {
                warn!("skipping reply {:?} while awaiting {}", reply.id, request.id);
                continue;
            }
            return Ok(reply.into_result()?);
        }
    }
}

impl Transport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    fn query(&mut self, statement: &str) -> Result<Value> {
        let result = self.call(Method::Query, vec![json!(statement)])?;
        response::unwrap_statements(response::parse_statements(result)?)
    }

    fn select(&mut self, target: &RecordId) -> Result<Value> {
        target.require_table()?;
        self.call(Method::Select, vec![json!(target.raw())])
    }

    fn create(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value> {
        let target = RecordId::for_record(&target.raw(), data)?;
        target.require_table()?;

        let result = self.call(Method::Create, vec![json!(target.raw()), json!(data)])?;
        if is_empty(&result) {
            return Err(QueryError::Unconfirmed {
                target: target.raw(),
            }
            .into());
        }
        Ok(result)
    }

    fn update(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value> {
        let target = RecordId::for_record(&target.raw(), data)?;
        target.require_table()?;
        target.require_id("update")?;
        self.call(Method::Update, vec![json!(target.raw()), json!(data)])
    }

    fn delete(&mut self, target: &RecordId) -> Result<Value> {
        target.require_table()?;
        self.call(Method::Delete, vec![json!(target.raw())])
    }

    fn use_scope(&mut self, namespace: &str, database: &str) -> Result<()> {
        self.call(Method::Use, vec![json!(namespace), json!(database)])?;
        Ok(())
    }

    fn ping(&mut self) -> Result<()> {
        self.call(Method::Ping, Vec::new())?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        debug!("closing {}", self.url);
        match self.socket.close(None) {
            Ok(()) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(e) => return Err(TransportError::from(e).into()),
        }
        // Drain until the peer acknowledges the close.
        loop {
            match self.socket.read() {
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(());
                }
                Err(e) => return Err(TransportError::from(e).into()),
            }
        }
    }
}
