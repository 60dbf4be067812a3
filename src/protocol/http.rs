//! Request/response transport over HTTP.
use log::{debug, trace};
use reqwest::{
    Method as HttpMethod, Url,
    blocking::Client,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::{Map, Value};

use crate::{RecordId, Result, config::TransportConfig, statement::Statement};

use super::{Transport, TransportError, TransportKind, response};

const SQL_ENDPOINT: &str = "sql";
const KEY_ENDPOINT: &str = "key";
const HEALTH_ENDPOINT: &str = "health";
const JSON: &str = "application/json";

/// Where a record write ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    /// Resource endpoint under `/key`.
    Resource {
        method: HttpMethod,
        segments: Vec<String>,
    },
    /// Inline statement for `/sql`, used for oversized bodies.
    Statement(String),
}

enum Body<'a> {
    Empty,
    Text(String),
    Json(&'a Map<String, Value>),
}

pub struct HttpTransport {
    client: Client,
    base: Url,
    user: Option<String>,
    password: Option<String>,
    namespace: String,
    database: String,
    max_payload_bytes: usize,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> std::result::Result<Self, TransportError> {
        let address = format!("http://{}:{}/", config.host(), config.port());
        let base = Url::parse(&address).map_err(|_| TransportError::Endpoint(address))?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base,
            user: config.user.clone(),
            password: config.password.clone(),
            namespace: config.namespace().to_string(),
            database: config.database().to_string(),
            max_payload_bytes: config.max_payload_bytes(),
        })
    }

    fn url<S: AsRef<str>>(&self, segments: &[S]) -> std::result::Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Endpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments.iter().map(AsRef::as_ref));
        Ok(url)
    }

    fn resource(target: &RecordId) -> Result<Vec<String>> {
        let mut segments = vec![KEY_ENDPOINT.to_string(), target.require_table()?.to_string()];
        if let Some(id) = target.id() {
            segments.push(id.to_string());
        }
        Ok(segments)
    }

    fn oversized(&self, data: &Map<String, Value>) -> std::result::Result<bool, TransportError> {
        let size = serde_json::to_vec(data)?.len();
        trace!("payload size {size} bytes, limit {}", self.max_payload_bytes);
        Ok(size > self.max_payload_bytes)
    }

    /// Chooses between the resource endpoint and an inline statement for a create.
    pub(crate) fn create_route(
        &self,
        target: &RecordId,
        data: &Map<String, Value>,
    ) -> Result<Route> {
        let target = RecordId::for_record(&target.raw(), data)?;
        if self.oversized(data)? {
            let data = without_id(data);
            let stmt = Statement::Create {
                target: &target,
                data: &data,
            };
            return Ok(Route::Statement(stmt.to_string()));
        }
        Ok(Route::Resource {
            method: HttpMethod::POST,
            segments: Self::resource(&target)?,
        })
    }

    pub(crate) fn update_route(
        &self,
        target: &RecordId,
        data: &Map<String, Value>,
    ) -> Result<Route> {
        let target = RecordId::for_record(&target.raw(), data)?;
        target.require_table()?;
        target.require_id("update")?;
        if self.oversized(data)? {
            let data = without_id(data);
            let stmt = Statement::Update {
                target: &target,
                data: &data,
            };
            return Ok(Route::Statement(stmt.to_string()));
        }
        Ok(Route::Resource {
            method: HttpMethod::PUT,
            segments: Self::resource(&target)?,
        })
    }

    fn write(&mut self, route: Route, data: &Map<String, Value>) -> Result<Value> {
        match route {
            Route::Statement(stmt) => {
                debug!("payload over {} bytes, writing through query", self.max_payload_bytes);
                self.query(&stmt)
            }
            Route::Resource { method, segments } => {
                let url = self.url(segments.as_slice())?;
                self.send(method, url, Body::Json(data))
            }
        }
    }

    fn request(&self, method: HttpMethod, url: Url) -> reqwest::blocking::RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header(ACCEPT, JSON)
            .header("NS", &self.namespace)
            .header("DB", &self.database);

        match &self.user {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    /// Issue one call and unwrap its statement envelopes.
    fn send(&mut self, method: HttpMethod, url: Url, body: Body<'_>) -> Result<Value> {
        debug!("{method} {url}");
        let request = self.request(method, url);
        let request = match body {
            Body::Empty => request,
            Body::Text(text) => request.header(CONTENT_TYPE, "text/plain").body(text),
            Body::Json(data) => request.json(data),
        };

        let response = request.send().map_err(TransportError::from)?;
        let status = response.status();
        let text = response.text().map_err(TransportError::from)?;
        trace!("{status}: {text}");

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        let body: Value = serde_json::from_str(&text).map_err(TransportError::from)?;
        response::unwrap_statements(response::parse_statements(body)?)
    }
}

fn without_id(data: &Map<String, Value>) -> Map<String, Value> {
    let mut data = data.clone();
    data.remove("id");
    data
}

impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn query(&mut self, statement: &str) -> Result<Value> {
        let url = self.url(&[SQL_ENDPOINT])?;
        self.send(HttpMethod::POST, url, Body::Text(statement.to_string()))
    }

    fn select(&mut self, target: &RecordId) -> Result<Value> {
        let url = self.url(Self::resource(target)?.as_slice())?;
        self.send(HttpMethod::GET, url, Body::Empty)
    }

    fn create(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value> {
        let route = self.create_route(target, data)?;
        self.write(route, data)
    }

    fn update(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value> {
        let route = self.update_route(target, data)?;
        self.write(route, data)
    }

    fn delete(&mut self, target: &RecordId) -> Result<Value> {
        let url = self.url(Self::resource(target)?.as_slice())?;
        self.send(HttpMethod::DELETE, url, Body::Empty)
    }

    fn use_scope(&mut self, namespace: &str, database: &str) -> Result<()> {
        self.namespace = namespace.to_string();
        self.database = database.to_string();
        Ok(())
    }

    fn ping(&mut self) -> Result<()> {
        let url = self.url(&[HEALTH_ENDPOINT])?;
        let response = self
            .request(HttpMethod::GET, url)
            .send()
            .map_err(TransportError::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().map_err(TransportError::from)?;
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
        sync::mpsc,
        thread,
    };

    use serde_json::json;

    use crate::{Error, error::QueryError};

    use super::*;

    /// One captured HTTP request: request line, headers (lowercased names) and body.
    #[derive(Debug)]
    struct Captured {
        line: String,
        headers: Vec<(String, String)>,
        body: String,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Serve canned `(status, body)` replies, one per connection, in order.
    fn serve(replies: Vec<(u16, String)>) -> (u16, mpsc::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for (status, reply) in replies {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut line = String::new();
                reader.read_line(&mut line).unwrap();

                let mut headers = Vec::new();
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((k, v)) = header.split_once(':') {
                        headers.push((k.trim().to_lowercase(), v.trim().to_string()));
                    }
                }

                let length = headers
                    .iter()
                    .find(|(k, _)| k == "content-length")
                    .map(|(_, v)| v.parse::<usize>().unwrap())
                    .unwrap_or(0);
                let mut body = vec![0; length];
                reader.read_exact(&mut body).unwrap();

                tx.send(Captured {
                    line: line.trim_end().to_string(),
                    headers,
                    body: String::from_utf8(body).unwrap(),
                })
                .unwrap();

                let mut stream = stream;
                write!(
                    stream,
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                    reply.len()
                )
                .unwrap();
                stream.flush().unwrap();
            }
        });

        (port, rx)
    }

    fn transport(port: u16, max_payload_bytes: Option<usize>) -> HttpTransport {
        let mut config = TransportConfig {
            host: Some("127.0.0.1".into()),
            port: Some(port),
            user: Some("root".into()),
            password: Some("secret".into()),
            namespace: Some("test".into()),
            database: Some("test".into()),
            max_payload_bytes,
            ..Default::default()
        };
        config.apply_defaults(false);
        HttpTransport::new(&config).unwrap()
    }

    fn ok(result: Value) -> String {
        json!([{"time": "1ms", "status": "OK", "result": result}]).to_string()
    }

    #[test]
    fn query_posts_raw_statement() {
        let (port, rx) = serve(vec![(200, ok(json!([])))]);
        let mut http = transport(port, None);

        let result = http.query("SELECT * FROM emptytable").unwrap();
        assert_eq!(result, json!([]));

        let req = rx.recv().unwrap();
        assert_eq!(req.line, "POST /sql HTTP/1.1");
        assert_eq!(req.body, "SELECT * FROM emptytable");
        assert_eq!(req.header("ns"), Some("test"));
        assert_eq!(req.header("db"), Some("test"));
        assert_eq!(req.header("accept"), Some(JSON));
        assert!(req.header("authorization").unwrap().starts_with("Basic "));
    }

    #[test]
    fn create_with_id_addresses_record() {
        let (port, rx) = serve(vec![(200, ok(json!([{"id": "test:test", "name": "test"}])))]);
        let mut http = transport(port, None);

        let data = json!({"id": "test", "name": "test"});
        let result = http
            .create(&RecordId::table_only("test"), data.as_object().unwrap())
            .unwrap();
        assert_eq!(result, json!([{"id": "test:test", "name": "test"}]));

        let req = rx.recv().unwrap();
        assert_eq!(req.line, "POST /key/test/test HTTP/1.1");
        let body: Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body, data);
    }

    #[test]
    fn create_without_id_addresses_table() {
        let (port, rx) = serve(vec![(200, ok(json!([{"id": "test:x1"}])))]);
        let mut http = transport(port, None);

        let data = json!({"name": "test"});
        http.create(&RecordId::table_only("test"), data.as_object().unwrap())
            .unwrap();
        assert_eq!(rx.recv().unwrap().line, "POST /key/test HTTP/1.1");
    }

    #[test]
    fn create_with_foreign_id_is_rejected() {
        let http = transport(1, None);
        let data = json!({"id": "other:1"});
        let err = http
            .create_route(&RecordId::table_only("test"), data.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn oversized_create_goes_through_query() {
        let (port, rx) = serve(vec![(200, ok(json!([{"id": "test:big"}])))]);
        let mut http = transport(port, Some(32));

        let data = json!({"id": "big", "text": "x".repeat(64)});
        http.create(&RecordId::table_only("test"), data.as_object().unwrap())
            .unwrap();

        let req = rx.recv().unwrap();
        assert_eq!(req.line, "POST /sql HTTP/1.1");
        assert_eq!(
            req.body,
            format!("CREATE test:big CONTENT {{\"text\": '{}'}}", "x".repeat(64))
        );
    }

    #[test]
    fn payload_at_threshold_uses_resource_endpoint() {
        let data = json!({"a": 1});
        let size = serde_json::to_vec(&data).unwrap().len();
        let http = transport(1, Some(size));

        let route = http
            .create_route(&RecordId::table_only("t"), data.as_object().unwrap())
            .unwrap();
        assert_eq!(
            route,
            Route::Resource {
                method: HttpMethod::POST,
                segments: vec!["key".into(), "t".into()]
            }
        );

        let http = transport(1, Some(size - 1));
        let route = http
            .create_route(&RecordId::table_only("t"), data.as_object().unwrap())
            .unwrap();
        assert_eq!(route, Route::Statement("CREATE t CONTENT {\"a\": 1}".into()));
    }

    #[test]
    fn update_requires_id() {
        let http = transport(1, None);
        let data = json!({"name": "x"});
        let err = http
            .update_route(&RecordId::table_only("t"), data.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(crate::ValidationError::MissingId { .. })
        ));
    }

    #[test]
    fn update_puts_record() {
        let http = transport(1, None);
        let data = json!({"name": "x"});
        let route = http
            .update_route(&RecordId::new("t", "1"), data.as_object().unwrap())
            .unwrap();
        assert_eq!(
            route,
            Route::Resource {
                method: HttpMethod::PUT,
                segments: vec!["key".into(), "t".into(), "1".into()]
            }
        );
    }

    #[test]
    fn oversized_update_goes_through_query() {
        let data = json!({"id": "1", "a": 1});
        let size = serde_json::to_vec(&data).unwrap().len();
        let http = transport(1, Some(size));

        let route = http
            .update_route(&RecordId::table_only("t"), data.as_object().unwrap())
            .unwrap();
        assert_eq!(
            route,
            Route::Resource {
                method: HttpMethod::PUT,
                segments: vec!["key".into(), "t".into(), "1".into()]
            }
        );

        let http = transport(1, Some(size - 1));
        let route = http
            .update_route(&RecordId::table_only("t"), data.as_object().unwrap())
            .unwrap();
        assert_eq!(route, Route::Statement("UPDATE t:1 CONTENT {\"a\": 1}".into()));
    }

    #[test]
    fn ping_checks_health_status() {
        let (port, rx) = serve(vec![(200, "{}".into()), (503, "starting".into())]);
        let mut http = transport(port, None);

        http.ping().unwrap();
        assert_eq!(rx.recv().unwrap().line, "GET /health HTTP/1.1");

        match http.ping() {
            Err(Error::Transport(TransportError::Status { status, body })) => {
                assert_eq!(status, 503);
                assert_eq!(body, "starting");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn bad_status_is_transport_error() {
        let (port, _rx) = serve(vec![(400, "{\"details\":\"bad request\"}".into())]);
        let mut http = transport(port, None);

        match http.query("NOT A QUERY") {
            Err(Error::Transport(TransportError::Status { status, body })) => {
                assert_eq!(status, 400);
                assert!(body.contains("bad request"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn failing_statement_returns_no_partial_results() {
        let reply = json!([
            {"status": "OK", "result": [{"id": "t:1"}]},
            {"status": "ERR", "detail": "Database record `t:1` already exists"}
        ])
        .to_string();
        let (port, _rx) = serve(vec![(200, reply)]);
        let mut http = transport(port, None);

        let err = http
            .query("SELECT * FROM t; CREATE t:1")
            .unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Statement { .. })));
    }

    #[test]
    fn use_scope_changes_headers() {
        let (port, rx) = serve(vec![(200, ok(json!([])))]);
        let mut http = transport(port, None);

        http.use_scope("other_ns", "other_db").unwrap();
        http.select(&RecordId::new("t", "a b")).unwrap();

        let req = rx.recv().unwrap();
        assert_eq!(req.line, "GET /key/t/a%20b HTTP/1.1");
        assert_eq!(req.header("ns"), Some("other_ns"));
        assert_eq!(req.header("db"), Some("other_db"));
    }
}
