//! In-memory transport that records calls and replays canned results.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde_json::{Map, Value, json};

use crate::{
    Connection, RecordId, Result,
    error::QueryError,
    protocol::{Transport, TransportKind},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query(String),
    Select(String),
    Create(String, Value),
    Update(String, Value),
    Delete(String),
    Use(String, String),
    Ping,
    Close,
}

enum Outcome {
    Value(Value),
    Fail(QueryError),
}

#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Call>>>);

impl Log {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Query(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }
}

pub struct Recorder {
    log: Log,
    outcomes: VecDeque<Outcome>,
}

impl Recorder {
    /// A connection answering its calls with `results` in order, then with empty lists.
    pub fn connection(results: Vec<Value>) -> (Connection, Log) {
        Self::with(results.into_iter().map(Outcome::Value).collect())
    }

    /// A connection whose first call fails with a statement error.
    pub fn failing() -> (Connection, Log) {
        Self::with(VecDeque::from([Outcome::Fail(QueryError::Statement {
            status: "ERR".into(),
            detail: json!("An error occurred: x"),
        })]))
    }

    fn with(outcomes: VecDeque<Outcome>) -> (Connection, Log) {
        let log = Log::default();
        let recorder = Recorder {
            log: log.clone(),
            outcomes,
        };
        (Connection::new(Box::new(recorder)), log)
    }

    fn answer(&mut self, call: Call) -> Result<Value> {
        self.log.push(call);
        match self.outcomes.pop_front() {
            Some(Outcome::Value(value)) => Ok(value),
            Some(Outcome::Fail(err)) => Err(err.into()),
            None => Ok(json!([])),
        }
    }
}

impl Transport for Recorder {
    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }

    fn query(&mut self, statement: &str) -> Result<Value> {
        self.answer(Call::Query(statement.to_string()))
    }

    fn select(&mut self, target: &RecordId) -> Result<Value> {
        self.answer(Call::Select(target.raw()))
    }

    fn create(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value> {
        self.answer(Call::Create(target.raw(), Value::Object(data.clone())))
    }

    fn update(&mut self, target: &RecordId, data: &Map<String, Value>) -> Result<Value> {
        self.answer(Call::Update(target.raw(), Value::Object(data.clone())))
    }

    fn delete(&mut self, target: &RecordId) -> Result<Value> {
        self.answer(Call::Delete(target.raw()))
    }

    fn use_scope(&mut self, namespace: &str, database: &str) -> Result<()> {
        self.log
            .push(Call::Use(namespace.to_string(), database.to_string()));
        Ok(())
    }

    fn ping(&mut self) -> Result<()> {
        self.log.push(Call::Ping);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.push(Call::Close);
        Ok(())
    }
}
