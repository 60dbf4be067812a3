//! Connections.
//!
//! A [`Connection`] owns one [`Transport`] and offers the same record operations whichever
//! wire protocol is underneath. It adds the operations the wire protocols lack: creating
//! lists of records, upserts, relations, and entry into the [`QueryBuilder`].
//!
//! A connection is not meant to be shared between threads without a lock around it; see
//! [`Registry`](crate::Registry) for the shared form.
use std::fmt;

use log::{debug, info};
use serde_json::{Map, Value};

use crate::{
    QueryBuilder, RecordId, Result,
    config::TransportConfig,
    error::ValidationError,
    protocol::{HttpTransport, SocketTransport, Transport, TransportKind},
    query::Filter,
    record::id_text,
};

const ID_KEY: &str = "id";

pub struct Connection {
    transport: Box<dyn Transport>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

pub(crate) fn as_record(value: &Value) -> std::result::Result<&Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError::NotARecord {
        found: value.to_string(),
    })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

impl Connection {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Open a connection over the transport `config` asks for.
    pub fn connect(config: &TransportConfig) -> Result<Self> {
        info!(
            "opening {:?} connection to {}:{}",
            config.kind(),
            config.host(),
            config.port()
        );
        let transport: Box<dyn Transport> = match config.kind() {
            TransportKind::Http => Box::new(HttpTransport::new(config)?),
            TransportKind::Websocket => Box::new(SocketTransport::connect(config)?),
        };
        Ok(Self::new(transport))
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn table(&mut self, table: impl Into<String>) -> QueryBuilder<'_> {
        QueryBuilder::bound(self, table)
    }

    pub fn query(&mut self, sql: &str) -> Result<Value> {
        self.transport.query(sql)
    }

    /// Same as [`query`](Self::query).
    pub fn select(&mut self, sql: &str) -> Result<Value> {
        self.query(sql)
    }

    /// A whole table, or one record when an id is given here or in `table`.
    pub fn get(&mut self, table: &str, id: Option<&str>) -> Result<Value> {
        let target = RecordId::parse(Some(table), id)?;
        target.require_table()?;
        self.transport.select(&target)
    }

    /// Create a record, or one record per element when `data` is a list.
    pub fn create(&mut self, table: &str, data: Value) -> Result<Value> {
        match &data {
            Value::Array(rows) => {
                let mut created = Vec::with_capacity(rows.len());
                for row in rows {
                    created.push(self.create_one(table, as_record(row)?)?);
                }
                Ok(Value::Array(created))
            }
            other => self.create_one(table, as_record(other)?),
        }
    }

    fn create_one(&mut self, table: &str, data: &Map<String, Value>) -> Result<Value> {
        let target = RecordId::for_record(table, data)?;
        target.require_table()?;
        self.transport.create(&target, data)
    }

    /// Same as [`create`](Self::create).
    pub fn insert(&mut self, table: &str, data: Value) -> Result<Value> {
        self.create(table, data)
    }

    /// Replace a record. The id comes from `table` (`table:id`) or from `data`.
    pub fn update(&mut self, table: &str, data: Value) -> Result<Value> {
        let data = as_record(&data)?;
        let target = RecordId::for_record(table, data)?;
        target.require_table()?;
        target.require_id("update")?;
        self.transport.update(&target, data)
    }

    /// Update the record matching `keys`, or create it when there is none.
    ///
    /// `keys` defaults to `["id"]` when empty. Keyed by id alone, the record is looked up
    /// directly; otherwise a query on the key columns finds it.
    pub fn upsert(&mut self, target: &str, data: Value, keys: &[&str]) -> Result<Value> {
        let record = as_record(&data)?;
        let keys = if keys.is_empty() { &[ID_KEY][..] } else { keys };
        let by_id = keys == [ID_KEY];

        if target.contains(':') && !by_id {
            return Err(ValidationError::KeyedTarget {
                target: target.to_string(),
            }
            .into());
        }

        let rid = RecordId::for_record(target, record)?;
        let table = rid.require_table()?.to_string();

        if by_id {
            rid.require_id("upsert")?;
            let existing = self.transport.select(&rid)?;
            return if is_empty(&existing) {
                debug!("upsert {}: not found, creating", rid.raw());
                self.transport.create(&rid, record)
            } else {
                debug!("upsert {}: exists, updating", rid.raw());
                self.transport.update(&rid, record)
            };
        }

        let mut conditions = Vec::with_capacity(keys.len());
        for key in keys {
            if *key == ID_KEY {
                rid.require_id("upsert")?;
                conditions.push(Filter::eq(ID_KEY, rid.raw()));
                continue;
            }
            let value = record.get(*key).ok_or_else(|| ValidationError::MissingKey {
                key: key.to_string(),
            })?;
            conditions.push(Filter::eq(*key, value.clone()));
        }

        let found = self
            .table(table.as_str())
            .select([ID_KEY])
            .and_where(conditions)
            .first()?;

        match found.as_ref().and_then(|row| row.get(ID_KEY)).and_then(id_text) {
            Some(id) => {
                let existing = RecordId::parse(Some(&table), Some(&id))?;
                debug!("upsert {}: matched on {keys:?}, updating", existing.raw());
                self.transport.update(&existing, record)
            }
            None => {
                debug!("upsert {table}: no match on {keys:?}, creating");
                self.transport.create(&rid, record)
            }
        }
    }

    /// Delete one record. Use [`drop`](Self::drop) to delete a whole table.
    pub fn delete(&mut self, table: &str, id: Option<&str>) -> Result<Value> {
        let target = RecordId::parse(Some(table), id)?;
        target.require_table()?;
        target.require_id("delete")?;
        self.transport.delete(&target)
    }

    /// Delete every record in `table`.
    pub fn drop(&mut self, table: &str) -> Result<Value> {
        self.transport.delete(&RecordId::table_only(table))
    }

    /// Create a `from->verb->to` edge between two records.
    pub fn relate(
        &mut self,
        from: &str,
        verb: &str,
        to: &str,
        data: Option<Value>,
    ) -> Result<Value> {
        self.table(verb).relate(from, verb, to, data)
    }

    pub fn use_scope(&mut self, namespace: &str, database: &str) -> Result<()> {
        self.transport.use_scope(namespace, database)
    }

    pub fn ping(&mut self) -> Result<()> {
        self.transport.ping()
    }

    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }
}
