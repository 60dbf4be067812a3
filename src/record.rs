//! Record identifiers.
//!
//! A record is addressed by a `table` and an optional `id`. Callers may hand these over as
//! one combined `table:id` token, as two separate arguments, or as a mix of both; [`RecordId::parse`]
//! reconciles them and refuses to guess when they disagree.
//!
//! # Example
//! ```rust
//! use tundra::RecordId;
//!
//! let rid = RecordId::parse(Some("person:tobie"), None).unwrap();
//! assert_eq!(rid.table(), Some("person"));
//! assert_eq!(rid.id(), Some("tobie"));
//!
//! assert!(RecordId::parse(Some("person:tobie"), Some("jaime")).is_err());
//! ```
use std::fmt;

use serde_json::{Map, Value};

use crate::error::ValidationError;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RecordId {
    table: Option<String>,
    id: Option<String>,
}

fn split(token: &str) -> (Option<&str>, &str) {
    match token.split_once(SEPARATOR) {
        Some((table, id)) => (Some(table), id),
        None => (None, token),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl RecordId {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            id: Some(id.into()),
        }
    }

    pub fn table_only(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            id: None,
        }
    }

    /// Reconcile a table (or `table:id` token) with an explicit id (or `table:id` token).
    ///
    /// Either side may carry a table and an id. When both sides name a table they must be
    /// equal, and likewise for the id.
    pub fn parse(table: Option<&str>, id: Option<&str>) -> Result<Self, ValidationError> {
        let (table_table, table_id) = match table {
            Some(token) => match split(token) {
                (Some(t), i) => (non_empty(t), non_empty(i)),
                (None, t) => (non_empty(t), None),
            },
            None => (None, None),
        };

        let (id_table, id_id) = match id {
            Some(token) => {
                let (t, i) = split(token);
                (t.and_then(non_empty), non_empty(i))
            }
            None => (None, None),
        };

        if let (Some(t), Some(it)) = (&table_table, &id_table) {
            if t != it {
                return Err(ValidationError::TableMismatch {
                    table: t.clone(),
                    id_table: it.clone(),
                });
            }
        }

        if let (Some(ti), Some(i)) = (&table_id, &id_id) {
            if ti != i {
                return Err(ValidationError::IdMismatch {
                    table_id: ti.clone(),
                    id: i.clone(),
                });
            }
        }

        Ok(Self {
            table: table_table.or(id_table),
            id: table_id.or(id_id),
        })
    }

    /// Reconcile a target with the `id` field of a record body, if it has one.
    pub fn for_record(target: &str, data: &Map<String, Value>) -> Result<Self, ValidationError> {
        let id = data.get("id").and_then(id_text);
        Self::parse(Some(target), id.as_deref())
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn require_table(&self) -> Result<&str, ValidationError> {
        self.table().ok_or(ValidationError::MissingTable)
    }

    pub fn require_id(&self, operation: &'static str) -> Result<&str, ValidationError> {
        self.id().ok_or(ValidationError::MissingId { operation })
    }

    /// `table:id` as the wire protocols expect it, without query-text escaping.
    pub fn raw(&self) -> String {
        match (&self.table, &self.id) {
            (Some(t), Some(i)) => format!("{t}{SEPARATOR}{i}"),
            (Some(t), None) => t.clone(),
            (None, Some(i)) => i.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Text form of an `id` field; numbers are accepted as well as strings.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_plain(ident: &str) -> bool {
    !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders the id for query text. Ids outside `[A-Za-z0-9_]` are wrapped in `⟨⟩`.
impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            write!(f, "{table}")?;
            if self.id.is_some() {
                write!(f, "{SEPARATOR}")?;
            }
        }
        match &self.id {
            Some(id) if is_plain(id) => write!(f, "{id}"),
            Some(id) => write!(f, "⟨{}⟩", id.replace('⟩', "\\⟩")),
            None => Ok(()),
        }
    }
}
