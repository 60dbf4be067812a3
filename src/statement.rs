//! Statement kinds and whole-record write statements.
use std::fmt;

use serde_json::{Map, Value};

use crate::{RecordId, query::literal};

/// What a query builder compiles to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operation {
    #[default]
    Select,
    Update,
    Relate,
    Delete,
}

/// A write carrying the full record body inline, e.g. `CREATE person:1 CONTENT {...}`.
///
/// Used when a body is too large for the resource endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement<'a> {
    Create {
        target: &'a RecordId,
        data: &'a Map<String, Value>,
    },
    Update {
        target: &'a RecordId,
        data: &'a Map<String, Value>,
    },
}

impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (verb, target, data) = match self {
            Statement::Create { target, data } => ("CREATE", target, data),
            Statement::Update { target, data } => ("UPDATE", target, data),
        };
        write!(f, "{verb} {target} CONTENT {}", literal::object(data))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn create_statement_inlines_content() {
        let target = RecordId::table_only("person");
        let data = json!({"name": "it's"});
        let stmt = Statement::Create {
            target: &target,
            data: data.as_object().unwrap(),
        };
        assert_eq!(
            stmt.to_string(),
            "CREATE person CONTENT {\"name\": 'it\\'s'}"
        );
    }

    #[test]
    fn update_statement_targets_record() {
        let target = RecordId::new("person", "1");
        let data = json!({"age": 3});
        let stmt = Statement::Update {
            target: &target,
            data: data.as_object().unwrap(),
        };
        assert_eq!(stmt.to_string(), "UPDATE person:1 CONTENT {\"age\": 3}");
    }
}
