//! Query builder.
//!
//! A [`QueryBuilder`] collects a declarative description of a query (table, projection,
//! filter tree, grouping, ordering, limits, fetched relations) and compiles it to query
//! text only when it is executed. Two builders in the same state always compile to the same
//! text.
//!
//! # Example
//! ```rust
//! use tundra::QueryBuilder;
//!
//! let sql = QueryBuilder::new("person")
//!     .and_where(("age", ">=", 18))
//!     .order_by("age", "desc")
//!     .limit(10)
//!     .to_sql();
//! assert_eq!(sql, "SELECT * FROM person WHERE age >= 18 ORDER BY age desc LIMIT 10");
//! ```
//!
//! Builders obtained from [`Connection::table`](crate::Connection::table) can also run
//! themselves with [`get`](QueryBuilder::get), [`first`](QueryBuilder::first), the
//! aggregate helpers, [`update`](QueryBuilder::update) and friends.
pub mod filter;
pub mod literal;

use log::debug;
use serde_json::{Map, Value};

use crate::{
    Connection, RecordId, Result, connection::as_record, error::ValidationError,
    statement::Operation,
};

pub use filter::Filter;

const DEFAULT_DIRECTION: &str = "ASC";
const ID_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    /// `GROUP ALL`: one group over every row.
    All,
    Column(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relation {
    from: RecordId,
    verb: String,
    to: RecordId,
}

pub struct QueryBuilder<'c> {
    connection: Option<&'c mut Connection>,
    table: String,
    fields: Vec<String>,
    filters: Vec<Filter>,
    group_by: Option<Grouping>,
    order_by: Option<(String, String)>,
    limit: Option<usize>,
    start: Option<usize>,
    fetch: Vec<String>,
    operation: Operation,
    data: Map<String, Value>,
    relation: Option<Relation>,
}

impl QueryBuilder<'static> {
    /// A builder that can compile but not execute.
    pub fn new(table: impl Into<String>) -> Self {
        Self::detached(table.into())
    }
}

impl<'c> QueryBuilder<'c> {
    fn detached(table: String) -> Self {
        Self {
            connection: None,
            table,
            fields: Vec::new(),
            filters: Vec::new(),
            group_by: None,
            order_by: None,
            limit: None,
            start: None,
            fetch: Vec::new(),
            operation: Operation::Select,
            data: Map::new(),
            relation: None,
        }
    }

    pub(crate) fn bound(connection: &'c mut Connection, table: impl Into<String>) -> Self {
        Self {
            connection: Some(connection),
            ..QueryBuilder::detached(table.into())
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Add a clause, AND-joined with the previous one.
    pub fn and_where(mut self, filter: impl Into<Filter>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Add a clause, OR-joined with the previous one.
    pub fn or_where(mut self, filter: impl Into<Filter>) -> Self {
        self.filters.push(Filter::Or);
        self.filters.push(filter.into());
        self
    }

    /// Rows whose `column` is one of `values`.
    pub fn where_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.and_where(Filter::contains(values, column))
    }

    pub fn where_not_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.and_where(Filter::contains_not(values, column))
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = Some(Grouping::Column(column.into()));
        self
    }

    pub fn group_all(mut self) -> Self {
        self.group_by = Some(Grouping::All);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.order_by = Some((column.into(), direction.into()));
        self
    }

    pub fn order_by_asc(self, column: impl Into<String>) -> Self {
        self.order_by(column, DEFAULT_DIRECTION)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    /// Expand a relation or record link in the results.
    ///
    /// The engine only expands reliably over ordered results, so this orders by `id` when
    /// no order was set.
    pub fn fetch(mut self, column: impl Into<String>) -> Self {
        self.fetch.push(column.into());
        if self.order_by.is_none() {
            self.order_by = Some((ID_FIELD.to_string(), DEFAULT_DIRECTION.to_string()));
        }
        self
    }

    /// Query text for the current state.
    pub fn to_sql(&self) -> String {
        match self.operation {
            Operation::Select => self.compile_select(),
            Operation::Update => self.compile_update(),
            Operation::Relate => self.compile_relate(),
            Operation::Delete => self.compile_delete(),
        }
    }

    fn condition(&self) -> String {
        let condition = filter::compile(&self.filters);
        if condition.is_empty() {
            condition
        } else {
            format!(" WHERE {condition}")
        }
    }

    fn compile_select(&self) -> String {
        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };

        let mut sql = format!("SELECT {fields} FROM {}{}", self.table, self.condition());
        match &self.group_by {
            Some(Grouping::All) => sql.push_str(" GROUP ALL"),
            Some(Grouping::Column(column)) => sql.push_str(&format!(" GROUP BY {column}")),
            None => {}
        }
        if let Some((column, direction)) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {column} {direction}"));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(start) = self.start {
            sql.push_str(&format!(" START {start}"));
        }
        if !self.fetch.is_empty() {
            sql.push_str(&format!(" FETCH {}", self.fetch.join(", ")));
        }
        sql
    }

    fn compile_update(&self) -> String {
        let mut sql = format!("UPDATE {}", self.table);
        if !self.data.is_empty() {
            sql.push_str(&format!(" SET {}", literal::assignments(&self.data)));
        }
        sql.push_str(&self.condition());
        sql
    }

    fn compile_delete(&self) -> String {
        format!("DELETE {}{}", self.table, self.condition())
    }

    fn compile_relate(&self) -> String {
        let Some(Relation { from, verb, to }) = &self.relation else {
            return String::new();
        };
        let mut sql = format!("RELATE {from}->{verb}->{to}");
        if !self.data.is_empty() {
            sql.push_str(&format!(" SET {}", literal::assignments(&self.data)));
        }
        sql
    }

    fn execute(mut self) -> Result<Value> {
        let sql = self.to_sql();
        let connection = self.connection.take().ok_or(ValidationError::Detached)?;
        debug!("executing: {sql}");
        connection.query(&sql)
    }

    /// Run the query and return its rows.
    pub fn get(self) -> Result<Vec<Value>> {
        Ok(rows(self.execute()?))
    }

    pub fn first(mut self) -> Result<Option<Value>> {
        self.limit = Some(1);
        Ok(self.get()?.into_iter().next())
    }

    pub fn exists(self) -> Result<bool> {
        Ok(self.first()?.is_some())
    }

    /// Fetch one record of this table by id.
    pub fn find(mut self, id: &str) -> Result<Option<Value>> {
        let target = RecordId::parse(Some(&self.table), Some(id))?;
        target.require_id("find")?;
        let connection = self.connection.take().ok_or(ValidationError::Detached)?;
        Ok(rows(connection.get(&target.raw(), None)?).into_iter().next())
    }

    /// Create one record, or one per element when `rows` is a list.
    pub fn insert(mut self, rows: Value) -> Result<Value> {
        let connection = self.connection.take().ok_or(ValidationError::Detached)?;
        connection.create(&self.table, rows)
    }

    /// Set `data`'s fields on every matching row.
    pub fn update(mut self, data: Value) -> Result<Value> {
        self.data = as_record(&data)?.clone();
        self.operation = Operation::Update;
        self.execute()
    }

    /// Delete every matching row.
    pub fn delete(mut self) -> Result<Value> {
        self.operation = Operation::Delete;
        self.execute()
    }

    /// Create a `from->verb->to` edge, with `data` set on the edge.
    pub fn relate(
        mut self,
        from: &str,
        verb: impl Into<String>,
        to: &str,
        data: Option<Value>,
    ) -> Result<Value> {
        if let Some(data) = &data {
            self.data = as_record(data)?.clone();
        }
        self.relation = Some(Relation {
            from: RecordId::parse(Some(from), None)?,
            verb: verb.into(),
            to: RecordId::parse(Some(to), None)?,
        });
        self.operation = Operation::Relate;
        self.execute()
    }

    pub fn count(self) -> Result<u64> {
        Ok(self.aggregate("count()".to_string())?.as_u64().unwrap_or(0))
    }

    pub fn sum(self, column: &str) -> Result<Value> {
        self.aggregate(format!("math::sum({column})"))
    }

    pub fn avg(self, column: &str) -> Result<Value> {
        self.aggregate(format!("math::mean({column})"))
    }

    pub fn max(self, column: &str) -> Result<Value> {
        self.aggregate(format!("math::max({column})"))
    }

    pub fn min(self, column: &str) -> Result<Value> {
        self.aggregate(format!("math::min({column})"))
    }

    /// Project a single aggregate and read it back from the field it names.
    fn aggregate(mut self, expression: String) -> Result<Value> {
        let field = expression
            .split('(')
            .next()
            .unwrap_or_default()
            .to_string();
        self.fields = vec![expression];
        self.group_by.get_or_insert(Grouping::All);

        let row = self.get()?.into_iter().next();
        Ok(row
            .and_then(|row| row.get(&field).cloned())
            .unwrap_or(Value::Null))
    }
}

/// Flattens a result into rows: lists as-is, a lone record as one row, null as none.
pub(crate) fn rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{Error, testing::Recorder};

    use super::*;

    #[test]
    fn select_everything() {
        assert_eq!(QueryBuilder::new("person").to_sql(), "SELECT * FROM person");
    }

    #[test]
    fn filtered_ordered_limited_select() {
        let sql = QueryBuilder::new("person")
            .and_where(("age", ">=", 18))
            .order_by("age", "desc")
            .limit(10)
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM person WHERE age >= 18 ORDER BY age desc LIMIT 10"
        );
    }

    #[test]
    fn compiling_twice_is_identical() {
        let build = || {
            QueryBuilder::new("person")
                .select(["name", "age"])
                .and_where(("name", "o'neil"))
                .or_where(vec![("age", 42), ("age", 43)])
                .where_in("tags", ["a", "b"])
                .group_by("age")
                .fetch("friends")
                .start(5)
        };
        let first = build();
        assert_eq!(first.to_sql(), first.to_sql());
        assert_eq!(first.to_sql(), build().to_sql());
    }

    #[test]
    fn or_where_joins_group_with_or() {
        let sql = QueryBuilder::new("test")
            .and_where(("age", 2))
            .or_where(vec![Filter::eq("age", 42), Filter::cmp("name", "=", "test")])
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM test WHERE age = 2 OR (age = 42 AND name = 'test')"
        );
    }

    #[test]
    fn empty_condition_group_adds_no_where() {
        let sql = QueryBuilder::new("t")
            .and_where(Vec::<Filter>::new())
            .to_sql();
        assert_eq!(sql, "SELECT * FROM t");
    }

    #[test]
    fn where_in_reverses_operands() {
        let sql = QueryBuilder::new("test")
            .where_in("age", [2, 12])
            .where_not_in("name", ["x"])
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM test WHERE [2, 12] CONTAINS age AND ['x'] CONTAINSNOT name"
        );
    }

    #[test]
    fn string_values_are_escaped() {
        let sql = QueryBuilder::new("test").and_where(("name", "'test'")).to_sql();
        assert_eq!(sql, "SELECT * FROM test WHERE name = '\\'test\\''");
    }

    #[test]
    fn fetch_injects_id_order() {
        let sql = QueryBuilder::new("person").fetch("friends").to_sql();
        assert_eq!(sql, "SELECT * FROM person ORDER BY id ASC FETCH friends");

        let sql = QueryBuilder::new("person")
            .order_by("age", "desc")
            .fetch("friends")
            .fetch("pets")
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM person ORDER BY age desc FETCH friends, pets"
        );
    }

    #[test]
    fn detached_builder_cannot_execute() {
        let err = QueryBuilder::new("person").get().unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Detached)));
    }

    #[test]
    fn get_returns_rows() {
        let (mut conn, log) = Recorder::connection(vec![json!([{"id": "t:1"}, {"id": "t:2"}])]);
        let rows = conn.table("t").and_where(("age", ">", 1)).get().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(log.queries(), vec!["SELECT * FROM t WHERE age > 1"]);
    }

    #[test]
    fn first_limits_to_one() {
        let (mut conn, log) = Recorder::connection(vec![json!([])]);
        assert_eq!(conn.table("t").first().unwrap(), None);
        assert_eq!(log.queries(), vec!["SELECT * FROM t LIMIT 1"]);
    }

    #[test]
    fn count_groups_everything_and_reads_count_field() {
        let (mut conn, log) = Recorder::connection(vec![json!([{"count": 3}])]);
        assert_eq!(conn.table("person").where_in("age", [1, 2]).count().unwrap(), 3);
        assert_eq!(
            log.queries(),
            vec!["SELECT count() FROM person WHERE [1, 2] CONTAINS age GROUP ALL"]
        );
    }

    #[test]
    fn count_of_nothing_is_zero() {
        let (mut conn, _log) = Recorder::connection(vec![json!([])]);
        assert_eq!(conn.table("person").count().unwrap(), 0);
    }

    #[test]
    fn aggregates_keep_explicit_grouping() {
        let (mut conn, log) = Recorder::connection(vec![json!([{"math::sum": 54}])]);
        let total = conn.table("person").group_by("team").sum("age").unwrap();
        assert_eq!(total, json!(54));
        assert_eq!(
            log.queries(),
            vec!["SELECT math::sum(age) FROM person GROUP BY team"]
        );
    }

    #[test]
    fn avg_max_min_read_their_fields() {
        let (mut conn, log) = Recorder::connection(vec![
            json!([{"math::mean": 2.5}]),
            json!([{"math::max": 4}]),
            json!([{"math::min": 1}]),
        ]);
        assert_eq!(conn.table("p").avg("age").unwrap(), json!(2.5));
        assert_eq!(conn.table("p").max("age").unwrap(), json!(4));
        assert_eq!(conn.table("p").min("age").unwrap(), json!(1));
        assert_eq!(
            log.queries(),
            vec![
                "SELECT math::mean(age) FROM p GROUP ALL",
                "SELECT math::max(age) FROM p GROUP ALL",
                "SELECT math::min(age) FROM p GROUP ALL",
            ]
        );
    }

    #[test]
    fn update_sets_fields_on_matches() {
        let (mut conn, log) = Recorder::connection(vec![json!([])]);
        conn.table("person")
            .and_where(("name", "Mike"))
            .update(json!({"age": 32, "nick": "it's me"}))
            .unwrap();
        assert_eq!(
            log.queries(),
            vec!["UPDATE person SET age = 32, nick = 'it\\'s me' WHERE name = 'Mike'"]
        );
    }

    #[test]
    fn update_rejects_non_records() {
        let (mut conn, _log) = Recorder::connection(vec![]);
        let err = conn.table("person").update(json!([1, 2])).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NotARecord { .. })
        ));
    }

    #[test]
    fn delete_matching_rows() {
        let (mut conn, log) = Recorder::connection(vec![json!([])]);
        conn.table("person").and_where(("age", "<", 18)).delete().unwrap();
        assert_eq!(log.queries(), vec!["DELETE person WHERE age < 18"]);
    }

    #[test]
    fn relate_with_edge_data() {
        let (mut conn, log) = Recorder::connection(vec![json!([]), json!([])]);
        conn.table("")
            .relate("person:1", "knows", "person:2", Some(json!({"since": "2020"})))
            .unwrap();
        conn.table("")
            .relate("person:1", "likes", "post:a-b", None)
            .unwrap();
        assert_eq!(
            log.queries(),
            vec![
                "RELATE person:1->knows->person:2 SET since = '2020'",
                "RELATE person:1->likes->post:⟨a-b⟩",
            ]
        );
    }
}
