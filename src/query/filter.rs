//! Filter trees and their compilation to WHERE conditions.
use serde_json::Value;

use super::literal;

const AND: &str = " AND ";
const OR: &str = " OR ";

/// One element of a WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column operator literal`
    Condition {
        column: String,
        operator: String,
        value: Value,
    },
    /// `[values] CONTAINS column`, value list first as the grammar requires.
    Membership {
        values: Vec<Value>,
        negated: bool,
        column: String,
    },
    /// Parenthesized sub-condition.
    Group(Vec<Filter>),
    /// Turns the join between the previous and the next clause into OR.
    Or,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(column, "=", value)
    }

    pub fn cmp(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Filter::Condition {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn contains<V: Into<Value>>(
        values: impl IntoIterator<Item = V>,
        column: impl Into<String>,
    ) -> Self {
        Filter::Membership {
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
            column: column.into(),
        }
    }

    pub fn contains_not<V: Into<Value>>(
        values: impl IntoIterator<Item = V>,
        column: impl Into<String>,
    ) -> Self {
        Filter::Membership {
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
            column: column.into(),
        }
    }
}

impl<C: Into<String>, V: Into<Value>> From<(C, V)> for Filter {
    fn from((column, value): (C, V)) -> Self {
        Filter::eq(column, value)
    }
}

impl<C: Into<String>, O: Into<String>, V: Into<Value>> From<(C, O, V)> for Filter {
    fn from((column, operator, value): (C, O, V)) -> Self {
        Filter::cmp(column, operator, value)
    }
}

impl<F: Into<Filter>> From<Vec<F>> for Filter {
    fn from(filters: Vec<F>) -> Self {
        Filter::Group(filters.into_iter().map(Into::into).collect())
    }
}

/// Compiles an ordered clause list into the body of a WHERE clause.
///
/// Every clause is followed by a join keyword; an [`Filter::Or`] marker swaps the join the
/// previous clause left behind, and the dangling join after the last clause is dropped.
pub fn compile(filters: &[Filter]) -> String {
    let mut out = String::new();

    for filter in filters {
        match filter {
            Filter::Or => {
                if out.ends_with(AND) {
                    out.truncate(out.len() - AND.len());
                    out.push_str(OR);
                }
                continue;
            }
            Filter::Condition {
                column,
                operator,
                value,
            } => {
                out.push_str(&format!("{column} {operator} {}", literal::format(value)));
            }
            Filter::Membership {
                values,
                negated,
                column,
            } => {
                let operator = if *negated { "CONTAINSNOT" } else { "CONTAINS" };
                let values = literal::format(&Value::Array(values.clone()));
                out.push_str(&format!("{values} {operator} {column}"));
            }
            Filter::Group(inner) => {
                let inner = compile(inner);
                if inner.is_empty() {
                    continue;
                }
                out.push_str(&format!("({inner})"));
            }
        }
        out.push_str(AND);
    }

    for join in [AND, OR] {
        if out.ends_with(join) {
            out.truncate(out.len() - join.len());
        }
    }
    out
}
