//! Literal formatting for values embedded in query text.
use serde_json::{Map, Value};

/// Backslash-escapes a string so it can sit inside a quoted literal.
///
/// Escaped: NUL, backslash, newline, carriage return, ASCII 26, single and double quotes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

pub fn quote(s: &str) -> String {
    format!("'{}'", escape(s))
}

pub fn format(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items = items.iter().map(format).collect::<Vec<_>>();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => object(map),
    }
}

pub fn object(map: &Map<String, Value>) -> String {
    let fields = map
        .iter()
        .map(|(k, v)| format!("\"{}\": {}", escape(k), format(v)))
        .collect::<Vec<_>>();
    format!("{{{}}}", fields.join(", "))
}

/// `column = literal` pairs for SET clauses.
pub fn assignments(map: &Map<String, Value>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k} = {}", format(v)))
        .collect::<Vec<_>>()
        .join(", ")
}
