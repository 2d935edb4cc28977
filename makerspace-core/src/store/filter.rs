//! Row filters shared by every store adapter.

use std::cmp::Ordering;

use serde_json::Value;

use crate::store::Row;

/// A comparison on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Filter::Gt(column.to_string(), value.into())
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(column.to_string(), value.into())
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Filter::Lt(column.to_string(), value.into())
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Filter::Lte(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Gt(c, _) | Filter::Gte(c, _) | Filter::Lt(c, _) | Filter::Lte(c, _) => c,
        }
    }

    fn value(&self) -> &Value {
        match self {
            Filter::Eq(_, v) | Filter::Gt(_, v) | Filter::Gte(_, v) | Filter::Lt(_, v) | Filter::Lte(_, v) => v,
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            Filter::Eq(..) => "eq",
            Filter::Gt(..) => "gt",
            Filter::Gte(..) => "gte",
            Filter::Lt(..) => "lt",
            Filter::Lte(..) => "lte",
        }
    }

    /// Whether `row` satisfies this filter. Missing columns never match.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(self.column()) else {
            return false;
        };
        let Some(ordering) = compare_values(actual, self.value()) else {
            return false;
        };
        match self {
            Filter::Eq(..) => ordering == Ordering::Equal,
            Filter::Gt(..) => ordering == Ordering::Greater,
            Filter::Gte(..) => ordering != Ordering::Less,
            Filter::Lt(..) => ordering == Ordering::Less,
            Filter::Lte(..) => ordering != Ordering::Greater,
        }
    }

    /// PostgREST query pair, e.g. `("user_id", "eq.abc")`.
    pub fn to_query_pair(&self) -> (String, String) {
        (
            self.column().to_string(),
            format!("{}.{}", self.operator(), value_text(self.value())),
        )
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Order two JSON scalars. Strings and numbers are compared by their text so
/// that `"42"` and `42` address the same key.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::String(_), Value::Number(_)) | (Value::Number(_), Value::String(_)) => {
            Some(value_text(a).cmp(&value_text(b)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> Row {
        match json!({ "id": 7, "user_id": "u1", "last_seen": "2025-03-05T10:00:00Z" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_equality_across_number_and_text_ids() {
        assert!(Filter::eq("id", "7").matches(&row()));
        assert!(Filter::eq("id", 7).matches(&row()));
        assert!(!Filter::eq("id", 8).matches(&row()));
    }

    #[test]
    fn test_range_filters_on_timestamps() {
        assert!(Filter::gte("last_seen", "2025-03-05T09:59:30Z").matches(&row()));
        assert!(!Filter::gt("last_seen", "2025-03-05T10:00:00Z").matches(&row()));
        assert!(Filter::lte("last_seen", "2025-03-05T10:00:00Z").matches(&row()));
    }

    #[test]
    fn test_missing_column_never_matches() {
        assert!(!Filter::eq("username", "ada").matches(&row()));
    }

    #[test]
    fn test_query_pair() {
        assert_eq!(
            Filter::eq("user_id", "u1").to_query_pair(),
            ("user_id".to_string(), "eq.u1".to_string())
        );
        assert_eq!(
            Filter::lt("id", 10).to_query_pair(),
            ("id".to_string(), "lt.10".to_string())
        );
    }
}
