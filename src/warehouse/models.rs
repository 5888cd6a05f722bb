//! Data models representing a tabular query result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A result column as reported by the warehouse schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// BigQuery type name (e.g. "STRING", "INT64", "TIMESTAMP")
    pub field_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// Possible types for a single cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    String(String),
    Null,
}

impl Value {
    /// NULL, or a FLOAT NaN
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => {
                if *v != 0.0 && (v.abs() < 0.001 || v.abs() >= 1e9) {
                    write!(f, "{v:.2e}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Bool(v) => write!(f, "{v}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
            Value::String(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
        }
    }
}

/// An ordered table returned by a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    /// Row count reported by the warehouse; may exceed `rows.len()` when truncated
    pub total_rows: u64,
    /// When the rows were received, shown in the status bar
    pub fetched_at: DateTime<Utc>,
}

impl QueryResult {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        let total_rows = rows.len() as u64;
        QueryResult {
            columns,
            rows,
            total_rows,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Iterate over one column's cells
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| row.get(idx).unwrap_or(&Value::Null))
    }

    /// First `n` rows, for the sample table
    pub fn head(&self, n: usize) -> &[Vec<Value>] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn is_truncated(&self) -> bool {
        self.total_rows > self.rows.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec![Column::new("user_id", "STRING"), Column::new("assignment", "STRING")],
            vec![
                vec![Value::String("u1".into()), Value::String("A".into())],
                vec![Value::String("u2".into()), Value::String("B".into())],
                vec![Value::String("u3".into())],
            ],
        )
    }

    #[test]
    fn test_column_lookup() {
        let result = sample();
        assert_eq!(result.column_index("assignment"), Some(1));
        assert_eq!(result.column_index("missing"), None);
        assert_eq!(result.column_names(), vec!["user_id", "assignment"]);
    }

    #[test]
    fn test_short_rows_read_as_null() {
        let result = sample();
        let values: Vec<&Value> = result.column_values(1).collect();
        assert_eq!(values.len(), 3);
        assert!(values[2].is_missing());
    }

    #[test]
    fn test_head_clamps() {
        let result = sample();
        assert_eq!(result.head(2).len(), 2);
        assert_eq!(result.head(50).len(), 3);
        assert!(!result.is_truncated());
    }

    #[test]
    fn test_missing_cells() {
        assert!(Value::Null.is_missing());
        assert!(Value::Float(f64::NAN).is_missing());
        assert!(!Value::Float(0.0).is_missing());
        assert!(!Value::String("null".into()).is_missing());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Null.to_string(), "null");
        let ts = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "1970-01-01 00:00:00 UTC");
    }
}
