//! Tabular result model for source query responses.
//!
//! A query against the source returns one or more [`Table`]s, each holding
//! ordered [`Record`]s. A record is a column map from column name to typed
//! [`Value`]; the column set can differ between tables of the same response
//! (the source emits one table per distinct series schema).
//!
//! Records store their columns in a `BTreeMap` so that every iteration over
//! a record visits columns in the same (sorted) order. Downstream encoding
//! relies on this for deterministic output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Column holding the measurement name of a row.
pub const MEASUREMENT_COLUMN: &str = "_measurement";
/// Column holding the field name of a row.
pub const FIELD_COLUMN: &str = "_field";
/// Column holding the field value of a row.
pub const VALUE_COLUMN: &str = "_value";
/// Column holding the row timestamp.
pub const TIME_COLUMN: &str = "_time";

/// A single typed cell value from a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A string cell (tags, measurement and field names, string fields).
    String(String),
    /// A boolean cell.
    Bool(bool),
    /// A floating-point cell.
    Float(f64),
    /// A signed integer cell.
    Int(i64),
    /// An unsigned integer cell.
    UInt(u64),
    /// An RFC3339 timestamp cell.
    Time(DateTime<Utc>),
    /// An absent cell.
    Null,
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string content for string cells, `None` otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One row of a query result table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value, replacing any previous value for that column.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    /// Returns the value of a column, if the column is present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Returns the string content of a column, if present and string-typed.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Iterates over all columns in sorted column-name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the row timestamp from the `_time` column.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self.get(TIME_COLUMN) {
            Some(Value::Time(t)) => Some(*t),
            _ => None,
        }
    }
}

/// One table of a query result: an ordered list of rows sharing a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// The rows of this table, in response order.
    pub records: Vec<Record>,
}

impl Table {
    /// Returns `true` if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of rows in the table.
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_insert_and_get() {
        let mut record = Record::new();
        record.insert("room", Value::String("kitchen".to_string()));
        record.insert(VALUE_COLUMN, Value::Float(21.5));

        assert_eq!(record.get_str("room"), Some("kitchen"));
        assert_eq!(record.get(VALUE_COLUMN), Some(&Value::Float(21.5)));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_record_columns_sorted() {
        let mut record = Record::new();
        record.insert("zone", Value::String("b".to_string()));
        record.insert("area", Value::String("a".to_string()));
        record.insert("host", Value::String("h".to_string()));

        let names: Vec<&str> = record.columns().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["area", "host", "zone"]);
    }

    #[test]
    fn test_record_time() {
        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let mut record = Record::new();
        assert!(record.time().is_none());

        record.insert(TIME_COLUMN, Value::Time(ts));
        assert_eq!(record.time(), Some(ts));

        // A mistyped _time column is treated as absent.
        record.insert(TIME_COLUMN, Value::String("2024-01-01".to_string()));
        assert!(record.time().is_none());
    }

    #[test]
    fn test_value_helpers() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(false).is_null());
        assert_eq!(Value::String("x".to_string()).as_str(), Some("x"));
        assert!(Value::Float(1.0).as_str().is_none());
    }
}
