//! Line-protocol encoding of query result rows.
//!
//! Converts [`Record`]s into the target's textual point format:
//!
//! ```text
//! measurement[,tag=value,...] field=value timestamp_ns
//! ```
//!
//! Encoding is pure and deterministic: the same record always produces the
//! same line, with tags emitted in sorted column order. One row maps to at
//! most one line — rows without a usable measurement, field value, or
//! timestamp are dropped.
//!
//! # Escaping
//!
//! Tag keys, tag values, and field keys get a backslash inserted before each
//! space, comma, and equals sign; measurement names before each space and
//! comma. The rule is reversible by removing a backslash that precedes one
//! of those characters. String field values are double-quoted with inner
//! double quotes, line feeds, and carriage returns backslash-escaped.

use crate::record::{FIELD_COLUMN, MEASUREMENT_COLUMN, Record, VALUE_COLUMN, Value};

/// Column naming the pivoted entity of a row.
const ENTITY_COLUMN: &str = "entity_id";
/// Column naming the pivoted entity's domain.
const DOMAIN_COLUMN: &str = "domain";

/// Strategy selecting the output measurement for each row.
///
/// Chosen once per run; every other encoding rule hangs off this choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Grouping {
    /// The source's native `_measurement` value names each output series.
    #[default]
    Native,
    /// The `domain.entity_id` pair names each output series and the native
    /// measurement is carried as a `unit_of_measurement` tag. This matches
    /// the Home Assistant recorder layout, where the measurement column
    /// actually holds a unit.
    PivotedEntity,
}

impl Grouping {
    /// The source column this strategy groups series by.
    pub fn key_column(self) -> &'static str {
        match self {
            Grouping::Native => MEASUREMENT_COLUMN,
            Grouping::PivotedEntity => ENTITY_COLUMN,
        }
    }

    /// Resolves the output measurement name for one row, if the row has one.
    fn measurement(self, record: &Record) -> Option<String> {
        match self {
            Grouping::Native => record
                .get_str(MEASUREMENT_COLUMN)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            Grouping::PivotedEntity => {
                let domain = record.get_str(DOMAIN_COLUMN).filter(|d| !d.is_empty())?;
                let entity = record.get_str(ENTITY_COLUMN).filter(|e| !e.is_empty())?;
                Some(format!("{domain}.{entity}"))
            }
        }
    }

    /// Whether a column of this name is emitted as a tag.
    ///
    /// Internal (`_`-prefixed) and query bookkeeping columns never are. In
    /// pivot mode the grouping columns are already encoded in the
    /// measurement name and are excluded as well.
    fn is_tag_column(self, name: &str) -> bool {
        if name.starts_with('_') || name == "result" || name == "table" {
            return false;
        }
        match self {
            Grouping::Native => true,
            Grouping::PivotedEntity => name != ENTITY_COLUMN && name != DOMAIN_COLUMN,
        }
    }
}

/// Converts one row into a protocol line.
///
/// Returns `None` for rows that produce no output: missing or blank
/// measurement, missing field key, null/empty/non-finite field value, or a
/// missing timestamp.
pub fn encode_row(record: &Record, grouping: Grouping) -> Option<String> {
    let measurement = grouping.measurement(record)?;
    let field_key = record.get_str(FIELD_COLUMN).filter(|f| !f.is_empty())?;
    let field_value = render_field_value(record.get(VALUE_COLUMN)?)?;
    let timestamp_ns = record.time()?.timestamp_nanos_opt()?;

    let mut line = escape_measurement(&measurement);

    for (name, value) in record.columns() {
        if !grouping.is_tag_column(name) {
            continue;
        }
        let Some(text) = tag_value_text(value) else {
            continue;
        };
        line.push(',');
        line.push_str(&escape_tag(name));
        line.push('=');
        line.push_str(&escape_tag(&text));
    }

    if grouping == Grouping::PivotedEntity
        && let Some(unit) = record
            .get_str(MEASUREMENT_COLUMN)
            .filter(|u| !u.trim().is_empty())
    {
        line.push_str(",unit_of_measurement=");
        line.push_str(&escape_tag(unit));
    }

    line.push(' ');
    line.push_str(&escape_tag(field_key));
    line.push('=');
    line.push_str(&field_value);
    line.push(' ');
    line.push_str(&timestamp_ns.to_string());

    Some(line)
}

/// Encodes every row of a chunk, joining surviving lines with newlines.
///
/// Dropped rows contribute nothing; an empty or all-dropped chunk yields an
/// empty string, which callers treat as "nothing to send".
pub fn encode_chunk(records: &[Record], grouping: Grouping) -> String {
    let lines: Vec<String> = records
        .iter()
        .filter_map(|record| encode_row(record, grouping))
        .collect();
    lines.join("\n")
}

/// Renders a tag cell as text, or `None` if the tag must be skipped.
///
/// Null, blank, and literal `nan` (any casing) values are skipped.
fn tag_value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Time(t) => t.to_rfc3339(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(text)
    }
}

/// Renders a field cell for the protocol, or `None` if the row is dropped.
fn render_field_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(quote_string_field(s)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Float(f) if !f.is_finite() => None,
        Value::Float(f) => Some(f.to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Time(t) => Some(quote_string_field(&t.to_rfc3339())),
    }
}

/// Inserts a backslash before each space, comma, and equals sign.
pub fn escape_tag(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ' ' | ',' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inserts a backslash before each space and comma.
fn escape_measurement(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ' ' | ',') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Double-quotes a string field value, escaping inner quotes and line breaks.
fn quote_string_field(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TIME_COLUMN;
    use chrono::{DateTime, Utc};

    fn time(rfc3339: &str) -> Value {
        Value::Time(
            DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    fn native_record(measurement: &str, field: &str, value: Value) -> Record {
        let mut record = Record::new();
        record.insert(MEASUREMENT_COLUMN, Value::String(measurement.to_string()));
        record.insert(FIELD_COLUMN, Value::String(field.to_string()));
        record.insert(VALUE_COLUMN, value);
        record.insert(TIME_COLUMN, time("2024-01-01T00:00:00Z"));
        record
    }

    /// Reverses `escape_tag`: drops a backslash preceding space/comma/equals.
    fn unescape_tag(escaped: &str) -> String {
        let mut out = String::with_capacity(escaped.len());
        let mut chars = escaped.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\'
                && let Some(&next) = chars.peek()
                && matches!(next, ' ' | ',' | '=')
            {
                continue;
            }
            out.push(c);
        }
        out
    }

    #[test]
    fn test_native_row() {
        let mut record = native_record("temp", "value", Value::Float(21.5));
        record.insert("room", Value::String("kitchen".to_string()));

        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(line, "temp,room=kitchen value=21.5 1704067200000000000");
    }

    #[test]
    fn test_pivoted_row() {
        let mut record = native_record("celsius", "value", Value::Float(21.5));
        record.insert("domain", Value::String("sensor".to_string()));
        record.insert("entity_id", Value::String("temp_kitchen".to_string()));

        let line = encode_row(&record, Grouping::PivotedEntity).unwrap();
        assert_eq!(
            line,
            "sensor.temp_kitchen,unit_of_measurement=celsius value=21.5 1704067200000000000"
        );
    }

    #[test]
    fn test_pivoted_row_without_unit() {
        let mut record = native_record(" ", "value", Value::Float(1.0));
        record.insert("domain", Value::String("sensor".to_string()));
        record.insert("entity_id", Value::String("door".to_string()));

        let line = encode_row(&record, Grouping::PivotedEntity).unwrap();
        assert_eq!(line, "sensor.door value=1 1704067200000000000");
    }

    #[test]
    fn test_pivoted_row_missing_entity_is_dropped() {
        let record = native_record("celsius", "value", Value::Float(21.5));
        assert!(encode_row(&record, Grouping::PivotedEntity).is_none());
    }

    #[test]
    fn test_string_field_is_quoted_and_escaped() {
        let record = native_record(
            "events",
            "message",
            Value::String("hello \"world\"".to_string()),
        );

        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(
            line,
            "events message=\"hello \\\"world\\\"\" 1704067200000000000"
        );
    }

    #[test]
    fn test_string_field_line_breaks() {
        let record = native_record("events", "message", Value::String("a\nb\rc".to_string()));

        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(line, "events message=\"a\\nb\\rc\" 1704067200000000000");
    }

    #[test]
    fn test_bool_and_integer_fields() {
        let record = native_record("switch", "state", Value::Bool(true));
        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(line, "switch state=true 1704067200000000000");

        let record = native_record("counter", "hits", Value::Int(-3));
        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(line, "counter hits=-3 1704067200000000000");

        let record = native_record("counter", "hits", Value::UInt(7));
        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(line, "counter hits=7 1704067200000000000");
    }

    #[test]
    fn test_null_and_empty_field_values_drop_the_row() {
        let record = native_record("temp", "value", Value::Null);
        assert!(encode_row(&record, Grouping::Native).is_none());

        let record = native_record("temp", "value", Value::String(String::new()));
        assert!(encode_row(&record, Grouping::Native).is_none());

        let record = native_record("temp", "value", Value::Float(f64::NAN));
        assert!(encode_row(&record, Grouping::Native).is_none());
    }

    #[test]
    fn test_missing_timestamp_drops_the_row() {
        let mut record = Record::new();
        record.insert(MEASUREMENT_COLUMN, Value::String("temp".to_string()));
        record.insert(FIELD_COLUMN, Value::String("value".to_string()));
        record.insert(VALUE_COLUMN, Value::Float(1.0));

        assert!(encode_row(&record, Grouping::Native).is_none());
    }

    #[test]
    fn test_tag_escaping_is_reversible() {
        let mut record = native_record("temp", "value", Value::Float(1.0));
        record.insert("room name", Value::String("a=b, c".to_string()));

        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(
            line,
            "temp,room\\ name=a\\=b\\,\\ c value=1 1704067200000000000"
        );

        assert_eq!(unescape_tag("room\\ name"), "room name");
        assert_eq!(unescape_tag("a\\=b\\,\\ c"), "a=b, c");
    }

    #[test]
    fn test_measurement_escaping() {
        let record = native_record("my measurement,x", "value", Value::Float(1.0));
        let line = encode_row(&record, Grouping::Native).unwrap();
        assert!(line.starts_with("my\\ measurement\\,x "));
    }

    #[test]
    fn test_blank_and_nan_tags_are_skipped() {
        let mut record = native_record("temp", "value", Value::Float(1.0));
        record.insert("empty", Value::String(String::new()));
        record.insert("blank", Value::String("   ".to_string()));
        record.insert("missing", Value::String("NaN".to_string()));
        record.insert("null", Value::Null);
        record.insert("room", Value::String("kitchen".to_string()));

        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(line, "temp,room=kitchen value=1 1704067200000000000");
    }

    #[test]
    fn test_bookkeeping_columns_are_not_tags() {
        let mut record = native_record("temp", "value", Value::Float(1.0));
        record.insert("result", Value::String("_result".to_string()));
        record.insert("table", Value::Int(0));
        record.insert("_start", time("2023-01-01T00:00:00Z"));

        let line = encode_row(&record, Grouping::Native).unwrap();
        assert_eq!(line, "temp value=1 1704067200000000000");
    }

    #[test]
    fn test_encode_chunk_drops_rows_and_joins() {
        let rows = vec![
            native_record("temp", "value", Value::Float(1.0)),
            native_record("temp", "value", Value::Null),
            native_record("temp", "value", Value::Float(2.0)),
        ];

        let encoded = encode_chunk(&rows, Grouping::Native);
        let lines: Vec<&str> = encoded.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.len() <= rows.len());
        assert!(lines[0].contains("value=1"));
        assert!(lines[1].contains("value=2"));
    }

    #[test]
    fn test_encode_chunk_is_deterministic() {
        let mut record = native_record("temp", "value", Value::Float(21.5));
        record.insert("zone", Value::String("upstairs".to_string()));
        record.insert("room", Value::String("kitchen".to_string()));
        let rows = vec![record];

        let first = encode_chunk(&rows, Grouping::Native);
        let second = encode_chunk(&rows, Grouping::Native);
        assert_eq!(first, second);
        // Sorted column order, independent of insertion order.
        assert_eq!(
            first,
            "temp,room=kitchen,zone=upstairs value=21.5 1704067200000000000"
        );
    }

    #[test]
    fn test_encode_chunk_empty_input() {
        assert_eq!(encode_chunk(&[], Grouping::Native), "");
    }
}
