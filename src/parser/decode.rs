// Value decoder: turns one raw field into its logical value.
// Decoding is a pure function of the raw token and the dialect.

use std::fmt;

// A decoded field. `Null` prints exactly like an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalValue {
    Null,
    Text(String),
}

impl LogicalValue {
    pub fn empty() -> Self {
        LogicalValue::Text(String::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LogicalValue::Null)
    }

    // Output form: NULL collapses to "".
    pub fn as_str(&self) -> &str {
        match self {
            LogicalValue::Null => "",
            LogicalValue::Text(s) => s,
        }
    }
}

impl fmt::Display for LogicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LogicalValue {
    fn from(s: &str) -> Self {
        LogicalValue::Text(s.to_string())
    }
}

// Decode a field taken from an INSERT tuple.
// Only quote escapes are undone; backslash sequences other than \' and \"
// are left in place.
pub fn decode_mysql_field(raw: &str) -> LogicalValue {
    let val = raw.trim();
    if val.eq_ignore_ascii_case("NULL") {
        return LogicalValue::Null;
    }
    if let Some(inner) = strip_matching(val, '\'') {
        return LogicalValue::Text(inner.replace("''", "'").replace("\\'", "'"));
    }
    if let Some(inner) = strip_matching(val, '"') {
        return LogicalValue::Text(inner.replace("\"\"", "\"").replace("\\\"", "\""));
    }
    LogicalValue::Text(val.to_string())
}

// Decode a single tab-separated field of a COPY data line.
pub fn decode_copy_field(raw: &str) -> LogicalValue {
    if raw == "\\N" {
        return LogicalValue::Null;
    }
    // Fixed order; a later pass may see output of an earlier one.
    let val = raw
        .replace("\\t", "\t")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\\\", "\\");
    LogicalValue::Text(val)
}

// Split a COPY data line on tabs and decode every field.
pub fn decode_copy_line(line: &str) -> Vec<LogicalValue> {
    line.split('\t').map(decode_copy_field).collect()
}

// Interior of a value wrapped in `quote` at both ends (needs at least 2 chars).
fn strip_matching(val: &str, quote: char) -> Option<&str> {
    if val.len() > 1 && val.starts_with(quote) && val.ends_with(quote) {
        Some(&val[1..val.len() - 1])
    } else {
        None
    }
}
