// Dialect recognizer: classifies a line as a MySQL INSERT or a PostgreSQL COPY
// header and pulls out the table name (plus columns for COPY).
// Regexes are built once per recognizer and reused for every line.

use regex::Regex;
use serde::Serialize;
use std::fmt;

// SQL dump flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    // `INSERT INTO ... VALUES (...), (...);`
    MySql,
    // `COPY table (cols) FROM stdin;` followed by tab-separated rows.
    Postgres,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::MySql => f.write_str("MySQL"),
            Dialect::Postgres => f.write_str("PostgreSQL"),
        }
    }
}

// A successful classification of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub dialect: Dialect,
    pub table: String,
    // Only set for COPY headers.
    pub schema: Option<String>,
    pub columns: Option<Vec<String>>,
}

pub struct DialectRecognizer {
    insert_patterns: Vec<Regex>,
    insert_table_re: Regex,
    insert_keyword_re: Regex,
    copy_re: Regex,
}

impl DialectRecognizer {
    pub fn new() -> Self {
        // Optional `db.` qualifier; the last segment is the table.
        let target = r"(?i)INSERT\s+INTO\s+(?:`?\w+`?\.)?`?(\w+)`?";
        // Bare VALUES, column list hugging the table name, column list after a space.
        let insert_patterns = [
            r"\s+VALUES\s*\(",
            r"\s*\([^)]+\)\s+VALUES\s*\(",
            r"\s+\([^)]+\)\s*VALUES\s*\(",
        ]
        .iter()
        .map(|tail| Regex::new(&format!("{target}{tail}")).expect("valid insert regex"))
        .collect();
        let insert_table_re = Regex::new(target).expect("valid insert table regex");
        let insert_keyword_re = Regex::new(r"(?i)INSERT\s+INTO").expect("valid insert keyword regex");
        let copy_re = Regex::new(r"(?i)COPY\s+(?:(\w+)\.)?(\w+)\s*\(([^)]+)\)\s+FROM\s+stdin;")
            .expect("valid copy regex");
        Self {
            insert_patterns,
            insert_table_re,
            insert_keyword_re,
            copy_re,
        }
    }

    // Classify a line. INSERT wins over COPY when both would match.
    pub fn detect(&self, line: &str) -> Option<Detection> {
        let line = line.trim();
        if let Some(detection) = self.detect_insert(line) {
            return Some(detection);
        }
        self.detect_copy(line)
    }

    pub fn detect_insert(&self, line: &str) -> Option<Detection> {
        if !self.insert_patterns.iter().any(|re| re.is_match(line)) {
            return None;
        }
        // The table name comes from the looser match so all three
        // variants report it the same way.
        let table = self.insert_table(line)?;
        Some(Detection {
            dialect: Dialect::MySql,
            table,
            schema: None,
            columns: None,
        })
    }

    pub fn detect_copy(&self, line: &str) -> Option<Detection> {
        let cap = self.copy_re.captures(line)?;
        let columns = cap[3]
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Some(Detection {
            dialect: Dialect::Postgres,
            table: cap[2].to_string(),
            schema: cap.get(1).map(|m| m.as_str().to_string()),
            columns: Some(columns),
        })
    }

    // Table name of any `INSERT INTO <ident>`, with or without VALUES.
    pub fn insert_table(&self, line: &str) -> Option<String> {
        self.insert_table_re
            .captures(line)
            .map(|cap| cap[1].to_string())
    }

    // Cheap check used by the assembler to start collecting a statement.
    pub fn is_insert_line(&self, line: &str) -> bool {
        self.insert_keyword_re.is_match(line)
    }

    // Table name of a COPY header, used by the analysis pass.
    pub fn copy_table(&self, line: &str) -> Option<String> {
        self.copy_re.captures(line).map(|cap| cap[2].to_string())
    }
}

impl Default for DialectRecognizer {
    fn default() -> Self {
        Self::new()
    }
}
