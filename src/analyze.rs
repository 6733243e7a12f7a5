// File analysis: a read-only pass that reports what a dump contains before
// anything is converted, and the preflight checks that gate the conversion.

use crate::converter::DEFAULT_MAX_STATEMENT_LINES;
use crate::error::{ConvertError, Result};
use crate::parser::{Dialect, DialectRecognizer, SchemaParser};
use crate::source::LineSource;
use serde::Serialize;
use std::io::BufRead;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub total_lines: u64,
    pub create_tables: Vec<String>,
    // Unique, first-seen order.
    pub insert_tables: Vec<String>,
    pub copy_tables: Vec<String>,
    pub detected_dialect: Option<Dialect>,
    pub estimated_rows: u64,
}

impl Analysis {
    // Tables that carry data, INSERT targets first.
    pub fn data_tables(&self) -> impl Iterator<Item = &str> {
        self.insert_tables
            .iter()
            .chain(self.copy_tables.iter())
            .map(String::as_str)
    }

    // Fail early on dumps that cannot produce rows. Returns the tables the
    // conversion will actually touch.
    pub fn preflight(&self, filter: Option<&str>) -> Result<Vec<String>> {
        if self.detected_dialect.is_none() {
            return Err(ConvertError::FormatUnrecognized);
        }
        if self.insert_tables.is_empty() && self.copy_tables.is_empty() {
            return Err(ConvertError::NoDataStatements);
        }
        let targets: Vec<String> = self
            .data_tables()
            .filter(|t| filter.map_or(true, |f| matches_filter(f, t)))
            .map(str::to_string)
            .collect();
        if targets.is_empty() {
            if let Some(f) = filter {
                return Err(ConvertError::TableFilterNoMatch {
                    filter: f.to_string(),
                });
            }
        }
        Ok(targets)
    }
}

// Case-insensitive substring match of a table filter.
pub fn matches_filter(filter: &str, table: &str) -> bool {
    table.to_lowercase().contains(&filter.to_lowercase())
}

pub struct Analyzer {
    recognizer: DialectRecognizer,
    schema: SchemaParser,
    max_statement_lines: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            recognizer: DialectRecognizer::new(),
            schema: SchemaParser::new(),
            max_statement_lines: DEFAULT_MAX_STATEMENT_LINES,
        }
    }

    // Line budget for joining an INSERT that is only recognizable once
    // joined. Pass the converter's max_statement_lines.
    pub fn with_max_statement_lines(mut self, max_lines: usize) -> Self {
        self.max_statement_lines = max_lines;
        self
    }

    pub fn analyze<R: BufRead>(
        &self,
        reader: R,
        bar: Option<&indicatif::ProgressBar>,
    ) -> Result<Analysis> {
        let mut source = LineSource::new(reader);
        let mut analysis = Analysis::default();
        let mut in_copy = false;
        let mut last_bytes = 0;

        while let Some(line) = source.next_line()? {
            if let Some(b) = bar {
                b.inc(source.bytes_read() - last_bytes);
                last_bytes = source.bytes_read();
            }
            let stripped = line.trim();

            // COPY data rows are counted, not classified.
            if in_copy {
                if stripped == "\\." {
                    in_copy = false;
                } else if !stripped.is_empty() {
                    analysis.estimated_rows += 1;
                }
                continue;
            }
            if stripped.is_empty() || stripped.starts_with("--") {
                continue;
            }

            if let Some(table) = self.schema.table_name(stripped) {
                analysis.create_tables.push(table);
            }

            if let Some(table) = self.recognizer.insert_table(stripped) {
                if !analysis.insert_tables.contains(&table) {
                    analysis.insert_tables.push(table);
                }
                // Until a dialect is known, an INSERT whose VALUES clause
                // starts on a later line is joined the way the converter
                // joins it, so both passes see the same statement.
                let joined;
                let text = if analysis.detected_dialect.is_none()
                    && self.recognizer.detect(stripped).is_none()
                {
                    joined = source.join_statement(stripped, self.max_statement_lines)?.0;
                    joined.as_str()
                } else {
                    stripped
                };
                let values_count = text.matches("VALUES").count() as u64;
                let opens = text.matches('(').count() as u64;
                let closes = text.matches(')').count() as u64;
                analysis.estimated_rows += values_count.max(opens.min(closes) / 2);
                if analysis.detected_dialect.is_none() {
                    analysis.detected_dialect = self.recognizer.detect(text).map(|d| d.dialect);
                }
                continue;
            }

            if let Some(table) = self.recognizer.copy_table(stripped) {
                analysis.copy_tables.push(table);
                in_copy = true;
            }

            if analysis.detected_dialect.is_none() {
                analysis.detected_dialect = self.recognizer.detect(stripped).map(|d| d.dialect);
            }
        }

        if let Some(b) = bar {
            b.finish();
        }
        analysis.total_lines = source.line_no();
        tracing::debug!(
            lines = analysis.total_lines,
            creates = analysis.create_tables.len(),
            inserts = analysis.insert_tables.len(),
            copies = analysis.copy_tables.len(),
            "analysis finished"
        );
        Ok(analysis)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
