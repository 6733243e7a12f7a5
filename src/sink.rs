// Row sinks: where header rows, data rows and diagnostics end up.
// The converter never looks at what a sink did with an event.

use crate::error::Result;
use crate::parser::{Dialect, LogicalValue};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

// Consumer of the converter's output.
// `header` is called exactly once per table, before that table's first
// `row`. Every row has as many values as its table's header.
pub trait RowSink {
    fn header(&mut self, table: &str, columns: &[String]) -> Result<()>;

    fn row(&mut self, table: &str, values: &[LogicalValue]) -> Result<()>;

    // Structured notices for reporting. Never affects conversion.
    fn diagnostic(&mut self, _event: &Diagnostic) {}

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

// How a row with the wrong number of values was repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    Padded,
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchNotice {
    pub table: String,
    pub line: u64,
    pub expected: usize,
    pub found: usize,
    pub repair: Repair,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    DialectDetected { dialect: Dialect, line: u64 },
    ColumnCountMismatch(MismatchNotice),
    // The scanner found nothing and the naive strategy recovered tuples.
    FallbackSplit { table: String, line: u64, tuples: usize },
    // No strategy produced a tuple; the statement contributed no rows.
    EmptyStatement { table: String, line: u64 },
    StatementSkipped { line: u64, reason: String },
}

// Writes every table into one CSV stream, in source order.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        // Tables differ in width, so records are not length-checked.
        let writer = csv::WriterBuilder::new()
            .flexible(true)
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(out);
        Self { writer }
    }

    pub fn into_inner(self) -> std::result::Result<W, csv::IntoInnerError<csv::Writer<W>>> {
        self.writer.into_inner()
    }
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn header(&mut self, _table: &str, columns: &[String]) -> Result<()> {
        self.writer.write_record(columns)?;
        Ok(())
    }

    fn row(&mut self, _table: &str, values: &[LogicalValue]) -> Result<()> {
        self.writer.write_record(values.iter().map(LogicalValue::as_str))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// One CSV file per table inside a directory.
pub struct TableFilesSink {
    dir: PathBuf,
    writers: HashMap<String, csv::Writer<File>>,
    paths: Vec<PathBuf>,
}

impl TableFilesSink {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            writers: HashMap::new(),
            paths: Vec::new(),
        })
    }

    // Files created so far, in the order their tables appeared.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn writer(&mut self, table: &str) -> Result<&mut csv::Writer<File>> {
        match self.writers.entry(table.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let path = self.dir.join(format!("{}.csv", sanitize_filename(table)));
                let writer = csv::WriterBuilder::new()
                    .quote_style(csv::QuoteStyle::Necessary)
                    .from_path(&path)?;
                self.paths.push(path);
                Ok(e.insert(writer))
            }
        }
    }
}

impl RowSink for TableFilesSink {
    fn header(&mut self, table: &str, columns: &[String]) -> Result<()> {
        self.writer(table)?.write_record(columns)?;
        Ok(())
    }

    fn row(&mut self, table: &str, values: &[LogicalValue]) -> Result<()> {
        self.writer(table)?
            .write_record(values.iter().map(LogicalValue::as_str))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

// Make a safe filename by replacing characters that are invalid on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "_".to_string()
    } else {
        cleaned
    }
}

// One event recorded by MemorySink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Header { table: String, columns: Vec<String> },
    Row { table: String, values: Vec<String> },
}

// Keeps everything in memory, in arrival order. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header_for(&self, table: &str) -> Option<&[String]> {
        self.records.iter().find_map(|r| match r {
            Record::Header { table: t, columns } if t == table => Some(columns.as_slice()),
            _ => None,
        })
    }

    pub fn rows_for(&self, table: &str) -> Vec<&[String]> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Row { table: t, values } if t == table => Some(values.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r, Record::Row { .. }))
            .count()
    }

    pub fn mismatches(&self) -> Vec<&MismatchNotice> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::ColumnCountMismatch(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }
}

impl RowSink for MemorySink {
    fn header(&mut self, table: &str, columns: &[String]) -> Result<()> {
        self.records.push(Record::Header {
            table: table.to_string(),
            columns: columns.to_vec(),
        });
        Ok(())
    }

    fn row(&mut self, table: &str, values: &[LogicalValue]) -> Result<()> {
        self.records.push(Record::Row {
            table: table.to_string(),
            values: values.iter().map(|v| v.as_str().to_string()).collect(),
        });
        Ok(())
    }

    fn diagnostic(&mut self, event: &Diagnostic) {
        self.diagnostics.push(event.clone());
    }
}
