// Conversion pipeline: assembles statements from the line stream, drives the
// scanner and decoder, fixes one header per table and hands rows to a sink.
// All per-run state lives in a Session owned by a single convert() call.

use crate::analyze::matches_filter;
use crate::error::{ConvertError, Result};
use crate::parser::decode::{decode_copy_line, decode_mysql_field};
use crate::parser::scanner::{split_fields, tuple_interior};
use crate::parser::schema::CreateTableBlock;
use crate::parser::{
    Detection, Dialect, DialectRecognizer, InsertParser, LogicalValue, SchemaParser,
    SplitStrategy, TupleSplitter,
};
use crate::sink::{Diagnostic, MismatchNotice, Repair, RowSink};
use crate::source::LineSource;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use tracing::{debug, info, warn};

// Payloads above this many bytes take the streaming path.
pub const DEFAULT_LARGE_THRESHOLD: usize = 100_000;
pub const DEFAULT_MAX_STATEMENT_LINES: usize = 100_000;
pub const DEFAULT_CREATE_LOOKAHEAD: usize = 100;

const PROGRESS_LOG_EVERY: u64 = 5_000;
const MAX_RECORDED_MISMATCHES: usize = 1_000;
const ROWS_TO_LOG: u64 = 5;

// What to do with a row whose value count differs from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnPolicy {
    // Pad with empty values or drop trailing values, and report it.
    #[default]
    Repair,
    // Stop the conversion with `ConvertError::ColumnCountMismatch`.
    Strict,
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub table_filter: Option<String>,
    pub column_policy: ColumnPolicy,
    pub large_threshold: usize,
    // Physical lines an INSERT may be joined across before it is cut off.
    pub max_statement_lines: usize,
    // Lines a CREATE TABLE may look ahead to close its parentheses.
    pub create_lookahead: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            table_filter: None,
            column_policy: ColumnPolicy::Repair,
            large_threshold: DEFAULT_LARGE_THRESHOLD,
            max_statement_lines: DEFAULT_MAX_STATEMENT_LINES,
            create_lookahead: DEFAULT_CREATE_LOOKAHEAD,
        }
    }
}

// Metrics of one conversion. Table counts are keyed by name so the report
// serializes the same way on every run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConversionReport {
    pub lines_scanned: u64,
    pub statements: u64,
    pub rows_emitted: u64,
    pub dialect: Option<Dialect>,
    pub table_rows: BTreeMap<String, u64>,
    pub fallback_statements: u64,
    pub empty_statements: u64,
    pub mismatched_rows: u64,
    // First notices only; every notice still reaches the sink.
    pub mismatches: Vec<MismatchNotice>,
}

struct CopyBlock {
    table: String,
    emit: bool,
}

#[derive(Default)]
struct Session {
    // Locked by the first detection; never re-detected.
    dialect: Option<Dialect>,
    // CREATE TABLE columns, header candidates only.
    structures: HashMap<String, Vec<String>>,
    // Headers already sent to the sink.
    headers: HashMap<String, Vec<String>>,
    copy_block: Option<CopyBlock>,
    report: ConversionReport,
}

pub struct Converter {
    options: ConvertOptions,
    recognizer: DialectRecognizer,
    schema: SchemaParser,
    inserts: InsertParser,
    splitter: TupleSplitter,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            recognizer: DialectRecognizer::new(),
            schema: SchemaParser::new(),
            inserts: InsertParser::new(),
            splitter: TupleSplitter::new(),
        }
    }

    // Run one conversion over `reader`, streaming rows into `sink`.
    // The bar, if any, advances by bytes read.
    pub fn convert<R, S>(
        &self,
        reader: R,
        sink: &mut S,
        bar: Option<&indicatif::ProgressBar>,
    ) -> Result<ConversionReport>
    where
        R: BufRead,
        S: RowSink + ?Sized,
    {
        let mut source = LineSource::new(reader);
        let mut session = Session::default();
        let mut last_bytes = 0;
        let mut next_log = PROGRESS_LOG_EVERY;

        while let Some(line) = source.next_line()? {
            let line_no = source.line_no();
            self.process_line(&line, line_no, &mut source, &mut session, sink)?;

            if let Some(b) = bar {
                b.inc(source.bytes_read() - last_bytes);
                last_bytes = source.bytes_read();
            } else if source.line_no() >= next_log {
                debug!(
                    "Processed: {} lines, {} data rows",
                    source.line_no(),
                    session.report.rows_emitted
                );
                next_log = source.line_no() + PROGRESS_LOG_EVERY;
            }
        }

        sink.finish()?;
        if let Some(b) = bar {
            b.finish();
        }
        session.report.lines_scanned = source.line_no();
        session.report.dialect = session.dialect;
        info!(
            lines = session.report.lines_scanned,
            rows = session.report.rows_emitted,
            "conversion completed"
        );
        Ok(session.report)
    }

    fn process_line<R: BufRead, S: RowSink + ?Sized>(
        &self,
        line: &str,
        line_no: u64,
        source: &mut LineSource<R>,
        session: &mut Session,
        sink: &mut S,
    ) -> Result<()> {
        // Inside a COPY block every line is data until the terminator,
        // even if it looks like a comment or a statement.
        if let Some(block) = session.copy_block.take() {
            if line.trim() == "\\." {
                debug!("End of COPY data block for {}", block.table);
                return Ok(());
            }
            if block.emit && !line.trim().is_empty() {
                self.emit_values(&block.table, decode_copy_line(line), line_no, session, sink)?;
            }
            session.copy_block = Some(block);
            return Ok(());
        }

        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with("--") || stripped.starts_with("/*") {
            return Ok(());
        }

        if self.schema.is_create_table(stripped) {
            return self.learn_create_table(stripped, source, session);
        }

        if session.dialect.is_none() {
            self.try_lock_dialect(stripped, line_no, session, sink);
        }

        match session.dialect {
            Some(Dialect::Postgres) => match self.recognizer.detect_copy(stripped) {
                Some(detection) => self.start_copy(detection, session, sink),
                None => Ok(()),
            },
            _ if self.recognizer.is_insert_line(stripped) => {
                let statement = self.assemble_insert(stripped, source)?;
                // A multi-line INSERT may only reveal its VALUES clause once joined.
                if session.dialect.is_none() {
                    self.try_lock_dialect(&statement, line_no, session, sink);
                }
                if session.dialect == Some(Dialect::MySql) {
                    self.process_insert(&statement, line_no, session, sink)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn try_lock_dialect<S: RowSink + ?Sized>(
        &self,
        text: &str,
        line_no: u64,
        session: &mut Session,
        sink: &mut S,
    ) {
        if let Some(detection) = self.recognizer.detect(text) {
            info!("Format confirmed: {}", detection.dialect);
            session.dialect = Some(detection.dialect);
            sink.diagnostic(&Diagnostic::DialectDetected {
                dialect: detection.dialect,
                line: line_no,
            });
        }
    }

    // Record the columns of a CREATE TABLE. Lookahead lines are only peeked;
    // the main loop still sees them.
    fn learn_create_table<R: BufRead>(
        &self,
        first: &str,
        source: &mut LineSource<R>,
        session: &mut Session,
    ) -> Result<()> {
        let Some(table) = self.schema.table_name(first) else {
            return Ok(());
        };
        let mut block = CreateTableBlock::new(first);
        let mut ahead = 0;
        while block.needs_more() && ahead < self.options.create_lookahead {
            match source.peek_at(ahead)? {
                Some(line) => block.push(line),
                None => break,
            }
            ahead += 1;
        }
        let columns = self.schema.columns(block.text());
        if columns.is_empty() {
            debug!("Found CREATE TABLE for {} without column names", table);
        } else {
            debug!(
                "Table {} columns: {:?} ({} lookahead lines)",
                table,
                columns,
                block.extra_lines()
            );
        }
        session.structures.insert(table, columns);
        Ok(())
    }

    // A ';' that ends a line inside a string literal also ends the statement.
    fn assemble_insert<R: BufRead>(
        &self,
        first: &str,
        source: &mut LineSource<R>,
    ) -> Result<String> {
        let start = source.line_no();
        let (statement, cut) = source.join_statement(first, self.options.max_statement_lines)?;
        if cut {
            warn!(
                "INSERT at line {} exceeded {} lines without ';', parsing what was read",
                start, self.options.max_statement_lines
            );
        }
        Ok(statement)
    }

    fn process_insert<S: RowSink + ?Sized>(
        &self,
        statement: &str,
        line_no: u64,
        session: &mut Session,
        sink: &mut S,
    ) -> Result<()> {
        session.report.statements += 1;
        let insert = match self.inserts.parse(statement) {
            Ok(insert) => insert,
            Err(reason) => {
                debug!("Skipping statement at line {}: {}", line_no, reason);
                sink.diagnostic(&Diagnostic::StatementSkipped {
                    line: line_no,
                    reason,
                });
                return Ok(());
            }
        };
        let table = insert.table;
        if !self.table_selected(&table) {
            debug!("Skipping table {} due to filter", table);
            return Ok(());
        }
        debug!(
            "Processing INSERT for table {} ({} bytes of values)",
            table,
            insert.payload.len()
        );

        self.resolve_header(&table, insert.columns.as_deref(), session, sink)?;

        let chunked = insert.payload.len() > self.options.large_threshold;
        if chunked {
            debug!("Large INSERT detected, using streaming tuple parsing");
        }
        let outcome = self.for_each_tuple(insert.payload, chunked, |tuple| {
            self.emit_tuple(&table, tuple, line_no, session, sink)
        })?;

        match outcome {
            Some((SplitStrategy::Scanner, n)) => {
                debug!("Found {} value sets in INSERT for {}", n, table);
            }
            Some((strategy, n)) => {
                debug!("Alternative parsing ({:?}) found {} value sets", strategy, n);
                session.report.fallback_statements += 1;
                sink.diagnostic(&Diagnostic::FallbackSplit {
                    table,
                    line: line_no,
                    tuples: n,
                });
            }
            None => {
                debug!("No value sets found in INSERT for {}", table);
                session.report.empty_statements += 1;
                sink.diagnostic(&Diagnostic::EmptyStatement {
                    table,
                    line: line_no,
                });
            }
        }
        Ok(())
    }

    // Walk the split strategies in order and feed tuples of the first one that
    // yields anything to `f`. The whole-buffer path splits first and then
    // emits; the chunked path emits each tuple as soon as it closes. Both see
    // the same tuples in the same order.
    fn for_each_tuple<F>(
        &self,
        payload: &str,
        chunked: bool,
        mut f: F,
    ) -> Result<Option<(SplitStrategy, usize)>>
    where
        F: FnMut(&str) -> Result<()>,
    {
        if !chunked {
            let Some((strategy, tuples)) = self.splitter.split(payload) else {
                return Ok(None);
            };
            for &tuple in &tuples {
                f(tuple)?;
            }
            return Ok(Some((strategy, tuples.len())));
        }

        for strategy in SplitStrategy::CHAIN {
            let mut n = 0;
            for tuple in self.splitter.iter(strategy, payload) {
                f(tuple)?;
                n += 1;
            }
            if n > 0 {
                return Ok(Some((strategy, n)));
            }
        }
        Ok(None)
    }

    fn emit_tuple<S: RowSink + ?Sized>(
        &self,
        table: &str,
        tuple: &str,
        line_no: u64,
        session: &mut Session,
        sink: &mut S,
    ) -> Result<()> {
        let fields = split_fields(tuple_interior(tuple));
        if fields.is_empty() {
            return Ok(());
        }
        let values = fields.into_iter().map(decode_mysql_field).collect();
        self.emit_values(table, values, line_no, session, sink)
    }

    fn start_copy<S: RowSink + ?Sized>(
        &self,
        detection: Detection,
        session: &mut Session,
        sink: &mut S,
    ) -> Result<()> {
        session.report.statements += 1;
        let emit = self.table_selected(&detection.table);
        if emit {
            debug!("COPY statement for table: {}", detection.table);
            self.resolve_header(&detection.table, detection.columns.as_deref(), session, sink)?;
        } else {
            debug!("Skipping COPY block for {} due to filter", detection.table);
        }
        session.copy_block = Some(CopyBlock {
            table: detection.table,
            emit,
        });
        Ok(())
    }

    // Fix the header for a table the first time it is seen: explicit column
    // list first, then CREATE TABLE columns. With neither, the header is
    // synthesized later from the first row.
    fn resolve_header<S: RowSink + ?Sized>(
        &self,
        table: &str,
        explicit: Option<&[String]>,
        session: &mut Session,
        sink: &mut S,
    ) -> Result<()> {
        if session.headers.contains_key(table) {
            return Ok(());
        }
        let candidate = explicit
            .filter(|cols| !cols.is_empty())
            .map(<[String]>::to_vec)
            .or_else(|| lookup_structure(&session.structures, table));
        if let Some(columns) = candidate {
            fix_header(table, columns, session, sink)?;
        }
        Ok(())
    }

    // Send one decoded row, synthesizing the header if the table has none yet
    // and repairing the width to match it.
    fn emit_values<S: RowSink + ?Sized>(
        &self,
        table: &str,
        mut values: Vec<LogicalValue>,
        line_no: u64,
        session: &mut Session,
        sink: &mut S,
    ) -> Result<()> {
        let expected = match session.headers.get(table) {
            Some(header) => header.len(),
            None => {
                let columns: Vec<String> =
                    (1..=values.len()).map(|i| format!("column_{i}")).collect();
                debug!("Generated headers for {}: {:?}", table, columns);
                fix_header(table, columns, session, sink)?;
                values.len()
            }
        };

        if values.len() != expected {
            let found = values.len();
            debug!(
                "Column mismatch in {} at line {}: expected {}, got {}",
                table, line_no, expected, found
            );
            if self.options.column_policy == ColumnPolicy::Strict {
                return Err(ConvertError::ColumnCountMismatch {
                    table: table.to_string(),
                    expected,
                    found,
                    line: line_no,
                });
            }
            let notice = MismatchNotice {
                table: table.to_string(),
                line: line_no,
                expected,
                found,
                repair: if found < expected {
                    Repair::Padded
                } else {
                    Repair::Truncated
                },
            };
            values.resize(expected, LogicalValue::empty());
            sink.diagnostic(&Diagnostic::ColumnCountMismatch(notice.clone()));
            session.report.mismatched_rows += 1;
            if session.report.mismatches.len() < MAX_RECORDED_MISMATCHES {
                session.report.mismatches.push(notice);
            }
        }

        sink.row(table, &values)?;
        session.report.rows_emitted += 1;
        let count = session
            .report
            .table_rows
            .entry(table.to_string())
            .or_default();
        *count += 1;
        if *count <= ROWS_TO_LOG {
            debug!("{} row {}: {:?}", table, count, &values[..values.len().min(3)]);
        }
        Ok(())
    }

    fn table_selected(&self, table: &str) -> bool {
        self.options
            .table_filter
            .as_deref()
            .map_or(true, |f| matches_filter(f, table))
    }
}

fn fix_header<S: RowSink + ?Sized>(
    table: &str,
    columns: Vec<String>,
    session: &mut Session,
    sink: &mut S,
) -> Result<()> {
    sink.header(table, &columns)?;
    info!("Header for table '{}': {} columns", table, columns.len());
    session.headers.insert(table.to_string(), columns);
    Ok(())
}

// Exact table name first, then a case-insensitive match. Empty structures
// count as missing.
fn lookup_structure(structures: &HashMap<String, Vec<String>>, table: &str) -> Option<Vec<String>> {
    if let Some(cols) = structures.get(table).filter(|c| !c.is_empty()) {
        return Some(cols.clone());
    }
    let table_lower = table.to_lowercase();
    structures
        .iter()
        .filter(|(name, cols)| !cols.is_empty() && name.to_lowercase() == table_lower)
        .min_by(|a, b| a.0.cmp(b.0))
        .map(|(_, cols)| cols.clone())
}
