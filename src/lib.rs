// sqldump2csv: convert SQL dumps into CSV without a SQL engine.
// MySQL-style INSERT ... VALUES statements and PostgreSQL-style COPY ... FROM
// stdin blocks are understood; the first one seen fixes the dialect.

pub mod analyze;
pub mod converter;
pub mod error;
pub mod logger;
pub mod parser;
pub mod progress;
pub mod sink;
pub mod source;

pub use analyze::{Analysis, Analyzer};
pub use converter::{ColumnPolicy, ConversionReport, ConvertOptions, Converter};
pub use error::{ConvertError, Result};
pub use parser::{Dialect, LogicalValue};
pub use sink::{CsvSink, Diagnostic, MemorySink, RowSink, TableFilesSink};
