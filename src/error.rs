// Error types for dump conversion.
// Malformed literal content never shows up here: the scanner degrades to
// "fewer rows" instead. These are the conditions the caller has to see.

use std::path::PathBuf;

// Errors that can stop a conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    // No INSERT or COPY pattern matched anywhere in the input.
    #[error("no INSERT or COPY statements detected")]
    FormatUnrecognized,

    // A dialect was detected but the dump only carries schema statements.
    #[error("no data insertion statements found (the file appears to contain only table structures)")]
    NoDataStatements,

    // The user-supplied table filter matched none of the data tables.
    #[error("no tables match filter '{filter}'")]
    TableFilterNoMatch {
        // The filter as given on the command line.
        filter: String,
    },

    // Input file does not exist.
    #[error("input file '{}' not found", .0.display())]
    InputNotFound(PathBuf),

    // The conversion ran but produced zero data rows.
    #[error("conversion finished without writing any data rows")]
    NoRowsWritten,

    // Column count differs from the header and strict mode is on.
    #[error("table '{table}' line {line}: expected {expected} columns, found {found}")]
    ColumnCountMismatch {
        table: String,
        expected: usize,
        found: usize,
        line: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;
