// sqldump2csv command-line entry point.
// Analyze the dump, check that it can produce rows, then stream it into CSV.

use clap::{CommandFactory, Parser};
use sqldump2csv::analyze::{Analysis, Analyzer};
use sqldump2csv::converter::{
    DEFAULT_CREATE_LOOKAHEAD, DEFAULT_LARGE_THRESHOLD, DEFAULT_MAX_STATEMENT_LINES,
};
use sqldump2csv::progress::ProgressManager;
use sqldump2csv::{
    logger, ColumnPolicy, ConversionReport, ConvertError, ConvertOptions, Converter, CsvSink,
    TableFilesSink,
};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

// Command-line flags and positional arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "Convert MySQL INSERT / PostgreSQL COPY dumps to CSV")]
struct Args {
    /// Input SQL dump.
    input: PathBuf,

    /// Output CSV file (default: input with a .csv extension).
    /// With --split this is a directory (default: <input stem>_csv).
    output: Option<PathBuf>,

    /// Enable debug logging (disables progress bars).
    #[arg(short, long)]
    debug: bool,

    /// Only convert tables whose name contains this text (case-insensitive).
    #[arg(short, long)]
    table: Option<String>,

    /// Only analyze the file, don't convert.
    #[arg(short, long)]
    analyze_only: bool,

    /// Write one CSV file per table into the output directory.
    #[arg(long)]
    split: bool,

    /// Fail on rows whose column count differs from the header instead of padding/truncating.
    #[arg(long)]
    strict_columns: bool,

    /// VALUES payloads larger than this many bytes are parsed tuple by tuple.
    #[arg(long, default_value_t = DEFAULT_LARGE_THRESHOLD)]
    large_threshold: usize,

    /// Max physical lines joined into one INSERT statement.
    #[arg(long, default_value_t = DEFAULT_MAX_STATEMENT_LINES)]
    max_statement_lines: usize,

    /// Max lines a CREATE TABLE may look ahead for its closing parenthesis.
    #[arg(long, default_value_t = DEFAULT_CREATE_LOOKAHEAD)]
    create_lookahead: usize,

    /// Write analysis and conversion metrics as JSON to this file.
    #[arg(long)]
    report_json: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        eprintln!();
        std::process::exit(1);
    }
    let args = Args::parse();

    logger::init(args.debug);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input, args.split));
    info!("Input file: {}", args.input.display());
    if !args.analyze_only {
        info!("Output: {}", output.display());
    }
    if let Some(filter) = &args.table {
        info!("Table filter: {}", filter);
    }

    // No bars in debug mode; they would interleave with log lines.
    let progress = ProgressManager::new(!args.debug);

    let start = Instant::now();
    match run(&args, &output, &progress) {
        Ok(Some(report)) => {
            print_summary(&report, &output, args.split)?;
            debug!("Total time {:?}", start.elapsed());
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            error!("{}", e);
            let mut stderr = io::stderr();
            writeln!(stderr, "\nConversion failed!")?;
            writeln!(stderr, "Tips:")?;
            writeln!(stderr, "   - Check if file contains INSERT INTO or COPY statements")?;
            writeln!(stderr, "   - Try with --debug flag for more information")?;
            writeln!(stderr, "   - Use --analyze-only to inspect file structure")?;
            std::process::exit(1);
        }
    }
}

// Returns None when only the analysis was requested.
fn run(
    args: &Args,
    output: &Path,
    progress: &ProgressManager,
) -> sqldump2csv::Result<Option<ConversionReport>> {
    if !args.input.exists() {
        return Err(ConvertError::InputNotFound(args.input.clone()));
    }

    let bar = progress.new_file_bar(&args.input, "Analyzing");
    let analysis = Analyzer::new()
        .with_max_statement_lines(args.max_statement_lines)
        .analyze(BufReader::new(File::open(&args.input)?), bar.as_ref())?;
    print_analysis(&analysis)?;
    if args.analyze_only {
        return Ok(None);
    }

    let targets = analysis.preflight(args.table.as_deref())?;
    if args.table.is_some() {
        info!("Filtering for tables: {:?}", targets);
    }

    let options = ConvertOptions {
        table_filter: args.table.clone(),
        column_policy: if args.strict_columns {
            ColumnPolicy::Strict
        } else {
            ColumnPolicy::Repair
        },
        large_threshold: args.large_threshold,
        max_statement_lines: args.max_statement_lines,
        create_lookahead: args.create_lookahead,
    };
    let converter = Converter::new(options);

    info!("Converting file: {}", args.input.display());
    let bar = progress.new_file_bar(&args.input, "Converting");
    let input = BufReader::new(File::open(&args.input)?);
    let report = if args.split {
        let mut sink = TableFilesSink::new(output)?;
        converter.convert(input, &mut sink, bar.as_ref())?
    } else {
        let mut sink = CsvSink::create(output)?;
        converter.convert(input, &mut sink, bar.as_ref())?
    };

    if let Some(path) = args.report_json.as_ref() {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "analysis": analysis,
            "conversion": report,
        }))?;
        std::fs::write(path, json)?;
    }

    if report.rows_emitted == 0 {
        return Err(ConvertError::NoRowsWritten);
    }
    Ok(Some(report))
}

fn print_analysis(analysis: &Analysis) -> io::Result<()> {
    let mut stderr = io::stderr();
    writeln!(stderr, "File Analysis:")?;
    writeln!(stderr, "   Total lines: {}", analysis.total_lines)?;
    writeln!(stderr, "   CREATE TABLE statements: {}", analysis.create_tables.len())?;
    writeln!(stderr, "   INSERT statements for tables: {:?}", analysis.insert_tables)?;
    writeln!(stderr, "   COPY statements for tables: {:?}", analysis.copy_tables)?;
    writeln!(stderr, "   Estimated data rows: {}", analysis.estimated_rows)?;
    match analysis.detected_dialect {
        Some(dialect) => writeln!(stderr, "   Detected format: {}", dialect)?,
        None => writeln!(stderr, "   No INSERT or COPY statements detected!")?,
    }
    Ok(())
}

fn print_summary(report: &ConversionReport, output: &Path, split: bool) -> io::Result<()> {
    let sep = "=".repeat(60);
    let mut stderr = io::stderr();
    writeln!(stderr, "\n{}\nSUMMARY\n{}", sep, sep)?;
    if let Some(dialect) = report.dialect {
        writeln!(stderr, "Format:     {}", dialect)?;
    }
    writeln!(stderr, "Lines:      {}", report.lines_scanned)?;
    writeln!(stderr, "Rows:       {}", report.rows_emitted)?;
    for (table, rows) in &report.table_rows {
        writeln!(stderr, "  {:<24} {}", table, rows)?;
    }
    if report.mismatched_rows > 0 {
        writeln!(stderr, "Repaired:   {} rows with a wrong column count", report.mismatched_rows)?;
    }
    if report.fallback_statements > 0 || report.empty_statements > 0 {
        writeln!(
            stderr,
            "Fallbacks:  {} statements, {} without rows",
            report.fallback_statements, report.empty_statements
        )?;
    }
    if split {
        writeln!(stderr, "Output dir: {}", output.display())?;
    } else {
        let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        writeln!(stderr, "Output:     {} ({} bytes)", output.display(), size)?;
    }
    writeln!(stderr, "{}", sep)?;
    Ok(())
}

fn default_output(input: &Path, split: bool) -> PathBuf {
    if split {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        input.with_file_name(format!("{}_csv", stem))
    } else {
        input.with_extension("csv")
    }
}
