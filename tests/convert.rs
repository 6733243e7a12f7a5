// End-to-end conversion tests: dumps in, rows and reports out.

use serde_json::Value;
use sqldump2csv::sink::{MismatchNotice, Record, Repair};
use sqldump2csv::{
    Analyzer, ColumnPolicy, ConversionReport, ConvertError, ConvertOptions, Converter, CsvSink,
    Dialect, LogicalValue, MemorySink, RowSink, TableFilesSink,
};
use std::io::Cursor;

// Keeps decoded values so NULL and '' can be told apart.
#[derive(Default)]
struct ValueSink {
    rows: Vec<Vec<LogicalValue>>,
}

impl RowSink for ValueSink {
    fn header(&mut self, _table: &str, _columns: &[String]) -> sqldump2csv::Result<()> {
        Ok(())
    }

    fn row(&mut self, _table: &str, values: &[LogicalValue]) -> sqldump2csv::Result<()> {
        self.rows.push(values.to_vec());
        Ok(())
    }
}

fn convert(dump: &str) -> (MemorySink, ConversionReport) {
    convert_with(dump, ConvertOptions::default())
}

fn convert_with(dump: &str, options: ConvertOptions) -> (MemorySink, ConversionReport) {
    let mut sink = MemorySink::new();
    let report = Converter::new(options)
        .convert(Cursor::new(dump), &mut sink, None)
        .unwrap();
    (sink, report)
}

fn to_csv(dump: &str, options: ConvertOptions) -> String {
    let mut sink = CsvSink::new(Vec::new());
    Converter::new(options)
        .convert(Cursor::new(dump), &mut sink, None)
        .unwrap();
    String::from_utf8(sink.into_inner().unwrap()).unwrap()
}

const USERS_DUMP: &str = "\
-- MySQL dump 10.13
/*!40101 SET NAMES utf8 */;
CREATE TABLE `users` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `name` varchar(255) DEFAULT NULL,
  `email` varchar(255) DEFAULT NULL,
  `bio` text,
  PRIMARY KEY (`id`),
  KEY `idx_email` (`email`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
INSERT INTO `users` VALUES (1,'Ann','ann@example.com','likes (parens)'),(2,'O''Brien',NULL,'it\\'s fine');
INSERT INTO `users` VALUES (3,'Cy','cy@example.com',NULL);
";

#[test]
fn every_tuple_becomes_a_row() {
    let (sink, report) = convert("INSERT INTO t VALUES (1,'a'),(2,'b'),(3,'c');\n");
    assert_eq!(sink.row_count(), 3);
    assert_eq!(report.rows_emitted, 3);
    assert_eq!(report.table_rows.get("t"), Some(&3));
    assert_eq!(sink.header_for("t").unwrap(), ["column_1", "column_2"]);
}

#[test]
fn null_and_quoted_null_differ() {
    let mut sink = ValueSink::default();
    Converter::new(ConvertOptions::default())
        .convert(
            Cursor::new("INSERT INTO t VALUES (NULL, 'NULL', null);\n"),
            &mut sink,
            None,
        )
        .unwrap();
    assert_eq!(
        sink.rows,
        vec![vec![
            LogicalValue::Null,
            LogicalValue::from("NULL"),
            LogicalValue::Null
        ]]
    );
}

#[test]
fn quote_escapes_are_undone() {
    let (sink, _) =
        convert("INSERT INTO t VALUES ('O''Brien', 'it\\'s', \"say \"\"hi\"\"\", 'a,b');\n");
    assert_eq!(
        sink.rows_for("t"),
        vec![["O'Brien", "it's", "say \"hi\"", "a,b"]]
    );
}

#[test]
fn parens_inside_strings_do_not_split_tuples() {
    let (sink, _) = convert("INSERT INTO t VALUES ('(test)', 2),(')', 3);\n");
    assert_eq!(sink.rows_for("t"), vec![["(test)", "2"], [")", "3"]]);
}

#[test]
fn mysql_dump_uses_create_table_header() {
    let (sink, report) = convert(USERS_DUMP);
    assert_eq!(report.dialect, Some(Dialect::MySql));
    assert_eq!(sink.header_for("users").unwrap(), ["id", "name", "email", "bio"]);
    assert_eq!(
        sink.rows_for("users"),
        vec![
            ["1", "Ann", "ann@example.com", "likes (parens)"],
            ["2", "O'Brien", "", "it's fine"],
            ["3", "Cy", "cy@example.com", ""],
        ]
    );
    assert_eq!(report.statements, 2);
    assert_eq!(report.mismatched_rows, 0);
}

#[test]
fn explicit_columns_beat_create_table() {
    let dump = "CREATE TABLE `t` (`a` int, `b` int);\n\
                INSERT INTO `t` (`b`, `a`) VALUES (2, 1);\n\
                INSERT INTO `t` (`a`, `b`) VALUES (3, 4);\n";
    let (sink, _) = convert(dump);
    // Fixed by the first statement, never re-emitted.
    let headers = sink
        .records
        .iter()
        .filter(|r| matches!(r, Record::Header { .. }))
        .count();
    assert_eq!(headers, 1);
    assert_eq!(sink.header_for("t").unwrap(), ["b", "a"]);
    assert_eq!(sink.rows_for("t"), vec![["2", "1"], ["3", "4"]]);
}

#[test]
fn create_table_lookup_ignores_case() {
    let dump = "CREATE TABLE `Orders` (\n`id` int,\n`total` decimal(10,2)\n);\n\
                INSERT INTO orders VALUES (1, 9.5);\n";
    let (sink, _) = convert(dump);
    assert_eq!(sink.header_for("orders").unwrap(), ["id", "total"]);
}

#[test]
fn short_and_long_rows_are_repaired() {
    let dump = "CREATE TABLE `t` (`a` int, `b` int, `c` int, `d` int);\n\
                INSERT INTO `t` VALUES (1,2,3),(1,2,3,4,5),(1,2,3,4);\n";
    let (sink, report) = convert(dump);
    assert_eq!(
        sink.rows_for("t"),
        vec![
            ["1", "2", "3", ""],
            ["1", "2", "3", "4"],
            ["1", "2", "3", "4"]
        ]
    );
    assert_eq!(report.mismatched_rows, 2);
    assert_eq!(
        report.mismatches,
        vec![
            MismatchNotice {
                table: "t".to_string(),
                line: 2,
                expected: 4,
                found: 3,
                repair: Repair::Padded,
            },
            MismatchNotice {
                table: "t".to_string(),
                line: 2,
                expected: 4,
                found: 5,
                repair: Repair::Truncated,
            },
        ]
    );
    assert_eq!(sink.mismatches().len(), 2);
}

#[test]
fn synthesized_header_follows_first_row() {
    let (sink, report) = convert("INSERT INTO t VALUES (1,2),(3,4,5),(6);\n");
    assert_eq!(sink.header_for("t").unwrap(), ["column_1", "column_2"]);
    assert_eq!(sink.rows_for("t"), vec![["1", "2"], ["3", "4"], ["6", ""]]);
    assert_eq!(report.mismatched_rows, 2);
}

#[test]
fn strict_columns_stop_the_conversion() {
    let dump = "CREATE TABLE `t` (`a` int, `b` int, `c` int, `d` int);\n\
                INSERT INTO `t` VALUES (1,2,3,4);\n\
                INSERT INTO `t` VALUES (1,2,3);\n";
    let options = ConvertOptions {
        column_policy: ColumnPolicy::Strict,
        ..ConvertOptions::default()
    };
    let mut sink = MemorySink::new();
    let err = Converter::new(options)
        .convert(Cursor::new(dump), &mut sink, None)
        .unwrap_err();
    match err {
        ConvertError::ColumnCountMismatch {
            table,
            expected,
            found,
            line,
        } => {
            assert_eq!(table, "t");
            assert_eq!((expected, found, line), (4, 3, 3));
        }
        other => panic!("unexpected error {other:?}"),
    }
    // Rows before the bad one were already delivered.
    assert_eq!(sink.row_count(), 1);
}

#[test]
fn postgres_copy_block() {
    let dump = "SET client_encoding = 'UTF8';\n\
                COPY public.people (id, name, note) FROM stdin;\n\
                1\tJohn\\tDoe\t\\N\n\
                2\tline\\nbreak\tback\\\\slash\n\
                \n\
                \\.\n\
                SELECT 1;\n";
    let (sink, report) = convert(dump);
    assert_eq!(report.dialect, Some(Dialect::Postgres));
    assert_eq!(sink.header_for("people").unwrap(), ["id", "name", "note"]);
    assert_eq!(
        sink.rows_for("people"),
        vec![["1", "John\tDoe", ""], ["2", "line\nbreak", "back\\slash"]]
    );

    let mut values = ValueSink::default();
    Converter::new(ConvertOptions::default())
        .convert(Cursor::new(dump), &mut values, None)
        .unwrap();
    assert!(values.rows[0][2].is_null());
}

#[test]
fn copy_lines_are_repaired_to_header_width() {
    let dump = "COPY t (a, b, c) FROM stdin;\n\
                1\t2\n\
                1\t2\t3\t4\n\
                \\.\n";
    let (sink, report) = convert(dump);
    assert_eq!(sink.header_for("t").unwrap(), ["a", "b", "c"]);
    assert_eq!(sink.rows_for("t"), vec![["1", "2", ""], ["1", "2", "3"]]);
    let repairs: Vec<(u64, usize, Repair)> = sink
        .mismatches()
        .iter()
        .map(|n| (n.line, n.found, n.repair))
        .collect();
    assert_eq!(repairs, vec![(2, 2, Repair::Padded), (3, 4, Repair::Truncated)]);
    assert_eq!(report.mismatched_rows, 2);
}

#[test]
fn analysis_accepts_values_on_following_lines() {
    let dump = "CREATE TABLE `t` (`a` int, `b` text);\n\
                INSERT INTO `t` (`a`, `b`) VALUES\n\
                (1, 'x'),\n\
                (2, 'y');\n";
    let analysis = Analyzer::new().analyze(Cursor::new(dump), None).unwrap();
    assert_eq!(analysis.detected_dialect, Some(Dialect::MySql));
    assert_eq!(analysis.preflight(None).unwrap(), vec!["t"]);

    let (sink, report) = convert(dump);
    assert_eq!(report.dialect, analysis.detected_dialect);
    assert_eq!(sink.rows_for("t"), vec![["1", "x"], ["2", "y"]]);
}

#[test]
fn table_filter_applies_to_inserts() {
    let dump = "INSERT INTO users VALUES (1);\n\
                INSERT INTO orders VALUES (7);\n\
                INSERT INTO user_roles VALUES (2);\n";
    let options = ConvertOptions {
        table_filter: Some("USER".to_string()),
        ..ConvertOptions::default()
    };
    let (sink, report) = convert_with(dump, options);
    assert_eq!(sink.rows_for("users"), vec![["1"]]);
    assert_eq!(sink.rows_for("user_roles"), vec![["2"]]);
    assert!(sink.header_for("orders").is_none());
    assert_eq!(report.rows_emitted, 2);
}

#[test]
fn table_filter_applies_to_copy_blocks() {
    let dump = "COPY public.a (x) FROM stdin;\n1\n\\.\n\
                COPY public.b (y) FROM stdin;\n2\n3\n\\.\n";
    let options = ConvertOptions {
        table_filter: Some("b".to_string()),
        ..ConvertOptions::default()
    };
    let (sink, _) = convert_with(dump, options);
    assert!(sink.header_for("a").is_none());
    assert_eq!(sink.rows_for("b"), vec![["2"], ["3"]]);
}

#[test]
fn keywords_are_case_insensitive() {
    let (sink, _) = convert("insert into t (a, b) values (1, 'x');\n");
    assert_eq!(sink.header_for("t").unwrap(), ["a", "b"]);
    assert_eq!(sink.rows_for("t"), vec![["1", "x"]]);
}

#[test]
fn qualified_table_names_use_last_segment() {
    let (sink, _) = convert("INSERT INTO `shop`.`items` VALUES (1);\n");
    assert_eq!(sink.rows_for("items"), vec![["1"]]);
}

#[test]
fn statement_without_tuples_is_counted() {
    let dump = "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES ;\n";
    let (sink, report) = convert(dump);
    assert_eq!(sink.row_count(), 1);
    assert_eq!(report.empty_statements, 1);
}

#[test]
fn csv_output_is_deterministic() {
    let first = to_csv(USERS_DUMP, ConvertOptions::default());
    let second = to_csv(USERS_DUMP, ConvertOptions::default());
    assert_eq!(first, second);
    assert_eq!(
        first,
        "id,name,email,bio\n\
         1,Ann,ann@example.com,likes (parens)\n\
         2,O'Brien,,it's fine\n\
         3,Cy,cy@example.com,\n"
    );
}

#[test]
fn large_payload_path_matches_whole_buffer_path() {
    let streamed = ConvertOptions {
        large_threshold: 0,
        ..ConvertOptions::default()
    };
    let (whole, whole_report) = convert(USERS_DUMP);
    let (chunked, chunked_report) = convert_with(USERS_DUMP, streamed);
    assert_eq!(whole.records, chunked.records);
    assert_eq!(whole_report.rows_emitted, chunked_report.rows_emitted);
    assert_eq!(
        to_csv(USERS_DUMP, ConvertOptions::default()),
        to_csv(
            USERS_DUMP,
            ConvertOptions {
                large_threshold: 0,
                ..ConvertOptions::default()
            }
        )
    );
}

#[test]
fn csv_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("dump.sql");
    let output = dir.path().join("dump.csv");
    std::fs::write(&input, USERS_DUMP).unwrap();

    let analysis = Analyzer::new()
        .analyze(
            std::io::BufReader::new(std::fs::File::open(&input).unwrap()),
            None,
        )
        .unwrap();
    assert_eq!(analysis.preflight(None).unwrap(), vec!["users"]);

    let mut sink = CsvSink::create(&output).unwrap();
    let report = Converter::new(ConvertOptions::default())
        .convert(
            std::io::BufReader::new(std::fs::File::open(&input).unwrap()),
            &mut sink,
            None,
        )
        .unwrap();
    drop(sink);
    assert_eq!(report.rows_emitted, 3);

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, ["id", "name", "email", "bio"]);
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[1][3], "it's fine");
}

#[test]
fn split_output_writes_one_file_per_table() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("tables");
    let dump = "INSERT INTO a (x) VALUES (1),(2);\nINSERT INTO `b/c` (y) VALUES ('q');\n";

    let mut sink = TableFilesSink::new(&out).unwrap();
    Converter::new(ConvertOptions::default())
        .convert(Cursor::new(dump), &mut sink, None)
        .unwrap();
    assert_eq!(sink.paths().len(), 2);
    drop(sink);

    assert_eq!(std::fs::read_to_string(out.join("a.csv")).unwrap(), "x\n1\n2\n");
    assert_eq!(std::fs::read_to_string(out.join("b_c.csv")).unwrap(), "y\nq\n");
}

#[test]
fn report_serializes_to_json() {
    let dump = "CREATE TABLE `t` (`a` int, `b` int);\nINSERT INTO `t` VALUES (1),(2,3);\n";
    let (sink, report) = convert(dump);
    let json: Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["dialect"], "mysql");
    assert_eq!(json["rows_emitted"], 2);
    assert_eq!(json["table_rows"]["t"], 2);
    assert_eq!(json["mismatches"][0]["repair"], "padded");

    let diagnostics: Value = serde_json::to_value(&sink.diagnostics).unwrap();
    let kinds: Vec<&str> = diagnostics
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["kind"].as_str())
        .collect();
    assert_eq!(kinds, vec!["dialect_detected", "column_count_mismatch"]);
}

#[test]
fn preflight_rejects_unusable_dumps() {
    let analyze = |dump: &str| Analyzer::new().analyze(Cursor::new(dump), None).unwrap();

    assert!(matches!(
        analyze("SELECT 1;\n").preflight(None),
        Err(ConvertError::FormatUnrecognized)
    ));
    assert!(matches!(
        analyze("INSERT INTO users VALUES (1);\n").preflight(Some("orders")),
        Err(ConvertError::TableFilterNoMatch { .. })
    ));
}
