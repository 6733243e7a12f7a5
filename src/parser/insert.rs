// INSERT parser: breaks one assembled INSERT statement into table name,
// optional explicit column list, and the raw VALUES payload.
// No SQL grammar: the table name and column list are read off the front.

use regex::Regex;

// One INSERT statement, decomposed. The payload borrows from the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement<'a> {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub payload: &'a str,
}

pub struct InsertParser {
    insert_into_re: Regex,
}

impl InsertParser {
    pub fn new() -> Self {
        let insert_into_re = Regex::new(r"(?i)INSERT\s+INTO\s+").expect("valid insert regex");
        Self { insert_into_re }
    }

    pub fn parse<'a>(&self, stmt: &'a str) -> Result<InsertStatement<'a>, String> {
        let m = self.insert_into_re.find(stmt).ok_or("not INSERT")?;
        let rest = &stmt[m.end()..];

        let (table, rest) = parse_table_name(rest)?;

        // Optional explicit column list.
        let mut rest = rest.trim_start();
        let mut columns = None;
        if rest.starts_with('(') {
            let mut depth = 0i32;
            let mut end_idx = None;
            for (i, c) in rest.char_indices() {
                if c == '(' {
                    depth += 1;
                } else if c == ')' {
                    depth -= 1;
                    if depth == 0 {
                        end_idx = Some(i);
                        break;
                    }
                }
            }
            let end = end_idx.ok_or("invalid column list")?;
            let cols: Vec<String> = rest[1..end]
                .split(',')
                .map(|c| c.trim().trim_matches(['`', '\'', '"'].as_ref()).to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !cols.is_empty() {
                columns = Some(cols);
            }
            rest = &rest[end + 1..];
        }

        // ASCII uppercasing keeps byte offsets aligned with `rest`.
        let values_pos = rest
            .to_ascii_uppercase()
            .find("VALUES")
            .ok_or("no VALUES clause")?;
        let payload = rest[values_pos + "VALUES".len()..].trim();
        let payload = payload.strip_suffix(';').unwrap_or(payload).trim_end();

        Ok(InsertStatement {
            table,
            columns,
            payload,
        })
    }
}

impl Default for InsertParser {
    fn default() -> Self {
        Self::new()
    }
}

// Table name at the start of `rest`, backticked or bare, with an optional
// database qualifier that is dropped. Returns the name and the remaining text.
fn parse_table_name(rest: &str) -> Result<(String, &str), String> {
    let mut rest = rest;
    let mut name;
    loop {
        if let Some(quoted) = rest.strip_prefix('`') {
            let end = quoted.find('`').ok_or("invalid table name")?;
            name = quoted[..end].to_string();
            rest = &quoted[end + 1..];
        } else {
            let end = rest
                .find(|c: char| c == '(' || c == '.' || c.is_whitespace())
                .unwrap_or(rest.len());
            name = rest[..end].trim_matches('"').to_string();
            rest = &rest[end..];
        }
        match rest.strip_prefix('.') {
            Some(after) => rest = after,
            None => break,
        }
    }
    if name.is_empty() {
        return Err("invalid table name".to_string());
    }
    Ok((name, rest))
}
