// Schema parser: learns column names from CREATE TABLE blocks.
// These are only used as header candidates for INSERTs without a column list;
// nothing here is emitted as data.

use regex::Regex;

pub struct SchemaParser {
    create_table_re: Regex,
    column_re: Regex,
}

impl SchemaParser {
    // Build regexes once for reuse.
    pub fn new() -> Self {
        let create_table_re = Regex::new(
            r"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:`?\w+`?\.)?`?(\w+)`?",
        )
        .expect("valid create table regex");
        // A column definition starts with a backticked name followed by a type.
        let column_re = Regex::new(r"^`([^`]+)`\s+\w").expect("valid column regex");
        Self {
            create_table_re,
            column_re,
        }
    }

    pub fn is_create_table(&self, line: &str) -> bool {
        self.create_table_re.is_match(line)
    }

    pub fn table_name(&self, line: &str) -> Option<String> {
        self.create_table_re
            .captures(line)
            .map(|cap| cap[1].to_string())
    }

    // Column identifiers in declaration order. Key and constraint definitions
    // start with a keyword rather than a backticked name and are skipped.
    pub fn columns(&self, create_text: &str) -> Vec<String> {
        let Some(body) = table_body(create_text) else {
            return Vec::new();
        };
        split_definitions(body)
            .into_iter()
            .filter_map(|def| self.column_re.captures(def))
            .map(|cap| cap[1].to_string())
            .collect()
    }
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self::new()
    }
}

// Text of one CREATE TABLE block, grown line by line until the parenthesis
// count returns to zero. The caller decides how many lines it may look ahead.
pub struct CreateTableBlock {
    text: String,
    balance: i64,
    lines: usize,
}

impl CreateTableBlock {
    pub fn new(first: &str) -> Self {
        Self {
            text: first.trim().to_string(),
            balance: paren_balance(first),
            lines: 0,
        }
    }

    pub fn needs_more(&self) -> bool {
        self.balance > 0
    }

    pub fn push(&mut self, line: &str) {
        self.text.push(' ');
        self.text.push_str(line.trim());
        self.balance += paren_balance(line);
        self.lines += 1;
    }

    // Lookahead lines joined so far.
    pub fn extra_lines(&self) -> usize {
        self.lines
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

fn paren_balance(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}

// Text between the first '(' and its matching ')'. A block cut short by the
// lookahead window yields everything after the '('.
fn table_body(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let body = &text[open + 1..];
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in body.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                if depth == 0 {
                    return Some(&body[..i]);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    Some(body)
}

// Split a table body on commas that are outside parens and quotes.
fn split_definitions(body: &str) -> Vec<&str> {
    let mut defs = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            ',' if !in_quote && depth == 0 => {
                defs.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    defs.push(body[start..].trim());
    defs
}
