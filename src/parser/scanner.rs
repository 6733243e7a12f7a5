// Literal scanner: splits a VALUES payload into tuples and a tuple into fields.
// Both splitters share one quote-tracking state machine; tuples additionally
// track parenthesis depth. Everything is sliced out of the input, never copied.

use regex::Regex;
use serde::Serialize;
use std::iter::Peekable;
use std::str::CharIndices;

// Quote tracking shared by the tuple and field splitters.
#[derive(Debug, Clone, Copy, Default)]
struct QuoteState {
    delim: Option<char>,
}

impl QuoteState {
    fn in_string(&self) -> bool {
        self.delim.is_some()
    }

    // Feed one character. Returns true when the character belongs to a string
    // literal (including its delimiters), false when it is structural.
    // Escape partners and doubled delimiters are pulled from `rest`.
    fn step(&mut self, c: char, rest: &mut Peekable<CharIndices<'_>>) -> bool {
        match self.delim {
            None => {
                if c == '\'' || c == '"' {
                    self.delim = Some(c);
                    true
                } else {
                    false
                }
            }
            Some(d) => {
                if c == '\\' {
                    rest.next();
                } else if c == d {
                    if rest.peek().map(|&(_, n)| n) == Some(d) {
                        rest.next();
                    } else {
                        self.delim = None;
                    }
                }
                true
            }
        }
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, ',' | ' ' | '\t' | '\n' | '\r')
}

fn trim_tuple(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == ',')
}

// Streaming tuple splitter over a VALUES payload.
// Each call to `next` yields one tuple (parens included) as soon as its
// closing parenthesis is seen, so a caller can process and drop tuples one
// at a time. Collecting the iterator gives the whole-buffer result.
pub struct TupleIter<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    start: usize,
    depth: usize,
    quotes: QuoteState,
    done: bool,
}

impl<'a> TupleIter<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            start: 0,
            depth: 0,
            quotes: QuoteState::default(),
            done: false,
        }
    }

    // Advance past the run of separators that follows a closed tuple.
    fn skip_separators(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if !is_separator(c) {
                break;
            }
            self.chars.next();
        }
        self.start = self.chars.peek().map_or(self.src.len(), |&(i, _)| i);
    }
}

impl<'a> Iterator for TupleIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.done {
            return None;
        }
        while let Some((i, c)) = self.chars.next() {
            if self.quotes.step(c, &mut self.chars) {
                continue;
            }
            match c {
                '(' => self.depth += 1,
                // A ')' at depth zero has nothing to close; it stays literal.
                ')' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let tuple = trim_tuple(&self.src[self.start..i + 1]);
                        self.skip_separators();
                        if !tuple.is_empty() {
                            return Some(tuple);
                        }
                    }
                }
                _ => {}
            }
        }
        self.done = true;
        // Trailing text that never opened a group is still handed out;
        // an unclosed group or string is dropped. The naive fallback relies
        // on this to recover payloads broken by a stray quote.
        let tail = trim_tuple(&self.src[self.start..]);
        if self.depth == 0 && !self.quotes.in_string() && !tail.is_empty() {
            Some(tail)
        } else {
            None
        }
    }
}

// Tuple splitting strategies, tried in order until one yields something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    // Quote- and nesting-aware state machine.
    Scanner,
    // Every `(...)` span without nested parens; ignores quoting entirely.
    NaiveParens,
}

impl SplitStrategy {
    pub const CHAIN: [SplitStrategy; 2] = [SplitStrategy::Scanner, SplitStrategy::NaiveParens];
}

// Holds the fallback regex so it is compiled once per conversion.
pub struct TupleSplitter {
    naive_re: Regex,
}

impl TupleSplitter {
    pub fn new() -> Self {
        let naive_re = Regex::new(r"\([^)]*\)").expect("valid naive tuple regex");
        Self { naive_re }
    }

    // Iterate over tuples using one strategy.
    pub fn iter<'a>(
        &'a self,
        strategy: SplitStrategy,
        payload: &'a str,
    ) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match strategy {
            SplitStrategy::Scanner => Box::new(TupleIter::new(payload)),
            SplitStrategy::NaiveParens => {
                Box::new(self.naive_re.find_iter(payload).map(|m| m.as_str()))
            }
        }
    }

    // Whole-buffer split: first strategy of the chain that yields any tuple.
    // None means every strategy came back empty.
    pub fn split<'a>(&'a self, payload: &'a str) -> Option<(SplitStrategy, Vec<&'a str>)> {
        for strategy in SplitStrategy::CHAIN {
            let tuples: Vec<&str> = self.iter(strategy, payload).collect();
            if !tuples.is_empty() {
                return Some((strategy, tuples));
            }
        }
        None
    }
}

impl Default for TupleSplitter {
    fn default() -> Self {
        Self::new()
    }
}

// Strip one leading '(' and one trailing ')' when present.
pub fn tuple_interior(tuple: &str) -> &str {
    let t = tuple.strip_prefix('(').unwrap_or(tuple);
    t.strip_suffix(')').unwrap_or(t)
}

// Split a tuple interior on top-level commas (commas outside string literals).
// Fields are trimmed. A blank trailing field is dropped, so "()" has no fields.
pub fn split_fields(interior: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut quotes = QuoteState::default();
    let mut chars = interior.char_indices().peekable();
    let mut start = 0;

    while let Some((i, c)) = chars.next() {
        if quotes.step(c, &mut chars) {
            continue;
        }
        if c == ',' {
            fields.push(interior[start..i].trim());
            start = i + 1;
        }
    }

    let last = interior[start..].trim();
    if !last.is_empty() {
        fields.push(last);
    }
    fields
}
