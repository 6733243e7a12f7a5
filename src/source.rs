// Line source: forward iteration over a dump with a bounded peek window.
// Lines are decoded lossily so a stray invalid byte never aborts a conversion.

use std::collections::VecDeque;
use std::io::{self, BufRead};

pub struct LineSource<R> {
    reader: R,
    lookahead: VecDeque<String>,
    buf: Vec<u8>,
    eof: bool,
    line_no: u64,
    bytes_read: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lookahead: VecDeque::new(),
            buf: Vec::new(),
            eof: false,
            line_no: 0,
            bytes_read: 0,
        }
    }

    // Number of the last line handed out by next_line (1-based).
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    // Bytes pulled from the reader so far, peeked lines included.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    // Next line without its terminator ("\n" or "\r\n").
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        let line = match self.lookahead.pop_front() {
            Some(line) => Some(line),
            None => self.read_raw()?,
        };
        if line.is_some() {
            self.line_no += 1;
        }
        Ok(line)
    }

    // Look at the upcoming line `i` positions ahead (0 = next) without
    // consuming it. Only lines up to `i` are buffered.
    pub fn peek_at(&mut self, i: usize) -> io::Result<Option<&str>> {
        while self.lookahead.len() <= i {
            match self.read_raw()? {
                Some(line) => self.lookahead.push_back(line),
                None => return Ok(None),
            }
        }
        Ok(self.lookahead.get(i).map(String::as_str))
    }

    // Join following lines onto `first` with a single space until the text
    // ends with ';', the input ends, or `max_lines` lines were joined.
    // Returns the text and whether the line budget ran out.
    pub fn join_statement(&mut self, first: &str, max_lines: usize) -> io::Result<(String, bool)> {
        let mut statement = first.to_string();
        let mut joined = 0;
        while !statement.trim_end().ends_with(';') {
            if joined >= max_lines {
                return Ok((statement, true));
            }
            match self.next_line()? {
                Some(next) => {
                    statement.push(' ');
                    statement.push_str(next.trim());
                    joined += 1;
                }
                None => break,
            }
        }
        Ok((statement, false))
    }

    fn read_raw(&mut self) -> io::Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            self.eof = true;
            return Ok(None);
        }
        self.bytes_read += n as u64;
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn strips_terminators() {
        let mut src = LineSource::new(Cursor::new("a\r\nb\n\nc"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some(""));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("c"));
        assert_eq!(src.next_line().unwrap(), None);
        assert_eq!(src.line_no(), 4);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut src = LineSource::new(Cursor::new("1\n2\n3\n"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("1"));
        assert_eq!(src.peek_at(1).unwrap(), Some("3"));
        assert_eq!(src.peek_at(0).unwrap(), Some("2"));
        assert_eq!(src.peek_at(5).unwrap(), None);
        assert_eq!(src.line_no(), 1);
        assert_eq!(src.next_line().unwrap().as_deref(), Some("2"));
        assert_eq!(src.line_no(), 2);
        assert_eq!(src.bytes_read(), 6);
    }

    #[test]
    fn join_statement_stops_at_semicolon() {
        let mut src = LineSource::new(Cursor::new("VALUES\n  (1),\n(2);\nnext\n"));
        let first = src.next_line().unwrap().unwrap();
        let (stmt, cut) = src.join_statement(&first, 10).unwrap();
        assert_eq!(stmt, "VALUES (1), (2);");
        assert!(!cut);
        assert_eq!(src.line_no(), 3);
        assert_eq!(src.next_line().unwrap().as_deref(), Some("next"));
    }

    #[test]
    fn join_statement_respects_budget() {
        let mut src = LineSource::new(Cursor::new("a\nb\nc\nd;\n"));
        let first = src.next_line().unwrap().unwrap();
        let (stmt, cut) = src.join_statement(&first, 2).unwrap();
        assert_eq!(stmt, "a b c");
        assert!(cut);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut src = LineSource::new(Cursor::new(vec![b'a', 0xff, b'b', b'\n']));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("a\u{fffd}b"));
    }
}
