//! Tokenizer for the KV1 pipe-delimited text format.
//!
//! The stream is an optional `[...]` header line, comment lines starting
//! with `;`, blank lines, and data rows of `|`-separated cells terminated by
//! CR, LF or CRLF. Cells are either unquoted (trailing ASCII whitespace
//! stripped, interior whitespace kept) or quoted with `"` where `""` denotes
//! a literal quote. Errors abandon the current row but not the stream.

use std::fmt;

/// Cells are raw bytes: UTF-8 validity is a per-field concern of the parser,
/// not of tokenization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kv1Token {
    Cell(Vec<u8>),
    RowEnd,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("no matching closing quote found")]
    UnterminatedQuote,
    #[error("non-whitespace character after closing quote")]
    GarbageAfterQuote,
    #[error("expected CR, LF or '|' after cell")]
    UnexpectedByteAfterCell,
}

pub struct Kv1Lexer<'a> {
    slice: &'a [u8],
    pub tokens: Vec<Kv1Token>,
    pub errors: Vec<LexError>,
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\x0b' | b'\x0c')
}

impl<'a> Kv1Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Kv1Lexer {
            slice: input,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenizes the whole input, accumulating errors instead of stopping at
    /// the first.
    pub fn lex(&mut self) {
        if self.slice.first() == Some(&b'[') {
            self.eat_rest_of_line();
        }
        loop {
            self.eat_blank();
            match self.slice.first() {
                None => break,
                Some(b';') => {
                    self.eat_rest_of_line();
                }
                Some(_) => self.lex_row(),
            }
        }
    }

    // Skips up to and including the next line ending.
    fn eat_rest_of_line(&mut self) {
        let end = self
            .slice
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(self.slice.len());
        self.slice = &self.slice[end..];
        self.eat_line_ending();
    }

    fn eat_line_ending(&mut self) -> bool {
        match self.slice {
            [b'\r', b'\n', ..] => {
                self.slice = &self.slice[2..];
                true
            }
            [b'\r', ..] | [b'\n', ..] => {
                self.slice = &self.slice[1..];
                true
            }
            _ => false,
        }
    }

    // Skips interline whitespace and empty lines.
    fn eat_blank(&mut self) {
        loop {
            while let Some(&b) = self.slice.first() {
                if is_space(b) {
                    self.slice = &self.slice[1..];
                } else {
                    break;
                }
            }
            if !self.eat_line_ending() {
                return;
            }
        }
    }

    fn lex_row(&mut self) {
        while let Some(&b) = self.slice.first() {
            if b == b'\r' || b == b'\n' {
                break;
            }
            let ok = if b == b'"' {
                self.read_quoted_cell()
            } else {
                self.read_unquoted_cell()
            };
            if !ok {
                // The row is poisoned; drop the rest of it.
                self.eat_rest_of_line();
                break;
            }
            match self.slice.first() {
                None => break,
                Some(b'|') => {
                    self.slice = &self.slice[1..];
                    // A line ending or EOF right after the pipe is one more
                    // empty cell at the end of the record.
                    if matches!(self.slice.first(), None | Some(b'\r') | Some(b'\n')) {
                        self.tokens.push(Kv1Token::Cell(Vec::new()));
                    }
                }
                Some(b'\r') | Some(b'\n') => {
                    self.eat_line_ending();
                    break;
                }
                Some(_) => {
                    self.errors.push(LexError::UnexpectedByteAfterCell);
                    self.eat_rest_of_line();
                    break;
                }
            }
        }
        self.tokens.push(Kv1Token::RowEnd);
    }

    fn read_quoted_cell(&mut self) -> bool {
        debug_assert_eq!(self.slice.first(), Some(&b'"'));
        self.slice = &self.slice[1..];

        let mut data = Vec::new();
        loop {
            let Some(quote) = self.slice.iter().position(|&b| b == b'"') else {
                self.errors.push(LexError::UnterminatedQuote);
                // Recover at the next line boundary.
                let nl = self
                    .slice
                    .iter()
                    .position(|&b| b == b'\r' || b == b'\n')
                    .unwrap_or(self.slice.len());
                self.slice = &self.slice[nl..];
                return false;
            };
            if self.slice.get(quote + 1) == Some(&b'"') {
                // Escaped quote: keep one '"' and continue.
                data.extend_from_slice(&self.slice[..quote + 1]);
                self.slice = &self.slice[quote + 2..];
            } else {
                data.extend_from_slice(&self.slice[..quote]);
                self.slice = &self.slice[quote + 1..];
                break;
            }
        }

        // Only whitespace may follow the closing quote within the cell.
        let mut end = self.slice.len();
        for (i, &b) in self.slice.iter().enumerate() {
            if b == b'|' || b == b'\r' || b == b'\n' {
                end = i;
                break;
            }
            if !is_space(b) {
                self.errors.push(LexError::GarbageAfterQuote);
                return false;
            }
        }
        self.slice = &self.slice[end..];
        self.tokens.push(Kv1Token::Cell(data));
        true
    }

    fn read_unquoted_cell(&mut self) -> bool {
        let mut end = self.slice.len();
        let mut content_end = 0;
        for (i, &b) in self.slice.iter().enumerate() {
            if b == b'|' || b == b'\r' || b == b'\n' {
                end = i;
                break;
            }
            if !is_space(b) {
                content_end = i + 1;
            }
        }
        self.tokens
            .push(Kv1Token::Cell(self.slice[..content_end].to_vec()));
        self.slice = &self.slice[end..];
        true
    }
}

impl fmt::Debug for Kv1Lexer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kv1Lexer")
            .field("tokens", &self.tokens.len())
            .field("errors", &self.errors)
            .finish()
    }
}

/// Convenience wrapper: tokenize `input` in one go.
pub fn lex(input: &[u8]) -> (Vec<Kv1Token>, Vec<LexError>) {
    let mut lexer = Kv1Lexer::new(input);
    lexer.lex();
    (lexer.tokens, lexer.errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Kv1Token::{Cell, RowEnd};

    fn cell(s: &str) -> Kv1Token {
        Cell(s.as_bytes().to_vec())
    }

    #[test]
    fn quoting_and_trailing_pipe() {
        let (tokens, errors) = lex(b"\"A\"\"B\"|C||\n");
        assert!(errors.is_empty());
        assert_eq!(
            tokens,
            vec![cell("A\"B"), cell("C"), cell(""), cell(""), RowEnd]
        );
    }

    #[test]
    fn header_and_comments_are_skipped() {
        let (tokens, errors) = lex(b"[OpenOV KV1]\n;generated nightly\nORUN|1|I\n");
        assert!(errors.is_empty());
        assert_eq!(tokens, vec![cell("ORUN"), cell("1"), cell("I"), RowEnd]);
    }

    #[test]
    fn unquoted_whitespace_handling() {
        // Trailing whitespace is stripped, interior whitespace is kept.
        let (tokens, errors) = lex(b"Den  Haag  |x\n");
        assert!(errors.is_empty());
        assert_eq!(tokens, vec![cell("Den  Haag"), cell("x"), RowEnd]);
    }

    #[test]
    fn quoted_preserves_trailing_whitespace() {
        let (tokens, errors) = lex(b"\"a \" |b\n");
        assert!(errors.is_empty());
        assert_eq!(tokens, vec![cell("a "), cell("b"), RowEnd]);
    }

    #[test]
    fn crlf_and_cr_line_endings() {
        let (tokens, errors) = lex(b"a|b\r\nc\rd\n");
        assert!(errors.is_empty());
        assert_eq!(
            tokens,
            vec![cell("a"), cell("b"), RowEnd, cell("c"), RowEnd, cell("d"), RowEnd]
        );
    }

    #[test]
    fn blank_lines_between_rows() {
        let (tokens, errors) = lex(b"a\n\n  \nb\n");
        assert!(errors.is_empty());
        assert_eq!(tokens, vec![cell("a"), RowEnd, cell("b"), RowEnd]);
    }

    #[test]
    fn unterminated_quote_poisons_row_only() {
        let (tokens, errors) = lex(b"\"abc|def\nx|y\n");
        assert_eq!(errors, vec![LexError::UnterminatedQuote]);
        // The bad row still gets its ROW_END; the next row lexes normally.
        assert_eq!(tokens, vec![RowEnd, cell("x"), cell("y"), RowEnd]);
    }

    #[test]
    fn garbage_after_closing_quote() {
        let (tokens, errors) = lex(b"\"a\"junk|b\nc\n");
        assert_eq!(errors, vec![LexError::GarbageAfterQuote]);
        assert_eq!(tokens, vec![RowEnd, cell("c"), RowEnd]);
    }

    #[test]
    fn last_row_without_newline() {
        let (tokens, errors) = lex(b"a|b");
        assert!(errors.is_empty());
        assert_eq!(tokens, vec![cell("a"), cell("b"), RowEnd]);
    }
}
