//! Quote- and comment-aware views of a SQL string
//!
//! Every view has the same byte length as the input, so offsets found in one
//! view locate the same text in the original.

use std::ops::Range;

/// A SQL string with literal bodies and comments located
#[derive(Debug, Clone)]
pub struct SqlText<'a> {
    raw: &'a str,
    /// Literal bodies blanked, comments kept
    masked: String,
    /// Literal bodies and comments blanked
    code: String,
    statements: Vec<Range<usize>>,
    unterminated: Option<usize>,
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    Code,
    Literal(char),
    LineComment,
    BlockComment,
}

impl<'a> SqlText<'a> {
    /// Split `raw` into literal, comment and code regions
    pub fn new(raw: &'a str) -> Self {
        let mut masked = String::with_capacity(raw.len());
        let mut code = String::with_capacity(raw.len());
        let mut statements = Vec::new();
        let mut statement_start = 0;
        let mut unterminated = None;
        let mut state = State::Code;
        let mut literal_start = 0;

        let chars: Vec<(usize, char)> = raw.char_indices().collect();
        let mut i = 0;
        while i < chars.len() {
            let (offset, c) = chars[i];
            let next = chars.get(i + 1).map(|(_, n)| *n);
            match state {
                State::Code => match c {
                    '\'' | '"' => {
                        state = State::Literal(c);
                        literal_start = offset;
                        keep(&mut masked, &mut code, c);
                    }
                    '-' if next == Some('-') => {
                        state = State::LineComment;
                        masked.push(c);
                        blank(&mut code, c);
                    }
                    '#' => {
                        state = State::LineComment;
                        masked.push(c);
                        blank(&mut code, c);
                    }
                    '/' if next == Some('*') => {
                        state = State::BlockComment;
                        masked.push(c);
                        blank(&mut code, c);
                    }
                    ';' => {
                        statements.push(statement_start..offset);
                        statement_start = offset + 1;
                        keep(&mut masked, &mut code, c);
                    }
                    _ => keep(&mut masked, &mut code, c),
                },
                State::Literal(quote) => {
                    if c == quote && next == Some(quote) {
                        // Doubled quote is an escaped quote
                        blank(&mut masked, c);
                        blank(&mut code, c);
                        blank(&mut masked, quote);
                        blank(&mut code, quote);
                        i += 2;
                        continue;
                    }
                    if c == '\\' && next.is_some() {
                        blank(&mut masked, c);
                        blank(&mut code, c);
                        if let Some(n) = next {
                            blank(&mut masked, n);
                            blank(&mut code, n);
                        }
                        i += 2;
                        continue;
                    }
                    if c == quote {
                        state = State::Code;
                        keep(&mut masked, &mut code, c);
                    } else {
                        blank(&mut masked, c);
                        blank(&mut code, c);
                    }
                }
                State::LineComment => {
                    if c == '\n' {
                        state = State::Code;
                        keep(&mut masked, &mut code, c);
                    } else {
                        masked.push(c);
                        blank(&mut code, c);
                    }
                }
                State::BlockComment => {
                    masked.push(c);
                    blank(&mut code, c);
                    if c == '*' && next == Some('/') {
                        masked.push('/');
                        blank(&mut code, '/');
                        state = State::Code;
                        i += 2;
                        continue;
                    }
                }
            }
            i += 1;
        }
        if let State::Literal(_) = state {
            unterminated = Some(literal_start);
        }
        if statement_start < raw.len() {
            statements.push(statement_start..raw.len());
        }

        SqlText {
            raw,
            masked,
            code,
            statements,
            unterminated,
        }
    }

    /// The input as given
    pub fn raw(&self) -> &str {
        self.raw
    }

    /// Literal bodies blanked, comments kept
    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// Literal bodies and comments blanked
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Byte ranges of the `;`-separated statements
    pub fn statements(&self) -> &[Range<usize>] {
        &self.statements
    }

    /// Offset of the opening quote of a literal that never closes
    pub fn unterminated(&self) -> Option<usize> {
        self.unterminated
    }

    /// Index of the statement containing `offset`
    pub fn statement_at(&self, offset: usize) -> usize {
        self.statements
            .iter()
            .position(|r| offset < r.end)
            .unwrap_or_else(|| self.statements.len().saturating_sub(1))
    }

    /// Returns true if `offset` lies in code, outside literals and comments
    pub fn is_code(&self, offset: usize) -> bool {
        match (self.raw.as_bytes().get(offset), self.code.as_bytes().get(offset)) {
            (Some(r), Some(c)) => r == c && !r.is_ascii_whitespace(),
            _ => false,
        }
    }
}

fn keep(masked: &mut String, code: &mut String, c: char) {
    masked.push(c);
    code.push(c);
}

/// Push spaces covering the UTF-8 width of `c`
fn blank(out: &mut String, c: char) {
    for _ in 0..c.len_utf8() {
        out.push(' ');
    }
}
