//! Source tokenizer for Python and JavaScript
//!
//! Produces just enough lexical structure for call resolution: identifiers,
//! string literals (with their text and whether they interpolate), operators
//! and brackets. Malformed input never aborts the scan; problems are recorded
//! as [`SyntaxIssue`]s and the scanner keeps going.

use super::Language;
use crate::verdict::Location;

/// Token category
#[derive(Debug, Clone, PartialEq)]
pub enum SrcKind {
    /// Identifier or keyword
    Ident(String),
    /// String literal with its unquoted body
    Str {
        /// Literal body, escapes left as written
        value: String,
        /// f-string with a `{` or template literal with `${`
        interpolated: bool,
    },
    /// Numeric literal
    Number,
    /// Operator such as `=`, `+`, `%`, `=>`, `:`
    Op(String),
    /// `(`, `[` or `{`
    Open(char),
    /// `)`, `]` or `}`
    Close(char),
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `;`
    Semicolon,
    /// Logical line break
    Newline,
}

/// A token and where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct SrcToken {
    /// Category
    pub kind: SrcKind,
    /// Start position
    pub location: Location,
}

impl SrcToken {
    /// Identifier text, if this is an identifier
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            SrcKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true for the operator `op`
    pub fn is_op(&self, op: &str) -> bool {
        matches!(&self.kind, SrcKind::Op(o) if o == op)
    }
}

/// A syntax problem found while scanning or parsing
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxIssue {
    /// Where the problem was detected
    pub location: Location,
    /// Description
    pub message: String,
}

/// Operators recognized as single tokens, longest first
const OPERATORS: &[&str] = &[
    "===", "!==", "**=", "...", ">>>", "==", "!=", "<=", ">=", "=>", "**", "//", "+=", "-=", "*=",
    "/=", "%=", "&&", "||", "??", "?.", "->", ":=", "<<", ">>", "=", "+", "-", "*", "/", "%", "<",
    ">", "!", "&", "|", "^", "~", "?", ":", "@",
];

/// Python string prefixes; `f` marks an f-string
const PY_STRING_PREFIXES: &[&str] = &["f", "r", "b", "u", "rb", "br", "fr", "rf"];

/// Tokenizer over one source file
pub struct SourceScanner {
    language: Language,
    source: Vec<char>,
    /// Byte offset of each char, plus the total length
    offsets: Vec<usize>,
    tokens: Vec<SrcToken>,
    issues: Vec<SyntaxIssue>,
    brackets: Vec<(char, Location)>,
    current: usize,
    line: usize,
    column: usize,
}

impl SourceScanner {
    /// Creates a scanner
    pub fn new(source: &str, language: Language) -> Self {
        let mut offsets: Vec<usize> = source.char_indices().map(|(i, _)| i).collect();
        offsets.push(source.len());
        SourceScanner {
            language,
            source: source.chars().collect(),
            offsets,
            tokens: Vec::new(),
            issues: Vec::new(),
            brackets: Vec::new(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scan the whole source
    pub fn scan(mut self) -> (Vec<SrcToken>, Vec<SyntaxIssue>) {
        while !self.is_at_end() {
            self.scan_token();
        }
        for (open, location) in std::mem::take(&mut self.brackets) {
            self.issues.push(SyntaxIssue {
                location,
                message: format!("unclosed '{}'", open),
            });
        }
        self.issues.sort_by_key(|i| i.location.offset);
        (self.tokens, self.issues)
    }

    fn scan_token(&mut self) {
        let start = self.location();
        let c = self.advance();
        match c {
            ' ' | '\t' | '\r' => {}
            '\n' => {
                self.newline();
                // Python continues lines implicitly inside brackets
                if self.language == Language::JavaScript || self.brackets.is_empty() {
                    self.push(SrcKind::Newline, start);
                }
            }
            '\\' if self.peek() == '\n' => {
                self.advance();
                self.newline();
            }
            '#' if self.language == Language::Python => self.skip_line(),
            '/' if self.language == Language::JavaScript && self.peek() == '/' => self.skip_line(),
            '/' if self.language == Language::JavaScript && self.peek() == '*' => {
                self.advance();
                self.skip_block_comment(start);
            }
            '(' | '[' | '{' => {
                self.brackets.push((c, start));
                self.push(SrcKind::Open(c), start);
            }
            ')' | ']' | '}' => {
                self.close_bracket(c, start);
                self.push(SrcKind::Close(c), start);
            }
            ',' => self.push(SrcKind::Comma, start),
            ';' => self.push(SrcKind::Semicolon, start),
            '.' if !self.peek().is_ascii_digit() && !(self.peek() == '.' && self.peek_next() == '.') => {
                self.push(SrcKind::Dot, start)
            }
            '\'' | '"' => self.scan_string(c, false, start),
            '`' if self.language == Language::JavaScript => self.scan_template(start),
            c if c.is_ascii_digit() || (c == '.' && self.peek().is_ascii_digit()) => {
                self.scan_number(start)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_identifier(c, start),
            _ => self.scan_operator(c, start),
        }
    }

    fn scan_identifier(&mut self, first: char, start: Location) {
        let mut name = first.to_string();
        while self.peek().is_alphanumeric() || self.peek() == '_' || self.peek() == '$' {
            name.push(self.advance());
        }
        if self.language == Language::Python
            && matches!(self.peek(), '\'' | '"')
            && PY_STRING_PREFIXES.contains(&name.to_ascii_lowercase().as_str())
        {
            let quote = self.advance();
            let formatted = name.to_ascii_lowercase().contains('f');
            self.scan_string(quote, formatted, start);
            return;
        }
        self.push(SrcKind::Ident(name), start);
    }

    fn scan_string(&mut self, quote: char, formatted: bool, start: Location) {
        let triple = self.language == Language::Python && self.peek() == quote && self.peek_next() == quote;
        if triple {
            self.advance();
            self.advance();
        }
        let mut value = String::new();
        loop {
            if self.is_at_end() {
                self.issues.push(SyntaxIssue {
                    location: start,
                    message: "unterminated string literal".to_string(),
                });
                break;
            }
            let c = self.advance();
            if c == '\\' && !self.is_at_end() {
                value.push(c);
                let escaped = self.advance();
                if escaped == '\n' {
                    self.newline();
                }
                value.push(escaped);
                continue;
            }
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == quote && self.peek_next() == quote {
                    self.advance();
                    self.advance();
                    break;
                }
            }
            if c == '\n' {
                self.newline();
                if !triple {
                    self.issues.push(SyntaxIssue {
                        location: start,
                        message: "unterminated string literal".to_string(),
                    });
                    break;
                }
            }
            value.push(c);
        }
        let interpolated = formatted && value.replace("{{", "").contains('{');
        self.push(SrcKind::Str { value, interpolated }, start);
    }

    fn scan_template(&mut self, start: Location) {
        let mut value = String::new();
        loop {
            if self.is_at_end() {
                self.issues.push(SyntaxIssue {
                    location: start,
                    message: "unterminated template literal".to_string(),
                });
                break;
            }
            let c = self.advance();
            match c {
                '\\' if !self.is_at_end() => {
                    value.push(c);
                    value.push(self.advance());
                }
                '`' => break,
                '\n' => {
                    self.newline();
                    value.push(c);
                }
                _ => value.push(c),
            }
        }
        let interpolated = value.contains("${");
        self.push(SrcKind::Str { value, interpolated }, start);
    }

    fn scan_number(&mut self, start: Location) {
        while self.peek().is_alphanumeric() || self.peek() == '.' || self.peek() == '_' {
            self.advance();
        }
        self.push(SrcKind::Number, start);
    }

    fn scan_operator(&mut self, first: char, start: Location) {
        let candidate: String = std::iter::once(first)
            .chain(self.source[self.current..].iter().take(2).copied())
            .collect();
        match OPERATORS.iter().find(|op| candidate.starts_with(**op)) {
            Some(op) => {
                for _ in 1..op.chars().count() {
                    self.advance();
                }
                self.push(SrcKind::Op((*op).to_string()), start);
            }
            None => self.issues.push(SyntaxIssue {
                location: start,
                message: format!("unexpected character '{}'", first),
            }),
        }
    }

    fn close_bracket(&mut self, close: char, location: Location) {
        let expected = match close {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.last() {
            Some((open, _)) if *open == expected => {
                self.brackets.pop();
            }
            Some((open, _)) => {
                let open = *open;
                self.brackets.pop();
                self.issues.push(SyntaxIssue {
                    location,
                    message: format!("'{}' does not close '{}'", close, open),
                });
            }
            None => self.issues.push(SyntaxIssue {
                location,
                message: format!("unmatched '{}'", close),
            }),
        }
    }

    fn skip_line(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, start: Location) {
        loop {
            if self.is_at_end() {
                self.issues.push(SyntaxIssue {
                    location: start,
                    message: "unterminated block comment".to_string(),
                });
                return;
            }
            let c = self.advance();
            if c == '\n' {
                self.newline();
            } else if c == '*' && self.peek() == '/' {
                self.advance();
                return;
            }
        }
    }

    fn push(&mut self, kind: SrcKind, location: Location) {
        self.tokens.push(SrcToken { kind, location });
    }

    fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
            offset: self.offsets[self.current],
        }
    }

    fn newline(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c != '\n' {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str, language: Language) -> Vec<SrcKind> {
        let (tokens, issues) = SourceScanner::new(source, language).scan();
        assert!(issues.is_empty(), "{:?}", issues);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_python_strings() {
        let k = kinds("os.system(f\"rm {path}\") # gone", Language::Python);
        assert_eq!(k[0], SrcKind::Ident("os".to_string()));
        assert_eq!(k[1], SrcKind::Dot);
        assert_eq!(
            k[4],
            SrcKind::Str {
                value: "rm {path}".to_string(),
                interpolated: true
            }
        );
        assert_eq!(k.len(), 6);

        let k = kinds("x = f'{{literal}}'", Language::Python);
        assert!(matches!(&k[2], SrcKind::Str { interpolated: false, .. }));
    }

    #[test]
    fn test_python_implicit_continuation() {
        let k = kinds("run(\n  a,\n  b)\nnext", Language::Python);
        let newlines = k.iter().filter(|t| **t == SrcKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_javascript_template_and_comments() {
        let k = kinds("exec(`ls ${dir}`) // list\n/* x */ y", Language::JavaScript);
        assert!(matches!(&k[2], SrcKind::Str { interpolated: true, .. }));
        assert_eq!(k.last(), Some(&SrcKind::Ident("y".to_string())));
    }

    #[test]
    fn test_operators() {
        let k = kinds("a === b => c", Language::JavaScript);
        assert_eq!(k[1], SrcKind::Op("===".to_string()));
        assert_eq!(k[3], SrcKind::Op("=>".to_string()));
    }

    #[test]
    fn test_issues_are_recorded() {
        let (_, issues) = SourceScanner::new("print('open", Language::Python).scan();
        assert_eq!(issues.len(), 2);
        let (_, issues) = SourceScanner::new("f(])", Language::JavaScript).scan();
        assert!(!issues.is_empty());
        assert_eq!(issues[0].location.column, 3);
    }
}
