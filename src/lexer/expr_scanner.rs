use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

/// Scanner for the infix expression language
pub struct ExprScanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Column where the current token started
    start_column: usize,
}

impl ExprScanner {
    /// Creates a new scanner over `source`
    pub fn new(source: &str) -> Self {
        ExprScanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens and returns them, terminated by `Eof`
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens
            .push(Token::new(TokenKind::Eof, String::new(), self.line, self.column));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            '(' | '[' => self.add_token(TokenKind::LeftParen),
            ')' | ']' => self.add_token(TokenKind::RightParen),
            ',' => self.add_token(TokenKind::Comma),

            '+' => self.add_token(TokenKind::Plus),
            '-' | '\u{2212}' => self.add_token(TokenKind::Minus),
            '*' | '\u{00d7}' | '\u{22c5}' => {
                if self.match_char('*') {
                    self.add_token(TokenKind::Caret);
                } else {
                    self.add_token(TokenKind::Star);
                }
            }
            '/' | '\u{00f7}' => self.add_token(TokenKind::Slash),
            '^' => self.add_token(TokenKind::Caret),
            '=' => {
                // Accept `==` as a plain equals sign
                self.match_char('=');
                self.add_token(TokenKind::Equals);
            }

            // Superscript powers: x² is x^2
            '\u{00b2}' => self.add_superscript("2"),
            '\u{00b3}' => self.add_superscript("3"),

            c if c.is_ascii_digit() => self.scan_number()?,
            '.' if self.peek().is_ascii_digit() => self.scan_number()?,

            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            _ => {
                return Err(Error::Syntax {
                    line: self.line,
                    column: self.start_column,
                    message: format!("Unexpected character '{}'", c),
                });
            }
        }

        Ok(())
    }

    fn scan_number(&mut self) -> Result<()> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume .
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        } else if self.peek() == '.' && !self.peek_next().is_alphabetic() {
            // Trailing dot, as in `5.`
            self.advance();
        }

        // Exponent part makes the literal approximate: 1.5e-3
        let exponent_follows = matches!(self.peek(), 'e' | 'E')
            && (self.peek_next().is_ascii_digit()
                || (matches!(self.peek_next(), '+' | '-') && self.peek_at(2).is_ascii_digit()));

        if exponent_follows {
            self.advance(); // e
            if matches!(self.peek(), '+' | '-') {
                self.advance();
            }
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            let text = self.lexeme();
            let value: f64 = text.parse().map_err(|_| Error::Syntax {
                line: self.line,
                column: self.start_column,
                message: format!("Invalid number: {}", text),
            })?;
            self.add_token(TokenKind::Scientific(value));
        } else {
            let text = self.lexeme();
            self.add_token(TokenKind::Decimal(text.trim_end_matches('.').to_string()));
        }

        Ok(())
    }

    fn scan_identifier(&mut self) {
        // Superscript digits end the name: `x²` is `x` then a power
        while self.peek().is_alphabetic() || self.peek().is_ascii_digit() || self.peek() == '_' {
            self.advance();
        }
        let text = self.lexeme();
        self.add_token(TokenKind::Identifier(text));
    }

    fn add_superscript(&mut self, digits: &str) {
        self.add_token(TokenKind::Caret);
        self.tokens.push(Token::new(
            TokenKind::Decimal(digits.to_string()),
            digits.to_string(),
            self.line,
            self.start_column,
        ));
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        self.column += 1;
        true
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, ahead: usize) -> char {
        self.source
            .get(self.current + ahead)
            .copied()
            .unwrap_or('\0')
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn add_token(&mut self, kind: TokenKind) {
        let text = self.lexeme();
        self.tokens
            .push(Token::new(kind, text, self.line, self.start_column));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        ExprScanner::new(source)
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_expression() {
        let tokens = kinds("3*x^2 + 1");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Decimal("3".to_string()),
                TokenKind::Star,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Caret,
                TokenKind::Decimal("2".to_string()),
                TokenKind::Plus,
                TokenKind::Decimal("1".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_double_star_is_power() {
        let tokens = kinds("x**2");
        assert_eq!(tokens[1], TokenKind::Caret);
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_decimal_and_scientific() {
        let tokens = kinds("0.075 1.5e-3 .5");
        assert_eq!(tokens[0], TokenKind::Decimal("0.075".to_string()));
        assert_eq!(tokens[1], TokenKind::Scientific(1.5e-3));
        assert_eq!(tokens[2], TokenKind::Decimal(".5".to_string()));
    }

    #[test]
    fn test_identifier_after_number_is_not_exponent() {
        // `2e` is 2 followed by the constant e, not a malformed exponent
        let tokens = kinds("2e");
        assert_eq!(tokens[0], TokenKind::Decimal("2".to_string()));
        assert_eq!(tokens[1], TokenKind::Identifier("e".to_string()));
    }

    #[test]
    fn test_positions() {
        let tokens = ExprScanner::new("a +\n  b").scan_tokens().unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 3));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
    }

    #[test]
    fn test_unexpected_character() {
        let err = ExprScanner::new("x $ 2").scan_tokens().unwrap_err();
        match err {
            Error::Syntax { column, .. } => assert_eq!(column, 3),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_superscript() {
        let tokens = kinds("x²");
        assert_eq!(tokens[0], TokenKind::Identifier("x".to_string()));
        assert_eq!(tokens[1], TokenKind::Caret);
        assert_eq!(tokens[2], TokenKind::Decimal("2".to_string()));

        let tokens = kinds("3x³ + y2");
        assert_eq!(tokens[1], TokenKind::Identifier("x".to_string()));
        assert_eq!(tokens[2], TokenKind::Caret);
        assert_eq!(tokens[3], TokenKind::Decimal("3".to_string()));
        assert_eq!(tokens[5], TokenKind::Identifier("y2".to_string()));
    }
}
