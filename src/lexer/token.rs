use serde::{Deserialize, Serialize};

/// A single token from the source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// All token types of the expression language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer or finite decimal literal, kept as text so it can be read exactly
    Decimal(String),
    /// Literal in scientific notation, read as an approximate value
    Scientific(f64),

    // Identifiers
    /// Symbol, constant or function name
    Identifier(String),

    // Operators
    /// Plus operator (+)
    Plus,
    /// Minus operator (-)
    Minus,
    /// Star operator (*)
    Star,
    /// Slash operator (/)
    Slash,
    /// Power operator (^ or **)
    Caret,
    /// Equals sign (=)
    Equals,

    // Delimiters
    /// Left parenthesis (
    LeftParen,
    /// Right parenthesis )
    RightParen,
    /// Comma delimiter
    Comma,

    // Special
    /// End of input marker
    Eof,
}

impl TokenKind {
    /// Check if token can end an operand (used to detect implicit multiplication)
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Decimal(_)
                | TokenKind::Scientific(_)
                | TokenKind::Identifier(_)
                | TokenKind::RightParen
        )
    }

    /// Check if token can start an operand
    pub fn starts_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Decimal(_)
                | TokenKind::Scientific(_)
                | TokenKind::Identifier(_)
                | TokenKind::LeftParen
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TokenKind::Decimal(text) => write!(f, "{}", text),
            TokenKind::Scientific(value) => write!(f, "{:e}", value),
            TokenKind::Identifier(id) => write!(f, "{}", id),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Equals => write!(f, "="),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_boundaries() {
        assert!(TokenKind::Decimal("2".to_string()).ends_operand());
        assert!(TokenKind::RightParen.ends_operand());
        assert!(!TokenKind::Plus.ends_operand());
        assert!(TokenKind::Identifier("x".to_string()).starts_operand());
        assert!(!TokenKind::Comma.starts_operand());
    }
}
