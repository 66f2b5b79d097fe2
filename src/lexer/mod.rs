//! Lexical analysis for the expression language
//!
//! Converts claim text such as `3*x^2 + 2x - 1` into a stream of tokens.

mod expr_scanner;
mod token;

pub use expr_scanner::ExprScanner;
pub use token::{Token, TokenKind};
