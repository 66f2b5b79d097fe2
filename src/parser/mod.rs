//! Expression Normalizer
//!
//! Parses the restricted claim language (arithmetic, powers, a closed set of
//! named functions, calculus operators) into an [`Expr`] tree.

mod ast;
mod expr_parser;

pub use ast::{format_rational, rational_to_f64, BinaryOp, Expr, Function, Number, UnaryOp};
pub use expr_parser::{ExprParser, SymbolTable, MAX_NESTING};

use crate::error::Result;
use crate::lexer::ExprScanner;

/// Parse one expression
pub fn parse(text: &str, symbols: &SymbolTable) -> Result<Expr> {
    let tokens = ExprScanner::new(text).scan_tokens()?;
    ExprParser::new(tokens, symbols).parse()
}

/// Parse a claim, dropping a leading `Label =`
pub fn parse_claim(text: &str, symbols: &SymbolTable) -> Result<Expr> {
    let tokens = ExprScanner::new(text).scan_tokens()?;
    let mut parser = ExprParser::new(tokens, symbols);
    parser.skip_label();
    parser.parse()
}

/// Parse `lhs = rhs` (a bare expression means `expr = 0`)
pub fn parse_equation(text: &str, symbols: &SymbolTable) -> Result<(Expr, Expr)> {
    let tokens = ExprScanner::new(text).scan_tokens()?;
    ExprParser::new(tokens, symbols).parse_equation()
}

/// Parse a comma-separated list of expressions
pub fn parse_list(text: &str, symbols: &SymbolTable) -> Result<Vec<Expr>> {
    let tokens = ExprScanner::new(text).scan_tokens()?;
    ExprParser::new(tokens, symbols).parse_list()
}
