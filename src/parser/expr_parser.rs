use super::ast::{BinaryOp, Expr, Function, Number};
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use std::collections::BTreeSet;

/// Deepest nesting the parser will follow before giving up
pub const MAX_NESTING: usize = 200;

/// Symbols the parser accepts
///
/// Functions are a closed set; free symbols are unrestricted unless an
/// explicit allow-list is given.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    allowed: Option<BTreeSet<String>>,
}

impl SymbolTable {
    /// Accept any identifier as a free symbol
    pub fn permissive() -> Self {
        SymbolTable { allowed: None }
    }

    /// Accept only the listed free symbols; an empty list is permissive
    pub fn allow<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = symbols.into_iter().map(Into::into).collect();
        if set.is_empty() {
            SymbolTable { allowed: None }
        } else {
            SymbolTable { allowed: Some(set) }
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        match &self.allowed {
            Some(set) if !set.contains(name) => Err(Error::UnknownSymbol {
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Recursive-descent parser for infix expressions
pub struct ExprParser<'a> {
    tokens: Vec<Token>,
    current: usize,
    symbols: &'a SymbolTable,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    /// Creates a parser over scanned tokens
    pub fn new(tokens: Vec<Token>, symbols: &'a SymbolTable) -> Self {
        ExprParser {
            tokens,
            current: 0,
            symbols,
            depth: 0,
        }
    }

    /// Parse the whole token stream as one expression
    pub fn parse(&mut self) -> Result<Expr> {
        if self.is_at_end() {
            return Err(Error::EmptyInput);
        }
        let expr = self.parse_expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parse `lhs = rhs`; a bare expression is read as `expr = 0`
    pub fn parse_equation(&mut self) -> Result<(Expr, Expr)> {
        if self.is_at_end() {
            return Err(Error::EmptyInput);
        }
        let lhs = self.parse_expression()?;
        let rhs = if self.check(&TokenKind::Equals) {
            self.advance();
            self.parse_expression()?
        } else {
            Expr::int(0)
        };
        self.expect_end()?;
        Ok((lhs, rhs))
    }

    /// Parse a comma-separated list of expressions
    pub fn parse_list(&mut self) -> Result<Vec<Expr>> {
        if self.is_at_end() {
            return Err(Error::EmptyInput);
        }
        let mut items = vec![self.parse_expression()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            items.push(self.parse_expression()?);
        }
        self.expect_end()?;
        Ok(items)
    }

    /// Skip a leading `Label =` as in `A = P*(1+r)^n`
    pub fn skip_label(&mut self) {
        let labelled = matches!(self.peek().kind, TokenKind::Identifier(_))
            && matches!(
                self.tokens.get(self.current + 1).map(|t| &t.kind),
                Some(TokenKind::Equals)
            );
        if labelled {
            self.current += 2;
        }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::budget("expression nesting", MAX_NESTING));
        }
        let result = self.parse_additive();
        self.depth -= 1;
        result
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = Expr::binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let kind = self.peek().kind.clone();
            let op = match kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                // Juxtaposition: 2x, 3(x + 1), (a)(b)
                ref kind if kind.starts_operand() => {
                    let right = self.parse_power()?;
                    expr = Expr::binary(BinaryOp::Mul, expr, right);
                    continue;
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = Expr::binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.nested(|p| p.parse_unary())?;
                Ok(Expr::neg(operand))
            }
            TokenKind::Plus => {
                self.advance();
                self.nested(|p| p.parse_unary())
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        // e^u is read as exp(u)
        let euler_base = matches!(&self.peek().kind, TokenKind::Identifier(name) if name == "e")
            && matches!(
                self.tokens.get(self.current + 1).map(|t| &t.kind),
                Some(TokenKind::Caret)
            );
        if euler_base {
            self.current += 2;
            let exponent = self.nested(|p| p.parse_unary())?;
            return Ok(Expr::call(Function::Exp, vec![exponent]));
        }

        let base = self.parse_primary()?;
        if self.check(&TokenKind::Caret) {
            self.advance();
            // Right associative, and the exponent may carry its own sign
            let exponent = self.nested(|p| p.parse_unary())?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Decimal(ref text) => {
                self.advance();
                let number = Number::from_decimal(text).ok_or_else(|| Error::Syntax {
                    line: token.line,
                    column: token.column,
                    message: format!("Invalid number: {}", text),
                })?;
                Ok(Expr::Number(number))
            }
            TokenKind::Scientific(value) => {
                self.advance();
                Ok(Expr::Number(Number::Approx(value)))
            }
            TokenKind::Identifier(ref name) => {
                self.advance();
                self.parse_identifier(name, &token)
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "')' to close '('")?;
                Ok(expr)
            }
            TokenKind::Eof => Err(self.syntax_error(&token, "Unexpected end of input".to_string())),
            _ => Err(self.syntax_error(
                &token,
                format!("Unexpected token '{}' in expression", token.kind),
            )),
        }
    }

    fn parse_identifier(&mut self, name: &str, token: &Token) -> Result<Expr> {
        if let Some(func) = Function::from_name(name) {
            if !self.check(&TokenKind::LeftParen) {
                return Err(self.syntax_error(
                    token,
                    format!("Function '{}' requires arguments", name),
                ));
            }
            return self.parse_call(func, token);
        }

        match name {
            "pi" | "\u{03c0}" => return Ok(Expr::Number(Number::Approx(std::f64::consts::PI))),
            "e" => return Ok(Expr::Number(Number::Approx(std::f64::consts::E))),
            _ => {}
        }

        // A multi-letter name applied to arguments is an unknown function;
        // a single letter before '(' is implicit multiplication.
        if self.check(&TokenKind::LeftParen) && name.chars().count() > 1 {
            return Err(Error::UnknownSymbol {
                name: name.to_string(),
            });
        }

        self.symbols.check(name)?;
        Ok(Expr::Symbol(name.to_string()))
    }

    fn parse_call(&mut self, func: Function, token: &Token) -> Result<Expr> {
        self.consume(TokenKind::LeftParen, "'(' after function name")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            args.push(self.parse_expression()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        self.consume(TokenKind::RightParen, "')' to close argument list")?;

        // diff(f) and integrate(f) default to the single free symbol of f
        if func.is_calculus() && args.len() == 1 {
            let symbols = args[0].symbols();
            if symbols.len() == 1 {
                if let Some(var) = symbols.into_iter().next() {
                    args.push(Expr::Symbol(var));
                }
            }
        }

        if args.len() != func.arity() {
            return Err(self.syntax_error(
                token,
                format!(
                    "Function '{}' expects {} argument(s), got {}",
                    func.name(),
                    func.arity(),
                    args.len()
                ),
            ));
        }
        if func.is_calculus() && !matches!(args[1], Expr::Symbol(_)) {
            return Err(self.syntax_error(
                token,
                format!("Second argument of '{}' must be a symbol", func.name()),
            ));
        }
        Ok(Expr::call(func, args))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::budget("expression nesting", MAX_NESTING));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect_end(&self) -> Result<()> {
        if self.is_at_end() {
            return Ok(());
        }
        let token = self.peek();
        let message = match token.kind {
            TokenKind::RightParen => "Unbalanced ')'".to_string(),
            _ => format!("Unexpected trailing token '{}'", token.kind),
        };
        Err(self.syntax_error(token, message))
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        // The scanner always terminates the stream with Eof
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.syntax_error(
                &token,
                format!("Expected {}, found {}", expected, token.kind),
            ))
        }
    }

    fn syntax_error(&self, token: &Token, message: String) -> Error {
        Error::Syntax {
            line: token.line,
            column: token.column,
            message,
        }
    }
}
