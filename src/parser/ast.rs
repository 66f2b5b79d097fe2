use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::collections::BTreeSet;
use std::fmt;

/// Numeric literal with its provenance
///
/// Integers and finite decimals are read exactly; scientific notation and the
/// irrational constants are approximate.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    /// Exact rational value
    Exact(BigRational),
    /// Approximate floating value
    Approx(f64),
}

impl Number {
    /// Exact integer
    pub fn int(value: i64) -> Self {
        Number::Exact(BigRational::from_integer(BigInt::from(value)))
    }

    /// Read a decimal literal such as `12`, `0.075` or `.5` exactly
    pub fn from_decimal(text: &str) -> Option<Self> {
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let digits = format!("{}{}", int_part, frac_part);
        let numer = BigInt::parse_bytes(digits.as_bytes(), 10)?;
        let denom = num_traits::pow(BigInt::from(10), frac_part.len());
        Some(Number::Exact(BigRational::new(numer, denom)))
    }

    /// Returns true for exact values
    pub fn is_exact(&self) -> bool {
        matches!(self, Number::Exact(_))
    }

    /// Floating approximation
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Exact(r) => rational_to_f64(r),
            Number::Approx(v) => *v,
        }
    }

    /// Returns true if the value is exactly zero
    pub fn is_zero(&self) -> bool {
        match self {
            Number::Exact(r) => r.is_zero(),
            Number::Approx(v) => *v == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Exact(r) => write!(f, "{}", format_rational(r)),
            Number::Approx(v) => write!(f, "{}", v),
        }
    }
}

/// Convert a rational to `f64`, keeping precision for large operands
pub fn rational_to_f64(r: &BigRational) -> f64 {
    if let Some(v) = r.to_f64() {
        if v.is_finite() {
            return v;
        }
    }
    let numer = r.numer().to_f64().unwrap_or(f64::NAN);
    let denom = r.denom().to_f64().unwrap_or(f64::NAN);
    numer / denom
}

/// Render a rational as an integer, a terminating decimal, or `p/q`
pub fn format_rational(r: &BigRational) -> String {
    if r.is_integer() {
        return r.numer().to_string();
    }
    // Terminating decimals read better in explanations: 0.075 rather than 3/40
    let mut denom = r.denom().clone();
    let two = BigInt::from(2);
    let five = BigInt::from(5);
    let mut places = 0usize;
    let mut twos = 0usize;
    let mut fives = 0usize;
    while (&denom % &two).is_zero() {
        denom /= &two;
        twos += 1;
    }
    while (&denom % &five).is_zero() {
        denom /= &five;
        fives += 1;
    }
    if denom.is_one() {
        places = twos.max(fives);
    }
    if places == 0 || places > 12 {
        return format!("{}/{}", r.numer(), r.denom());
    }
    let scale = num_traits::pow(BigInt::from(10), places);
    let scaled = (r * BigRational::from_integer(scale)).to_integer();
    let negative = scaled.is_negative();
    let digits = scaled.abs().to_string();
    let padded = format!("{:0>width$}", digits, width = places + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - places);
    format!("{}{}.{}", if negative { "-" } else { "" }, int_part, frac_part)
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition operator (+)
    Add,
    /// Subtraction operator (-)
    Sub,
    /// Multiplication operator (*)
    Mul,
    /// Division operator (/)
    Div,
    /// Power operator (^)
    Pow,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Negation operator (-)
    Neg,
}

/// Closed set of named functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Function {
    /// Sine
    Sin,
    /// Cosine
    Cos,
    /// Tangent
    Tan,
    /// Inverse sine
    Asin,
    /// Inverse cosine
    Acos,
    /// Inverse tangent
    Atan,
    /// Hyperbolic sine
    Sinh,
    /// Hyperbolic cosine
    Cosh,
    /// Hyperbolic tangent
    Tanh,
    /// Natural exponential
    Exp,
    /// Natural logarithm (`ln` and `log`)
    Ln,
    /// Base-10 logarithm
    Log10,
    /// Square root
    Sqrt,
    /// Absolute value
    Abs,
    /// Derivative operator: `diff(f, x)`
    Diff,
    /// Antiderivative operator: `integrate(f, x)`
    Integrate,
}

impl Function {
    /// Look up a function by any of its accepted spellings
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" | "arcsin" => Function::Asin,
            "acos" | "arccos" => Function::Acos,
            "atan" | "arctan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "log10" => Function::Log10,
            "sqrt" => Function::Sqrt,
            "abs" => Function::Abs,
            "diff" | "derivative" => Function::Diff,
            "integrate" | "integral" => Function::Integrate,
            _ => return None,
        };
        Some(f)
    }

    /// Canonical spelling
    pub fn name(&self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Diff => "diff",
            Function::Integrate => "integrate",
        }
    }

    /// Number of arguments the function takes
    pub fn arity(&self) -> usize {
        match self {
            Function::Diff | Function::Integrate => 2,
            _ => 1,
        }
    }

    /// Returns true for the calculus operators
    pub fn is_calculus(&self) -> bool {
        matches!(self, Function::Diff | Function::Integrate)
    }
}

/// Expression tree node
///
/// Built once per parse and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(Number),
    /// Free symbol
    Symbol(String),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Named function application
    Call {
        /// Function
        func: Function,
        /// Arguments
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Exact integer literal
    pub fn int(value: i64) -> Self {
        Expr::Number(Number::int(value))
    }

    /// Symbol node
    pub fn symbol(name: &str) -> Self {
        Expr::Symbol(name.to_string())
    }

    /// Binary node
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Negation node
    pub fn neg(operand: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        }
    }

    /// Function application node
    pub fn call(func: Function, args: Vec<Expr>) -> Self {
        Expr::Call { func, args }
    }

    /// Free symbols, sorted
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Binary { left, right, .. } => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            Expr::Unary { operand, .. } => operand.collect_symbols(out),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_symbols(out);
                }
            }
        }
    }

    /// Returns true if any node is a `diff` or `integrate` call
    pub fn has_calculus(&self) -> bool {
        match self {
            Expr::Number(_) | Expr::Symbol(_) => false,
            Expr::Binary { left, right, .. } => left.has_calculus() || right.has_calculus(),
            Expr::Unary { operand, .. } => operand.has_calculus(),
            Expr::Call { func, args } => {
                func.is_calculus() || args.iter().any(|a| a.has_calculus())
            }
        }
    }

    /// Returns true if every literal in the tree is exact
    pub fn is_exact(&self) -> bool {
        match self {
            Expr::Number(n) => n.is_exact(),
            Expr::Symbol(_) => true,
            Expr::Binary { left, right, .. } => left.is_exact() && right.is_exact(),
            Expr::Unary { operand, .. } => operand.is_exact(),
            Expr::Call { args, .. } => args.iter().all(|a| a.is_exact()),
        }
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        match self {
            Expr::Number(_) | Expr::Symbol(_) => 1,
            Expr::Binary { left, right, .. } => 1 + left.size() + right.size(),
            Expr::Unary { operand, .. } => 1 + operand.size(),
            Expr::Call { args, .. } => 1 + args.iter().map(|a| a.size()).sum::<usize>(),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 3,
            Expr::Number(Number::Exact(r)) if !r.is_integer() => 2,
            Expr::Number(n) if n.to_f64() < 0.0 => 3,
            _ => 5,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                match op {
                    BinaryOp::Pow => {
                        // Right associative: the base needs strictly tighter binding
                        left.fmt_operand(f, prec + 1)?;
                        write!(f, "{}", op)?;
                        right.fmt_operand(f, prec)
                    }
                    BinaryOp::Add | BinaryOp::Mul => {
                        left.fmt_operand(f, prec)?;
                        write!(f, " {} ", op)?;
                        right.fmt_operand(f, prec)
                    }
                    BinaryOp::Sub | BinaryOp::Div => {
                        left.fmt_operand(f, prec)?;
                        write!(f, " {} ", op)?;
                        right.fmt_operand(f, prec + 1)
                    }
                }
            }
            Expr::Unary { op, operand } => {
                write!(f, "{}", op)?;
                operand.fmt_operand(f, 4)
            }
            Expr::Call { func, args } => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Pow => write!(f, "^"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Pow.precedence() > BinaryOp::Mul.precedence());
    }

    #[test]
    fn test_decimal_is_exact() {
        let n = Number::from_decimal("0.075").unwrap();
        assert_eq!(
            n,
            Number::Exact(BigRational::new(BigInt::from(3), BigInt::from(40)))
        );
        assert!(Number::from_decimal(".").is_none());
        assert_eq!(Number::from_decimal(".5").unwrap().to_f64(), 0.5);
    }

    #[test]
    fn test_format_rational() {
        let r = BigRational::new(BigInt::from(3), BigInt::from(40));
        assert_eq!(format_rational(&r), "0.075");
        let r = BigRational::new(BigInt::from(-1), BigInt::from(3));
        assert_eq!(format_rational(&r), "-1/3");
        let r = BigRational::new(BigInt::from(-5), BigInt::from(2));
        assert_eq!(format_rational(&r), "-2.5");
    }

    #[test]
    fn test_display_parenthesizes() {
        let e = Expr::binary(
            BinaryOp::Mul,
            Expr::binary(BinaryOp::Add, Expr::symbol("x"), Expr::int(1)),
            Expr::binary(BinaryOp::Pow, Expr::symbol("x"), Expr::int(2)),
        );
        assert_eq!(e.to_string(), "(x + 1) * x^2");
        let e = Expr::binary(
            BinaryOp::Sub,
            Expr::symbol("a"),
            Expr::binary(BinaryOp::Sub, Expr::symbol("b"), Expr::symbol("c")),
        );
        assert_eq!(e.to_string(), "a - (b - c)");
    }

    #[test]
    fn test_symbols_and_calculus() {
        let e = Expr::call(
            Function::Diff,
            vec![
                Expr::binary(BinaryOp::Mul, Expr::symbol("y"), Expr::symbol("x")),
                Expr::symbol("x"),
            ],
        );
        assert!(e.has_calculus());
        let names: Vec<String> = e.symbols().into_iter().collect();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }
}
