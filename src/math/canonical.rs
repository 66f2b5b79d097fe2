//! Canonical forms for symbolic equality
//!
//! An expression is normalized into a sum of monomials with exact rational
//! coefficients. Monomials are sorted maps from atoms (symbols, opaque
//! function applications, unexpandable powers) to integer exponents, so two
//! expressions that differ only in term order, grouping, or unreduced
//! constants end up with identical forms.

use crate::error::{Error, Result};
use crate::parser::{format_rational, BinaryOp, Expr, Function, Number, UnaryOp};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::collections::BTreeMap;
use std::fmt;

/// Largest exponent applied to a rational coefficient
const MAX_COEFFICIENT_EXPONENT: i64 = 4_096;

/// Largest root degree tried when reducing constant powers like `8^(1/3)`
const MAX_ROOT_DEGREE: u32 = 64;

/// Indivisible factor of a monomial
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Atom {
    /// Free symbol
    Symbol(String),
    /// Function application that could not be reduced
    Func(Function, Vec<Poly>),
    /// `base ^ exponent` that could not be expanded
    Power(Box<Poly>, Box<Poly>),
}

/// Product of atoms raised to non-zero integer exponents
pub type Monomial = BTreeMap<Atom, i64>;

/// Sum of monomials with non-zero rational coefficients
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Poly {
    terms: BTreeMap<Monomial, BigRational>,
}

impl Poly {
    /// The zero polynomial
    pub fn zero() -> Self {
        Poly::default()
    }

    /// A constant
    pub fn constant(value: BigRational) -> Self {
        let mut p = Poly::zero();
        p.add_term(Monomial::new(), value);
        p
    }

    /// Integer constant
    pub fn int(value: i64) -> Self {
        Poly::constant(BigRational::from_integer(BigInt::from(value)))
    }

    /// A single atom with coefficient one
    pub fn atom(atom: Atom, exponent: i64) -> Self {
        let mut monomial = Monomial::new();
        monomial.insert(atom, exponent);
        let mut p = Poly::zero();
        p.add_term(monomial, BigRational::one());
        p
    }

    /// A single term
    pub fn term(monomial: Monomial, coeff: BigRational) -> Self {
        let mut p = Poly::zero();
        p.add_term(monomial, coeff);
        p
    }

    /// A free symbol
    pub fn symbol(name: &str) -> Self {
        Poly::atom(Atom::Symbol(name.to_string()), 1)
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true for the zero polynomial
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in canonical order
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &BigRational)> {
        self.terms.iter()
    }

    /// The value, if the polynomial is a constant
    pub fn as_constant(&self) -> Option<BigRational> {
        match self.terms.len() {
            0 => Some(BigRational::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(m, _)| m.is_empty())
                .map(|(_, c)| c.clone()),
            _ => None,
        }
    }

    /// The only term, if there is exactly one
    pub fn single_term(&self) -> Option<(&Monomial, &BigRational)> {
        if self.terms.len() == 1 {
            self.terms.iter().next()
        } else {
            None
        }
    }

    /// Returns true if no atom mentions `var`
    pub fn is_free_of(&self, var: &str) -> bool {
        self.terms
            .keys()
            .all(|m| m.keys().all(|atom| atom.is_free_of(var)))
    }

    /// Dense coefficients `[c0, c1, ...]` if this is a polynomial in `var`
    /// with exact constant coefficients
    pub fn coefficients_in(&self, var: &str) -> Option<Vec<BigRational>> {
        let mut coeffs: Vec<BigRational> = Vec::new();
        for (monomial, coeff) in &self.terms {
            let degree = match monomial.len() {
                0 => 0usize,
                1 => match monomial.iter().next() {
                    Some((Atom::Symbol(name), exp)) if name == var && *exp > 0 => {
                        usize::try_from(*exp).ok()?
                    }
                    _ => return None,
                },
                _ => return None,
            };
            if coeffs.len() <= degree {
                coeffs.resize(degree + 1, BigRational::zero());
            }
            coeffs[degree] += coeff;
        }
        Some(coeffs)
    }

    /// Sum of two polynomials
    pub fn add(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }

    /// Additive inverse
    pub fn neg(&self) -> Poly {
        self.scale(&-BigRational::one())
    }

    /// Multiply every coefficient by `factor`
    pub fn scale(&self, factor: &BigRational) -> Poly {
        if factor.is_zero() {
            return Poly::zero();
        }
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.clone(), c * factor))
                .collect(),
        }
    }

    /// Convert back into an expression tree
    pub fn to_expr(&self) -> Expr {
        let mut out: Option<Expr> = None;
        for (monomial, coeff) in self.terms.iter().rev() {
            let mut factors: Vec<Expr> = Vec::new();
            let magnitude = coeff.abs();
            if !magnitude.is_one() || monomial.is_empty() {
                factors.push(Expr::Number(Number::Exact(magnitude)));
            }
            for (atom, exp) in monomial {
                let base = atom.to_expr();
                factors.push(if *exp == 1 {
                    base
                } else {
                    Expr::binary(BinaryOp::Pow, base, Expr::int(*exp))
                });
            }
            let mut iter = factors.into_iter();
            let first = iter.next().unwrap_or_else(|| Expr::int(1));
            let term = iter.fold(first, |acc, f| Expr::binary(BinaryOp::Mul, acc, f));
            out = Some(match out {
                None if coeff.is_negative() => Expr::neg(term),
                None => term,
                Some(acc) if coeff.is_negative() => Expr::binary(BinaryOp::Sub, acc, term),
                Some(acc) => Expr::binary(BinaryOp::Add, acc, term),
            });
        }
        out.unwrap_or_else(|| Expr::int(0))
    }

    fn add_term(&mut self, monomial: Monomial, coeff: BigRational) {
        if coeff.is_zero() {
            return;
        }
        let entry = self
            .terms
            .entry(monomial)
            .or_insert_with(BigRational::zero);
        *entry += coeff;
        if entry.is_zero() {
            self.terms.retain(|_, c| !c.is_zero());
        }
    }
}

impl Atom {
    fn is_free_of(&self, var: &str) -> bool {
        match self {
            Atom::Symbol(name) => name != var,
            Atom::Func(_, args) => args.iter().all(|a| a.is_free_of(var)),
            Atom::Power(base, exp) => base.is_free_of(var) && exp.is_free_of(var),
        }
    }

    fn to_expr(&self) -> Expr {
        match self {
            Atom::Symbol(name) => Expr::Symbol(name.clone()),
            Atom::Func(func, args) => Expr::call(*func, args.iter().map(|a| a.to_expr()).collect()),
            Atom::Power(base, exp) => Expr::binary(BinaryOp::Pow, base.to_expr(), exp.to_expr()),
        }
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

/// Builds canonical forms within a term budget
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    max_terms: usize,
    max_expand_exponent: u32,
}

impl Canonicalizer {
    /// Creates a canonicalizer with the given limits
    pub fn new(max_terms: usize, max_expand_exponent: u32) -> Self {
        Canonicalizer {
            max_terms,
            max_expand_exponent,
        }
    }

    /// Canonical form of `expr`
    ///
    /// Fails with `UnsupportedConstruct` on approximate literals or unreduced
    /// calculus operators; those are compared numerically instead.
    pub fn canonicalize(&self, expr: &Expr) -> Result<Poly> {
        match expr {
            Expr::Number(Number::Exact(r)) => Ok(Poly::constant(r.clone())),
            Expr::Number(Number::Approx(v)) => Err(Error::unsupported(format!(
                "approximate literal {} has no exact form",
                v
            ))),
            Expr::Symbol(name) => Ok(Poly::symbol(name)),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Ok(self.canonicalize(operand)?.neg()),
            Expr::Binary { op, left, right } => {
                let a = self.canonicalize(left)?;
                let b = self.canonicalize(right)?;
                match op {
                    BinaryOp::Add => self.checked(a.add(&b)),
                    BinaryOp::Sub => self.checked(a.add(&b.neg())),
                    BinaryOp::Mul => self.mul(&a, &b),
                    BinaryOp::Div => {
                        let inv = self.power_int(&b, -1)?;
                        self.mul(&a, &inv)
                    }
                    BinaryOp::Pow => self.power(&a, &b),
                }
            }
            Expr::Call { func, args } => {
                if func.is_calculus() {
                    return Err(Error::unsupported(format!(
                        "unreduced {} operator",
                        func.name()
                    )));
                }
                let arg = match args.first() {
                    Some(arg) => self.canonicalize(arg)?,
                    None => return Err(Error::parse(format!("{} needs an argument", func.name()))),
                };
                if *func == Function::Sqrt {
                    let half = Poly::constant(BigRational::new(BigInt::from(1), BigInt::from(2)));
                    return self.power(&arg, &half);
                }
                self.function(*func, arg)
            }
        }
    }

    /// Product of two polynomials, fully expanded
    pub fn mul(&self, a: &Poly, b: &Poly) -> Result<Poly> {
        if a.len().saturating_mul(b.len()) > self.max_terms.saturating_mul(4) {
            return Err(Error::budget("expanded product terms", self.max_terms));
        }
        let mut out = Poly::zero();
        for (ma, ca) in &a.terms {
            for (mb, cb) in &b.terms {
                let mut monomial = ma.clone();
                for (atom, exp) in mb {
                    let entry = monomial.entry(atom.clone()).or_insert(0);
                    *entry += exp;
                }
                monomial.retain(|_, e| *e != 0);
                out.add_term(monomial, ca * cb);
            }
        }
        self.checked(out)
    }

    fn checked(&self, p: Poly) -> Result<Poly> {
        if p.len() > self.max_terms {
            Err(Error::budget("canonical form terms", self.max_terms))
        } else {
            Ok(p)
        }
    }

    fn power(&self, base: &Poly, exp: &Poly) -> Result<Poly> {
        if let Some(r) = exp.as_constant() {
            if r.is_integer() {
                return match r.to_integer().to_i64() {
                    Some(n) => self.power_int(base, n),
                    None => Err(Error::budget("integer exponent", i64::MAX as usize)),
                };
            }
            if let Some(c) = base.as_constant() {
                if let Some(value) = exact_rational_power(&c, &r) {
                    return Ok(Poly::constant(value));
                }
            }
        }
        if let Some(c) = base.as_constant() {
            if c.is_one() {
                return Ok(Poly::int(1));
            }
        }
        Ok(Poly::atom(
            Atom::Power(Box::new(base.clone()), Box::new(exp.clone())),
            1,
        ))
    }

    fn power_int(&self, base: &Poly, n: i64) -> Result<Poly> {
        if n == 0 {
            return Ok(Poly::int(1));
        }
        if base.is_zero() {
            return if n < 0 {
                Err(Error::DivisionByZero)
            } else {
                Ok(Poly::zero())
            };
        }

        if let Some((monomial, coeff)) = base.single_term() {
            if n.abs() > MAX_COEFFICIENT_EXPONENT {
                return Err(Error::budget(
                    "coefficient exponent",
                    MAX_COEFFICIENT_EXPONENT as usize,
                ));
            }
            let mut raised = Monomial::new();
            for (atom, exp) in monomial {
                let e = exp
                    .checked_mul(n)
                    .ok_or_else(|| Error::budget("monomial exponent", i64::MAX as usize))?;
                raised.insert(atom.clone(), e);
            }
            let magnitude = usize::try_from(n.unsigned_abs())
                .map_err(|_| Error::budget("coefficient exponent", usize::MAX))?;
            let mut value = num_traits::pow(coeff.clone(), magnitude);
            if n < 0 {
                value = value.recip();
            }
            let mut p = Poly::zero();
            p.add_term(raised, value);
            return Ok(p);
        }

        let magnitude = n.unsigned_abs();
        if magnitude > u64::from(self.max_expand_exponent) {
            return Ok(Poly::atom(
                Atom::Power(Box::new(base.clone()), Box::new(Poly::int(n))),
                1,
            ));
        }
        if n < 0 {
            let expanded = self.power_int(base, -n)?;
            if let Some((_, _)) = expanded.single_term() {
                return self.power_int(&expanded, -1);
            }
            return Ok(Poly::atom(
                Atom::Power(Box::new(expanded), Box::new(Poly::int(-1))),
                1,
            ));
        }

        // Binary exponentiation keeps the number of expansions logarithmic
        let mut result = Poly::int(1);
        let mut square = base.clone();
        let mut remaining = magnitude;
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = self.mul(&result, &square)?;
            }
            remaining >>= 1;
            if remaining > 0 {
                square = self.mul(&square, &square)?;
            }
        }
        Ok(result)
    }

    fn function(&self, func: Function, arg: Poly) -> Result<Poly> {
        if let Some(c) = arg.as_constant() {
            if c.is_zero() {
                match func {
                    Function::Sin
                    | Function::Tan
                    | Function::Asin
                    | Function::Atan
                    | Function::Sinh
                    | Function::Tanh
                    | Function::Abs => return Ok(Poly::zero()),
                    Function::Cos | Function::Cosh | Function::Exp => return Ok(Poly::int(1)),
                    _ => {}
                }
            }
            if c.is_one() {
                match func {
                    Function::Ln | Function::Log10 | Function::Acos => return Ok(Poly::zero()),
                    _ => {}
                }
            }
            match func {
                Function::Abs => return Ok(Poly::constant(c.abs())),
                Function::Ln | Function::Log10 if !c.is_positive() => {
                    return Err(Error::Undefined(format!(
                        "{}({}) is undefined",
                        func.name(),
                        format_rational(&c)
                    )));
                }
                _ => {}
            }
        }

        // ln(exp(u)) = u over the reals
        if func == Function::Ln {
            if let Some((monomial, coeff)) = arg.single_term() {
                if coeff.is_one() && monomial.len() == 1 {
                    if let Some((Atom::Func(Function::Exp, inner), 1)) = monomial.iter().next() {
                        if let Some(u) = inner.first() {
                            return Ok(u.clone());
                        }
                    }
                }
            }
        }

        Ok(Poly::atom(Atom::Func(func, vec![arg]), 1))
    }
}

/// `c^(p/q)` when the result is rational
fn exact_rational_power(c: &BigRational, r: &BigRational) -> Option<BigRational> {
    let q = r.denom().to_u32()?;
    if q > MAX_ROOT_DEGREE {
        return None;
    }
    let negative = c.is_negative();
    if negative && q % 2 == 0 {
        return None;
    }
    let numer_root = exact_root(&c.numer().abs(), q)?;
    let denom_root = exact_root(c.denom(), q)?;
    let mut root = BigRational::new(numer_root, denom_root);
    if negative {
        root = -root;
    }
    let p = r.numer().to_i64()?;
    if p.abs() > MAX_COEFFICIENT_EXPONENT {
        return None;
    }
    if root.is_zero() && p < 0 {
        return None;
    }
    let mut value = num_traits::pow(root, usize::try_from(p.unsigned_abs()).ok()?);
    if p < 0 {
        value = value.recip();
    }
    Some(value)
}

fn exact_root(n: &BigInt, degree: u32) -> Option<BigInt> {
    let root = n.nth_root(degree);
    if num_traits::pow(root.clone(), degree as usize) == *n {
        Some(root)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, SymbolTable};

    fn canon(source: &str) -> Poly {
        let expr = parse(source, &SymbolTable::permissive()).unwrap();
        Canonicalizer::new(4096, 64).canonicalize(&expr).unwrap()
    }

    #[test]
    fn test_term_order_and_grouping() {
        assert_eq!(canon("x + y"), canon("y + x"));
        assert_eq!(canon("2*(x + 1)"), canon("2x + 2"));
        assert_eq!(canon("(x+1)^2"), canon("x^2 + 2x + 1"));
        assert_eq!(canon("(x+1)**2 - x**2 - 2*x"), canon("1"));
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(canon("1/2 + 1/3").as_constant().unwrap().to_string(), "5/6");
        assert_eq!(canon("sqrt(16)"), canon("4"));
        assert_eq!(canon("8^(1/3)"), canon("2"));
        assert_eq!(canon("x/x"), canon("1"));
        assert_eq!(canon("cos(0) + exp(0)"), canon("2"));
    }

    #[test]
    fn test_functions_stay_opaque() {
        assert_eq!(canon("sin(x+1)"), canon("sin(1+x)"));
        assert_ne!(canon("sin(x)"), canon("cos(x)"));
        assert_eq!(canon("ln(exp(2x))"), canon("2x"));
    }

    #[test]
    fn test_division_by_zero() {
        let expr = parse("1/(x - x)", &SymbolTable::permissive()).unwrap();
        let err = Canonicalizer::new(4096, 64).canonicalize(&expr).unwrap_err();
        assert_eq!(err, Error::DivisionByZero);
    }

    #[test]
    fn test_approximate_literals_are_rejected() {
        let expr = parse("2.5e3 * x", &SymbolTable::permissive()).unwrap();
        assert!(Canonicalizer::new(4096, 64).canonicalize(&expr).is_err());
    }

    #[test]
    fn test_term_budget() {
        let expr = parse("(a+b+c+d)^12", &SymbolTable::permissive()).unwrap();
        let err = Canonicalizer::new(64, 64).canonicalize(&expr).unwrap_err();
        assert!(matches!(err, Error::BudgetExhausted { .. }));
    }

    #[test]
    fn test_coefficients_in() {
        let coeffs = canon("3x^2 - 4").coefficients_in("x").unwrap();
        assert_eq!(coeffs.len(), 3);
        assert_eq!(coeffs[0].to_string(), "-4");
        assert!(coeffs[1].is_zero());
        assert!(canon("x*y").coefficients_in("x").is_none());
    }

    #[test]
    fn test_to_expr_round_trips() {
        let p = canon("x^2 - 3x + 1/2");
        let again = Canonicalizer::new(4096, 64)
            .canonicalize(&p.to_expr())
            .unwrap();
        assert_eq!(p, again);
    }
}
