//! Symbolic differentiation and a small antiderivative table

use super::canonical::{Atom, Canonicalizer, Monomial, Poly};
use crate::error::{Error, Result};
use crate::parser::{BinaryOp, Expr, Function, Number, UnaryOp};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

/// Replace every `diff` and `integrate` call with its result, innermost first
pub fn reduce(expr: &Expr, canon: &Canonicalizer) -> Result<Expr> {
    match expr {
        Expr::Number(_) | Expr::Symbol(_) => Ok(expr.clone()),
        Expr::Binary { op, left, right } => Ok(Expr::binary(
            *op,
            reduce(left, canon)?,
            reduce(right, canon)?,
        )),
        Expr::Unary { op, operand } => Ok(Expr::Unary {
            op: *op,
            operand: Box::new(reduce(operand, canon)?),
        }),
        Expr::Call { func, args } => {
            let args = args
                .iter()
                .map(|a| reduce(a, canon))
                .collect::<Result<Vec<_>>>()?;
            match func {
                Function::Diff => {
                    let (body, var) = calculus_args(&args)?;
                    differentiate(body, var)
                }
                Function::Integrate => {
                    let (body, var) = calculus_args(&args)?;
                    integrate(body, var, canon)
                }
                _ => Ok(Expr::call(*func, args)),
            }
        }
    }
}

fn calculus_args(args: &[Expr]) -> Result<(&Expr, &str)> {
    match args {
        [body, Expr::Symbol(var)] => Ok((body, var.as_str())),
        _ => Err(Error::parse("calculus operator needs an expression and a variable")),
    }
}

/// Derivative of `expr` with respect to `var`
pub fn differentiate(expr: &Expr, var: &str) -> Result<Expr> {
    if !expr.symbols().contains(var) {
        return Ok(Expr::int(0));
    }
    match expr {
        Expr::Number(_) => Ok(Expr::int(0)),
        Expr::Symbol(name) => Ok(Expr::int(if name == var { 1 } else { 0 })),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Ok(neg(differentiate(operand, var)?)),
        Expr::Binary { op, left, right } => {
            let (l, r) = (left.as_ref(), right.as_ref());
            match op {
                BinaryOp::Add => Ok(add(differentiate(l, var)?, differentiate(r, var)?)),
                BinaryOp::Sub => Ok(sub(differentiate(l, var)?, differentiate(r, var)?)),
                BinaryOp::Mul => Ok(add(
                    mul(differentiate(l, var)?, r.clone()),
                    mul(l.clone(), differentiate(r, var)?),
                )),
                BinaryOp::Div => {
                    let numerator = sub(
                        mul(differentiate(l, var)?, r.clone()),
                        mul(l.clone(), differentiate(r, var)?),
                    );
                    Ok(div(numerator, pow(r.clone(), Expr::int(2))))
                }
                BinaryOp::Pow => differentiate_power(l, r, var),
            }
        }
        Expr::Call { func, args } => {
            let u = match args.first() {
                Some(u) => u,
                None => return Err(Error::parse(format!("{} needs an argument", func.name()))),
            };
            let du = differentiate(u, var)?;
            let outer = match func {
                Function::Sin => call(Function::Cos, u),
                Function::Cos => neg(call(Function::Sin, u)),
                Function::Tan => add(Expr::int(1), pow(call(Function::Tan, u), Expr::int(2))),
                Function::Asin => div(
                    Expr::int(1),
                    call_expr(Function::Sqrt, sub(Expr::int(1), pow(u.clone(), Expr::int(2)))),
                ),
                Function::Acos => neg(div(
                    Expr::int(1),
                    call_expr(Function::Sqrt, sub(Expr::int(1), pow(u.clone(), Expr::int(2)))),
                )),
                Function::Atan => div(Expr::int(1), add(Expr::int(1), pow(u.clone(), Expr::int(2)))),
                Function::Sinh => call(Function::Cosh, u),
                Function::Cosh => call(Function::Sinh, u),
                Function::Tanh => sub(Expr::int(1), pow(call(Function::Tanh, u), Expr::int(2))),
                Function::Exp => call(Function::Exp, u),
                Function::Ln => div(Expr::int(1), u.clone()),
                Function::Log10 => div(
                    Expr::int(1),
                    mul(u.clone(), call_expr(Function::Ln, Expr::int(10))),
                ),
                Function::Sqrt => div(Expr::int(1), mul(Expr::int(2), call(Function::Sqrt, u))),
                Function::Abs => div(u.clone(), call(Function::Abs, u)),
                Function::Diff | Function::Integrate => {
                    return Err(Error::unsupported(format!(
                        "unreduced {} inside a derivative",
                        func.name()
                    )));
                }
            };
            Ok(mul(outer, du))
        }
    }
}

fn differentiate_power(base: &Expr, exponent: &Expr, var: &str) -> Result<Expr> {
    let base_varies = base.symbols().contains(var);
    let exponent_varies = exponent.symbols().contains(var);

    if !exponent_varies {
        // n * b^(n-1) * b'
        let lowered = sub(exponent.clone(), Expr::int(1));
        return Ok(mul(
            mul(exponent.clone(), pow(base.clone(), lowered)),
            differentiate(base, var)?,
        ));
    }
    let power = pow(base.clone(), exponent.clone());
    let ln_base = call(Function::Ln, base);
    if !base_varies {
        // b^u * ln(b) * u'
        return Ok(mul(mul(power, ln_base), differentiate(exponent, var)?));
    }
    // b^u * (u' ln b + u b'/b)
    let inner = add(
        mul(differentiate(exponent, var)?, ln_base),
        div(mul(exponent.clone(), differentiate(base, var)?), base.clone()),
    );
    Ok(mul(power, inner))
}

/// Antiderivative of `expr` with respect to `var`, without a constant
///
/// Covers linear combinations of powers of `var`, `1/x`, and `exp`, `sin`,
/// `cos`, `sinh`, `cosh` or powers of a linear argument.
pub fn integrate(expr: &Expr, var: &str, canon: &Canonicalizer) -> Result<Expr> {
    if !expr.symbols().contains(var) {
        return Ok(mul(expr.clone(), Expr::symbol(var)));
    }
    match expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => return Ok(neg(integrate(operand, var, canon)?)),
        Expr::Binary { op, left, right } => {
            let left_free = !left.symbols().contains(var);
            let right_free = !right.symbols().contains(var);
            match op {
                BinaryOp::Add => {
                    return Ok(add(
                        integrate(left, var, canon)?,
                        integrate(right, var, canon)?,
                    ))
                }
                BinaryOp::Sub => {
                    return Ok(sub(
                        integrate(left, var, canon)?,
                        integrate(right, var, canon)?,
                    ))
                }
                BinaryOp::Mul if left_free => {
                    return Ok(mul(left.as_ref().clone(), integrate(right, var, canon)?))
                }
                BinaryOp::Mul if right_free => {
                    return Ok(mul(integrate(left, var, canon)?, right.as_ref().clone()))
                }
                BinaryOp::Div if right_free => {
                    return Ok(div(integrate(left, var, canon)?, right.as_ref().clone()))
                }
                _ => {}
            }
        }
        _ => {}
    }

    let poly = canon.canonicalize(expr)?;
    let mut total = Poly::zero();
    for (monomial, coeff) in poly.terms() {
        let term = integrate_term(monomial, coeff, var)?;
        total = total.add(&canon.canonicalize(&term)?);
    }
    Ok(total.to_expr())
}

fn integrate_term(monomial: &Monomial, coeff: &BigRational, var: &str) -> Result<Expr> {
    let mut rest = Monomial::new();
    let mut dependent: Option<(&Atom, i64)> = None;
    for (atom, exp) in monomial {
        if Poly::atom(atom.clone(), 1).is_free_of(var) {
            rest.insert(atom.clone(), *exp);
        } else if dependent.is_some() {
            return Err(no_rule(monomial));
        } else {
            dependent = Some((atom, *exp));
        }
    }
    let factor = Poly::term(rest, coeff.clone()).to_expr();

    let (atom, exp) = match dependent {
        Some(d) => d,
        None => return Ok(mul(factor, Expr::symbol(var))),
    };

    let antiderivative = match atom {
        Atom::Symbol(_) => {
            if exp == -1 {
                call_expr(Function::Ln, Expr::symbol(var))
            } else {
                let raised = exp + 1;
                div(pow(Expr::symbol(var), Expr::int(raised)), Expr::int(raised))
            }
        }
        Atom::Func(func, args) => {
            let (slope, u) = match args.first().and_then(|u| linear_in(u, var)) {
                Some((slope, _)) => (slope, args[0].to_expr()),
                None => return Err(no_rule(monomial)),
            };
            let slope = Expr::Number(Number::Exact(slope));
            match (func, exp) {
                (Function::Exp, k) => {
                    // exp(u)^k = exp(k u)
                    let scaled = mul(Expr::int(k), slope);
                    div(pow(call_expr(Function::Exp, u), Expr::int(k)), scaled)
                }
                (Function::Sin, 1) => div(neg(call_expr(Function::Cos, u)), slope),
                (Function::Cos, 1) => div(call_expr(Function::Sin, u), slope),
                (Function::Sinh, 1) => div(call_expr(Function::Cosh, u), slope),
                (Function::Cosh, 1) => div(call_expr(Function::Sinh, u), slope),
                _ => return Err(no_rule(monomial)),
            }
        }
        Atom::Power(base, exponent) => {
            let (slope, _) = linear_in(base, var).ok_or_else(|| no_rule(monomial))?;
            let r = exponent.as_constant().ok_or_else(|| no_rule(monomial))?;
            let total = r * BigRational::from_integer(BigInt::from(exp));
            let slope = Expr::Number(Number::Exact(slope));
            if total == -BigRational::one() {
                div(call_expr(Function::Ln, base.to_expr()), slope)
            } else {
                let raised = total + BigRational::one();
                div(
                    pow(base.to_expr(), Expr::Number(Number::Exact(raised.clone()))),
                    mul(Expr::Number(Number::Exact(raised)), slope),
                )
            }
        }
    };
    Ok(mul(factor, antiderivative))
}

/// `(a, b)` when `p = a*var + b` with rational `a != 0` and `b` free of `var`
fn linear_in(p: &Poly, var: &str) -> Option<(BigRational, Poly)> {
    let mut slope = BigRational::zero();
    let mut offset = Poly::zero();
    for (monomial, coeff) in p.terms() {
        let is_var = monomial.len() == 1
            && matches!(monomial.iter().next(), Some((Atom::Symbol(n), 1)) if n == var);
        if is_var {
            slope += coeff;
            continue;
        }
        if !monomial
            .keys()
            .all(|atom| Poly::atom(atom.clone(), 1).is_free_of(var))
        {
            return None;
        }
        let term = Poly::term(monomial.clone(), coeff.clone());
        offset = offset.add(&term);
    }
    if slope.is_zero() {
        None
    } else {
        Some((slope, offset))
    }
}

fn no_rule(monomial: &Monomial) -> Error {
    let p = Poly::term(monomial.clone(), BigRational::one());
    Error::unsupported(format!("no antiderivative rule for {}", p))
}

fn exact(expr: &Expr) -> Option<&BigRational> {
    match expr {
        Expr::Number(Number::Exact(r)) => Some(r),
        _ => None,
    }
}

fn is_int(expr: &Expr, value: i64) -> bool {
    exact(expr).map_or(false, |r| *r == BigRational::from_integer(BigInt::from(value)))
}

fn add(a: Expr, b: Expr) -> Expr {
    if let (Some(x), Some(y)) = (exact(&a), exact(&b)) {
        return Expr::Number(Number::Exact(x + y));
    }
    if is_int(&a, 0) {
        return b;
    }
    if is_int(&b, 0) {
        return a;
    }
    Expr::binary(BinaryOp::Add, a, b)
}

fn sub(a: Expr, b: Expr) -> Expr {
    if let (Some(x), Some(y)) = (exact(&a), exact(&b)) {
        return Expr::Number(Number::Exact(x - y));
    }
    if is_int(&b, 0) {
        return a;
    }
    if is_int(&a, 0) {
        return neg(b);
    }
    Expr::binary(BinaryOp::Sub, a, b)
}

fn mul(a: Expr, b: Expr) -> Expr {
    if let (Some(x), Some(y)) = (exact(&a), exact(&b)) {
        return Expr::Number(Number::Exact(x * y));
    }
    if is_int(&a, 0) || is_int(&b, 0) {
        return Expr::int(0);
    }
    if is_int(&a, 1) {
        return b;
    }
    if is_int(&b, 1) {
        return a;
    }
    Expr::binary(BinaryOp::Mul, a, b)
}

fn div(a: Expr, b: Expr) -> Expr {
    if is_int(&a, 0) && !is_int(&b, 0) {
        return Expr::int(0);
    }
    if is_int(&b, 1) {
        return a;
    }
    Expr::binary(BinaryOp::Div, a, b)
}

fn pow(base: Expr, exponent: Expr) -> Expr {
    if is_int(&exponent, 1) {
        return base;
    }
    if is_int(&exponent, 0) {
        return Expr::int(1);
    }
    Expr::binary(BinaryOp::Pow, base, exponent)
}

fn neg(a: Expr) -> Expr {
    if let Some(x) = exact(&a) {
        return Expr::Number(Number::Exact(-x));
    }
    match a {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => *operand,
        other => Expr::neg(other),
    }
}

fn call(func: Function, arg: &Expr) -> Expr {
    Expr::call(func, vec![arg.clone()])
}

fn call_expr(func: Function, arg: Expr) -> Expr {
    Expr::call(func, vec![arg])
}
