use crate::error::{Error, Result};
use crate::parser::{BinaryOp, Expr, Function, UnaryOp};
use std::collections::BTreeMap;

/// Values bound to free symbols during evaluation
pub type Bindings = BTreeMap<String, f64>;

/// Evaluate `expr` in floating point
///
/// Domain violations (division by zero, logarithms of non-positive values,
/// even roots of negatives) and non-finite intermediate results are errors,
/// so callers can skip undefined sample points.
pub fn eval_f64(expr: &Expr, bindings: &Bindings) -> Result<f64> {
    let value = match expr {
        Expr::Number(n) => n.to_f64(),
        Expr::Symbol(name) => *bindings.get(name).ok_or_else(|| Error::UnknownSymbol {
            name: name.clone(),
        })?,
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => -eval_f64(operand, bindings)?,
        Expr::Binary { op, left, right } => {
            let a = eval_f64(left, bindings)?;
            let b = eval_f64(right, bindings)?;
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(Error::DivisionByZero);
                    }
                    a / b
                }
                BinaryOp::Pow => {
                    if a == 0.0 && b < 0.0 {
                        return Err(Error::DivisionByZero);
                    }
                    a.powf(b)
                }
            }
        }
        Expr::Call { func, args } => {
            let x = match args.first() {
                Some(arg) => eval_f64(arg, bindings)?,
                None => return Err(Error::parse(format!("{} needs an argument", func.name()))),
            };
            apply(*func, x)?
        }
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::Undefined(format!("{} is not finite", expr)))
    }
}

fn apply(func: Function, x: f64) -> Result<f64> {
    let undefined = || Error::Undefined(format!("{}({}) is outside the domain", func.name(), x));
    let value = match func {
        Function::Sin => x.sin(),
        Function::Cos => x.cos(),
        Function::Tan => x.tan(),
        Function::Asin | Function::Acos if !(-1.0..=1.0).contains(&x) => return Err(undefined()),
        Function::Asin => x.asin(),
        Function::Acos => x.acos(),
        Function::Atan => x.atan(),
        Function::Sinh => x.sinh(),
        Function::Cosh => x.cosh(),
        Function::Tanh => x.tanh(),
        Function::Exp => x.exp(),
        Function::Ln | Function::Log10 if x <= 0.0 => return Err(undefined()),
        Function::Ln => x.ln(),
        Function::Log10 => x.log10(),
        Function::Sqrt if x < 0.0 => return Err(undefined()),
        Function::Sqrt => x.sqrt(),
        Function::Abs => x.abs(),
        Function::Diff | Function::Integrate => {
            return Err(Error::unsupported(format!(
                "{} cannot be evaluated numerically",
                func.name()
            )))
        }
    };
    Ok(value)
}

/// Replace every occurrence of `var` with `value`
pub fn substitute(expr: &Expr, var: &str, value: &Expr) -> Expr {
    match expr {
        Expr::Symbol(name) if name == var => value.clone(),
        Expr::Number(_) | Expr::Symbol(_) => expr.clone(),
        Expr::Binary { op, left, right } => Expr::binary(
            *op,
            substitute(left, var, value),
            substitute(right, var, value),
        ),
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(substitute(operand, var, value)),
        },
        Expr::Call { func, args } => Expr::call(
            *func,
            args.iter().map(|a| substitute(a, var, value)).collect(),
        ),
    }
}

/// Render a float for explanations: six decimals, trailing zeros dropped
pub fn format_value(value: f64) -> String {
    if value.abs() >= 1e15 || (value != 0.0 && value.abs() < 1e-6) {
        return format!("{:e}", value);
    }
    let text = format!("{:.6}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
