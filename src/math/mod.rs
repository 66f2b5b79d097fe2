//! Math Verification Engine
//!
//! Decides whether a claimed result equals an expected one. Both sides are
//! parsed, calculus operators are reduced with the rule tables, and the
//! results are compared first by canonical form, then by seeded numeric
//! sampling. Claims without free symbols are evaluated exactly where the
//! literals allow it and compared within a decimal tolerance.
//!
//! # Example
//!
//! ```
//! use qwed_verify::math::{MathContext, MathEngine};
//! use qwed_verify::config::MathConfig;
//!
//! let engine = MathEngine::new(MathConfig::default());
//! let verdict = engine.verify("diff(x^3 + 2x, x)", "3x^2 + 2", &MathContext::default());
//! assert!(verdict.is_verified());
//! assert_eq!(verdict.confidence(), 1.0);
//! ```

pub mod calculus;
pub mod canonical;
pub mod eval;
pub mod sampling;

use crate::config::MathConfig;
use crate::error::{Error, Result};
use crate::parser::{
    format_rational, parse, parse_claim, parse_equation, rational_to_f64, BinaryOp, Expr,
    SymbolTable,
};
use crate::verdict::{EngineKind, Finding, Severity, Verdict};
use canonical::Canonicalizer;
use eval::{eval_f64, format_value, substitute, Bindings};
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use sampling::{format_point, SampleOutcome, Sampler};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Confidence ceiling for verdicts that rest on sampling
pub const SAMPLED_CONFIDENCE_CAP: f64 = 0.95;

/// Confidence of a refutation backed by a sampled counterexample
pub const COUNTEREXAMPLE_CONFIDENCE: f64 = 0.99;

/// Confidence when a numeric assertion involved approximate literals
pub const APPROXIMATE_CONFIDENCE: f64 = 0.95;

/// Confidence of a root check where completeness could not be established
pub const PARTIAL_SOLVE_CONFIDENCE: f64 = 0.9;

/// What the claim asserts about the expected value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// `claim` evaluates to `expected`
    #[default]
    Evaluate,
    /// `claim` simplifies to `expected`
    Simplify,
    /// The derivative of `claim` is `expected`
    Derivative,
    /// `expected` is an antiderivative of `claim`
    Integral,
    /// `expected` lists the roots of the equation `claim`
    Solve,
}

impl Operation {
    /// Look up an operation by name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name.trim().to_ascii_lowercase().as_str() {
            "evaluate" | "eval" | "check" | "verify" => Operation::Evaluate,
            "simplify" => Operation::Simplify,
            "derivative" | "differentiate" | "diff" => Operation::Derivative,
            "integral" | "integrate" => Operation::Integral,
            "solve" => Operation::Solve,
            _ => return None,
        };
        Some(op)
    }
}

/// Per-call options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MathContext {
    /// What is being checked
    pub operation: Operation,
    /// Variable for calculus and solve; inferred when there is only one
    pub variable: Option<String>,
    /// Absolute tolerance for numeric assertions
    pub tolerance: Option<f64>,
    /// Sampling trials, capped by the configuration
    pub sample_trials: Option<usize>,
}

impl MathContext {
    /// Context for one operation
    pub fn for_operation(operation: Operation) -> Self {
        MathContext {
            operation,
            ..Default::default()
        }
    }

    /// Set the variable
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }
}

/// Math verification engine
#[derive(Debug, Clone)]
pub struct MathEngine {
    config: MathConfig,
    symbols: SymbolTable,
    canon: Canonicalizer,
}

impl MathEngine {
    /// Creates an engine
    pub fn new(config: MathConfig) -> Self {
        let symbols = SymbolTable::allow(config.allowed_symbols.iter().cloned());
        let canon = Canonicalizer::new(config.max_terms, config.max_expand_exponent);
        MathEngine {
            config,
            symbols,
            canon,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &MathConfig {
        &self.config
    }

    /// Verify `claim` against `expected`; errors become `undetermined`
    pub fn verify(&self, claim: &str, expected: &str, ctx: &MathContext) -> Verdict {
        match self.try_verify(claim, expected, ctx) {
            Ok(verdict) => verdict,
            Err(err) => Verdict::undetermined_from(EngineKind::Math, &err),
        }
    }

    fn try_verify(&self, claim: &str, expected: &str, ctx: &MathContext) -> Result<Verdict> {
        debug!(operation = ?ctx.operation, claim, expected, "math verify");
        match ctx.operation {
            Operation::Evaluate | Operation::Simplify => {
                let lhs = self.reduce(&parse_claim(claim, &self.symbols)?)?;
                let rhs = self.reduce(&parse_claim(expected, &self.symbols)?)?;
                let tolerance = self.tolerance_for(expected, ctx);
                self.compare(&lhs, &rhs, expected, tolerance, ctx)
            }
            Operation::Derivative => {
                let f = self.reduce(&parse_claim(claim, &self.symbols)?)?;
                let var = self.variable(ctx, &f)?;
                let derived = calculus::differentiate(&f, &var)?;
                let rhs = self.reduce(&parse_claim(expected, &self.symbols)?)?;
                let tolerance = self.tolerance_for(expected, ctx);
                let verdict = self.compare(&derived, &rhs, expected, tolerance, ctx)?;
                Ok(verdict.prefixed(format!("d/d{}({}) = {}", var, f, self.display(&derived))))
            }
            Operation::Integral => {
                let integrand = self.reduce(&parse_claim(claim, &self.symbols)?)?;
                let antiderivative = self.reduce(&parse_claim(expected, &self.symbols)?)?;
                let var = self.variable(ctx, &integrand)?;
                let derived = calculus::differentiate(&antiderivative, &var)?;
                let verdict = self.compare(&derived, &integrand, claim, None, ctx)?;
                Ok(verdict.prefixed(format!(
                    "d/d{}({}) = {}",
                    var,
                    antiderivative,
                    self.display(&derived)
                )))
            }
            Operation::Solve => self.verify_roots(claim, expected, ctx),
        }
    }

    fn reduce(&self, expr: &Expr) -> Result<Expr> {
        if expr.has_calculus() {
            calculus::reduce(expr, &self.canon)
        } else {
            Ok(expr.clone())
        }
    }

    fn variable(&self, ctx: &MathContext, expr: &Expr) -> Result<String> {
        if let Some(var) = &ctx.variable {
            return Ok(var.clone());
        }
        let symbols = expr.symbols();
        if symbols.is_empty() || symbols.contains("x") {
            return Ok("x".to_string());
        }
        if symbols.len() == 1 {
            return Ok(symbols.into_iter().next().unwrap_or_default());
        }
        Err(Error::unsupported(format!(
            "ambiguous variable among {}; pass `variable`",
            symbols.into_iter().collect::<Vec<_>>().join(", ")
        )))
    }

    fn display(&self, expr: &Expr) -> String {
        match self.canon.canonicalize(expr) {
            Ok(poly) => poly.to_string(),
            Err(_) => expr.to_string(),
        }
    }

    /// Tolerance for numeric assertions
    ///
    /// A caller-supplied tolerance wins. Otherwise the configured decimal
    /// tolerance applies, tightened to half a unit in the last place when the
    /// expected value is a decimal literal with more places.
    fn tolerance_for(&self, expected: &str, ctx: &MathContext) -> Option<f64> {
        if let Some(tol) = ctx.tolerance {
            return Some(tol.abs());
        }
        let default = self.config.decimal_tolerance;
        let literal = expected.trim().trim_start_matches(['-', '+']);
        let places = match literal.split_once('.') {
            Some((int_part, frac_part))
                if int_part.chars().all(|c| c.is_ascii_digit())
                    && !frac_part.is_empty()
                    && frac_part.chars().all(|c| c.is_ascii_digit()) =>
            {
                frac_part.len()
            }
            _ => return Some(default),
        };
        let half_unit = 0.5 * 10f64.powi(-(places as i32));
        Some(default.min(half_unit))
    }

    fn compare(
        &self,
        lhs: &Expr,
        rhs: &Expr,
        claimed: &str,
        tolerance: Option<f64>,
        ctx: &MathContext,
    ) -> Result<Verdict> {
        let symbols: BTreeSet<String> = lhs.symbols().union(&rhs.symbols()).cloned().collect();
        if symbols.is_empty() {
            return self.compare_numbers(
                lhs,
                rhs,
                claimed,
                tolerance.unwrap_or(self.config.decimal_tolerance),
            );
        }

        match (self.canon.canonicalize(lhs), self.canon.canonicalize(rhs)) {
            (Ok(a), Ok(b)) => {
                if a == b {
                    debug!(form = %a, "canonical forms agree");
                    return Ok(Verdict::verified(
                        EngineKind::Math,
                        1.0,
                        format!("canonical forms agree: {}", a),
                    ));
                }
                let difference = a.add(&b.neg());
                if let Some(offset) = difference.as_constant() {
                    let message = format!(
                        "{} and {} differ by the constant {}",
                        a,
                        b,
                        format_rational(&offset)
                    );
                    return Ok(Verdict::refuted(
                        EngineKind::Math,
                        1.0,
                        message.clone(),
                        Finding::new(Severity::High, "mismatch", message),
                    ));
                }
                debug!(left = %a, right = %b, "canonical forms differ, sampling");
            }
            (Err(err), _) | (_, Err(err)) => {
                debug!(error = %err, "no canonical form, sampling");
            }
        }

        let symbols: Vec<String> = symbols.into_iter().collect();
        Ok(self.sample(lhs, rhs, &symbols, ctx))
    }

    fn sample(&self, lhs: &Expr, rhs: &Expr, symbols: &[String], ctx: &MathContext) -> Verdict {
        let trials = ctx
            .sample_trials
            .unwrap_or(self.config.sample_trials)
            .min(self.config.max_sample_trials);
        let sampler = Sampler::new(
            self.config.seed,
            trials,
            self.config.sample_domain,
            self.config.abs_tolerance,
            self.config.rel_tolerance,
        );
        match sampler.compare(lhs, rhs, symbols) {
            SampleOutcome::Agree { defined, total } => {
                let confidence = SAMPLED_CONFIDENCE_CAP * defined as f64 / total as f64;
                Verdict::verified(
                    EngineKind::Math,
                    confidence,
                    format!(
                        "{} and {} agree at {} of {} sampled points",
                        lhs, rhs, defined, total
                    ),
                )
            }
            SampleOutcome::Counterexample { point, left, right } => {
                let message = format!(
                    "at {}: {} = {} but {} = {}",
                    format_point(&point),
                    lhs,
                    format_value(left),
                    rhs,
                    format_value(right)
                );
                Verdict::refuted(
                    EngineKind::Math,
                    COUNTEREXAMPLE_CONFIDENCE,
                    format!("counterexample {}", message),
                    Finding::new(Severity::High, "counterexample", message),
                )
            }
            SampleOutcome::NoDefinedPoints { total } => {
                let message = format!(
                    "neither side is defined at any of {} sampled points",
                    total
                );
                Verdict::undetermined(
                    EngineKind::Math,
                    message.clone(),
                    Finding::new(Severity::Info, "undefined-evaluation", message),
                )
            }
        }
    }

    fn compare_numbers(
        &self,
        lhs: &Expr,
        rhs: &Expr,
        claimed: &str,
        tolerance: f64,
    ) -> Result<Verdict> {
        let (computed, close, confidence) = match (self.exact_value(lhs)?, self.exact_value(rhs)?) {
            (Some(a), Some(b)) => {
                let tol = BigRational::from_float(tolerance).unwrap_or_else(BigRational::zero);
                let close = (&a - &b).abs() <= tol;
                (exact_text(&a), close, 1.0)
            }
            _ => {
                let a = eval_f64(lhs, &Bindings::new())?;
                let b = eval_f64(rhs, &Bindings::new())?;
                (format_value(a), (a - b).abs() <= tolerance, APPROXIMATE_CONFIDENCE)
            }
        };
        let claimed = claimed.trim();
        debug!(computed = %computed, claimed, close, "numeric assertion");
        if close {
            Ok(Verdict::verified(
                EngineKind::Math,
                confidence,
                format!(
                    "computed {} matches claimed {} within {}",
                    computed, claimed, tolerance
                ),
            ))
        } else {
            let message = format!("computed {} but claimed {}", computed, claimed);
            Ok(Verdict::refuted(
                EngineKind::Math,
                confidence,
                message.clone(),
                Finding::new(Severity::High, "mismatch", message),
            ))
        }
    }

    fn exact_value(&self, expr: &Expr) -> Result<Option<BigRational>> {
        match self.canon.canonicalize(expr) {
            Ok(poly) => Ok(poly.as_constant()),
            Err(Error::UnsupportedConstruct(_)) | Err(Error::BudgetExhausted { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn verify_roots(&self, claim: &str, expected: &str, ctx: &MathContext) -> Result<Verdict> {
        let (lhs, rhs) = parse_equation(claim, &self.symbols)?;
        let equation = Expr::binary(BinaryOp::Sub, self.reduce(&lhs)?, self.reduce(&rhs)?);
        let var = self.variable(ctx, &equation)?;
        let roots = self.parse_roots(expected, &var)?;

        let mut approximate = false;
        let mut values: Vec<f64> = Vec::with_capacity(roots.len());
        for root in &roots {
            if !root.symbols().is_empty() {
                return Err(Error::unsupported(format!("root {} is not numeric", root)));
            }
            let at_root = substitute(&equation, &var, root);
            match self.exact_value(&at_root)? {
                Some(residual) if residual.is_zero() => {}
                Some(residual) => {
                    let message = format!(
                        "{} = {} leaves {}, not 0",
                        var,
                        root,
                        format_rational(&residual)
                    );
                    return Ok(Verdict::refuted(
                        EngineKind::Math,
                        1.0,
                        message.clone(),
                        Finding::new(Severity::High, "mismatch", message),
                    ));
                }
                None => {
                    approximate = true;
                    let residual = eval_f64(&at_root, &Bindings::new())?;
                    if residual.abs() > ROOT_TOLERANCE {
                        let message = format!(
                            "{} = {} leaves {}, not 0",
                            var,
                            root,
                            format_value(residual)
                        );
                        return Ok(Verdict::refuted(
                            EngineKind::Math,
                            COUNTEREXAMPLE_CONFIDENCE,
                            message.clone(),
                            Finding::new(Severity::High, "mismatch", message),
                        ));
                    }
                }
            }
            let value = eval_f64(root, &Bindings::new())?;
            if !values.iter().any(|v| (v - value).abs() <= ROOT_TOLERANCE) {
                values.push(value);
            }
        }

        let expected_count = self
            .canon
            .canonicalize(&equation)
            .ok()
            .and_then(|poly| poly.coefficients_in(&var))
            .and_then(|coeffs| real_root_count(&coeffs));

        match expected_count {
            Some(RootCount::Every) => Ok(Verdict::verified(
                EngineKind::Math,
                1.0,
                format!("the equation holds for every {}", var),
            )),
            Some(RootCount::Finite(count)) if values.len() < count => {
                let message = format!(
                    "the equation has {} distinct real root(s) but {} given",
                    count,
                    values.len()
                );
                Ok(Verdict::refuted(
                    EngineKind::Math,
                    1.0,
                    message.clone(),
                    Finding::new(Severity::High, "incomplete-solution", message),
                ))
            }
            Some(RootCount::Finite(count)) => Ok(Verdict::verified(
                EngineKind::Math,
                if approximate { COUNTEREXAMPLE_CONFIDENCE } else { 1.0 },
                format!(
                    "all {} root(s) satisfy {} and the root set is complete",
                    count, claim.trim()
                ),
            )),
            None => Ok(Verdict::verified(
                EngineKind::Math,
                PARTIAL_SOLVE_CONFIDENCE,
                format!("every given root satisfies {}", claim.trim()),
            )
            .with_findings([Finding::new(
                Severity::Info,
                "completeness-unchecked",
                "root set completeness is only checked for polynomials of degree 2 or less",
            )])),
        }
    }

    /// Root list such as `2, -2`, `x = 2 or x = -2`, `{1/2}` or `none`
    fn parse_roots(&self, text: &str, var: &str) -> Result<Vec<Expr>> {
        let trimmed = text
            .trim()
            .trim_start_matches(['{', '['])
            .trim_end_matches(['}', ']'])
            .trim();
        let lowered = trimmed.to_ascii_lowercase();
        if trimmed.is_empty()
            || matches!(
                lowered.as_str(),
                "none" | "no solution" | "no solutions" | "no real solution" | "no real solutions"
            )
        {
            return Ok(Vec::new());
        }
        lowered
            .replace(" or ", ",")
            .split(',')
            .map(|part| {
                let value = match part.split_once('=') {
                    Some((name, value)) if name.trim() == var.to_ascii_lowercase() => value,
                    _ => part,
                };
                parse(value, &self.symbols)
            })
            .collect()
    }
}

/// Largest residual accepted for a root that cannot be checked exactly
pub const ROOT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootCount {
    Every,
    Finite(usize),
}

/// Distinct real roots of a polynomial of degree two or less
fn real_root_count(coeffs: &[BigRational]) -> Option<RootCount> {
    let degree = coeffs.iter().rposition(|c| !c.is_zero());
    match degree {
        None => Some(RootCount::Every),
        Some(0) => Some(RootCount::Finite(0)),
        Some(1) => Some(RootCount::Finite(1)),
        Some(2) => {
            let four = BigRational::from_integer(4.into());
            let discriminant = &coeffs[1] * &coeffs[1] - four * &coeffs[2] * &coeffs[0];
            Some(RootCount::Finite(if discriminant.is_positive() {
                2
            } else if discriminant.is_zero() {
                1
            } else {
                0
            }))
        }
        _ => None,
    }
}

/// Exact value as a short decimal when it terminates, otherwise six places
fn exact_text(value: &BigRational) -> String {
    let text = format_rational(value);
    if text.contains('/') {
        format_value(rational_to_f64(value))
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Validity;

    fn engine() -> MathEngine {
        MathEngine::new(MathConfig::default())
    }

    fn check(claim: &str, expected: &str) -> Verdict {
        engine().verify(claim, expected, &MathContext::default())
    }

    #[test]
    fn test_compound_interest() {
        let verdict = check("A = 10000*(1+0.075/4)^(4*5)", "14499.48");
        assert!(verdict.is_verified());
        assert_eq!(verdict.confidence(), 1.0);

        let verdict = check("A = 10000*(1+0.075/4)^(4*5)", "14000.00");
        assert!(verdict.is_refuted());
        assert!(verdict.explanation().contains("14499.48"));
        assert!(verdict.explanation().contains("14000.00"));
    }

    #[test]
    fn test_literal_places_tighten_tolerance() {
        assert!(check("1/3", "0.33").is_verified());
        assert!(check("0.001", "0.004").is_refuted());
    }

    #[test]
    fn test_symbolic_identity() {
        let verdict = check("(x+1)^2", "x^2 + 2x + 1");
        assert!(verdict.is_verified());
        assert_eq!(verdict.confidence(), 1.0);
        assert!(verdict.findings().is_empty());
    }

    #[test]
    fn test_constant_offset_is_refuted_exactly() {
        let verdict = check("(x+1)^2", "x^2 + 2x");
        assert!(verdict.is_refuted());
        assert_eq!(verdict.confidence(), 1.0);
        assert_eq!(verdict.findings()[0].kind(), "mismatch");
    }

    #[test]
    fn test_trig_identity_needs_sampling() {
        let verdict = check("sin(x)^2 + cos(x)^2 + x", "1 + x");
        assert!(verdict.is_verified());
        assert!(verdict.confidence() <= SAMPLED_CONFIDENCE_CAP);
        assert!(verdict.confidence() > 0.9);
    }

    #[test]
    fn test_sampled_counterexample() {
        let verdict = check("sin(x)", "cos(x) * x");
        assert!(verdict.is_refuted());
        assert_eq!(verdict.findings()[0].kind(), "counterexample");
        assert!(verdict.explanation().contains("x = "));
    }

    #[test]
    fn test_derivative_operation() {
        let ctx = MathContext::for_operation(Operation::Derivative);
        let verdict = engine().verify("x^3 + 2x", "3x^2 + 2", &ctx);
        assert!(verdict.is_verified());
        assert_eq!(verdict.confidence(), 1.0);
        assert!(verdict.explanation().starts_with("d/dx("));
    }

    #[test]
    fn test_integral_ignores_constant() {
        let ctx = MathContext::for_operation(Operation::Integral);
        let verdict = engine().verify("2x", "x^2 + C", &ctx);
        assert!(verdict.is_verified());
        let verdict = engine().verify("2x", "x^3", &ctx);
        assert!(verdict.is_refuted());
    }

    #[test]
    fn test_solve_quadratic() {
        let ctx = MathContext::for_operation(Operation::Solve);
        assert!(engine().verify("x^2 = 4", "2, -2", &ctx).is_verified());
        assert!(engine().verify("x^2 = 4", "x = 2 or x = -2", &ctx).is_verified());

        let missing = engine().verify("x^2 = 4", "2", &ctx);
        assert!(missing.is_refuted());
        assert_eq!(missing.findings()[0].kind(), "incomplete-solution");

        let wrong = engine().verify("x^2 = 4", "3", &ctx);
        assert!(wrong.is_refuted());
        assert!(wrong.explanation().contains("leaves 5"));
    }

    #[test]
    fn test_solve_irrational_and_empty() {
        let ctx = MathContext::for_operation(Operation::Solve);
        let verdict = engine().verify("x^2 - 2 = 0", "sqrt(2), -sqrt(2)", &ctx);
        assert!(verdict.is_verified());
        assert!(engine().verify("x^2 + 1 = 0", "none", &ctx).is_verified());
    }

    #[test]
    fn test_solve_higher_degree_is_partial() {
        let ctx = MathContext::for_operation(Operation::Solve);
        let verdict = engine().verify("x^3 - x = 0", "0, 1, -1", &ctx);
        assert!(verdict.is_verified());
        assert_eq!(verdict.confidence(), PARTIAL_SOLVE_CONFIDENCE);
        assert_eq!(verdict.findings()[0].kind(), "completeness-unchecked");
    }

    #[test]
    fn test_errors_are_undetermined() {
        let verdict = check("(x + 1", "x");
        assert_eq!(verdict.valid(), Validity::Undetermined);
        assert_eq!(verdict.findings()[0].kind(), "parse-error");

        let verdict = check("frobnicate(x)", "x");
        assert_eq!(verdict.findings()[0].kind(), "unknown-symbol");

        let verdict = check("1/0", "1");
        assert_eq!(verdict.findings()[0].kind(), "undefined-evaluation");
    }

    #[test]
    fn test_no_defined_points() {
        let verdict = check("sqrt(-1 - x^2)", "x");
        assert!(verdict.is_undetermined());
    }

    #[test]
    fn test_trial_cap() {
        let mut config = MathConfig::default();
        config.max_sample_trials = 5;
        let ctx = MathContext {
            sample_trials: Some(10_000),
            ..Default::default()
        };
        let verdict = MathEngine::new(config).verify("sin(x)^2 + cos(x)^2", "1", &ctx);
        assert!(verdict.explanation().contains("of 5 sampled points"));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::from_name("Derivative"), Some(Operation::Derivative));
        assert_eq!(Operation::from_name("integrate"), Some(Operation::Integral));
        assert_eq!(Operation::from_name("guess"), None);
    }
}
