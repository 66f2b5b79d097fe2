//! Integration tests for the math engine through its public API

use qwed_verify::config::MathConfig;
use qwed_verify::math::{MathContext, MathEngine, Operation};
use qwed_verify::{EngineKind, Validity};

fn engine() -> MathEngine {
    MathEngine::new(MathConfig::default())
}

#[test]
fn test_polynomial_derivative_is_exact() {
    let ctx = MathContext::for_operation(Operation::Derivative);
    let verdict = engine().verify("x^3 + 2x", "3x^2 + 2", &ctx);
    assert_eq!(verdict.valid(), Validity::True);
    assert_eq!(verdict.confidence(), 1.0);
    assert_eq!(verdict.engine(), EngineKind::Math);
}

#[test]
fn test_inline_derivative_claim() {
    let verdict = engine().verify("diff(x^3 + 2x, x)", "3x^2 + 2", &MathContext::default());
    assert!(verdict.is_verified());
}

#[test]
fn test_compound_interest_quarterly() {
    let e = engine();
    let claim = "A = 10000*(1+0.075/4)^(4*5)";
    assert!(e.verify(claim, "14499.48", &MathContext::default()).is_verified());

    let wrong = e.verify(claim, "14000.00", &MathContext::default());
    assert!(wrong.is_refuted());
    assert!(wrong.explanation().contains("14499.48"));
    assert!(wrong.explanation().contains("14000.00"));
}

#[test]
fn test_compound_interest_annual() {
    let verdict = engine().verify("10000*(1+0.075)^5", "14356.29", &MathContext::default());
    assert!(verdict.is_verified());
}

#[test]
fn test_caller_tolerance() {
    let ctx = MathContext {
        tolerance: Some(1.0),
        ..Default::default()
    };
    assert!(engine().verify("10/3", "3.5", &ctx).is_verified());
    assert!(engine().verify("10/3", "5", &ctx).is_refuted());
}

#[test]
fn test_symbolic_equivalence() {
    let e = engine();
    let ctx = MathContext::default();
    assert!(e.verify("(x+1)^2", "x^2 + 2x + 1", &ctx).is_verified());
    assert!(e.verify("(x+1)^2", "x^2 + 2x", &ctx).is_refuted());
    assert!(e.verify("sin(x)^2 + cos(x)^2 + x", "1 + x", &ctx).is_verified());
}

#[test]
fn test_superscript_powers() {
    let e = engine();
    let simplify = MathContext::for_operation(Operation::Simplify);
    let verdict = e.verify("x²", "x^2", &simplify);
    assert_eq!(verdict.valid(), Validity::True);
    assert_eq!(verdict.confidence(), 1.0);

    let derivative = MathContext::for_operation(Operation::Derivative);
    assert!(e.verify("x^3", "3x²", &derivative).is_verified());
    assert!(e.verify("x³", "3x^2", &derivative).is_verified());
}

#[test]
fn test_d_as_a_variable() {
    let e = engine();
    let simplify = MathContext::for_operation(Operation::Simplify);
    assert!(e.verify("a + d", "d + a", &simplify).is_verified());
    assert!(e.verify("2d + d", "3d", &simplify).is_verified());
    assert!(e.verify("a + d", "a - d", &simplify).is_refuted());
}

#[test]
fn test_solve_and_integral() {
    let e = engine();
    let solve = MathContext::for_operation(Operation::Solve);
    assert!(e.verify("x^2 = 4", "2, -2", &solve).is_verified());
    assert!(e.verify("x^2 = 4", "2", &solve).is_refuted());

    let integral = MathContext::for_operation(Operation::Integral);
    assert!(e.verify("2x", "x^2 + C", &integral).is_verified());
}

#[test]
fn test_malformed_claims_are_undetermined() {
    let e = engine();
    let ctx = MathContext::default();
    for (claim, kind) in [
        ("(x + 1", "parse-error"),
        ("frobnicate(x)", "unknown-symbol"),
        ("1/0", "undefined-evaluation"),
    ] {
        let verdict = e.verify(claim, "1", &ctx);
        assert!(verdict.is_undetermined(), "{}", claim);
        assert!(!verdict.explanation().is_empty());
        assert_eq!(verdict.findings()[0].kind(), kind, "{}", claim);
    }
}

#[test]
fn test_verdicts_are_deterministic() {
    let ctx = MathContext::default();
    let a = engine().verify("sin(x)", "cos(x) * x", &ctx);
    let b = engine().verify("sin(x)", "cos(x) * x", &ctx);
    assert_eq!(a, b);
    assert_eq!(a.digest(), b.digest());
    assert_eq!(a.to_json(), b.to_json());
}
