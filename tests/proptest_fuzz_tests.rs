//! Property-based tests for the verification engines
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. No engine panics on arbitrary input
//! 2. Identical inputs give identical verdicts
//! 3. Polynomial derivatives are confirmed exactly

use proptest::prelude::*;
use qwed_verify::code::CodeEngine;
use qwed_verify::config::{CodeConfig, LogicConfig, MathConfig, SqlConfig};
use qwed_verify::logic::LogicEngine;
use qwed_verify::math::{MathContext, MathEngine, Operation};
use qwed_verify::sql::SqlEngine;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Generate random strings that might break scanners
fn arbitrary_source_string() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[\x00-\x7F]{0,200}").unwrap()
}

/// Generate expression-like token soup
fn expression_like_string() -> impl Strategy<Value = String> {
    prop::collection::vec(expression_token(), 0..30).prop_map(|tokens| tokens.join(" "))
}

fn expression_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("(".to_string()),
        Just(")".to_string()),
        Just("+".to_string()),
        Just("-".to_string()),
        Just("*".to_string()),
        Just("/".to_string()),
        Just("^".to_string()),
        Just("=".to_string()),
        Just(",".to_string()),
        Just("x".to_string()),
        Just("y".to_string()),
        Just("sin".to_string()),
        Just("sqrt".to_string()),
        Just("diff".to_string()),
        (-100i64..100i64).prop_map(|n| n.to_string()),
        (0.0f64..100.0f64).prop_map(|f| format!("{:.3}", f)),
    ]
}

/// Generate plain data that can sit inside a SQL string literal
fn literal_text() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-zA-Z0-9 ;=-]{0,40}").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn math_never_panics(claim in expression_like_string(), expected in expression_like_string()) {
        let engine = MathEngine::new(MathConfig::default());
        let verdict = engine.verify(&claim, &expected, &MathContext::default());
        prop_assert!((0.0..=1.0).contains(&verdict.confidence()));
    }

    #[test]
    fn math_is_deterministic(claim in expression_like_string()) {
        let engine = MathEngine::new(MathConfig::default());
        let a = engine.verify(&claim, "x", &MathContext::default());
        let b = engine.verify(&claim, "x", &MathContext::default());
        prop_assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn quadratic_derivatives_are_exact(a in -20i64..20, b in -20i64..20, c in -20i64..20) {
        let engine = MathEngine::new(MathConfig::default());
        let ctx = MathContext::for_operation(Operation::Derivative);
        let claim = format!("({})*x^2 + ({})*x + ({})", a, b, c);
        let expected = format!("({})*x + ({})", 2 * a, b);
        let verdict = engine.verify(&claim, &expected, &ctx);
        prop_assert!(verdict.is_verified(), "{} -> {}: {}", claim, expected, verdict.explanation());
        prop_assert_eq!(verdict.confidence(), 1.0);
    }

    #[test]
    fn logic_never_panics(premise in arbitrary_source_string(), conclusion in arbitrary_source_string()) {
        let engine = LogicEngine::new(LogicConfig::default());
        let verdict = engine.verify(&[premise], &conclusion);
        prop_assert!((0.0..=1.0).contains(&verdict.confidence()));
        prop_assert!(verdict.is_verified() || !verdict.explanation().is_empty());
    }

    #[test]
    fn code_never_panics(source in arbitrary_source_string()) {
        let engine = CodeEngine::new(CodeConfig::default());
        let py = engine.scan(&source, Some("python"));
        let js = engine.scan(&source, Some("javascript"));
        prop_assert_eq!(py.clone(), engine.scan(&source, Some("python")));
        prop_assert_eq!(js.clone(), engine.scan(&source, Some("javascript")));
    }

    #[test]
    fn sql_never_panics(query in arbitrary_source_string()) {
        let engine = SqlEngine::new(SqlConfig::default());
        let verdict = engine.scan(&query);
        if verdict.is_refuted() {
            prop_assert!(!verdict.findings().is_empty());
        }
    }

    #[test]
    fn sql_literal_contents_are_data(text in literal_text()) {
        let engine = SqlEngine::new(SqlConfig::default());
        let query = format!("SELECT * FROM notes WHERE body = '{}'", text);
        let verdict = engine.scan(&query);
        prop_assert!(verdict.is_verified(), "{}", verdict.explanation());
    }
}
