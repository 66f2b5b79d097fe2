//! Integration tests for the dispatch router

use qwed_verify::{
    DispatchError, Dispatcher, ParallelConfig, ToolRegistry, ToolRequest, Validity, VerifierConfig,
};
use serde_json::json;

#[test]
fn test_each_tool_routes_to_its_engine() {
    let d = Dispatcher::default();

    let math = d
        .invoke("math", &json!({"claim": "(x+1)^2", "expected": "x^2 + 2x + 1"}))
        .unwrap();
    assert_eq!(math.engine().as_str(), "math");

    let logic = d
        .invoke(
            "logic",
            &json!({"premises": ["All men are mortal", "Socrates is a man"], "conclusion": "Socrates is mortal"}),
        )
        .unwrap();
    assert_eq!(logic.valid(), Validity::True);

    let code = d
        .invoke("code", &json!({"source": "import os\nos.system(cmd)", "language_hint": "python"}))
        .unwrap();
    assert_eq!(code.valid(), Validity::False);

    let sql = d.invoke("sql", &json!({"query": "SELECT name FROM users WHERE id = ?"})).unwrap();
    assert_eq!(sql.valid(), Validity::True);
}

#[test]
fn test_original_tool_names_and_fields() {
    let d = Dispatcher::default();
    let verdict = d
        .invoke(
            "verify_math",
            &json!({"expression": "10000*(1+0.075/4)^(4*5)", "claimed_result": "14000.00"}),
        )
        .unwrap();
    assert!(verdict.is_refuted());

    let verdict = d
        .invoke("verify_code", &json!({"code": "eval(input())", "language": "python"}))
        .unwrap();
    assert!(verdict.is_refuted());

    let verdict = d
        .invoke("verify_sql", &json!({"query": "SELECT * FROM users", "allowed_tables": ["users"]}))
        .unwrap();
    assert!(verdict.is_verified());
}

#[test]
fn test_dispatch_errors() {
    let d = Dispatcher::default();
    assert!(matches!(d.invoke("verify_weather", &json!({})), Err(DispatchError::UnknownTool(_))));
    assert_eq!(
        d.invoke("logic", &json!({"conclusion": "P"})).err(),
        Some(DispatchError::MissingArgument("premises".to_string()))
    );
    assert!(matches!(
        d.invoke("math", &json!("2+2")),
        Err(DispatchError::MalformedArgument { .. })
    ));
    assert!(matches!(
        d.invoke("math", &json!({"claim": "1", "expected": true})),
        Err(DispatchError::MalformedArgument { .. })
    ));
}

#[test]
fn test_field_and_alias_must_agree() {
    let d = Dispatcher::default();
    assert_eq!(
        d.invoke("math", &json!({"claim": "2+2", "expression": "2+3", "expected": 4})).err(),
        Some(DispatchError::malformed("expression", "conflicts with 'claim'"))
    );
    assert_eq!(
        d.invoke("code", &json!({"source": "x = 1", "code": "eval(input())"})).err(),
        Some(DispatchError::malformed("code", "conflicts with 'source'"))
    );
    let same = d
        .invoke("math", &json!({"claim": "2+2", "expression": "2+2", "expected": 4}))
        .unwrap();
    assert!(same.is_verified());
}

#[test]
fn test_engine_failures_are_verdicts_not_errors() {
    let d = Dispatcher::default();
    let verdict = d
        .invoke("code", &json!({"source": "puts 1", "language_hint": "ruby"}))
        .unwrap();
    assert_eq!(verdict.valid(), Validity::Undetermined);
}

#[test]
fn test_config_flows_into_engines() {
    let config = VerifierConfig::from_json(r#"{"sql": {"block_destructive": false}}"#).unwrap();
    let d = Dispatcher::new(config);
    assert!(d.invoke("sql", &json!({"query": "DROP TABLE users"})).unwrap().is_verified());
}

#[test]
fn test_batch_in_request_order() {
    let d = Dispatcher::with_registry(ToolRegistry::default(), ParallelConfig { max_parallelism: 2 });
    let requests: Vec<ToolRequest> = vec![
        ToolRequest::new("sql", json!({"query": "DROP TABLE users"})),
        ToolRequest::new("logic", json!({"premises": ["P or Q", "not P"], "conclusion": "Q"})),
        ToolRequest::new("missing", json!({})),
    ];
    let results = d.invoke_batch(&requests);
    assert_eq!(results.len(), 3);
    assert!(results[0].as_ref().map(|v| v.is_refuted()).unwrap_or(false));
    assert!(results[1].as_ref().map(|v| v.is_verified()).unwrap_or(false));
    assert!(results[2].is_err());
    assert!(d.invoke_batch(&[]).is_empty());
}

#[test]
fn test_schemas_for_transport() {
    let schemas = ToolRegistry::default().schemas();
    let names: Vec<&str> = schemas
        .as_array()
        .map(|a| a.iter().filter_map(|s| s["name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["code", "logic", "math", "sql"]);
    for schema in schemas.as_array().into_iter().flatten() {
        assert_eq!(schema["inputSchema"]["type"], "object");
    }
}
