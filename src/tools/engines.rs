//! The four engine tools

use crate::code::CodeEngine;
use crate::config::VerifierConfig;
use crate::error::DispatchError;
use crate::logic::LogicEngine;
use crate::math::{MathContext, MathEngine, Operation};
use crate::sql::SqlEngine;
use crate::tools::{DispatchResult, ToolArguments, ToolRegistry, VerificationTool};
use crate::verdict::Verdict;
use serde_json::{json, Value};

/// Register the math, logic, code and sql tools
pub fn register_all(registry: &mut ToolRegistry, config: &VerifierConfig) {
    registry.register(MathTool::new(MathEngine::new(config.math.clone())));
    registry.register(LogicTool::new(LogicEngine::new(config.logic.clone())));
    registry.register(CodeTool::new(CodeEngine::new(config.code.clone())));
    registry.register(SqlTool::new(SqlEngine::new(config.sql.clone())));
}

/// Checks a claimed math result
///
/// Arguments: `claim` (or `expression`), `expected` (or `claimed_result`,
/// text or number), and optionally `tolerance`, `sample_trials`, `operation`
/// and `variable`.
pub struct MathTool {
    engine: MathEngine,
}

impl MathTool {
    /// Wrap an engine
    pub fn new(engine: MathEngine) -> Self {
        MathTool { engine }
    }
}

impl VerificationTool for MathTool {
    fn name(&self) -> &str {
        "math"
    }

    fn description(&self) -> &str {
        "Verify that a math expression equals, simplifies to, differentiates to, integrates to or solves to an expected result"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "claim": {"type": "string", "description": "Expression or equation to check"},
                "expected": {"type": ["string", "number"], "description": "Claimed result"},
                "tolerance": {"type": "number", "minimum": 0},
                "sample_trials": {"type": "integer", "minimum": 1},
                "operation": {
                    "type": "string",
                    "enum": ["evaluate", "simplify", "derivative", "integral", "solve"]
                },
                "variable": {"type": "string"}
            },
            "required": ["claim", "expected"]
        })
    }

    fn accepted_fields(&self) -> &[&'static str] {
        &[
            "claim",
            "expression",
            "expected",
            "claimed_result",
            "tolerance",
            "sample_trials",
            "operation",
            "variable",
        ]
    }

    fn invoke(&self, args: &ToolArguments) -> DispatchResult<Verdict> {
        let claim = args.text(&["claim", "expression"])?;
        let expected = args.text_or_number(&["expected", "claimed_result"])?;

        let operation = match args.optional_text(&["operation"])? {
            Some(name) => Operation::from_name(name).ok_or_else(|| {
                DispatchError::malformed("operation", format!("unknown operation '{}'", name))
            })?,
            None => Operation::default(),
        };
        let ctx = MathContext {
            operation,
            variable: args.optional_text(&["variable"])?.map(str::to_string),
            tolerance: args.optional_f64("tolerance")?,
            sample_trials: args.optional_count("sample_trials")?,
        };
        Ok(self.engine.verify(claim, &expected, &ctx))
    }
}

/// Checks that premises entail a conclusion
pub struct LogicTool {
    engine: LogicEngine,
}

impl LogicTool {
    /// Wrap an engine
    pub fn new(engine: LogicEngine) -> Self {
        LogicTool { engine }
    }
}

impl VerificationTool for LogicTool {
    fn name(&self) -> &str {
        "logic"
    }

    fn description(&self) -> &str {
        "Verify that a conclusion follows from a list of premises written in controlled English"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "premises": {"type": "array", "items": {"type": "string"}},
                "conclusion": {"type": "string"}
            },
            "required": ["premises", "conclusion"]
        })
    }

    fn accepted_fields(&self) -> &[&'static str] {
        &["premises", "conclusion"]
    }

    fn invoke(&self, args: &ToolArguments) -> DispatchResult<Verdict> {
        let premises = args.text_list("premises")?;
        let conclusion = args.text(&["conclusion"])?;
        Ok(self.engine.verify(&premises, conclusion))
    }
}

/// Scans source code for dangerous capabilities
pub struct CodeTool {
    engine: CodeEngine,
}

impl CodeTool {
    /// Wrap an engine
    pub fn new(engine: CodeEngine) -> Self {
        CodeTool { engine }
    }
}

impl VerificationTool for CodeTool {
    fn name(&self) -> &str {
        "code"
    }

    fn description(&self) -> &str {
        "Scan Python or JavaScript source for command execution, dynamic evaluation, unsafe deserialization and injection"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {"type": "string"},
                "language_hint": {"type": "string", "enum": ["python", "javascript"]}
            },
            "required": ["source"]
        })
    }

    fn accepted_fields(&self) -> &[&'static str] {
        &["source", "code", "language_hint", "language"]
    }

    fn invoke(&self, args: &ToolArguments) -> DispatchResult<Verdict> {
        let source = args.text(&["source", "code"])?;
        let hint = args.optional_text(&["language_hint", "language"])?;
        Ok(self.engine.scan(source, hint))
    }
}

/// Scans a SQL query for injection signatures
pub struct SqlTool {
    engine: SqlEngine,
}

impl SqlTool {
    /// Wrap an engine
    pub fn new(engine: SqlEngine) -> Self {
        SqlTool { engine }
    }
}

impl VerificationTool for SqlTool {
    fn name(&self) -> &str {
        "sql"
    }

    fn description(&self) -> &str {
        "Scan a SQL query for injection signatures and destructive statements"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "allowed_tables": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["query"]
        })
    }

    fn accepted_fields(&self) -> &[&'static str] {
        &["query", "allowed_tables"]
    }

    fn invoke(&self, args: &ToolArguments) -> DispatchResult<Verdict> {
        let query = args.text(&["query"])?;
        Ok(match args.optional_text_list("allowed_tables")? {
            Some(tables) => self.engine.scan_with_tables(query, &tables),
            None => self.engine.scan(query),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerifierConfig;
    use crate::verdict::EngineKind;

    fn args(value: Value) -> ToolArguments {
        ToolArguments::from_value(&value).unwrap()
    }

    #[test]
    fn test_math_tool() {
        let tool = MathTool::new(MathEngine::new(VerifierConfig::default().math));
        let v = tool
            .invoke(&args(json!({"expression": "2 + 2", "claimed_result": 4})))
            .unwrap();
        assert!(v.is_verified());
        assert_eq!(v.engine(), EngineKind::Math);

        let v = tool
            .invoke(&args(json!({"claim": "x^3", "expected": "3x^2", "operation": "derivative"})))
            .unwrap();
        assert!(v.is_verified());

        assert!(matches!(
            tool.invoke(&args(json!({"claim": "x", "expected": "x", "operation": "guess"}))),
            Err(DispatchError::MalformedArgument { .. })
        ));
        assert_eq!(
            tool.invoke(&args(json!({"claim": "x"}))).err(),
            Some(DispatchError::MissingArgument("expected".to_string()))
        );
    }

    #[test]
    fn test_logic_tool() {
        let tool = LogicTool::new(LogicEngine::new(VerifierConfig::default().logic));
        let v = tool
            .invoke(&args(json!({
                "premises": ["All men are mortal", "Socrates is a man"],
                "conclusion": "Socrates is mortal"
            })))
            .unwrap();
        assert!(v.is_verified());
        assert!(tool
            .invoke(&args(json!({"premises": "All men are mortal", "conclusion": "x"})))
            .is_err());
    }

    #[test]
    fn test_code_tool_accepts_original_field_names() {
        let tool = CodeTool::new(CodeEngine::new(VerifierConfig::default().code));
        let v = tool
            .invoke(&args(json!({"code": "eval(input())", "language": "python"})))
            .unwrap();
        assert!(v.is_refuted());
    }

    #[test]
    fn test_sql_tool_allowed_tables() {
        let tool = SqlTool::new(SqlEngine::new(VerifierConfig::default().sql));
        let v = tool
            .invoke(&args(json!({"query": "SELECT * FROM users", "allowed_tables": ["orders"]})))
            .unwrap();
        assert!(v.is_refuted());
        let v = tool.invoke(&args(json!({"query": "SELECT * FROM users"}))).unwrap();
        assert!(v.is_verified());
    }
}
