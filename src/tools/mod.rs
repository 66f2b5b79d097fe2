//! Dispatch router
//!
//! Each engine is exposed as a [`VerificationTool`] with a closed argument
//! schema. The [`ToolRegistry`] maps tool names to tools and the
//! [`Dispatcher`] routes JSON invocations, alone or in batches.

pub mod dispatch;
pub mod engines;

pub use dispatch::{Dispatcher, ToolRequest};

use crate::config::VerifierConfig;
use crate::error::DispatchError;
use crate::verdict::Verdict;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Result type for dispatch operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// A verification engine exposed to callers by name
pub trait VerificationTool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description
    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn input_schema(&self) -> Value;

    /// Argument names the tool accepts, aliases included
    fn accepted_fields(&self) -> &[&'static str];

    /// Run the engine on already-checked arguments
    fn invoke(&self, args: &ToolArguments) -> DispatchResult<Verdict>;
}

/// Named arguments of one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    fields: Map<String, Value>,
}

impl ToolArguments {
    /// Wrap a JSON arguments object
    pub fn from_value(value: &Value) -> DispatchResult<Self> {
        match value {
            Value::Object(fields) => Ok(ToolArguments {
                fields: fields.clone(),
            }),
            Value::Null => Ok(ToolArguments::default()),
            other => Err(DispatchError::malformed(
                "arguments",
                format!("expected a JSON object, got {}", type_name(other)),
            )),
        }
    }

    /// Reject any field outside `accepted`
    pub fn check_fields(&self, accepted: &[&str]) -> DispatchResult<()> {
        match self.fields.keys().find(|k| !accepted.contains(&k.as_str())) {
            Some(unknown) => Err(DispatchError::malformed(unknown.as_str(), "unknown argument")),
            None => Ok(()),
        }
    }

    /// First non-null value among `names`, with the name it was found under
    ///
    /// A field and its alias may both be given only with equal values.
    fn lookup<'a>(&self, names: &[&'a str]) -> DispatchResult<Option<(&'a str, &Value)>> {
        let mut present = names.iter().filter_map(|name| match self.fields.get(*name) {
            Some(Value::Null) | None => None,
            Some(value) => Some((*name, value)),
        });
        let first = match present.next() {
            Some(first) => first,
            None => return Ok(None),
        };
        match present.find(|(_, value)| *value != first.1) {
            Some((alias, _)) => Err(DispatchError::malformed(
                alias,
                format!("conflicts with '{}'", first.0),
            )),
            None => Ok(Some(first)),
        }
    }

    /// Required text argument; `names` lists the field and its aliases
    pub fn text(&self, names: &[&str]) -> DispatchResult<&str> {
        self.optional_text(names)?
            .ok_or_else(|| DispatchError::MissingArgument(primary(names)))
    }

    /// Optional text argument
    pub fn optional_text(&self, names: &[&str]) -> DispatchResult<Option<&str>> {
        match self.lookup(names)? {
            None => Ok(None),
            Some((_, Value::String(s))) => Ok(Some(s.as_str())),
            Some((name, other)) => Err(DispatchError::malformed(
                name,
                format!("expected a string, got {}", type_name(other)),
            )),
        }
    }

    /// Required argument given as text or as a JSON number
    pub fn text_or_number(&self, names: &[&str]) -> DispatchResult<String> {
        match self.lookup(names)? {
            None => Err(DispatchError::MissingArgument(primary(names))),
            Some((_, Value::String(s))) => Ok(s.clone()),
            Some((_, Value::Number(n))) => Ok(n.to_string()),
            Some((name, other)) => Err(DispatchError::malformed(
                name,
                format!("expected a string or number, got {}", type_name(other)),
            )),
        }
    }

    /// Required array of strings
    pub fn text_list(&self, name: &str) -> DispatchResult<Vec<String>> {
        self.optional_text_list(name)?
            .ok_or_else(|| DispatchError::MissingArgument(name.to_string()))
    }

    /// Optional array of strings
    pub fn optional_text_list(&self, name: &str) -> DispatchResult<Option<Vec<String>>> {
        let items = match self.lookup(&[name])? {
            None => return Ok(None),
            Some((_, Value::Array(items))) => items,
            Some((_, other)) => {
                return Err(DispatchError::malformed(
                    name,
                    format!("expected an array of strings, got {}", type_name(other)),
                ))
            }
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(DispatchError::malformed(
                    name,
                    format!("element {} is {}, expected a string", i, type_name(other)),
                )),
            })
            .collect::<DispatchResult<Vec<String>>>()
            .map(Some)
    }

    /// Optional non-negative number
    pub fn optional_f64(&self, name: &str) -> DispatchResult<Option<f64>> {
        match self.lookup(&[name])? {
            None => Ok(None),
            Some((_, Value::Number(n))) => match n.as_f64() {
                Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
                _ => Err(DispatchError::malformed(name, "expected a non-negative number")),
            },
            Some((_, other)) => Err(DispatchError::malformed(
                name,
                format!("expected a number, got {}", type_name(other)),
            )),
        }
    }

    /// Optional positive integer
    pub fn optional_count(&self, name: &str) -> DispatchResult<Option<usize>> {
        match self.lookup(&[name])? {
            None => Ok(None),
            Some((_, Value::Number(n))) => match n.as_u64() {
                Some(v) if v > 0 => Ok(Some(v as usize)),
                _ => Err(DispatchError::malformed(name, "expected a positive integer")),
            },
            Some((_, other)) => Err(DispatchError::malformed(
                name,
                format!("expected a positive integer, got {}", type_name(other)),
            )),
        }
    }
}

fn primary(names: &[&str]) -> String {
    names.first().copied().unwrap_or("argument").to_string()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Tool registry
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn VerificationTool>>,
}

impl ToolRegistry {
    /// Registry holding the four engines, configured from `config`
    pub fn new(config: &VerifierConfig) -> Self {
        let mut registry = ToolRegistry::empty();
        engines::register_all(&mut registry, config);
        registry
    }

    /// Create empty registry
    pub fn empty() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool of the same name
    pub fn register<T: VerificationTool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    ///
    /// Falls back to a case-insensitive match, then to the name without a
    /// `verify_` prefix, so `verify_sql` and `SQL` both reach `sql`.
    pub fn get(&self, name: &str) -> DispatchResult<Arc<dyn VerificationTool>> {
        if let Some(tool) = self.tools.get(name) {
            return Ok(Arc::clone(tool));
        }

        let name_lower = name.trim().to_lowercase();
        let bare = name_lower.strip_prefix("verify_").unwrap_or(&name_lower);
        for (key, tool) in &self.tools {
            let key = key.to_lowercase();
            if key == name_lower || key == bare {
                return Ok(Arc::clone(tool));
            }
        }

        Err(DispatchError::UnknownTool(name.to_string()))
    }

    /// Check if a tool is reachable under `name`
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// All tool names, sorted
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get tool count
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// One `{name, description, inputSchema}` object per tool, sorted by name
    pub fn schemas(&self) -> Value {
        let schemas: Vec<Value> = self
            .list_tools()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect();
        Value::Array(schemas)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(&VerifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::EngineKind;

    struct EchoTool;

    impl VerificationTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Accepts any text"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        fn accepted_fields(&self) -> &[&'static str] {
            &["text"]
        }

        fn invoke(&self, args: &ToolArguments) -> DispatchResult<Verdict> {
            let text = args.text(&["text"])?;
            Ok(Verdict::verified(EngineKind::Math, 1.0, text))
        }
    }

    #[test]
    fn test_tool_registration() {
        let mut registry = ToolRegistry::empty();
        registry.register(EchoTool);

        assert!(registry.has("echo"));
        assert!(registry.has("ECHO"));
        assert!(registry.has("verify_echo"));
        assert!(!registry.has("unknown"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_standard_registry() {
        let registry = ToolRegistry::default();
        assert_eq!(registry.list_tools(), vec!["code", "logic", "math", "sql"]);
        let schemas = registry.schemas();
        assert_eq!(schemas.as_array().map(|a| a.len()), Some(4));
        assert_eq!(schemas[3]["name"], "sql");
        assert_eq!(schemas[3]["inputSchema"]["required"], json!(["query"]));
    }

    #[test]
    fn test_argument_getters() {
        let args = ToolArguments::from_value(&json!({
            "expression": "2+2",
            "expected": 4,
            "premises": ["a", "b"],
            "tolerance": 0.01,
            "sample_trials": 10,
            "language": null,
        }))
        .unwrap();

        assert_eq!(args.text(&["claim", "expression"]).unwrap(), "2+2");
        assert_eq!(args.text_or_number(&["expected"]).unwrap(), "4");
        assert_eq!(args.text_list("premises").unwrap(), vec!["a", "b"]);
        assert_eq!(args.optional_f64("tolerance").unwrap(), Some(0.01));
        assert_eq!(args.optional_count("sample_trials").unwrap(), Some(10));
        assert_eq!(args.optional_text(&["language"]).unwrap(), None);
        assert_eq!(
            args.text(&["conclusion"]),
            Err(DispatchError::MissingArgument("conclusion".to_string()))
        );
    }

    #[test]
    fn test_conflicting_aliases() {
        let args = ToolArguments::from_value(&json!({
            "claim": "2+2",
            "expression": "2+3",
            "code": "x = 1",
            "source": "x = 1",
        }))
        .unwrap();
        assert_eq!(
            args.text(&["claim", "expression"]),
            Err(DispatchError::malformed("expression", "conflicts with 'claim'"))
        );
        assert_eq!(args.text(&["source", "code"]).unwrap(), "x = 1");
    }

    #[test]
    fn test_malformed_arguments() {
        assert!(ToolArguments::from_value(&json!([1, 2])).is_err());

        let args = ToolArguments::from_value(&json!({
            "premises": ["a", 3],
            "tolerance": -1,
            "sample_trials": 0,
            "query": 7,
        }))
        .unwrap();
        assert!(matches!(
            args.text_list("premises"),
            Err(DispatchError::MalformedArgument { .. })
        ));
        assert!(args.optional_f64("tolerance").is_err());
        assert!(args.optional_count("sample_trials").is_err());
        assert!(args.text(&["query"]).is_err());
        assert_eq!(
            args.check_fields(&["premises", "tolerance", "sample_trials"]),
            Err(DispatchError::malformed("query", "unknown argument"))
        );
    }
}
