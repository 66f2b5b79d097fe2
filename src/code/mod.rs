//! Static Code-Risk Engine
//!
//! Scans Python or JavaScript source without running it. The source is
//! tokenized ([`scanner`]), split into statements and parsed into a shallow
//! syntax tree ([`syntax`]), then walked once in source order ([`walker`])
//! while calls are resolved through imports and aliases and looked up in the
//! per-language capability table ([`tables`]).
//!
//! # Example
//!
//! ```
//! use qwed_verify::code::CodeEngine;
//! use qwed_verify::config::CodeConfig;
//!
//! let engine = CodeEngine::new(CodeConfig::default());
//! let verdict = engine.scan("import os\nos.system(f\"ping {host}\")", Some("python"));
//! assert!(verdict.is_refuted());
//! ```

pub mod scanner;
pub mod syntax;
pub mod tables;
pub mod walker;

use crate::config::CodeConfig;
use crate::error::{Error, Result};
use crate::verdict::{EngineKind, Finding, Severity, Verdict};
use scanner::SourceScanner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tables::CapabilityTable;
use tracing::debug;
use walker::Walker;

/// Confidence when a finding rejects the code
pub const REJECT_CONFIDENCE: f64 = 1.0;

/// Confidence when nothing rejects; static analysis cannot prove absence
pub const PASS_CONFIDENCE: f64 = 0.9;

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python 3
    Python,
    /// JavaScript, including Node.js modules
    JavaScript,
}

impl Language {
    /// Look up a language from a caller hint
    pub fn from_hint(hint: &str) -> Result<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "python" | "py" | "python3" => Ok(Language::Python),
            "javascript" | "js" | "node" | "nodejs" | "mjs" | "cjs" => Ok(Language::JavaScript),
            _ => Err(Error::UnsupportedLanguage {
                language: hint.to_string(),
            }),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
        }
    }
}

/// Static code-risk engine
#[derive(Debug, Clone)]
pub struct CodeEngine {
    config: CodeConfig,
    python: Arc<CapabilityTable>,
    javascript: Arc<CapabilityTable>,
}

impl CodeEngine {
    /// Creates an engine over the shared capability tables
    pub fn new(config: CodeConfig) -> Self {
        CodeEngine {
            config,
            python: CapabilityTable::for_language(Language::Python),
            javascript: CapabilityTable::for_language(Language::JavaScript),
        }
    }

    /// Replace the capability table for the table's language
    pub fn with_table(mut self, table: CapabilityTable) -> Self {
        match table.language() {
            Language::Python => self.python = Arc::new(table),
            Language::JavaScript => self.javascript = Arc::new(table),
        }
        self
    }

    /// Engine configuration
    pub fn config(&self) -> &CodeConfig {
        &self.config
    }

    /// Scan `source`; errors become `undetermined`
    pub fn scan(&self, source: &str, language_hint: Option<&str>) -> Verdict {
        match self.try_scan(source, language_hint) {
            Ok(verdict) => verdict,
            Err(err) => Verdict::undetermined_from(EngineKind::Code, &err),
        }
    }

    fn try_scan(&self, source: &str, language_hint: Option<&str>) -> Result<Verdict> {
        let language = Language::from_hint(language_hint.unwrap_or(&self.config.default_language))?;
        let table = match language {
            Language::Python => &self.python,
            Language::JavaScript => &self.javascript,
        };

        let (tokens, issues) = SourceScanner::new(source, language).scan();
        let program = syntax::parse_program(&tokens, language);
        let findings = Walker::new(table, self.config.report_imports).walk(&program);
        let rejected = findings.iter().any(|f| f.severity().rejects());
        debug!(
            %language,
            statements = program.len(),
            findings = findings.len(),
            syntax_issues = issues.len(),
            "code scan"
        );

        if let Some(issue) = issues.first() {
            let syntax = Finding::at(
                Severity::Info,
                "syntax-error",
                issue.location,
                issue.message.clone(),
            );
            if !rejected {
                return Ok(Verdict::undetermined(
                    EngineKind::Code,
                    format!(
                        "source does not parse as {} ({} at {}); no rejecting finding",
                        language, issue.message, issue.location
                    ),
                    syntax,
                )
                .with_findings(findings));
            }
            let mut findings = findings;
            findings.push(syntax);
            return Ok(Verdict::from_findings(
                EngineKind::Code,
                REJECT_CONFIDENCE,
                findings,
            ));
        }

        let confidence = if rejected {
            REJECT_CONFIDENCE
        } else {
            PASS_CONFIDENCE
        };
        Ok(Verdict::from_findings(EngineKind::Code, confidence, findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::tables::{Capability, Sink};
    use crate::verdict::Validity;

    fn engine() -> CodeEngine {
        CodeEngine::new(CodeConfig::default())
    }

    #[test]
    fn test_command_injection_rejected() {
        let v = engine().scan(
            "import subprocess\nsubprocess.run(\"tar czf \" + name, shell=True)",
            Some("py"),
        );
        assert!(v.is_refuted());
        assert_eq!(v.confidence(), 1.0);
        assert_eq!(v.max_severity(), Some(Severity::Critical));
    }

    #[test]
    fn test_clean_code_passes() {
        let v = engine().scan("import json\nprint(json.dumps({'a': 1}))", None);
        assert!(v.is_verified());
        assert_eq!(v.confidence(), PASS_CONFIDENCE);
        assert!(v.findings().is_empty());
    }

    #[test]
    fn test_advisories_do_not_reject() {
        let v = engine().scan("import os\nprint(os.getcwd())", Some("python"));
        assert_eq!(v.valid(), Validity::True);
        assert_eq!(v.findings()[0].kind(), "dangerous-import");
    }

    #[test]
    fn test_unsupported_language() {
        let v = engine().scan("puts 1", Some("ruby"));
        assert!(v.is_undetermined());
        assert_eq!(v.findings()[0].kind(), "unsupported-language");
    }

    #[test]
    fn test_syntax_errors() {
        let v = engine().scan("print('unterminated", Some("python"));
        assert!(v.is_undetermined());
        assert_eq!(v.findings()[0].kind(), "syntax-error");

        let v = engine().scan("eval(input()\n", Some("python"));
        assert!(v.is_refuted());
        assert_eq!(v.findings().last().map(|f| f.kind()), Some("syntax-error"));
    }

    #[test]
    fn test_custom_table() {
        let table = CapabilityTable::for_language(Language::JavaScript).with_entry(
            "fetch",
            Capability::new(Severity::High, "network-call", Sink::None),
        );
        let engine = engine().with_table(table);
        assert!(engine.scan("fetch(url)", Some("js")).is_refuted());
        assert!(CodeEngine::new(CodeConfig::default())
            .scan("fetch(url)", Some("js"))
            .is_verified());
    }

    #[test]
    fn test_report_imports_can_be_disabled() {
        let engine = CodeEngine::new(CodeConfig {
            report_imports: false,
            ..CodeConfig::default()
        });
        let v = engine.scan("import os", Some("python"));
        assert!(v.findings().is_empty());
    }
}
