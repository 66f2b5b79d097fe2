//! Verdict model shared by every engine
//!
//! A [`Verdict`] is the only thing an engine ever returns. It serializes to a
//! fixed-order JSON document, so two verdicts built from the same input are
//! byte-identical and share the same [`Verdict::digest`].

use crate::error::Error;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Tri-state outcome of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validity {
    /// The claim holds
    True,
    /// The claim was refuted or rejected
    False,
    /// The claim could not be decided
    Undetermined,
}

impl Serialize for Validity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Validity::True => serializer.serialize_bool(true),
            Validity::False => serializer.serialize_bool(false),
            Validity::Undetermined => serializer.serialize_str("undetermined"),
        }
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Validity::True => write!(f, "true"),
            Validity::False => write!(f, "false"),
            Validity::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Finding severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational note
    Info,
    /// Advisory
    Low,
    /// Advisory, worth a look
    Medium,
    /// Rejects the claim
    High,
    /// Rejects the claim
    Critical,
}

impl Severity {
    /// Severities at or above this level make a verdict `false`
    pub const REJECT_THRESHOLD: Severity = Severity::High;

    /// Returns true if a finding of this severity rejects the claim
    pub fn rejects(self) -> bool {
        self >= Self::REJECT_THRESHOLD
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Engine that produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Math verification engine
    Math,
    /// Logic verification engine
    Logic,
    /// Static code-risk engine
    Code,
    /// SQL injection engine
    Sql,
}

impl EngineKind {
    /// Lowercase engine name, also used as the tool name
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Math => "math",
            EngineKind::Logic => "logic",
            EngineKind::Code => "code",
            EngineKind::Sql => "sql",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source position of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
    /// Byte offset from the start of the input
    pub offset: usize,
}

impl Location {
    /// Compute line and column for a byte offset into `text`
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (idx, ch) in text.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Location {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single issue detected by an engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    severity: Severity,
    kind: String,
    location: Option<Location>,
    message: String,
}

impl Finding {
    /// Creates a finding without a location
    pub fn new(severity: Severity, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Finding {
            severity,
            kind: kind.into(),
            location: None,
            message: message.into(),
        }
    }

    /// Creates a finding anchored at a source location
    pub fn at(
        severity: Severity,
        kind: impl Into<String>,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Finding {
            severity,
            kind: kind.into(),
            location: Some(location),
            message: message.into(),
        }
    }

    /// Severity of the finding
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Short kind tag, e.g. `os-command-exec`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Location, when the engine can point at one
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "[{}] {} at {}: {}",
                self.severity, self.kind, loc, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.severity, self.kind, self.message),
        }
    }
}

/// Structured, deterministic result of one verification call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    valid: Validity,
    confidence: f64,
    explanation: String,
    findings: Vec<Finding>,
    engine: EngineKind,
}

impl Verdict {
    /// A claim that holds
    pub fn verified(engine: EngineKind, confidence: f64, explanation: impl Into<String>) -> Self {
        Verdict {
            valid: Validity::True,
            confidence: clamp_confidence(confidence),
            explanation: explanation.into(),
            findings: Vec::new(),
            engine,
        }
    }

    /// A claim that was refuted; `finding` records why
    pub fn refuted(
        engine: EngineKind,
        confidence: f64,
        explanation: impl Into<String>,
        finding: Finding,
    ) -> Self {
        Verdict {
            valid: Validity::False,
            confidence: clamp_confidence(confidence),
            explanation: non_empty(explanation.into(), "claim refuted"),
            findings: vec![finding],
            engine,
        }
    }

    /// A claim that could not be decided; `finding` records why
    pub fn undetermined(
        engine: EngineKind,
        explanation: impl Into<String>,
        finding: Finding,
    ) -> Self {
        Verdict {
            valid: Validity::Undetermined,
            confidence: 0.0,
            explanation: non_empty(explanation.into(), "claim could not be decided"),
            findings: vec![finding],
            engine,
        }
    }

    /// Recover an engine error into an `undetermined` verdict
    pub fn undetermined_from(engine: EngineKind, err: &Error) -> Self {
        tracing::warn!(engine = engine.as_str(), error = %err, "recovered engine error");
        let message = err.to_string();
        Verdict::undetermined(
            engine,
            message.clone(),
            Finding::new(Severity::Info, err.kind_tag(), message),
        )
    }

    /// Aggregate scanner findings: `false` if any finding rejects, otherwise `true`
    ///
    /// The explanation lists every finding in the order given.
    pub fn from_findings(engine: EngineKind, confidence: f64, findings: Vec<Finding>) -> Self {
        let rejected = findings.iter().any(|f| f.severity.rejects());
        let explanation = if findings.is_empty() {
            "no issues detected".to_string()
        } else {
            let lines: Vec<String> = findings.iter().map(|f| f.to_string()).collect();
            let lead = if rejected {
                "rejected"
            } else {
                "accepted with advisories"
            };
            format!("{}: {}", lead, lines.join("; "))
        };
        Verdict {
            valid: if rejected {
                Validity::False
            } else {
                Validity::True
            },
            confidence: clamp_confidence(confidence),
            explanation,
            findings,
            engine,
        }
    }

    /// Append additional findings, preserving order
    pub fn with_findings(mut self, findings: impl IntoIterator<Item = Finding>) -> Self {
        self.findings.extend(findings);
        self
    }

    /// Prepend context to the explanation, as in `d/dx(f) = g; ...`
    pub fn prefixed(mut self, context: impl AsRef<str>) -> Self {
        self.explanation = format!("{}; {}", context.as_ref(), self.explanation);
        self
    }

    /// Tri-state outcome
    pub fn valid(&self) -> Validity {
        self.valid
    }

    /// Returns true if the claim holds
    pub fn is_verified(&self) -> bool {
        self.valid == Validity::True
    }

    /// Returns true if the claim was refuted or rejected
    pub fn is_refuted(&self) -> bool {
        self.valid == Validity::False
    }

    /// Returns true if the claim could not be decided
    pub fn is_undetermined(&self) -> bool {
        self.valid == Validity::Undetermined
    }

    /// Confidence in `[0.0, 1.0]`
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Explanation text
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Findings in the order the engine produced them
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Producing engine
    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Highest finding severity, if any
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// Canonical JSON encoding
    pub fn to_json(&self) -> String {
        // Only strings, numbers and enums are serialized, so this cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Lowercase hex SHA-256 of [`Verdict::to_json`]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} valid={} confidence={:.2}: {}",
            self.engine, self.valid, self.confidence, self.explanation
        )
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn non_empty(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_serializes_tri_state() {
        assert_eq!(serde_json::to_string(&Validity::True).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Validity::False).unwrap(), "false");
        assert_eq!(
            serde_json::to_string(&Validity::Undetermined).unwrap(),
            "\"undetermined\""
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High.rejects());
        assert!(!Severity::Medium.rejects());
        assert!(Severity::Info < Severity::Low);
    }

    #[test]
    fn test_refuted_requires_explanation() {
        let v = Verdict::refuted(
            EngineKind::Math,
            1.0,
            "   ",
            Finding::new(Severity::High, "value-mismatch", "2 != 3"),
        );
        assert!(v.is_refuted());
        assert!(!v.explanation().trim().is_empty());
        assert_eq!(v.findings().len(), 1);
    }

    #[test]
    fn test_from_findings_aggregation() {
        let advisory = vec![Finding::new(Severity::Medium, "dynamic-call-unresolved", "x")];
        let v = Verdict::from_findings(EngineKind::Code, 0.9, advisory);
        assert!(v.is_verified());
        assert_eq!(v.findings().len(), 1);

        let blocking = vec![
            Finding::new(Severity::Low, "dangerous-import", "subprocess"),
            Finding::new(Severity::Critical, "dynamic-eval", "eval"),
        ];
        let v = Verdict::from_findings(EngineKind::Code, 1.0, blocking);
        assert!(v.is_refuted());
        assert_eq!(v.max_severity(), Some(Severity::Critical));
        let low = v.explanation().find("dangerous-import").unwrap();
        let crit = v.explanation().find("dynamic-eval").unwrap();
        assert!(low < crit);
    }

    #[test]
    fn test_undetermined_from_error() {
        let v = Verdict::undetermined_from(EngineKind::Logic, &Error::budget("atoms", 4));
        assert!(v.is_undetermined());
        assert_eq!(v.confidence(), 0.0);
        assert_eq!(v.findings()[0].kind(), "budget-exhausted");
    }

    #[test]
    fn test_digest_is_stable() {
        let a = Verdict::verified(EngineKind::Sql, 0.9, "no issues detected");
        let b = Verdict::verified(EngineKind::Sql, 0.9, "no issues detected");
        assert_eq!(a.to_json(), b.to_json());
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert!(a.to_json().starts_with("{\"valid\":true,"));
    }

    #[test]
    fn test_location_from_offset() {
        let loc = Location::from_offset("ab\ncd", 4);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 2);
    }
}
