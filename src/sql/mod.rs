//! Pattern-Based SQL Injection Engine
//!
//! Purely textual: the query is never parsed into a tree, executed or sent
//! anywhere. [`text`] locates literals, comments and statements; the ordered
//! [`signatures`] table is then run against those views.
//!
//! # Example
//!
//! ```
//! use qwed_verify::sql::SqlEngine;
//! use qwed_verify::config::SqlConfig;
//!
//! let engine = SqlEngine::new(SqlConfig::default());
//! assert!(engine.scan("SELECT * FROM accounts WHERE user_id = '1' OR '1'='1'").is_refuted());
//! assert!(engine.scan("SELECT name FROM users WHERE id = ?").is_verified());
//! ```

pub mod signatures;
pub mod text;

use crate::config::SqlConfig;
use crate::error::{Error, Result};
use crate::verdict::{EngineKind, Finding, Location, Severity, Verdict};
use signatures::{Matcher, SIGNATURES};
use std::collections::HashSet;
use text::SqlText;
use tracing::debug;

/// Confidence when a signature rejects the query
pub const REJECT_CONFIDENCE: f64 = 0.95;

/// Confidence when nothing rejects
pub const PASS_CONFIDENCE: f64 = 0.9;

/// Confidence when nothing rejects and values are bound through placeholders
pub const PARAMETERIZED_CONFIDENCE: f64 = 0.95;

/// SQL injection engine
#[derive(Debug, Clone, Default)]
pub struct SqlEngine {
    config: SqlConfig,
}

impl SqlEngine {
    /// Creates an engine
    pub fn new(config: SqlConfig) -> Self {
        SqlEngine { config }
    }

    /// Engine configuration
    pub fn config(&self) -> &SqlConfig {
        &self.config
    }

    /// Scan a query; errors become `undetermined`
    pub fn scan(&self, sql: &str) -> Verdict {
        self.recover(self.try_scan(sql, None))
    }

    /// Scan a query that may only touch `allowed_tables`
    ///
    /// Names compare case-insensitively; `schema.table` matches an allowed
    /// `table` and the other way round.
    pub fn scan_with_tables<S: AsRef<str>>(&self, sql: &str, allowed_tables: &[S]) -> Verdict {
        let allowed: Vec<String> = allowed_tables
            .iter()
            .map(|t| t.as_ref().trim().to_ascii_lowercase())
            .collect();
        self.recover(self.try_scan(sql, Some(&allowed)))
    }

    fn recover(&self, result: Result<Verdict>) -> Verdict {
        match result {
            Ok(verdict) => verdict,
            Err(err) => Verdict::undetermined_from(EngineKind::Sql, &err),
        }
    }

    fn try_scan(&self, sql: &str, allowed: Option<&[String]>) -> Result<Verdict> {
        if sql.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        let text = SqlText::new(sql);
        let placeholders = signatures::placeholder_count(&text);

        let mut seen: HashSet<(&'static str, usize)> = HashSet::new();
        let mut findings = Vec::new();
        let mut suppressed = 0usize;

        for signature in SIGNATURES.iter() {
            if matches!(signature.matcher, Matcher::Destructive) && !self.config.block_destructive {
                continue;
            }
            for hit in signature.matches(&text) {
                if signature.suppressible && placeholders > 0 {
                    suppressed += 1;
                    continue;
                }
                if !seen.insert((signature.kind, text.statement_at(hit.offset))) {
                    continue;
                }
                findings.push(Finding::at(
                    signature.severity,
                    signature.kind,
                    Location::from_offset(sql, hit.offset),
                    format!("{}: {}", signature.description, hit.excerpt),
                ));
            }
        }

        if let Some(allowed) = allowed {
            for (offset, table) in signatures::referenced_tables(&text) {
                if table_allowed(&table, allowed) {
                    continue;
                }
                if !seen.insert(("table-not-allowed", text.statement_at(offset))) {
                    continue;
                }
                findings.push(Finding::at(
                    Severity::High,
                    "table-not-allowed",
                    Location::from_offset(sql, offset),
                    format!("table {} is not in the allowed list", table),
                ));
            }
        }

        let rejected = findings.iter().any(|f| f.severity().rejects());
        debug!(
            statements = text.statements().len(),
            placeholders,
            findings = findings.len(),
            suppressed,
            rejected,
            "sql scan"
        );

        if rejected {
            return Ok(Verdict::from_findings(EngineKind::Sql, REJECT_CONFIDENCE, findings));
        }
        if placeholders > 0 {
            return Ok(
                Verdict::from_findings(EngineKind::Sql, PARAMETERIZED_CONFIDENCE, findings)
                    .prefixed(format!("values bound through {} placeholder(s)", placeholders)),
            );
        }
        Ok(Verdict::from_findings(EngineKind::Sql, PASS_CONFIDENCE, findings))
    }
}

fn table_allowed(table: &str, allowed: &[String]) -> bool {
    let table = table.to_ascii_lowercase();
    let bare = table.rsplit('.').next().unwrap_or(&table);
    allowed.iter().any(|a| {
        let allowed_bare = a.rsplit('.').next().unwrap_or(a);
        *a == table || (allowed_bare == bare && (!a.contains('.') || !table.contains('.')))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Validity;

    fn engine() -> SqlEngine {
        SqlEngine::new(SqlConfig::default())
    }

    #[test]
    fn test_tautology_rejected() {
        let v = engine().scan("SELECT * FROM accounts WHERE user_id = '1' OR '1'='1'");
        assert_eq!(v.valid(), Validity::False);
        assert_eq!(v.confidence(), REJECT_CONFIDENCE);
        assert_eq!(v.findings().len(), 1);
        assert_eq!(v.findings()[0].kind(), "tautology");
        assert!(v.explanation().contains("'1'='1'"));
    }

    #[test]
    fn test_placeholder_query_passes() {
        let v = engine().scan("SELECT name FROM users WHERE id = ?");
        assert!(v.is_verified());
        assert!(v.findings().is_empty());
        assert_eq!(v.confidence(), PARAMETERIZED_CONFIDENCE);
    }

    #[test]
    fn test_placeholders_suppress_tautology() {
        let v = engine().scan("SELECT * FROM t WHERE a = :a OR 1=1");
        assert!(v.is_verified());
        assert!(v.findings().is_empty());

        // Stacking is never suppressed
        let v = engine().scan("SELECT * FROM t WHERE a = ?; DELETE FROM t");
        assert!(v.is_refuted());
    }

    #[test]
    fn test_literal_query_passes() {
        let v = engine().scan("SELECT name FROM users WHERE status = 'active'");
        assert!(v.is_verified());
        assert_eq!(v.confidence(), PASS_CONFIDENCE);
        assert_eq!(v.explanation(), "no issues detected");
    }

    #[test]
    fn test_destructive_policy() {
        assert!(engine().scan("DROP TABLE users").is_refuted());
        let permissive = SqlEngine::new(SqlConfig {
            block_destructive: false,
        });
        assert!(permissive.scan("DROP TABLE users").is_verified());
    }

    #[test]
    fn test_one_finding_per_region_and_kind() {
        let v = engine().scan("SELECT * FROM t WHERE a = '' OR 1=1 OR 'x'='x'");
        assert_eq!(v.findings().len(), 1);

        let v = engine().scan("SELECT * FROM t WHERE a = '' OR 1=1; SELECT * FROM u WHERE b = 2 OR 3=3");
        let kinds: Vec<&str> = v.findings().iter().map(|f| f.kind()).collect();
        assert_eq!(kinds, vec!["stacked-statements", "tautology", "tautology"]);
    }

    #[test]
    fn test_findings_carry_locations() {
        let v = engine().scan("SELECT *\nFROM t WHERE id = 1 OR 1=1");
        let location = v.findings()[0].location().map(|l| (l.line, l.column));
        assert_eq!(location, Some((2, 21)));
    }

    #[test]
    fn test_allowed_tables() {
        let e = engine();
        let v = e.scan_with_tables("SELECT * FROM orders JOIN users ON 1 = 1", &["orders"]);
        assert!(v.is_refuted());
        assert_eq!(v.findings()[0].kind(), "table-not-allowed");
        assert!(v.findings()[0].message().contains("users"));

        assert!(e
            .scan_with_tables("SELECT * FROM public.Orders", &["orders"])
            .is_verified());
        assert!(e
            .scan_with_tables("SELECT * FROM billing.orders", &["public.orders"])
            .is_refuted());
    }

    #[test]
    fn test_empty_query_undetermined() {
        let v = engine().scan("   ");
        assert!(v.is_undetermined());
        assert_eq!(v.findings()[0].kind(), "parse-error");
    }
}
