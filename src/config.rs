//! Engine configuration
//!
//! Every option struct has a `Default` carrying the documented constants, and
//! deserializes from JSON with missing fields falling back to those defaults.

use serde::{Deserialize, Serialize};

/// Configuration for all engines
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Math engine options
    pub math: MathConfig,
    /// Logic engine options
    pub logic: LogicConfig,
    /// Code-risk engine options
    pub code: CodeConfig,
    /// SQL engine options
    pub sql: SqlConfig,
    /// Batch dispatch options
    pub parallel: ParallelConfig,
}

impl VerifierConfig {
    /// Parse a configuration document; absent fields keep their defaults
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Options for the math engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MathConfig {
    /// Absolute tolerance for pure numeric assertions (half a cent)
    pub decimal_tolerance: f64,
    /// Absolute tolerance per sampled trial
    pub abs_tolerance: f64,
    /// Relative tolerance per sampled trial
    pub rel_tolerance: f64,
    /// Default number of sampling trials
    pub sample_trials: usize,
    /// Hard cap on sampling trials, whatever the caller asks for
    pub max_sample_trials: usize,
    /// Symbols are sampled uniformly from `[-sample_domain, sample_domain]`
    pub sample_domain: f64,
    /// Seed for the sampling generator
    pub seed: u64,
    /// Largest integer exponent expanded symbolically
    pub max_expand_exponent: u32,
    /// Largest number of terms a canonical form may hold
    pub max_terms: usize,
    /// Restrict free symbols to this list (empty allows any identifier)
    pub allowed_symbols: Vec<String>,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            decimal_tolerance: 0.005,
            abs_tolerance: 1e-9,
            rel_tolerance: 1e-9,
            sample_trials: 24,
            max_sample_trials: 1_000,
            sample_domain: 10.0,
            seed: 0x5157_4544,
            max_expand_exponent: 64,
            max_terms: 4_096,
            allowed_symbols: Vec::new(),
        }
    }
}

/// Options for the logic engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogicConfig {
    /// Largest number of atoms the enumerator accepts
    pub max_atoms: usize,
    /// Largest number of assignments the enumerator visits
    pub max_assignments: usize,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            max_atoms: 20,
            max_assignments: 1 << 20,
        }
    }
}

/// Options for the code-risk engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Language assumed when the caller gives no hint
    pub default_language: String,
    /// Report imports of modules that carry dangerous capabilities
    pub report_imports: bool,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            default_language: "python".to_string(),
            report_imports: true,
        }
    }
}

/// Options for the SQL engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Reject DROP/TRUNCATE/ALTER/GRANT/REVOKE and unbounded DELETE/UPDATE
    pub block_destructive: bool,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            block_destructive: true,
        }
    }
}

/// Configuration for batch dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Maximum number of requests verified at once (default: num_cpus)
    pub max_parallelism: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            VerifierConfig::from_json(r#"{"logic": {"max_atoms": 8}, "sql": {"block_destructive": false}}"#)
                .unwrap();
        assert_eq!(config.logic.max_atoms, 8);
        assert_eq!(config.logic.max_assignments, 1 << 20);
        assert!(!config.sql.block_destructive);
        assert_eq!(config.math, MathConfig::default());
        assert_eq!(config.code.default_language, "python");
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(VerifierConfig::from_json(r#"{"logic": {"max_atoms": "many"}}"#).is_err());
    }
}
