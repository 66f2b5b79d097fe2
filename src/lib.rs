//! # qwed-verify - Deterministic Verification Engines
//!
//! Exact, explainable answers to four narrow classes of claims:
//!
//! - **Math** - equivalence of a claimed result with an expected one, by
//!   canonical forms, exact rational arithmetic and seeded numeric sampling
//! - **Logic** - entailment of a conclusion from controlled-English premises,
//!   by truth-table enumeration with a numeric feasibility check
//! - **Code** - static risk of Python or JavaScript source, by walking a
//!   shallow syntax tree against a dangerous-capability table
//! - **SQL** - injection exposure of a raw query, by an ordered signature
//!   table over quote- and comment-aware views of the text
//!
//! Every call returns a [`Verdict`]: tri-state validity, confidence,
//! explanation and ordered findings. Identical inputs give identical
//! verdicts; nothing is persisted, executed or sent over the network.
//!
//! ## Quick Start
//!
//! ```rust
//! use qwed_verify::{Dispatcher, Validity};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), qwed_verify::DispatchError> {
//! let dispatcher = Dispatcher::default();
//!
//! let verdict = dispatcher.invoke(
//!     "verify_math",
//!     &json!({"expression": "10000*(1+0.075/4)^(4*5)", "claimed_result": 14499.48}),
//! )?;
//! assert_eq!(verdict.valid(), Validity::True);
//!
//! let verdict = dispatcher.invoke(
//!     "sql",
//!     &json!({"query": "SELECT * FROM accounts WHERE user_id = '1' OR '1'='1'"}),
//! )?;
//! assert_eq!(verdict.valid(), Validity::False);
//! # Ok(())
//! # }
//! ```
//!
//! ## Using an Engine Directly
//!
//! ```rust
//! use qwed_verify::code::CodeEngine;
//! use qwed_verify::config::CodeConfig;
//!
//! let engine = CodeEngine::new(CodeConfig::default());
//! let verdict = engine.scan(
//!     "const { exec } = require('child_process');\nexec(`rm -rf ${dir}`);",
//!     Some("javascript"),
//! );
//! assert!(verdict.is_refuted());
//! println!("{}", verdict.to_json());
//! ```
//!
//! ## Errors
//!
//! Engine failures (unparseable claims, unsupported languages, exhausted
//! budgets) never escape: they come back as `undetermined` verdicts carrying
//! an [`Error`] description. Only malformed tool invocations are reported as
//! a [`DispatchError`].
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (`debug!` for decisions, `warn!` for
//! recovered errors) and installs no subscriber.

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod code;
pub mod config;
pub mod error;
pub mod lexer;
pub mod logic;
pub mod math;
pub mod parser;
pub mod sql;
pub mod tools;
pub mod verdict;

// Re-export main types
pub use code::{CodeEngine, Language};
pub use config::{CodeConfig, LogicConfig, MathConfig, ParallelConfig, SqlConfig, VerifierConfig};
pub use error::{DispatchError, Error, Result};
pub use logic::LogicEngine;
pub use math::{MathContext, MathEngine, Operation};
pub use sql::SqlEngine;
pub use tools::{Dispatcher, ToolArguments, ToolRegistry, ToolRequest, VerificationTool};
pub use verdict::{EngineKind, Finding, Location, Severity, Validity, Verdict};
