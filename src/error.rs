//! Error types for the verification engines

use thiserror::Error;

/// Engine errors
///
/// None of these escape an engine's public `verify`/`scan` entry point: each
/// one is recovered into an `undetermined` [`Verdict`](crate::Verdict).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Parse errors
    /// Syntax error encountered while scanning or parsing
    ///
    /// **Triggered by:** unbalanced delimiters, dangling operators
    /// **Example:** `(x + 1` (missing closing parenthesis)
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Line number where the error occurred (1-indexed)
        line: usize,
        /// Column number where the error occurred (1-indexed)
        column: usize,
        /// Error description
        message: String,
    },

    /// General parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Nothing to parse
    #[error("Empty input")]
    EmptyInput,

    /// Symbol or function outside the configured allow-list
    ///
    /// **Triggered by:** calling a function the normalizer does not know
    /// **Example:** `frobnicate(x)`
    #[error("Unknown symbol: {name}")]
    UnknownSymbol {
        /// Symbol name as written
        name: String,
    },

    /// No grammar is available for the requested source language
    #[error("Unsupported language: {language}")]
    UnsupportedLanguage {
        /// Language hint as supplied by the caller
        language: String,
    },

    /// Input parsed but uses a construct an engine cannot reason about
    ///
    /// **Example:** `integrate(tan(x)^3, x)` (no rule in the integration table)
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    // Evaluation errors
    /// Division by zero during exact or sampled evaluation
    #[error("Division by zero")]
    DivisionByZero,

    /// Expression is undefined at the evaluation point
    ///
    /// **Example:** `ln(-1)`, `sqrt(-4)` over the reals
    #[error("Undefined: {0}")]
    Undefined(String),

    // Resource errors
    /// An iteration budget ran out
    #[error("Budget exhausted: {what} exceeds limit {limit}")]
    BudgetExhausted {
        /// Which budget ran out
        what: String,
        /// Configured limit
        limit: usize,
    },
}

impl Error {
    /// Create a parse error with a message
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an unsupported-construct error with a message
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedConstruct(msg.into())
    }

    /// Create a budget error
    pub fn budget(what: impl Into<String>, limit: usize) -> Self {
        Error::BudgetExhausted {
            what: what.into(),
            limit,
        }
    }

    /// Finding tag used when this error is recovered into a verdict
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Error::Syntax { .. } | Error::Parse(_) | Error::EmptyInput => "parse-error",
            Error::UnknownSymbol { .. } => "unknown-symbol",
            Error::UnsupportedLanguage { .. } => "unsupported-language",
            Error::UnsupportedConstruct(_) => "unsupported-construct",
            Error::DivisionByZero | Error::Undefined(_) => "undefined-evaluation",
            Error::BudgetExhausted { .. } => "budget-exhausted",
        }
    }

    /// Returns true for errors caused by the shape of the input text
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            Error::Syntax { .. } | Error::Parse(_) | Error::EmptyInput | Error::UnknownSymbol { .. }
        )
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Request-level failure raised by the dispatch router
///
/// Distinct from [`Error`]: a `DispatchError` means the tool invocation itself
/// was malformed, not that the claim could not be verified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Tool name not present in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Required argument absent
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Argument present with the wrong shape
    #[error("Malformed argument {field}: {reason}")]
    MalformedArgument {
        /// Argument name
        field: String,
        /// What was wrong with it
        reason: String,
    },
}

impl DispatchError {
    /// Create a malformed-argument error
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError::MalformedArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(Error::EmptyInput.kind_tag(), "parse-error");
        assert_eq!(Error::budget("atoms", 20).kind_tag(), "budget-exhausted");
        assert_eq!(
            Error::UnsupportedLanguage {
                language: "cobol".to_string()
            }
            .kind_tag(),
            "unsupported-language"
        );
    }

    #[test]
    fn test_display() {
        let err = Error::Syntax {
            line: 1,
            column: 4,
            message: "Expected ')'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Syntax error at line 1, column 4: Expected ')'"
        );
        assert_eq!(
            DispatchError::malformed("premises", "expected an array").to_string(),
            "Malformed argument premises: expected an array"
        );
    }
}
