//! Error types for the redaction engine.

use thiserror::Error;

/// Result type for redaction operations.
pub type Result<T> = std::result::Result<T, RedactionError>;

/// Errors raised while building a rule set.
///
/// Redacting text never fails; only rule construction does.
#[derive(Error, Debug)]
pub enum RedactionError {
    /// Failed to compile a regex pattern.
    #[error("pattern error in rule '{rule}': {source}")]
    PatternError {
        rule: String,
        #[source]
        source: regex::Error,
    },

    /// A replacement token would be matched again by some rule, which breaks
    /// idempotence.
    #[error("token '{token}' of rule '{owner}' is matched by rule '{rule}'")]
    TokenMatchesRule {
        token: String,
        owner: String,
        rule: String,
    },
}

impl RedactionError {
    /// Stable error code for structured reporting.
    pub fn code(&self) -> u32 {
        match self {
            RedactionError::PatternError { .. } => 20,
            RedactionError::TokenMatchesRule { .. } => 21,
        }
    }
}
