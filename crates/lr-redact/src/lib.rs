//! Redaction engine for free-text log messages.
//!
//! This crate rewrites message strings by applying an ordered list of pattern
//! rules, replacing every match with a fixed literal token.
//!
//! # Key Features
//!
//! - **Ordered rules**: each rule sees the output of the previous one.
//! - **Adjacency guards**: IPv4 and UUID shapes are not matched inside longer
//!   digit or hex runs (version strings, hashes).
//! - **Idempotent**: `redact(redact(s)) == redact(s)`; rule sets whose tokens
//!   would be matched again are rejected at construction.
//! - **Allocation-free on the clean path**: text without matches is returned
//!   as `Cow::Borrowed`.
//!
//! # Example
//!
//! ```
//! use lr_redact::Redactor;
//!
//! let redactor = Redactor::new();
//! let out = redactor.redact("login from 10.0.0.7");
//! assert_eq!(out, "login from [REDACTED_IP]");
//! ```

pub mod engine;
pub mod error;
pub mod rule;
pub mod rules;

use std::borrow::Cow;

use once_cell::sync::Lazy;

pub use engine::Redactor;
pub use error::{RedactionError, Result};
pub use rule::{Adjacency, RedactionRule};
pub use rules::{default_rules, REDACTED_COORDS, REDACTED_IP, REDACTED_UUID};

static DEFAULT_REDACTOR: Lazy<Redactor> = Lazy::new(Redactor::new);

/// Process-wide engine with the built-in rules.
pub fn default_redactor() -> &'static Redactor {
    &DEFAULT_REDACTOR
}

/// Redact `text` with the built-in rules.
pub fn redact(text: &str) -> Cow<'_, str> {
    DEFAULT_REDACTOR.redact(text)
}
