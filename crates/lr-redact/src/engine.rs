//! Main redaction engine.
//!
//! The [`Redactor`] holds an immutable, ordered rule list and rewrites free
//! text. It carries no mutable state, so one instance can be shared across
//! any number of threads.

use std::borrow::Cow;

use crate::rule::RedactionRule;
use crate::rules::default_rules;
use crate::{RedactionError, Result};

/// Upper bound on full rule passes for a single input.
///
/// A second pass only changes text when a replacement removed the neighbour
/// that made an adjacency guard reject a candidate. The built-in rules settle
/// in at most three passes.
const MAX_PASSES: usize = 8;

/// Ordered pattern-rule redaction engine.
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<RedactionRule>,
}

impl Redactor {
    /// Create an engine with the built-in rules.
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Create an engine with a custom rule list.
    ///
    /// Rejects rule sets where some rule matches another rule's token, since
    /// such a set cannot be idempotent.
    pub fn with_rules(rules: Vec<RedactionRule>) -> Result<Self> {
        for owner in &rules {
            if let Some(hit) = rules.iter().find(|r| r.is_match(owner.token())) {
                return Err(RedactionError::TokenMatchesRule {
                    token: owner.token().to_string(),
                    owner: owner.name().to_string(),
                    rule: hit.name().to_string(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// The rules in application order.
    pub fn rules(&self) -> &[RedactionRule] {
        &self.rules
    }

    /// Redact `text`.
    ///
    /// Empty input is returned as-is without evaluating any rule. Text with no
    /// matches comes back as `Cow::Borrowed`.
    pub fn redact<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if text.is_empty() {
            return Cow::Borrowed(text);
        }

        let mut current = match self.apply_rules(text) {
            Cow::Borrowed(_) => return Cow::Borrowed(text),
            Cow::Owned(s) => s,
        };

        for _ in 1..MAX_PASSES {
            let next = match self.apply_rules(&current) {
                Cow::Borrowed(_) => break,
                Cow::Owned(s) => s,
            };
            current = next;
        }

        Cow::Owned(current)
    }

    /// Redact optional text; `None` stays `None`.
    pub fn redact_opt<'t>(&self, text: Option<&'t str>) -> Option<Cow<'t, str>> {
        text.map(|t| self.redact(t))
    }

    /// One pass: every rule in order, each fed the previous rule's output.
    fn apply_rules<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut out = Cow::Borrowed(text);
        for rule in &self.rules {
            let replaced = match rule.apply(&out) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = replaced {
                out = Cow::Owned(s);
            }
        }
        out
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}
