//! A single redaction rule: pattern, replacement token and adjacency guard.
//!
//! The `regex` crate has no lookaround, so "not next to another digit" style
//! constraints are expressed as an [`Adjacency`] guard evaluated against the
//! characters surrounding each candidate match. A rejected candidate makes the
//! search resume one character after its start, which yields the same matches
//! a leftmost engine with lookbehind/lookahead would produce.

use std::borrow::Cow;

use regex::Regex;

use crate::{RedactionError, Result};

/// Context check applied around each candidate match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjacency {
    /// The pattern alone decides.
    #[default]
    Free,
    /// Reject a match that touches an ASCII digit or continues a dotted
    /// number run (`"1."` before it, `".5"` after it).
    DottedDigits,
    /// Reject a match that touches an ASCII hex digit.
    HexDigits,
}

impl Adjacency {
    /// Whether the match `text[start..end]` is acceptable in its context.
    pub fn accepts(self, text: &str, start: usize, end: usize) -> bool {
        let before = text[..start].chars().rev();
        let after = text[end..].chars();
        match self {
            Adjacency::Free => true,
            Adjacency::DottedDigits => !continues_number(before) && !continues_number(after),
            Adjacency::HexDigits => !starts_with_hex(before) && !starts_with_hex(after),
        }
    }
}

fn continues_number(mut chars: impl Iterator<Item = char>) -> bool {
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
        _ => false,
    }
}

fn starts_with_hex(mut chars: impl Iterator<Item = char>) -> bool {
    matches!(chars.next(), Some(c) if c.is_ascii_hexdigit())
}

/// An ordered pattern/token pair.
///
/// Case sensitivity and word boundaries live in the pattern itself; together
/// with the adjacency guard they form the rule's identity.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    name: String,
    pattern: Regex,
    token: String,
    adjacency: Adjacency,
}

impl RedactionRule {
    /// Compile a rule with no adjacency guard.
    pub fn new(name: impl Into<String>, pattern: &str, token: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|source| RedactionError::PatternError {
            rule: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            pattern,
            token: token.into(),
            adjacency: Adjacency::Free,
        })
    }

    /// Set the adjacency guard.
    pub fn with_adjacency(mut self, adjacency: Adjacency) -> Self {
        self.adjacency = adjacency;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal replacement token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Source text of the compiled pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn adjacency(&self) -> Adjacency {
        self.adjacency
    }

    /// Whether the rule would replace anything in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.next_match(text, 0).is_some()
    }

    /// Replace every accepted, non-overlapping match with the token.
    ///
    /// Returns `Cow::Borrowed` when nothing matched.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let mut out: Option<String> = None;
        let mut last = 0;
        let mut pos = 0;

        while let Some((start, end)) = self.next_match(text, pos) {
            let buf = out.get_or_insert_with(|| String::with_capacity(text.len()));
            buf.push_str(&text[last..start]);
            buf.push_str(&self.token);
            last = end;
            pos = if end > start {
                end
            } else {
                next_boundary(text, end)
            };
            if pos > text.len() {
                break;
            }
        }

        match out {
            None => Cow::Borrowed(text),
            Some(mut buf) => {
                buf.push_str(&text[last..]);
                Cow::Owned(buf)
            }
        }
    }

    /// Next accepted match at or after byte offset `pos`.
    fn next_match(&self, text: &str, mut pos: usize) -> Option<(usize, usize)> {
        while pos <= text.len() {
            let m = self.pattern.find_at(text, pos)?;
            if self.adjacency.accepts(text, m.start(), m.end()) {
                return Some((m.start(), m.end()));
            }
            pos = next_boundary(text, m.start());
        }
        None
    }
}

/// Byte offset of the char boundary following `i`.
fn next_boundary(text: &str, i: usize) -> usize {
    i + text[i..].chars().next().map_or(1, char::len_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits_rule() -> RedactionRule {
        RedactionRule::new("num", r"[0-9]+\.[0-9]+", "<N>")
            .unwrap()
            .with_adjacency(Adjacency::DottedDigits)
    }

    #[test]
    fn test_free_rule_replaces_all() {
        let rule = RedactionRule::new("x", "ab", "[X]").unwrap();
        assert_eq!(rule.apply("ab cab abab"), "[X] c[X] [X][X]");
    }

    #[test]
    fn test_token_is_literal() {
        let rule = RedactionRule::new("x", "(a)", "$1-$0").unwrap();
        assert_eq!(rule.apply("a"), "$1-$0");
    }

    #[test]
    fn test_no_match_borrows() {
        let rule = RedactionRule::new("x", "zz", "[X]").unwrap();
        assert!(matches!(rule.apply("nothing here"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_dotted_digits_rejects_runs() {
        let rule = digits_rule();
        assert_eq!(rule.apply("v 1.5 ok"), "v <N> ok");
        assert_eq!(rule.apply("v 1.2.3"), "v 1.2.3");
        assert_eq!(rule.apply("v9 1.5"), "v9 <N>");
        assert_eq!(rule.apply("end 1.5."), "end <N>.");
    }

    #[test]
    fn test_hex_digits_guard() {
        let rule = RedactionRule::new("h", "[0-9a-f]{4}", "<H>")
            .unwrap()
            .with_adjacency(Adjacency::HexDigits);
        assert_eq!(rule.apply("beef"), "<H>");
        assert_eq!(rule.apply("beefa"), "beefa");
        assert_eq!(rule.apply("-beef-"), "-<H>-");
    }

    #[test]
    fn test_rejected_candidate_retries_next_char() {
        // "1.2" is rejected because ".5" follows it; the retry finds "2.5",
        // which is rejected because "1." precedes it.
        let rule = digits_rule();
        assert_eq!(rule.apply("x12.5y"), "x<N>y");
        assert_eq!(rule.apply("1.2.5"), "1.2.5");
    }

    #[test]
    fn test_multibyte_context() {
        let rule = digits_rule();
        assert_eq!(rule.apply("é1.5é"), "é<N>é");
    }

    #[test]
    fn test_bad_pattern_reports_rule_name() {
        let err = RedactionRule::new("broken", "(", "x").unwrap_err();
        assert_eq!(err.code(), 20);
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_is_match_respects_guard() {
        let rule = digits_rule();
        assert!(rule.is_match("a 1.5 b"));
        assert!(!rule.is_match("1.2.3"));
    }
}
