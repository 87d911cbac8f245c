//! Property-based tests for the redaction engine.
//!
//! Uses proptest to check idempotence and non-interference over log-like
//! messages assembled from realistic fragments.

use std::borrow::Cow;

use lr_redact::{redact, Redactor};
use proptest::prelude::*;

/// A fragment that may or may not be a redaction target.
fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z]{1,10}",
        "[0-9]{1,6}",
        (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}")),
        prop::collection::vec("[0-9a-f]{1,4}", 3..=8).prop_map(|g| g.join(":")),
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        (-500i32..500, -500i32..500, -500i32..500)
            .prop_map(|(x, y, z)| format!("({x}, {y}.5,{z})")),
        "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
        Just("[REDACTED_IP]".to_string()),
        Just("v1.2".to_string()),
        Just("12:30".to_string()),
    ]
}

/// A fragment containing nothing any built-in rule can match.
fn clean_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[g-zG-Z]{1,12}",
        "[0-9]{1,9}",
        "[0-9]{1,3}\\.[0-9]{1,3}",
        Just("(1, 2)".to_string()),
        Just("[REDACTED_UUID]".to_string()),
    ]
}

fn message(parts: impl Strategy<Value = String>) -> impl Strategy<Value = String> {
    prop::collection::vec(parts, 0..12).prop_map(|v| v.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Redacting twice is the same as redacting once.
    #[test]
    fn redact_is_idempotent(msg in message(fragment())) {
        let once = redact(&msg).into_owned();
        let twice = redact(&once).into_owned();
        prop_assert_eq!(&once, &twice, "input: {}", msg);
    }

    /// Idempotence holds for arbitrary printable text as well.
    #[test]
    fn redact_is_idempotent_on_arbitrary_text(msg in "[ -~]{0,64}") {
        let once = redact(&msg).into_owned();
        let twice = redact(&once).into_owned();
        prop_assert_eq!(&once, &twice, "input: {}", msg);
    }

    /// Text without targets is returned unchanged and unallocated.
    #[test]
    fn clean_text_is_untouched(msg in message(clean_fragment())) {
        let out = Redactor::new().redact(&msg);
        prop_assert!(matches!(out, Cow::Borrowed(_)), "rewrote: {}", msg);
        prop_assert_eq!(out.as_ref(), msg.as_str());
    }

    /// Every generated dotted quad disappears from the output.
    #[test]
    fn standalone_ipv4_is_always_removed(a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
        let ip = format!("{a}.{b}.{c}.{d}");
        let line = format!("from {ip} ok");
        let out = redact(&line);
        prop_assert_eq!(out.as_ref(), "from [REDACTED_IP] ok");
    }
}
