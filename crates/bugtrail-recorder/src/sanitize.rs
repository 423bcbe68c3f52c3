//! Sensitive data detection and redaction
//!
//! A value is redacted when its field is declared sensitive (input type,
//! autocomplete hint, name/id heuristics, caller patterns) or when the value
//! itself looks like a card number or SSN.

use bugtrail_core::selector::{looks_like_selector, Selector};
use bugtrail_core::{Element, Error};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

pub const SANITIZED_MARKER: &str = "[SANITIZED]";
/// Characters kept from a non-sensitive value.
pub const PREVIEW_LEN: usize = 50;

const SENSITIVE_INPUT_TYPES: &[&str] = &["password", "tel", "cc-number", "cc-csc", "cc-exp"];

const SENSITIVE_AUTOCOMPLETE: &[&str] = &[
    "current-password",
    "new-password",
    "one-time-code",
    "tel",
    "tel-national",
    "cc-number",
    "cc-csc",
    "cc-exp",
    "cc-exp-month",
    "cc-exp-year",
];

static SENSITIVE_NAMES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)passw(or)?d|pwd|(^|[_\-])pass($|[_\-])",
        r"[a-z]Pass([A-Z_\-]|$)",
        r"(?i)secret",
        r"(?i)token",
        r"(?i)api[_\-]?key",
        r"(?i)credit[_\-]?card|card[_\-]?num(ber)?|cc[_\-]?num(ber)?",
        r"(?i)cvv|cvc|csc",
        r"(?i)(^|[_\-])ssn($|[_\-\d])|social[_\-]?security",
        r"SSN|[a-z]Ssn([A-Z_\-\d]|$)",
        r"(?i)^pin$|pin[_\-]?(code|number)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("builtin pattern compiles"))
    .collect()
});

/// Digit runs are bounded by non-digits only, so glued text still matches.
static CARD_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(?:\d[ \-]?){12,15}\d(?:\D|$)").expect("builtin pattern compiles")
});

static SSN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)\d{3}[ \-]?\d{2}[ \-]?\d{4}(?:\D|$)").expect("builtin pattern compiles")
});

#[derive(Debug, Clone)]
enum CustomPattern {
    Selector(Selector),
    Regex(Regex),
}

/// Outcome of sanitizing one input value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedValue {
    pub value: String,
    /// Character count of the raw value.
    pub length: usize,
    pub is_sanitized: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    custom: Vec<CustomPattern>,
}

impl Sanitizer {
    /// Compile caller patterns; malformed ones are logged and skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut custom = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match compile(pattern) {
                Ok(p) => custom.push(p),
                Err(err) => tracing::warn!(code = ?err.code, "{}", err.message),
            }
        }
        Self { custom }
    }

    pub fn custom_pattern_count(&self) -> usize {
        self.custom.len()
    }

    pub fn is_sensitive_field<E: Element>(&self, element: &E) -> bool {
        if let Some(kind) = element.input_type() {
            if SENSITIVE_INPUT_TYPES.contains(&kind.as_str()) {
                return true;
            }
        }

        if let Some(hint) = element.attribute("autocomplete") {
            let hint = hint.to_ascii_lowercase();
            if hint.split_whitespace().any(|t| SENSITIVE_AUTOCOMPLETE.contains(&t)) {
                return true;
            }
        }

        let name = element.attribute("name").unwrap_or_default();
        let id = element.id().unwrap_or_default();
        if SENSITIVE_NAMES
            .iter()
            .any(|re| (!name.is_empty() && re.is_match(&name)) || (!id.is_empty() && re.is_match(&id)))
        {
            return true;
        }

        let class = element.attribute("class").unwrap_or_default();
        self.custom.iter().any(|pattern| match pattern {
            CustomPattern::Selector(selector) => selector.matches(element),
            CustomPattern::Regex(re) => {
                (!name.is_empty() && re.is_match(&name)) || (!class.is_empty() && re.is_match(&class))
            }
        })
    }

    pub fn value_looks_sensitive(value: &str) -> bool {
        CARD_NUMBER.is_match(value) || SSN.is_match(value)
    }

    pub fn sanitize<E: Element>(&self, element: &E, raw: &str) -> SanitizedValue {
        let length = raw.chars().count();
        if self.is_sensitive_field(element) || Self::value_looks_sensitive(raw) {
            return SanitizedValue {
                value: SANITIZED_MARKER.to_string(),
                length,
                is_sanitized: true,
            };
        }
        SanitizedValue {
            value: preview(raw, PREVIEW_LEN),
            length,
            is_sanitized: false,
        }
    }
}

fn compile(pattern: &str) -> bugtrail_core::Result<CustomPattern> {
    if looks_like_selector(pattern) {
        return Selector::parse(pattern)
            .map(CustomPattern::Selector)
            .map_err(|e| Error::malformed_pattern(pattern, &e.message));
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(CustomPattern::Regex)
        .map_err(|e| Error::malformed_pattern(pattern, &e.to_string()))
}

/// Cap to `max` characters, appending `...` when cut.
pub fn preview(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bugtrail_core::ElementSnapshot;
    use proptest::prelude::*;

    fn field(name: &str) -> ElementSnapshot {
        ElementSnapshot::new("input").with_attr("name", name)
    }

    #[test]
    fn custom_regex_matches_name_case_insensitively() {
        let sanitizer = Sanitizer::new(&["balance"]);
        let out = sanitizer.sanitize(&field("accountBalance"), "1000");
        assert_eq!(out.value, SANITIZED_MARKER);
        assert!(out.is_sanitized);
        assert_eq!(out.length, 4);
    }

    #[test]
    fn custom_selector_patterns() {
        let sanitizer = Sanitizer::new(&[".private", "[data-secret]"]);
        let el = ElementSnapshot::new("input").with_class("field private");
        assert!(sanitizer.is_sensitive_field(&el));
        let el = ElementSnapshot::new("textarea").with_attr("data-secret", "");
        assert!(sanitizer.is_sensitive_field(&el));
        assert!(!sanitizer.is_sensitive_field(&field("comment")));
    }

    #[test]
    fn malformed_patterns_are_skipped() {
        let sanitizer = Sanitizer::new(&["[name=", "(unclosed", "nickname"]);
        assert_eq!(sanitizer.custom_pattern_count(), 1);
        assert!(sanitizer.is_sensitive_field(&field("nickname")));
        assert!(!sanitizer.is_sensitive_field(&field("city")));
    }

    #[test]
    fn builtin_field_rules() {
        let s = Sanitizer::default();
        assert!(s.is_sensitive_field(&ElementSnapshot::new("input").with_attr("type", "password")));
        assert!(s.is_sensitive_field(&ElementSnapshot::new("input").with_attr("type", "TEL")));
        assert!(s.is_sensitive_field(&ElementSnapshot::new("input").with_attr("type", "cc-csc")));
        assert!(!s.is_sensitive_field(&ElementSnapshot::new("input").with_attr("type", "text")));
        assert!(s.is_sensitive_field(
            &ElementSnapshot::new("input").with_attr("autocomplete", "billing cc-number")
        ));
        assert!(s.is_sensitive_field(&ElementSnapshot::new("input").with_id("userPassword")));
        for name in ["api_key", "authToken", "card-number", "cvv", "SSN", "pin", "pin_code", "client_secret"] {
            assert!(s.is_sensitive_field(&field(name)), "{} should be sensitive", name);
        }
        for name in ["pass", "user_pass", "userPass", "passwd", "user_ssn", "customerSsn", "ssn2"] {
            assert!(s.is_sensitive_field(&field(name)), "{} should be sensitive", name);
        }
        for name in ["email", "spinner", "shipping", "city", "quantity", "passport", "compass", "classname", "bypassed"] {
            assert!(!s.is_sensitive_field(&field(name)), "{} should not be sensitive", name);
        }
    }

    #[test]
    fn value_heuristics() {
        assert!(Sanitizer::value_looks_sensitive("4111 1111 1111 1111"));
        assert!(Sanitizer::value_looks_sensitive("card: 4111-1111-1111-1111 exp"));
        assert!(Sanitizer::value_looks_sensitive("123-45-6789"));
        assert!(Sanitizer::value_looks_sensitive("123456789"));
        assert!(Sanitizer::value_looks_sensitive("cc4111111111111111"));
        assert!(Sanitizer::value_looks_sensitive("card_4111-1111-1111-1111"));
        assert!(Sanitizer::value_looks_sensitive("ssn_123-45-6789"));
        assert!(Sanitizer::value_looks_sensitive("id123456789x"));
        assert!(!Sanitizer::value_looks_sensitive("order 12345"));
        assert!(!Sanitizer::value_looks_sensitive("1234567890"));
        assert!(!Sanitizer::value_looks_sensitive("hello world"));
    }

    #[test]
    fn long_values_are_previewed() {
        let raw = "x".repeat(80);
        let out = Sanitizer::default().sanitize(&field("comment"), &raw);
        assert!(!out.is_sanitized);
        assert_eq!(out.length, 80);
        assert_eq!(out.value, format!("{}...", "x".repeat(PREVIEW_LEN)));
        assert_eq!(preview("héllo", 50), "héllo");
    }

    proptest! {
        #[test]
        fn card_numbers_never_leak(
            digits in proptest::collection::vec(0u8..10, 13..=16),
            sep in prop_oneof![Just(""), Just(" "), Just("-")],
            prefix in "[a-z_ ]{0,10}",
            suffix in "[a-z_ ]{0,10}",
        ) {
            let number = digits.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(sep);
            let raw = format!("{}{}{}", prefix, number, suffix);
            let out = Sanitizer::default().sanitize(&field("note"), &raw);
            prop_assert_eq!(out.value, SANITIZED_MARKER);
            prop_assert!(out.is_sanitized);
        }

        #[test]
        fn ssn_shaped_values_never_leak(
            area in "[0-9]{3}",
            group in "[0-9]{2}",
            serial in "[0-9]{4}",
            sep in prop_oneof![Just(""), Just(" "), Just("-")],
            prefix in "[a-z_ ]{0,10}",
            suffix in "[a-z_ ]{0,10}",
        ) {
            let raw = format!("{}{}{}{}{}{}{}", prefix, area, sep, group, sep, serial, suffix);
            let out = Sanitizer::default().sanitize(&field("note"), &raw);
            prop_assert_eq!(out.value, SANITIZED_MARKER);
            prop_assert!(out.is_sanitized);
        }

        #[test]
        fn sensitive_fields_never_leak(value in ".{0,120}") {
            let el = ElementSnapshot::new("input").with_attr("type", "password");
            let out = Sanitizer::default().sanitize(&el, &value);
            prop_assert_eq!(out.value, SANITIZED_MARKER);
            prop_assert_eq!(out.length, value.chars().count());
        }
    }
}
