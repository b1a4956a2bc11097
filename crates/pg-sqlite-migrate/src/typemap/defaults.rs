//! Column default rewriting.
//!
//! Rules are evaluated top to bottom and the first match wins. A default no
//! rule matches is carried over verbatim.

use super::{
    NEGATIVE_INFINITY_NUMBER, NEGATIVE_INFINITY_TIMESTAMP, POSITIVE_INFINITY_NUMBER,
    POSITIVE_INFINITY_TIMESTAMP,
};

/// One default-expression rewrite.
pub struct DefaultRule {
    /// Short name used in logs and tests.
    pub name: &'static str,
    matches: fn(&str) -> bool,
    rewrite: fn(&str) -> String,
}

impl DefaultRule {
    /// Apply the rule, returning `None` when it does not match.
    pub fn apply(&self, expr: &str) -> Option<String> {
        (self.matches)(expr).then(|| (self.rewrite)(expr))
    }
}

/// Ordered rewrite table for default expressions.
pub const DEFAULT_RULES: &[DefaultRule] = &[
    // SQLite has no sequences; integer columns get a trigger instead.
    DefaultRule {
        name: "sequence",
        matches: is_sequence_default,
        rewrite: |_| String::new(),
    },
    DefaultRule {
        name: "now",
        matches: |e| e == "now()",
        rewrite: |_| "CURRENT_TIMESTAMP".to_string(),
    },
    DefaultRule {
        name: "timestamp_infinity",
        matches: |e| e.starts_with("'infinity'::timestamp"),
        rewrite: |_| format!("'{}'", POSITIVE_INFINITY_TIMESTAMP),
    },
    DefaultRule {
        name: "timestamp_negative_infinity",
        matches: |e| e.starts_with("'-infinity'::timestamp"),
        rewrite: |_| format!("'{}'", NEGATIVE_INFINITY_TIMESTAMP),
    },
    DefaultRule {
        name: "numeric_infinity",
        matches: |e| e.contains("'Infinity'"),
        rewrite: |_| POSITIVE_INFINITY_NUMBER.to_string(),
    },
    DefaultRule {
        name: "numeric_negative_infinity",
        matches: |e| e.contains("'-Infinity'"),
        rewrite: |_| NEGATIVE_INFINITY_NUMBER.to_string(),
    },
    // Lossy: any cast suffix is dropped, meaningful or not.
    DefaultRule {
        name: "strip_cast",
        matches: |e| e.contains("::"),
        rewrite: |e| e.split("::").next().unwrap_or_default().to_string(),
    },
];

/// Whether a default expression draws from a sequence.
pub fn is_sequence_default(expr: &str) -> bool {
    expr.contains("nextval(") && expr.contains("seq'::regclass)")
}

/// Rewrite a source default into the target dialect.
pub fn rewrite_default(expr: &str) -> String {
    DEFAULT_RULES
        .iter()
        .find_map(|rule| rule.apply(expr))
        .unwrap_or_else(|| expr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matching_rule(expr: &str) -> Option<&'static str> {
        DEFAULT_RULES
            .iter()
            .find(|r| r.apply(expr).is_some())
            .map(|r| r.name)
    }

    #[test]
    fn test_now_becomes_current_timestamp() {
        assert_eq!(rewrite_default("now()"), "CURRENT_TIMESTAMP");
    }

    #[test]
    fn test_timestamp_infinity_defaults() {
        assert_eq!(
            rewrite_default("'infinity'::timestamp without time zone"),
            "'9999-12-31 12:00:00'"
        );
        assert_eq!(
            rewrite_default("'-infinity'::timestamp with time zone"),
            "'0000-00-00 12:00:00'"
        );
    }

    #[test]
    fn test_numeric_infinity_defaults() {
        assert_eq!(rewrite_default("'Infinity'::double precision"), "9e999");
        assert_eq!(rewrite_default("'-Infinity'::real"), "-9e999");
    }

    #[test]
    fn test_cast_suffix_is_truncated() {
        assert_eq!(rewrite_default("'open'::character varying"), "'open'");
        assert_eq!(rewrite_default("'{}'::jsonb"), "'{}'");
    }

    #[test]
    fn test_plain_default_passes_through() {
        assert_eq!(rewrite_default("0"), "0");
        assert_eq!(rewrite_default("true"), "true");
        assert_eq!(rewrite_default(""), "");
    }

    #[test]
    fn test_sequence_default_is_dropped() {
        assert!(is_sequence_default("nextval('orders_id_seq'::regclass)"));
        assert!(!is_sequence_default("nextval('orders_id')"));
        assert_eq!(rewrite_default("nextval('orders_id_seq'::regclass)"), "");
    }

    #[test]
    fn test_first_match_wins() {
        // Both the infinity rule and the cast rule match; infinity is listed first.
        assert_eq!(
            matching_rule("'infinity'::timestamp without time zone"),
            Some("timestamp_infinity")
        );
        assert_eq!(
            matching_rule("nextval('a_seq'::regclass)"),
            Some("sequence")
        );
        assert_eq!(matching_rule("42"), None);
    }
}
