//! Per-cell value conversion.
//!
//! Source cells arrive as text. Rules run top to bottom and the first one
//! that applies produces the bound value; a value no rule claims is bound
//! as text unchanged. Large object columns are handled by the engine
//! before these rules run.

use crate::source::ColumnClass;
use crate::target::CellValue;
use crate::typemap::{
    NEGATIVE_INFINITY_NUMBER, NEGATIVE_INFINITY_TIMESTAMP, POSITIVE_INFINITY_NUMBER,
    POSITIVE_INFINITY_TIMESTAMP,
};

/// One value rewrite.
pub struct ValueRule {
    /// Short name used in logs and tests.
    pub name: &'static str,
    applies: fn(ColumnClass, &str) -> bool,
    rewrite: fn(&str) -> String,
}

impl ValueRule {
    pub fn apply(&self, class: ColumnClass, value: &str) -> Option<String> {
        (self.applies)(class, value).then(|| (self.rewrite)(value))
    }
}

/// Ordered rewrite table for cell values.
pub const VALUE_RULES: &[ValueRule] = &[
    // Negative offsets are not recognized.
    ValueRule {
        name: "strip_zone_offset",
        applies: |class, v| class.is_zone_affected() && v.contains('+'),
        rewrite: strip_zone_offset,
    },
    ValueRule {
        name: "timestamp_infinity",
        applies: |class, v| class.is_timestamp() && v == "infinity",
        rewrite: |_| POSITIVE_INFINITY_TIMESTAMP.to_string(),
    },
    ValueRule {
        name: "timestamp_negative_infinity",
        applies: |class, v| class.is_timestamp() && v == "-infinity",
        rewrite: |_| NEGATIVE_INFINITY_TIMESTAMP.to_string(),
    },
    ValueRule {
        name: "numeric_infinity",
        applies: |_, v| v == "infinity",
        rewrite: |_| POSITIVE_INFINITY_NUMBER.to_string(),
    },
    ValueRule {
        name: "numeric_negative_infinity",
        applies: |_, v| v == "-infinity",
        rewrite: |_| NEGATIVE_INFINITY_NUMBER.to_string(),
    },
];

/// Text before the last `+`.
pub fn strip_zone_offset(value: &str) -> String {
    match value.rfind('+') {
        Some(pos) => value[..pos].to_string(),
        None => value.to_string(),
    }
}

/// Convert one source cell of a column with the given class.
pub fn convert_cell(class: ColumnClass, value: Option<String>) -> CellValue {
    let Some(value) = value else {
        return CellValue::Null;
    };
    match VALUE_RULES.iter().find_map(|rule| rule.apply(class, &value)) {
        Some(rewritten) => CellValue::Text(rewritten),
        None => CellValue::Text(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(class: ColumnClass, v: &str) -> CellValue {
        convert_cell(class, Some(v.to_string()))
    }

    fn t(v: &str) -> CellValue {
        CellValue::Text(v.to_string())
    }

    #[test]
    fn test_zone_offset_is_stripped() {
        assert_eq!(
            text(ColumnClass::TimestampWithZone, "2020-01-01 10:00:00+02"),
            t("2020-01-01 10:00:00")
        );
        assert_eq!(
            text(ColumnClass::TimestampWithoutZone, "2020-01-01 10:00:00.5+05:30"),
            t("2020-01-01 10:00:00.5")
        );
    }

    #[test]
    fn test_value_without_offset_passes_through() {
        assert_eq!(
            text(ColumnClass::TimestampWithZone, "2020-01-01 10:00:00"),
            t("2020-01-01 10:00:00")
        );
        assert_eq!(
            text(ColumnClass::TimestampWithZone, "2020-01-01 10:00:00-05"),
            t("2020-01-01 10:00:00-05")
        );
    }

    #[test]
    fn test_plain_timestamp_keeps_plus() {
        assert_eq!(
            text(ColumnClass::TimestampPlain, "2020-01-01 10:00:00+02"),
            t("2020-01-01 10:00:00+02")
        );
    }

    #[test]
    fn test_infinity_depends_on_class() {
        for class in [
            ColumnClass::TimestampPlain,
            ColumnClass::TimestampWithZone,
            ColumnClass::TimestampWithoutZone,
        ] {
            assert_eq!(text(class, "infinity"), t("9999-12-31 12:00:00"));
            assert_eq!(text(class, "-infinity"), t("0000-00-00 12:00:00"));
        }
        assert_eq!(text(ColumnClass::Plain, "infinity"), t("9e999"));
        assert_eq!(text(ColumnClass::Plain, "-infinity"), t("-9e999"));
    }

    #[test]
    fn test_infinity_match_is_exact_and_case_sensitive() {
        assert_eq!(text(ColumnClass::Plain, "Infinity"), t("Infinity"));
        assert_eq!(text(ColumnClass::TimestampPlain, " infinity"), t(" infinity"));
    }

    #[test]
    fn test_null_binds_null() {
        assert_eq!(convert_cell(ColumnClass::Plain, None), CellValue::Null);
        assert_eq!(
            convert_cell(ColumnClass::TimestampWithZone, None),
            CellValue::Null
        );
    }

    #[test]
    fn test_plain_text_is_verbatim() {
        assert_eq!(text(ColumnClass::Plain, "a+b"), t("a+b"));
        assert_eq!(text(ColumnClass::Plain, "42"), t("42"));
    }
}
