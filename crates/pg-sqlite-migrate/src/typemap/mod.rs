//! Type and default mapping between PostgreSQL and SQLite.
//!
//! SQLite accepts any declared type name and derives the column affinity
//! from it, so type names are carried over (after normalization) rather
//! than translated. The work here is classifying columns whose values need
//! special handling on read, rewriting defaults, and turning sequence
//! defaults into triggers.

mod defaults;

pub use defaults::{is_sequence_default, rewrite_default, DefaultRule, DEFAULT_RULES};

use crate::source::{quote_ident, Column, ColumnClass, RawColumn, TriggerSpec};

/// Stand-in for `infinity` in timestamp columns.
pub const POSITIVE_INFINITY_TIMESTAMP: &str = "9999-12-31 12:00:00";

/// Stand-in for `-infinity` in timestamp columns.
pub const NEGATIVE_INFINITY_TIMESTAMP: &str = "0000-00-00 12:00:00";

/// Literal SQLite parses as +Inf.
pub const POSITIVE_INFINITY_NUMBER: &str = "9e999";

/// Literal SQLite parses as -Inf.
pub const NEGATIVE_INFINITY_NUMBER: &str = "-9e999";

/// Result of mapping one catalog column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    pub column: Column,
    pub trigger: Option<TriggerSpec>,
}

/// Normalize a catalog type name. Multi-word names such as `USER-DEFINED`
/// come back hyphenated.
pub fn normalize_type(data_type: &str) -> String {
    data_type.replace('-', " ")
}

/// Classify a (normalized) source type.
pub fn classify(source_type: &str) -> ColumnClass {
    if source_type == "oid" {
        ColumnClass::LargeObject
    } else if source_type.contains("with time zone") {
        ColumnClass::TimestampWithZone
    } else if source_type.contains("without time zone") {
        ColumnClass::TimestampWithoutZone
    } else if source_type.contains("timestamp") {
        ColumnClass::TimestampPlain
    } else {
        ColumnClass::Plain
    }
}

/// Map one catalog column of `table` into its target descriptor.
///
/// `time_zone` is the zone the source stores `timestamp without time zone`
/// values in; such columns are converted on select.
pub fn map_column(table: &str, raw: &RawColumn, time_zone: &str) -> MappedColumn {
    let source_type = normalize_type(&raw.data_type);
    let target_type = source_type.clone();

    let trigger = (is_sequence_default(&raw.default) && target_type == "integer")
        .then(|| autoincrement_trigger(table, &raw.name));
    let default = rewrite_default(&raw.default);

    let class = classify(&source_type);

    let mut select_expr = quote_ident(&raw.name);
    if class == ColumnClass::TimestampWithoutZone {
        select_expr.push_str(&format!(
            " AT TIME ZONE '{}'",
            time_zone.replace('\'', "''")
        ));
    }

    MappedColumn {
        column: Column {
            name: raw.name.clone(),
            ordinal_pos: raw.ordinal_pos,
            source_type,
            target_type,
            default,
            class,
            select_expr,
        },
        trigger,
    }
}

/// Trigger that assigns `max(column) + 1` (or 0 on an empty table) to rows
/// inserted with a NULL `column`.
pub fn autoincrement_trigger(table: &str, column: &str) -> TriggerSpec {
    let t = quote_ident(table);
    let c = quote_ident(column);
    let name = quote_ident(&format!("{}_{}_autoincrement", table, column));

    let sql = format!(
        "CREATE TRIGGER {name} AFTER INSERT ON {t} FOR EACH ROW WHEN new.{c} IS NULL \
         BEGIN \
         UPDATE {t} SET {c} = (SELECT IFNULL(MAX({c}) + 1, 0) FROM {t}) WHERE rowid = new.rowid; \
         END;"
    );

    TriggerSpec {
        table: table.to_string(),
        column: column.to_string(),
        sql,
    }
}

/// Column definition for `CREATE TABLE`.
pub fn column_definition(column: &Column) -> String {
    let mut def = format!("{} {}", quote_ident(&column.name), column.target_type);
    if !column.default.is_empty() {
        def.push_str(" DEFAULT ");
        def.push_str(&column.default);
    }
    def
}
