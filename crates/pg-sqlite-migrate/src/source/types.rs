//! Schema and metadata types.

use serde::{Deserialize, Serialize};

/// One row of the table listing, before column introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCandidate {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Whether the table inherits from another table.
    pub is_child: bool,
}

impl TableCandidate {
    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Column record exactly as the source catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawColumn {
    /// Column name.
    pub name: String,

    /// Default expression text, empty when the column has none.
    pub default: String,

    /// Source data type name.
    pub data_type: String,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

/// How a column's values need to be treated on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnClass {
    /// Transferred as text.
    Plain,
    /// Holds a large object identifier; the object bytes become a blob.
    LargeObject,
    /// Carries a zone offset that must be stripped.
    TimestampWithZone,
    /// Timestamp without zone information; may hold infinity sentinels.
    TimestampPlain,
    /// Stored in the source's local zone; converted on select, then stripped.
    TimestampWithoutZone,
}

impl ColumnClass {
    /// Values arrive with a `+hh` offset suffix.
    pub fn is_zone_affected(self) -> bool {
        matches!(
            self,
            ColumnClass::TimestampWithZone | ColumnClass::TimestampWithoutZone
        )
    }

    /// Values may be the `infinity` / `-infinity` timestamp sentinels.
    pub fn is_timestamp(self) -> bool {
        matches!(
            self,
            ColumnClass::TimestampWithZone
                | ColumnClass::TimestampWithoutZone
                | ColumnClass::TimestampPlain
        )
    }
}

/// Column descriptor after dialect translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,

    /// Source data type name (hyphens normalized to spaces).
    pub source_type: String,

    /// Target data type name.
    pub target_type: String,

    /// Target default expression, empty for none.
    pub default: String,

    /// Value handling class.
    pub class: ColumnClass,

    /// Expression used for this column in the source SELECT.
    pub select_expr: String,
}

/// Auto-increment emulation for a sequence-backed integer column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Table the trigger is attached to.
    pub table: String,

    /// Column the trigger fills in.
    pub column: String,

    /// Target statement creating the trigger.
    pub sql: String,
}

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Whether the table inherits from another table.
    pub is_child: bool,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Triggers to create right after the table.
    pub triggers: Vec<TriggerSpec>,

    /// On-disk size, known once the size guard has run.
    pub size: Option<TableSize>,
}

impl Table {
    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Check if any column holds large object references.
    pub fn has_large_objects(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.class == ColumnClass::LargeObject)
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Owning table name.
    pub table: String,

    /// Indexed column names.
    pub columns: Vec<String>,
}

/// Table size as reported by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSize {
    /// Size in bytes.
    pub bytes: i64,

    /// Human-readable size.
    pub pretty: String,
}

/// A row as read from the source: one text cell per column, `None` for NULL.
pub type SourceRow = Vec<Option<String>>;

/// Row-streaming query for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub table: String,

    /// Projection, one expression per column, in ordinal order.
    pub projection: Vec<String>,

    /// Restrict to the table's own rows (`FROM ONLY`).
    pub only: bool,
}

impl SelectQuery {
    /// Build the query for a table.
    pub fn for_table(table: &Table, only: bool) -> Self {
        Self {
            schema: table.schema.clone(),
            table: table.name.clone(),
            projection: table.columns.iter().map(|c| c.select_expr.clone()).collect(),
            only,
        }
    }

    /// Render as SQL text.
    pub fn to_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}{}.{}",
            self.projection.join(", "),
            if self.only { "ONLY " } else { "" },
            quote_ident(&self.schema),
            quote_ident(&self.table)
        )
    }
}

/// Quote an identifier. PostgreSQL and SQLite share the same syntax.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
