//! SQLite target database operations.

mod sqlite;

pub use sqlite::SqliteTarget;

/// A value bound to one positional insert parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Null,
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    /// Byte length of a blob value, zero otherwise.
    pub fn blob_len(&self) -> usize {
        match self {
            CellValue::Blob(b) => b.len(),
            _ => 0,
        }
    }
}

/// A validated insert statement for one table.
#[derive(Debug, Clone)]
pub struct PreparedInsert {
    /// Target table name.
    pub table: String,

    /// Statement text with one `?` per column.
    pub sql: String,

    /// Number of positional parameters.
    pub params: usize,
}

/// Build the positional insert statement for `table`.
pub fn insert_sql(table: &str, columns: &[String]) -> String {
    let names: Vec<String> = columns.iter().map(|c| crate::source::quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        crate::source::quote_ident(table),
        names.join(", "),
        placeholders
    )
}
