//! Source database access.

mod postgres;
mod types;

#[cfg(test)]
pub(crate) mod memory;

pub use postgres::PgSource;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for source database operations.
///
/// One implementation owns one connection. Calls are strictly sequential;
/// the cursor and large object methods assume an open transaction started
/// with [`SourceCatalog::begin`].
#[async_trait]
pub trait SourceCatalog: Send {
    /// Set the session time zone used to render zone-bearing values.
    async fn set_time_zone(&mut self, zone: &str) -> Result<()>;

    /// List user tables, dropping names that match any `NOT LIKE` pattern.
    async fn list_tables(&mut self, exclude: &[String]) -> Result<Vec<TableCandidate>>;

    /// Load raw column records ordered by ordinal position.
    async fn load_columns(&mut self, schema: &str, table: &str) -> Result<Vec<RawColumn>>;

    /// Load index metadata for a table.
    async fn load_indexes(&mut self, schema: &str, table: &str) -> Result<Vec<Index>>;

    /// Total on-disk size of a table, plus its children when asked.
    async fn table_size(
        &mut self,
        schema: &str,
        table: &str,
        include_children: bool,
    ) -> Result<TableSize>;

    /// Begin a transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction, if any.
    async fn rollback(&mut self) -> Result<()>;

    /// Open the row cursor for a table.
    async fn open_rows(&mut self, query: &SelectQuery) -> Result<()>;

    /// Fetch up to `max` rows from the open cursor. Empty means exhausted.
    async fn fetch_rows(&mut self, max: usize) -> Result<Vec<SourceRow>>;

    /// Close the row cursor.
    async fn close_rows(&mut self) -> Result<()>;

    /// Install the large object size helper.
    async fn install_lo_size_probe(&mut self) -> Result<()>;

    /// Remove the large object size helper.
    async fn drop_lo_size_probe(&mut self) -> Result<()>;

    /// Size of a large object in bytes, via the helper.
    async fn lo_size(&mut self, oid: u32) -> Result<i64>;

    /// Open a large object for reading, returning its descriptor.
    async fn lo_open(&mut self, oid: u32) -> Result<i32>;

    /// Read up to `len` bytes from an open large object.
    async fn lo_read(&mut self, fd: i32, len: usize) -> Result<Vec<u8>>;

    /// Close a large object descriptor.
    async fn lo_close(&mut self, fd: i32) -> Result<()>;

    /// Get the database type.
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(&mut self);
}
