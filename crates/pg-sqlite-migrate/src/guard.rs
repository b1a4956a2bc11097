//! Table size guard.

use crate::config::MAX_TABLE_SIZE_BYTES;
use crate::error::Result;
use crate::source::{SourceCatalog, Table, TableSize};
use tracing::debug;

/// Outcome of a size check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeVerdict {
    Within(TableSize),
    Exceeds(TableSize),
}

impl SizeVerdict {
    pub fn size(&self) -> &TableSize {
        match self {
            SizeVerdict::Within(s) | SizeVerdict::Exceeds(s) => s,
        }
    }
}

/// Decides whether a table is small enough to migrate.
#[derive(Debug, Clone)]
pub struct SizeGuard {
    enforce: bool,
    limit_bytes: i64,
    select_only: bool,
}

impl SizeGuard {
    pub fn new(enforce: bool, select_only: bool) -> Self {
        Self {
            enforce,
            limit_bytes: MAX_TABLE_SIZE_BYTES,
            select_only,
        }
    }

    /// Override the ceiling.
    pub fn with_limit(mut self, limit_bytes: i64) -> Self {
        self.limit_bytes = limit_bytes;
        self
    }

    /// Measure `table`. Child sizes count toward the parent unless children
    /// are migrated on their own.
    pub async fn evaluate(
        &self,
        source: &mut dyn SourceCatalog,
        table: &Table,
    ) -> Result<SizeVerdict> {
        let size = source
            .table_size(&table.schema, &table.name, !self.select_only)
            .await?;
        debug!("{}: size {} ({} bytes)", table.full_name(), size.pretty, size.bytes);

        if self.enforce && size.bytes > self.limit_bytes {
            Ok(SizeVerdict::Exceeds(size))
        } else {
            Ok(SizeVerdict::Within(size))
        }
    }
}
