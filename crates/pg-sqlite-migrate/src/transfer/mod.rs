//! Data transfer engine.
//!
//! Tables move one at a time through a fixed sequence of states:
//!
//! ```text
//! Created -> ColumnsMapped -> SchemaEmitted -> IndexesEmitted -> Sizing -> Streaming -> Committed
//!                                                                  |           |
//!                                                                  +-> Skipped <+
//! ```
//!
//! The target schema (table, triggers, indexes) always exists before the
//! first row is inserted. Rows are read through a source cursor inside a
//! per-table source transaction and inserted into the single long-running
//! target transaction, which is committed and reopened every
//! `commit_interval_rows` rows for large tables.

mod convert;

pub use convert::{convert_cell, strip_zone_offset, ValueRule, VALUE_RULES};

use crate::config::{MigrationConfig, MAX_TABLE_SIZE_BYTES};
use crate::error::{MigrateError, Result};
use crate::guard::{SizeGuard, SizeVerdict};
use crate::index::replicate_indexes;
use crate::lob::LargeObjectReader;
use crate::schema::SchemaEnumerator;
use crate::source::{quote_ident, ColumnClass, SelectQuery, SourceCatalog, Table, TableCandidate};
use crate::target::{CellValue, PreparedInsert, SqliteTarget};
use crate::typemap::column_definition;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Rows between progress log lines.
const PROGRESS_INTERVAL: u64 = 1_000;

/// Per-table lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    Created,
    ColumnsMapped,
    SchemaEmitted,
    IndexesEmitted,
    Sizing,
    Streaming,
    Committed,
    Skipped,
}

/// Why a table was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SkipReason {
    /// Larger than the size ceiling.
    SizeLimit,
    /// The insert statement could not be prepared.
    PrepareFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SizeLimit => write!(f, "exceeds size limit"),
            SkipReason::PrepareFailed(e) => write!(f, "insert preparation failed: {}", e),
        }
    }
}

/// What happened to one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    /// Table name.
    pub table: String,

    /// Final state, always terminal.
    pub state: TableState,

    /// Rows inserted into the target.
    pub rows: u64,

    /// Large object bytes bound as blobs.
    pub large_object_bytes: u64,

    /// Size reported by the source, when measured.
    pub size_bytes: Option<i64>,

    /// Human-readable size.
    pub size_pretty: Option<String>,

    /// Target commits issued while streaming this table.
    pub intermediate_commits: u64,

    /// Set when `state` is `Skipped`.
    pub skip_reason: Option<SkipReason>,

    /// States visited, in order.
    #[serde(skip)]
    pub history: Vec<TableState>,
}

impl TableOutcome {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            state: TableState::Created,
            rows: 0,
            large_object_bytes: 0,
            size_bytes: None,
            size_pretty: None,
            intermediate_commits: 0,
            skip_reason: None,
            history: vec![TableState::Created],
        }
    }

    fn advance(&mut self, next: TableState) {
        debug!("{}: {:?} -> {:?}", self.table, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn skip(mut self, reason: SkipReason) -> Self {
        self.skip_reason = Some(reason);
        self.advance(TableState::Skipped);
        self
    }
}

/// Transfer settings.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub time_zone: String,
    pub select_only: bool,
    pub dump_large_objects: bool,
    pub enforce_max_table_size: bool,
    pub max_table_size_bytes: i64,
    pub commit_interval_rows: u64,
    pub fetch_batch_rows: usize,
}

impl From<&MigrationConfig> for TransferConfig {
    fn from(m: &MigrationConfig) -> Self {
        Self {
            time_zone: m.time_zone.clone(),
            select_only: m.select_only,
            dump_large_objects: m.dump_large_objects,
            enforce_max_table_size: m.enforce_max_table_size,
            max_table_size_bytes: MAX_TABLE_SIZE_BYTES,
            commit_interval_rows: m.commit_interval_rows,
            fetch_batch_rows: m.fetch_batch_rows,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::from(&MigrationConfig::default())
    }
}

/// Migrates tables one at a time.
pub struct TransferEngine {
    config: TransferConfig,
    guard: SizeGuard,
    lob: LargeObjectReader,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Self {
        let guard = SizeGuard::new(config.enforce_max_table_size, config.select_only)
            .with_limit(config.max_table_size_bytes);
        Self {
            config,
            guard,
            lob: LargeObjectReader::new(),
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Whether the large object size helper is installed in the source.
    pub fn probe_installed(&self) -> bool {
        self.lob.probe_installed()
    }

    /// Remove source-side helpers. Safe to call more than once.
    pub async fn teardown(&mut self, source: &mut dyn SourceCatalog) -> Result<()> {
        self.lob.teardown(source).await
    }

    /// Migrate one table.
    ///
    /// Recoverable problems end in `Skipped` or are logged; an `Err` is
    /// fatal for the run and may leave the source transaction open.
    pub async fn migrate_table(
        &mut self,
        source: &mut dyn SourceCatalog,
        target: &mut SqliteTarget,
        enumerator: &SchemaEnumerator<'_>,
        candidate: &TableCandidate,
    ) -> Result<TableOutcome> {
        let started = Instant::now();
        let mut outcome = TableOutcome::new(&candidate.name);

        let mut table = enumerator.describe(source, candidate).await?;
        outcome.advance(TableState::ColumnsMapped);

        self.emit_schema(target, &table).await;
        outcome.advance(TableState::SchemaEmitted);

        replicate_indexes(source, target, &table).await?;
        outcome.advance(TableState::IndexesEmitted);

        outcome.advance(TableState::Sizing);
        let verdict = self.guard.evaluate(source, &table).await?;
        let size = verdict.size().clone();
        outcome.size_bytes = Some(size.bytes);
        outcome.size_pretty = Some(size.pretty.clone());
        table.size = Some(size);

        if let SizeVerdict::Exceeds(size) = verdict {
            warn!(
                "{}: skipped, size {} exceeds the {} byte limit",
                table.full_name(),
                size.pretty,
                self.config.max_table_size_bytes
            );
            if let Err(e) = target.drop_table(&table.name).await {
                warn!("{}: failed to drop skipped table: {}", table.name, e);
            }
            return Ok(outcome.skip(SkipReason::SizeLimit));
        }

        outcome.advance(TableState::Streaming);
        let column_names: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let insert = match target.prepare_insert(&table.name, &column_names).await {
            Ok(insert) => insert,
            Err(e) => {
                warn!("{}: skipped, cannot prepare insert: {}", table.full_name(), e);
                return Ok(outcome.skip(SkipReason::PrepareFailed(e.to_string())));
            }
        };

        self.stream_rows(source, target, &table, &insert, &mut outcome)
            .await?;
        target.release().await?;
        outcome.advance(TableState::Committed);

        info!(
            "{}: {} rows, {} large object bytes in {:.1}s",
            table.full_name(),
            outcome.rows,
            outcome.large_object_bytes,
            started.elapsed().as_secs_f64()
        );
        Ok(outcome)
    }

    /// Create the table and its triggers. Failures are logged only.
    async fn emit_schema(&self, target: &mut SqliteTarget, table: &Table) {
        let columns: Vec<String> = table.columns.iter().map(column_definition).collect();
        let create = format!(
            "CREATE TABLE {} ({})",
            quote_ident(&table.name),
            columns.join(", ")
        );
        if let Err(e) = target.execute_ddl(&create).await {
            warn!("{}: create table failed: {} ({})", table.name, e, create);
        }

        for trigger in &table.triggers {
            if let Err(e) = target.execute_ddl(&trigger.sql).await {
                warn!(
                    "{}: trigger for column {} failed: {} ({})",
                    table.name, trigger.column, e, trigger.sql
                );
            }
        }
    }

    async fn stream_rows(
        &mut self,
        source: &mut dyn SourceCatalog,
        target: &mut SqliteTarget,
        table: &Table,
        insert: &PreparedInsert,
        outcome: &mut TableOutcome,
    ) -> Result<()> {
        if table.has_large_objects() {
            if self.config.dump_large_objects {
                info!("{}: contains large objects, this may take a while", table.name);
            } else {
                info!("{}: large objects disabled, copying identifiers only", table.name);
            }
        }

        source.begin().await?;
        let query = SelectQuery::for_table(table, self.config.select_only);
        debug!("Source: {}", query.to_sql());
        source.open_rows(&query).await?;

        let interval = self.config.commit_interval_rows;
        loop {
            let batch = source.fetch_rows(self.config.fetch_batch_rows).await?;
            if batch.is_empty() {
                break;
            }

            for row in batch {
                if interval > 0 && outcome.rows > 0 && outcome.rows % interval == 0 {
                    target.checkpoint().await?;
                    outcome.intermediate_commits += 1;
                    info!("{}: committed after {} rows", table.name, outcome.rows);
                }

                let values = self.convert_row(source, table, row).await?;
                outcome.large_object_bytes +=
                    values.iter().map(|v| v.blob_len() as u64).sum::<u64>();
                target.insert_row(insert, values).await?;
                outcome.rows += 1;

                if outcome.rows % PROGRESS_INTERVAL == 0 {
                    debug!("{}: {} rows", table.name, outcome.rows);
                }
            }
        }

        source.close_rows().await?;
        source.commit().await?;
        Ok(())
    }

    async fn convert_row(
        &mut self,
        source: &mut dyn SourceCatalog,
        table: &Table,
        row: Vec<Option<String>>,
    ) -> Result<Vec<CellValue>> {
        if row.len() != table.columns.len() {
            return Err(MigrateError::transfer(
                &table.name,
                format!(
                    "source row has {} cells, expected {}",
                    row.len(),
                    table.columns.len()
                ),
            ));
        }

        let mut values = Vec::with_capacity(row.len());
        for (column, cell) in table.columns.iter().zip(row) {
            let value = match (column.class, cell) {
                (ColumnClass::LargeObject, Some(raw)) if self.config.dump_large_objects => {
                    let oid: u32 = raw.trim().parse().map_err(|_| {
                        MigrateError::transfer(
                            &table.name,
                            format!("column {}: invalid large object id {:?}", column.name, raw),
                        )
                    })?;
                    CellValue::Blob(self.lob.fetch(source, oid).await?)
                }
                (class, cell) => convert_cell(class, cell),
            };
            values.push(value);
        }
        Ok(values)
    }
}
