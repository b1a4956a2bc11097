//! Migration orchestrator - main workflow coordinator.

use crate::config::Config;
use crate::error::{MigrateError, Result};
use crate::schema::SchemaEnumerator;
use crate::source::{PgSource, SourceCatalog};
use crate::target::SqliteTarget;
use crate::transfer::{TableOutcome, TableState, TransferConfig, TransferEngine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Session time zone for the source connection.
const SOURCE_TIME_ZONE: &str = "UTC";

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Box<dyn SourceCatalog>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Absolute path of the created database file.
    pub target_path: PathBuf,

    /// Tables processed.
    pub tables_total: usize,

    /// Tables fully copied.
    pub tables_migrated: usize,

    /// Tables skipped (size limit, insert preparation).
    pub tables_skipped: usize,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Total large object bytes transferred.
    pub large_object_bytes: u64,

    /// Child tables read through their parent instead of separately.
    pub skipped_children: Vec<String>,

    /// Per-table outcomes in migration order.
    pub outcomes: Vec<TableOutcome>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct RunReport {
    outcomes: Vec<TableOutcome>,
    skipped_children: Vec<String>,
    target_path: PathBuf,
}

impl Orchestrator {
    /// Validate `config` and connect to the source database.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = PgSource::connect(&config.source).await?;
        Ok(Self {
            config,
            source: Box::new(source),
        })
    }

    /// Use an already connected source.
    pub fn with_source(config: Config, source: Box<dyn SourceCatalog>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, source })
    }

    /// Run the migration.
    ///
    /// `cancel` is checked between tables; a table in progress always runs
    /// to completion first.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Starting migration run {} ({} -> {})",
            run_id,
            self.source.db_type(),
            self.config.target.path.display()
        );

        let mut engine = TransferEngine::new(TransferConfig::from(&self.config.migration));
        let report = match self.migrate_all(&mut engine, &cancel).await {
            Ok(report) => report,
            Err(e) => {
                error!("Migration aborted: {}", e);
                self.cleanup_after_failure(&mut engine).await;
                return Err(e);
            }
        };
        self.source.close().await;

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let count = |state| report.outcomes.iter().filter(|o| o.state == state).count();
        let result = MigrationResult {
            run_id,
            status: "completed".to_string(),
            started_at,
            completed_at,
            duration_seconds: duration,
            target_path: report.target_path,
            tables_total: report.outcomes.len(),
            tables_migrated: count(TableState::Committed),
            tables_skipped: count(TableState::Skipped),
            rows_transferred: report.outcomes.iter().map(|o| o.rows).sum(),
            large_object_bytes: report.outcomes.iter().map(|o| o.large_object_bytes).sum(),
            skipped_children: report.skipped_children,
            outcomes: report.outcomes,
        };

        info!(
            "Migration {}: {} tables ({} skipped), {} rows in {:.1}s",
            result.status,
            result.tables_total,
            result.tables_skipped,
            result.rows_transferred,
            result.duration_seconds
        );
        info!("Database written to {}", result.target_path.display());

        Ok(result)
    }

    async fn migrate_all(
        &mut self,
        engine: &mut TransferEngine,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let migration = &self.config.migration;
        let source = self.source.as_mut();

        source.set_time_zone(SOURCE_TIME_ZONE).await?;

        let mut target = SqliteTarget::create(&self.config.target.path).await?;
        target.begin().await?;

        let enumerator = SchemaEnumerator::new(
            &migration.exclude_tables,
            migration.select_only,
            &migration.time_zone,
        );
        let plan = enumerator.plan(source).await?;

        let mut outcomes = Vec::with_capacity(plan.tables.len());
        for (i, candidate) in plan.tables.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping before {}", candidate.full_name());
                return Err(MigrateError::Cancelled);
            }
            info!(
                "[{}/{}] Migrating {}",
                i + 1,
                plan.tables.len(),
                candidate.full_name()
            );
            let outcome = engine
                .migrate_table(source, &mut target, &enumerator, candidate)
                .await?;
            outcomes.push(outcome);
        }

        engine.teardown(source).await?;
        target.commit().await?;

        if let Err(e) = target.analyze().await {
            warn!("ANALYZE failed: {}", e);
        }
        let target_path = std::fs::canonicalize(target.path())
            .unwrap_or_else(|_| target.path().to_path_buf());
        target.close().await?;

        Ok(RunReport {
            outcomes,
            skipped_children: plan.skipped_children,
            target_path,
        })
    }

    /// Best-effort cleanup of source-side state after a fatal error.
    async fn cleanup_after_failure(&mut self, engine: &mut TransferEngine) {
        let source = self.source.as_mut();
        if let Err(e) = source.rollback().await {
            warn!("Source rollback failed: {}", e);
        }
        if let Err(e) = engine.teardown(source).await {
            warn!("Failed to remove large object size helper: {}", e);
        }
        source.close().await;
    }
}
