//! # pg-sqlite-migrate
//!
//! Copies a PostgreSQL database into a new SQLite file.
//!
//! The library covers the whole pipeline:
//!
//! - **Schema translation** of column types, defaults and sequence-backed
//!   integer columns (emulated with triggers)
//! - **Index replication** from the source catalog
//! - **Row transfer** through a server-side cursor with per-cell conversion
//!   of zone offsets and infinity sentinels
//! - **Large objects** copied into blobs
//! - **Size ceiling** to skip tables above 1 GiB
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_sqlite_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pg_sqlite_migrate::MigrateError> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod index;
pub mod lob;
pub mod orchestrator;
pub mod schema;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationResult, Orchestrator};
pub use source::{PgSource, SourceCatalog, Table};
pub use target::{CellValue, SqliteTarget};
pub use transfer::{SkipReason, TableOutcome, TableState, TransferConfig, TransferEngine};
