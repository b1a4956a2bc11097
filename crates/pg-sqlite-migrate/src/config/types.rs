//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (PostgreSQL).
    pub source: SourceConfig,

    /// Target database configuration (SQLite file).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "postgres" for now).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    #[serde(default = "default_localhost")]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require or verify-full (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,

    /// Connection timeout in seconds (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            r#type: default_postgres(),
            host: default_localhost(),
            port: default_pg_port(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            ssl_mode: default_prefer(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Target database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "sqlite").
    #[serde(default = "default_sqlite")]
    pub r#type: String,

    /// Path of the SQLite file to create. Must not exist yet.
    pub path: PathBuf,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            r#type: default_sqlite(),
            path: PathBuf::new(),
        }
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Zone in which the source stores `timestamp without time zone` values.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Tables to exclude (SQL `NOT LIKE` patterns).
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Copy large object contents into blobs (default: true).
    #[serde(default = "default_true")]
    pub dump_large_objects: bool,

    /// Skip tables larger than 1 GiB (default: true).
    #[serde(default = "default_true")]
    pub enforce_max_table_size: bool,

    /// Read each table with `SELECT ... FROM ONLY` and migrate child tables
    /// separately (default: false, children are read through their parent).
    #[serde(default)]
    pub select_only: bool,

    /// Commit the target every N rows for tables larger than N.
    #[serde(default = "default_commit_interval")]
    pub commit_interval_rows: u64,

    /// Rows pulled from the source cursor per round trip.
    #[serde(default = "default_fetch_batch")]
    pub fetch_batch_rows: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            exclude_tables: Vec::new(),
            dump_large_objects: true,
            enforce_max_table_size: true,
            select_only: false,
            commit_interval_rows: default_commit_interval(),
            fetch_batch_rows: default_fetch_batch(),
        }
    }
}

// Default value functions for serde
fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_sqlite() -> String {
    "sqlite".to_string()
}

fn default_localhost() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_prefer() -> String {
    "prefer".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_time_zone() -> String {
    "Europe/Berlin".to_string()
}

fn default_commit_interval() -> u64 {
    100_000
}

fn default_fetch_batch() -> usize {
    1_000
}

fn default_true() -> bool {
    true
}
