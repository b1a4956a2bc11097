//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

const SSL_MODES: &[&str] = &["disable", "prefer", "require", "verify-full"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'postgres', got '{}'",
            config.source.r#type
        )));
    }
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if !SSL_MODES.contains(&config.source.ssl_mode.to_lowercase().as_str()) {
        return Err(MigrateError::Config(format!(
            "source.ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            config.source.ssl_mode
        )));
    }

    // Target validation
    if config.target.r#type != "sqlite" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'sqlite', got '{}'",
            config.target.r#type
        )));
    }
    if config.target.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("target.path is required".into()));
    }
    if config.target.path.exists() {
        return Err(MigrateError::TargetExists(config.target.path.clone()));
    }

    // Migration config validation
    if config.migration.time_zone.trim().is_empty() {
        return Err(MigrateError::Config(
            "migration.time_zone must not be empty".into(),
        ));
    }
    if config.migration.commit_interval_rows == 0 {
        return Err(MigrateError::Config(
            "migration.commit_interval_rows must be at least 1".into(),
        ));
    }
    if config.migration.fetch_batch_rows == 0 {
        return Err(MigrateError::Config(
            "migration.fetch_batch_rows must be at least 1".into(),
        ));
    }

    Ok(())
}
