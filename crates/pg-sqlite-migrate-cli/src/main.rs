//! pg-sqlite-migrate CLI - copy a PostgreSQL database into a new SQLite file.

use clap::Parser;
use pg_sqlite_migrate::{Config, MigrateError, MigrationResult, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-sqlite-migrate")]
#[command(about = "Copy a PostgreSQL database into a new SQLite file")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source database host
    #[arg(short = 'H', long)]
    db_host: Option<String>,

    /// Source database port
    #[arg(short = 'p', long)]
    db_port: Option<u16>,

    /// Source database name
    #[arg(short = 'd', long)]
    db_name: Option<String>,

    /// Source database user
    #[arg(short = 'U', long)]
    db_user: Option<String>,

    /// Source database password
    #[arg(short = 'P', long, env = "PGPASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    /// TLS mode: disable, prefer, require, verify-full
    #[arg(long)]
    ssl_mode: Option<String>,

    /// SQLite file to create (must not exist)
    #[arg(short = 'f', long)]
    sqlite_file: Option<PathBuf>,

    /// Time zone of `timestamp without time zone` values in the source
    #[arg(short = 'T', long)]
    db_time_zone: Option<String>,

    /// Exclude tables matching a LIKE pattern (repeatable)
    #[arg(short = 'x', long = "exclude-table")]
    exclude_tables: Vec<String>,

    /// Copy large object contents into blobs
    #[arg(short = 'Q', long)]
    dump_large_objects: Option<bool>,

    /// Skip tables larger than 1 GiB
    #[arg(short = 'B', long)]
    use_max_dump_size: Option<bool>,

    /// Read tables with SELECT ONLY and migrate child tables separately
    #[arg(short = 'O', long)]
    use_select_only: Option<bool>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

impl Cli {
    /// Build the configuration from the optional file plus flag overrides.
    fn into_config(self) -> Result<Config, MigrateError> {
        let mut config = match &self.config {
            Some(path) => {
                let config = Config::load(path)?;
                info!("Loaded configuration from {:?}", path);
                config
            }
            None => Config {
                source: Default::default(),
                target: Default::default(),
                migration: Default::default(),
            },
        };

        if let Some(host) = self.db_host {
            config.source.host = host;
        }
        if let Some(port) = self.db_port {
            config.source.port = port;
        }
        if let Some(name) = self.db_name {
            config.source.database = name;
        }
        if let Some(user) = self.db_user {
            config.source.user = user;
        }
        if let Some(password) = self.db_password {
            config.source.password = password;
        }
        if let Some(mode) = self.ssl_mode {
            config.source.ssl_mode = mode;
        }
        if let Some(path) = self.sqlite_file {
            config.target.path = path;
        }
        if let Some(zone) = self.db_time_zone {
            config.migration.time_zone = zone;
        }
        if !self.exclude_tables.is_empty() {
            config.migration.exclude_tables = self.exclude_tables;
        }
        if let Some(v) = self.dump_large_objects {
            config.migration.dump_large_objects = v;
        }
        if let Some(v) = self.use_max_dump_size {
            config.migration.enforce_max_table_size = v;
        }
        if let Some(v) = self.use_select_only {
            config.migration.select_only = v;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let output_json = cli.output_json;
    let config = cli.into_config()?;
    config.validate()?;

    let cancel_token = setup_signal_handler()?;

    let orchestrator = Orchestrator::new(config).await?;
    let result = orchestrator.run(cancel_token).await?;

    if output_json {
        println!("{}", result.to_json()?);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn print_summary(result: &MigrationResult) {
    println!("\nMigration completed!");
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Tables: {}/{}",
        result.tables_migrated, result.tables_total
    );
    println!("  Rows: {}", result.rows_transferred);
    if result.large_object_bytes > 0 {
        println!("  Large object bytes: {}", result.large_object_bytes);
    }
    for outcome in result.outcomes.iter().filter(|o| o.skip_reason.is_some()) {
        if let Some(reason) = &outcome.skip_reason {
            println!("  Skipped {}: {}", outcome.table, reason);
        }
    }
    if !result.skipped_children.is_empty() {
        println!(
            "  Child tables read through parent: {}",
            result.skipped_children.join(", ")
        );
    }
    println!("  Output: {}", result.target_path.display());
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM. The run stops before
/// the next table.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Stopping after the current table...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current table...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
