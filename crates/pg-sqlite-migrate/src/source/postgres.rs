//! PostgreSQL source database operations.

use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};
use crate::source::{
    quote_ident, Index, RawColumn, SelectQuery, SourceCatalog, SourceRow, TableCandidate,
    TableSize,
};
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::{Client, Config as PgConfig, NoTls, SimpleQueryMessage};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, error, info, warn};

/// Server-side cursor used for row streaming.
const ROW_CURSOR: &str = "pg_sqlite_migrate_rows";

/// `INV_READ` mode flag for `lo_open`.
const INV_READ: i32 = 0x40000;

const LO_SIZE_PROBE_DDL: &str = r#"
    DROP FUNCTION IF EXISTS pg_sqlite_migrate_lo_size(oid);
    CREATE OR REPLACE FUNCTION pg_sqlite_migrate_lo_size(oid) RETURNS bigint AS $$
    DECLARE
        fd integer;
        sz bigint;
    BEGIN
        fd := lo_open($1, x'40000'::int);
        PERFORM lo_lseek64(fd, 0, 2);
        sz := lo_tell64(fd);
        PERFORM lo_close(fd);
        RETURN sz;
    END;
    $$ LANGUAGE plpgsql VOLATILE STRICT;
"#;

/// PostgreSQL source over a single connection.
pub struct PgSource {
    client: Client,
}

impl PgSource {
    /// Connect to PostgreSQL using SourceConfig.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if !config.user.is_empty() {
            pg_config.user(&config.user);
        }
        if !config.password.is_empty() {
            pg_config.password(&config.password);
        }

        let client = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                pg_config.ssl_mode(SslMode::Disable);
                let (client, connection) = pg_config.connect(NoTls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
            mode => {
                pg_config.ssl_mode(if mode == "prefer" {
                    SslMode::Prefer
                } else {
                    SslMode::Require
                });
                let tls = MakeRustlsConnect::new(Self::build_tls_config(mode)?);
                let (client, connection) = pg_config.connect(tls).await?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
        };

        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { client })
    }

    /// Build TLS configuration based on ssl_mode.
    fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
        match ssl_mode {
            "prefer" | "require" => {
                debug!(
                    "ssl_mode={}: TLS without server certificate verification",
                    ssl_mode
                );
                Ok(Self::tls_builder()?
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                    .with_no_client_auth())
            }
            "verify-full" => {
                let mut roots = rustls::RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                Ok(Self::tls_builder()?
                    .with_root_certificates(roots)
                    .with_no_client_auth())
            }
            other => Err(MigrateError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, prefer, require, verify-full",
                other
            ))),
        }
    }

    fn tls_builder() -> Result<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>> {
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| MigrateError::Config(format!("TLS setup failed: {}", e)))
    }

    fn qualified(schema: &str, table: &str) -> String {
        format!("{}.{}", quote_ident(schema), quote_ident(table))
    }
}

#[async_trait]
impl SourceCatalog for PgSource {
    async fn set_time_zone(&mut self, zone: &str) -> Result<()> {
        self.client
            .batch_execute(&format!("SET TIME ZONE '{}'", zone.replace('\'', "''")))
            .await?;
        Ok(())
    }

    async fn list_tables(&mut self, exclude: &[String]) -> Result<Vec<TableCandidate>> {
        let query = r#"
            SELECT
                t.table_schema::text,
                t.table_name::text,
                EXISTS (
                    SELECT 1
                    FROM pg_catalog.pg_inherits i
                    JOIN pg_catalog.pg_class c ON c.oid = i.inhrelid
                    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                    WHERE n.nspname = t.table_schema AND c.relname = t.table_name
                ) AS is_child
            FROM information_schema.tables t
            WHERE t.table_type = 'BASE TABLE'
              AND t.table_schema NOT IN ('pg_catalog', 'information_schema')
              AND t.table_name::text NOT LIKE ALL($1::text[])
            ORDER BY t.table_schema, t.table_name
        "#;

        let rows = self.client.query(query, &[&exclude]).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(TableCandidate {
                schema: row.try_get(0)?,
                name: row.try_get(1)?,
                is_child: row.try_get(2)?,
            });
        }

        debug!("Listed {} candidate tables", tables.len());
        Ok(tables)
    }

    async fn load_columns(&mut self, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
        let query = r#"
            SELECT
                column_name::text,
                COALESCE(column_default, '')::text,
                data_type::text,
                ordinal_position::int4
            FROM information_schema.columns
            WHERE table_schema::text = $1 AND table_name::text = $2
            ORDER BY ordinal_position
        "#;

        let rows = self.client.query(query, &[&schema, &table]).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(RawColumn {
                name: row.try_get(0)?,
                default: row.try_get(1)?,
                data_type: row.try_get(2)?,
                ordinal_pos: row.try_get(3)?,
            });
        }

        debug!("Loaded {} columns for {}.{}", columns.len(), schema, table);
        Ok(columns)
    }

    async fn load_indexes(&mut self, schema: &str, table: &str) -> Result<Vec<Index>> {
        let query = r#"
            SELECT
                i.relname::text AS index_name,
                t.relname::text AS table_name,
                array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum))
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND t.relkind = 'r'
            GROUP BY t.relname, i.relname
            ORDER BY t.relname, i.relname
        "#;

        let rows = self.client.query(query, &[&schema, &table]).await?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in rows {
            indexes.push(Index {
                name: row.try_get(0)?,
                table: row.try_get(1)?,
                columns: row.try_get(2)?,
            });
        }

        Ok(indexes)
    }

    async fn table_size(
        &mut self,
        schema: &str,
        table: &str,
        include_children: bool,
    ) -> Result<TableSize> {
        let query = if include_children {
            r#"
            SELECT pg_size_pretty(s.total), s.total
            FROM (
                SELECT pg_total_relation_size($1::text::regclass)
                     + COALESCE((
                           SELECT sum(pg_total_relation_size(i.inhrelid))::bigint
                           FROM pg_catalog.pg_inherits i
                           WHERE i.inhparent = $1::text::regclass
                       ), 0) AS total
            ) s
            "#
        } else {
            r#"
            SELECT pg_size_pretty(pg_total_relation_size($1::text::regclass)),
                   pg_total_relation_size($1::text::regclass)
            "#
        };

        let qualified = Self::qualified(schema, table);
        let row = self.client.query_one(query, &[&qualified]).await?;

        Ok(TableSize {
            pretty: row.try_get(0)?,
            bytes: row.try_get(1)?,
        })
    }

    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn open_rows(&mut self, query: &SelectQuery) -> Result<()> {
        let sql = query.to_sql();
        debug!("Opening cursor: {}", sql);
        self.client
            .batch_execute(&format!("DECLARE {} NO SCROLL CURSOR FOR {}", ROW_CURSOR, sql))
            .await?;
        Ok(())
    }

    async fn fetch_rows(&mut self, max: usize) -> Result<Vec<SourceRow>> {
        let messages = self
            .client
            .simple_query(&format!("FETCH FORWARD {} FROM {}", max, ROW_CURSOR))
            .await?;

        let mut rows = Vec::with_capacity(max);
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                rows.push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            }
        }
        Ok(rows)
    }

    async fn close_rows(&mut self) -> Result<()> {
        self.client
            .batch_execute(&format!("CLOSE {}", ROW_CURSOR))
            .await?;
        Ok(())
    }

    async fn install_lo_size_probe(&mut self) -> Result<()> {
        self.client.batch_execute(LO_SIZE_PROBE_DDL).await?;
        debug!("Installed large object size probe");
        Ok(())
    }

    async fn drop_lo_size_probe(&mut self) -> Result<()> {
        self.client
            .batch_execute("DROP FUNCTION IF EXISTS pg_sqlite_migrate_lo_size(oid)")
            .await?;
        debug!("Dropped large object size probe");
        Ok(())
    }

    async fn lo_size(&mut self, oid: u32) -> Result<i64> {
        let row = self
            .client
            .query_one("SELECT pg_sqlite_migrate_lo_size($1)", &[&oid])
            .await?;
        Ok(row.try_get::<_, Option<i64>>(0)?.unwrap_or(0))
    }

    async fn lo_open(&mut self, oid: u32) -> Result<i32> {
        let row = self
            .client
            .query_one("SELECT lo_open($1, $2)", &[&oid, &INV_READ])
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn lo_read(&mut self, fd: i32, len: usize) -> Result<Vec<u8>> {
        let len = i32::try_from(len).unwrap_or(i32::MAX);
        let row = self
            .client
            .query_one("SELECT loread($1, $2)", &[&fd, &len])
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn lo_close(&mut self, fd: i32) -> Result<()> {
        self.client
            .execute("SELECT lo_close($1)", &[&fd])
            .await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&mut self) {
        // The connection task ends when the client is dropped.
        debug!("Closing PostgreSQL source");
    }
}

/// Certificate verifier that accepts any server certificate.
///
/// Used for `ssl_mode` `prefer` and `require`, which encrypt the connection
/// without authenticating the server. `verify-full` checks against the
/// bundled web PKI roots instead.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
