//! SQLite file writer built on a single sqlx connection.

use super::{insert_sql, CellValue, PreparedInsert};
use crate::error::{MigrateError, Result};
use crate::source::quote_ident;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection, Executor};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Target SQLite database.
pub struct SqliteTarget {
    conn: SqliteConnection,
    path: PathBuf,
}

impl SqliteTarget {
    /// Create a new database file at `path`. An existing file is never
    /// reused or overwritten.
    pub async fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(MigrateError::TargetExists(path.to_path_buf()));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);
        let conn = options.connect().await?;

        info!("Created target database {}", path.display());
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a statement without parameters.
    pub async fn execute_ddl(&mut self, sql: &str) -> Result<()> {
        debug!("Target: {}", sql);
        sqlx::raw_sql(sql).execute(&mut self.conn).await?;
        Ok(())
    }

    pub async fn begin(&mut self) -> Result<()> {
        sqlx::raw_sql("BEGIN").execute(&mut self.conn).await?;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        sqlx::raw_sql("COMMIT").execute(&mut self.conn).await?;
        Ok(())
    }

    /// Commit and immediately open the next transaction.
    pub async fn checkpoint(&mut self) -> Result<()> {
        self.commit().await?;
        self.begin().await
    }

    /// Prepare the insert statement for `table`. The statement is cached on
    /// the connection and reused by every [`SqliteTarget::insert_row`] call.
    pub async fn prepare_insert(
        &mut self,
        table: &str,
        columns: &[String],
    ) -> Result<PreparedInsert> {
        let sql = insert_sql(table, columns);
        (&mut self.conn).prepare(sql.as_str()).await?;
        debug!("Prepared: {}", sql);
        Ok(PreparedInsert {
            table: table.to_string(),
            sql,
            params: columns.len(),
        })
    }

    /// Bind `values` in order and execute the prepared insert.
    pub async fn insert_row(
        &mut self,
        insert: &PreparedInsert,
        values: Vec<CellValue>,
    ) -> Result<()> {
        if values.len() != insert.params {
            return Err(MigrateError::transfer(
                &insert.table,
                format!("expected {} values, got {}", insert.params, values.len()),
            ));
        }

        let mut query = sqlx::query(&insert.sql);
        for value in values {
            query = match value {
                CellValue::Null => query.bind(None::<String>),
                CellValue::Text(s) => query.bind(s),
                CellValue::Blob(b) => query.bind(b),
            };
        }
        query.execute(&mut self.conn).await?;
        Ok(())
    }

    /// Drop cached prepared statements.
    pub async fn release(&mut self) -> Result<()> {
        self.conn.clear_cached_statements().await?;
        Ok(())
    }

    pub async fn drop_table(&mut self, table: &str) -> Result<()> {
        self.execute_ddl(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .await
    }

    /// Refresh planner statistics.
    pub async fn analyze(&mut self) -> Result<()> {
        self.execute_ddl("ANALYZE").await
    }

    /// Connection handle, for ad hoc queries.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.sqlite");
        std::fs::write(&path, b"keep me").unwrap();

        let err = SqliteTarget::create(&path).await.err().unwrap();
        assert!(matches!(err, MigrateError::TargetExists(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_insert_binds_null_text_and_blob() {
        let dir = TempDir::new().unwrap();
        let mut target = SqliteTarget::create(&dir.path().join("t.sqlite"))
            .await
            .unwrap();
        target
            .execute_ddl("CREATE TABLE \"t\" (\"a\" text, \"b\" text, \"c\" blob)")
            .await
            .unwrap();

        let cols = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let insert = target.prepare_insert("t", &cols).await.unwrap();
        target
            .insert_row(
                &insert,
                vec![
                    CellValue::Null,
                    CellValue::Text("x".into()),
                    CellValue::Blob(vec![0, 159, 146, 150]),
                ],
            )
            .await
            .unwrap();

        let (a, b, c): (Option<String>, String, Vec<u8>) =
            sqlx::query_as("SELECT a, b, c FROM t")
                .fetch_one(target.connection())
                .await
                .unwrap();
        assert_eq!(a, None);
        assert_eq!(b, "x");
        assert_eq!(c, vec![0, 159, 146, 150]);

        target.release().await.unwrap();
        target.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_fails_for_missing_table() {
        let dir = TempDir::new().unwrap();
        let mut target = SqliteTarget::create(&dir.path().join("t.sqlite"))
            .await
            .unwrap();
        let result = target.prepare_insert("missing", &["a".to_string()]).await;
        assert!(matches!(result, Err(MigrateError::Target(_))));
    }

    #[tokio::test]
    async fn test_wrong_arity_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut target = SqliteTarget::create(&dir.path().join("t.sqlite"))
            .await
            .unwrap();
        target.execute_ddl("CREATE TABLE \"t\" (\"a\" text)").await.unwrap();
        let insert = target.prepare_insert("t", &["a".to_string()]).await.unwrap();
        let err = target.insert_row(&insert, vec![]).await.unwrap_err();
        assert!(matches!(err, MigrateError::Transfer { .. }));
    }
}
