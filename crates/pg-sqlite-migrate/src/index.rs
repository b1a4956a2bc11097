//! Index replication.

use crate::error::Result;
use crate::source::{quote_ident, Index, SourceCatalog, Table};
use crate::target::SqliteTarget;
use tracing::{debug, warn};

/// `CREATE INDEX` statement for the target.
pub fn create_index_sql(index: &Index) -> String {
    let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE INDEX {} ON {} ({})",
        quote_ident(&index.name),
        quote_ident(&index.table),
        columns.join(", ")
    )
}

/// Recreate the source indexes of `table` on the target.
///
/// Indexes naming a column the table does not have, and statements that
/// fail on the target, are logged and skipped. Returns the number of
/// indexes created.
pub async fn replicate_indexes(
    source: &mut dyn SourceCatalog,
    target: &mut SqliteTarget,
    table: &Table,
) -> Result<usize> {
    let indexes = source.load_indexes(&table.schema, &table.name).await?;
    if indexes.is_empty() {
        debug!("{}: no indexes", table.full_name());
        return Ok(0);
    }

    let mut created = 0;
    for index in &indexes {
        let unknown: Vec<&str> = index
            .columns
            .iter()
            .filter(|c| !table.columns.iter().any(|col| &col.name == *c))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            warn!(
                "Skipping index {}: unknown columns {}",
                index.name,
                unknown.join(", ")
            );
            continue;
        }

        let sql = create_index_sql(index);
        match target.execute_ddl(&sql).await {
            Ok(()) => created += 1,
            Err(e) => warn!("Failed to create index {}: {} ({})", index.name, e, sql),
        }
    }
    debug!("{}: created {} of {} indexes", table.full_name(), created, indexes.len());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaEnumerator;
    use crate::source::memory::{MemorySource, MemoryTable};
    use crate::source::TableCandidate;
    use tempfile::TempDir;

    #[test]
    fn test_create_index_sql_preserves_column_order() {
        let index = Index {
            name: "orders_customer_placed_idx".into(),
            table: "orders".into(),
            columns: vec!["customer".into(), "placed".into()],
        };
        assert_eq!(
            create_index_sql(&index),
            "CREATE INDEX \"orders_customer_placed_idx\" ON \"orders\" (\"customer\", \"placed\")"
        );
    }

    async fn orders_target(dir: &TempDir) -> SqliteTarget {
        let mut target = SqliteTarget::create(&dir.path().join("i.sqlite"))
            .await
            .unwrap();
        target
            .execute_ddl("CREATE TABLE \"orders\" (\"id\" integer, \"customer\" text)")
            .await
            .unwrap();
        target
    }

    async fn describe_orders(source: &mut MemorySource) -> Table {
        let candidate = TableCandidate {
            schema: "public".into(),
            name: "orders".into(),
            is_child: false,
        };
        SchemaEnumerator::new(&[], false, "UTC")
            .describe(source, &candidate)
            .await
            .unwrap()
    }

    async fn index_names(target: &mut SqliteTarget) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' ORDER BY name",
        )
        .fetch_all(target.connection())
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_index_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let mut target = orders_target(&dir).await;
        // Occupies the name of the first source index.
        target
            .execute_ddl("CREATE INDEX \"orders_customer_idx\" ON \"orders\" (\"id\")")
            .await
            .unwrap();

        let mut source = MemorySource::new(vec![MemoryTable::new("orders")
            .column("id", "integer", "")
            .column("customer", "text", "")
            .index("orders_customer_idx", &["customer"])
            .index("orders_id_idx", &["id"])]);
        let table = describe_orders(&mut source).await;

        let created = replicate_indexes(&mut source, &mut target, &table)
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(
            index_names(&mut target).await,
            vec!["orders_customer_idx", "orders_id_idx"]
        );
    }

    #[tokio::test]
    async fn test_index_on_unknown_column_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut target = orders_target(&dir).await;

        let mut source = MemorySource::new(vec![MemoryTable::new("orders")
            .column("id", "integer", "")
            .column("customer", "text", "")
            .index("orders_missing_idx", &["customer", "no_such_column"])
            .index("orders_customer_idx", &["customer"])]);
        let table = describe_orders(&mut source).await;

        let created = replicate_indexes(&mut source, &mut target, &table)
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(index_names(&mut target).await, vec!["orders_customer_idx"]);
    }
}
