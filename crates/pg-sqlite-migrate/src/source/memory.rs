//! In-memory source catalog for engine tests.

use crate::error::{MigrateError, Result};
use crate::source::{
    Index, RawColumn, SelectQuery, SourceCatalog, SourceRow, TableCandidate, TableSize,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A table held by [`MemorySource`].
#[derive(Debug, Clone)]
pub(crate) struct MemoryTable {
    pub schema: String,
    pub name: String,
    pub parent: Option<String>,
    pub columns: Vec<RawColumn>,
    pub rows: Vec<SourceRow>,
    pub indexes: Vec<Index>,
    pub size_bytes: i64,
}

impl MemoryTable {
    pub fn new(name: &str) -> Self {
        Self {
            schema: "public".to_string(),
            name: name.to_string(),
            parent: None,
            columns: Vec::new(),
            rows: Vec::new(),
            indexes: Vec::new(),
            size_bytes: 8192,
        }
    }

    pub fn column(mut self, name: &str, data_type: &str, default: &str) -> Self {
        let ordinal_pos = self.columns.len() as i32 + 1;
        self.columns.push(RawColumn {
            name: name.to_string(),
            default: default.to_string(),
            data_type: data_type.to_string(),
            ordinal_pos,
        });
        self
    }

    pub fn row(mut self, values: &[Option<&str>]) -> Self {
        self.rows
            .push(values.iter().map(|v| v.map(str::to_string)).collect());
        self
    }

    pub fn child_of(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn index(mut self, name: &str, columns: &[&str]) -> Self {
        self.indexes.push(Index {
            name: name.to_string(),
            table: self.name.clone(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn size(mut self, bytes: i64) -> Self {
        self.size_bytes = bytes;
        self
    }
}

/// Catalog backed by plain vectors. Every call is appended to `events`.
#[derive(Default)]
pub(crate) struct MemorySource {
    pub tables: Vec<MemoryTable>,
    pub large_objects: HashMap<u32, Vec<u8>>,
    /// Forces the size probe result.
    pub lo_size_override: Option<i64>,
    pub fail_lo_close: bool,
    pub events: Arc<Mutex<Vec<String>>>,
    in_transaction: bool,
    cursor: Option<VecDeque<SourceRow>>,
    open_fds: HashMap<i32, (u32, usize)>,
    next_fd: i32,
}

impl MemorySource {
    pub fn new(tables: Vec<MemoryTable>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    pub fn with_large_object(mut self, oid: u32, bytes: &[u8]) -> Self {
        self.large_objects.insert(oid, bytes.to_vec());
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn table(&self, schema: &str, name: &str) -> Result<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
            .ok_or_else(|| MigrateError::SchemaExtraction(format!("no table {}.{}", schema, name)))
    }

    fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MemoryTable> + 'a {
        self.tables
            .iter()
            .filter(move |t| t.parent.as_deref() == Some(name))
    }

    fn require_transaction(&self, what: &str) -> Result<()> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(MigrateError::transfer(what, "no open source transaction"))
        }
    }
}

/// SQL `LIKE` matching with `%` and `_` wildcards.
pub(crate) fn like(value: &str, pattern: &str) -> bool {
    fn matches(v: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => v.is_empty(),
            Some(('%', rest)) => (0..=v.len()).any(|i| matches(&v[i..], rest)),
            Some(('_', rest)) => !v.is_empty() && matches(&v[1..], rest),
            Some((c, rest)) => v.first() == Some(c) && matches(&v[1..], rest),
        }
    }
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    matches(&v, &p)
}

#[async_trait]
impl SourceCatalog for MemorySource {
    async fn set_time_zone(&mut self, zone: &str) -> Result<()> {
        self.record(format!("set_time_zone {}", zone));
        Ok(())
    }

    async fn list_tables(&mut self, exclude: &[String]) -> Result<Vec<TableCandidate>> {
        self.record("list_tables");
        let mut tables: Vec<TableCandidate> = self
            .tables
            .iter()
            .filter(|t| exclude.iter().all(|p| !like(&t.name, p)))
            .map(|t| TableCandidate {
                schema: t.schema.clone(),
                name: t.name.clone(),
                is_child: t.parent.is_some(),
            })
            .collect();
        tables.sort_by(|a, b| (&a.schema, &a.name).cmp(&(&b.schema, &b.name)));
        Ok(tables)
    }

    async fn load_columns(&mut self, schema: &str, table: &str) -> Result<Vec<RawColumn>> {
        Ok(self.table(schema, table)?.columns.clone())
    }

    async fn load_indexes(&mut self, schema: &str, table: &str) -> Result<Vec<Index>> {
        Ok(self.table(schema, table)?.indexes.clone())
    }

    async fn table_size(
        &mut self,
        schema: &str,
        table: &str,
        include_children: bool,
    ) -> Result<TableSize> {
        let mut bytes = self.table(schema, table)?.size_bytes;
        if include_children {
            bytes += self.children(table).map(|c| c.size_bytes).sum::<i64>();
        }
        Ok(TableSize {
            bytes,
            pretty: format!("{} bytes", bytes),
        })
    }

    async fn begin(&mut self) -> Result<()> {
        self.record("begin");
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.record("commit");
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.record("rollback");
        self.in_transaction = false;
        self.cursor = None;
        Ok(())
    }

    async fn open_rows(&mut self, query: &SelectQuery) -> Result<()> {
        self.require_transaction(&query.table)?;
        self.record(format!("open_rows {}", query.to_sql()));

        let table = self.table(&query.schema, &query.table)?;
        let width = table.columns.len();
        let mut rows: VecDeque<SourceRow> = table.rows.iter().cloned().collect();
        if !query.only {
            for child in self.children(&query.table) {
                rows.extend(child.rows.iter().map(|r| r[..width].to_vec()));
            }
        }
        self.cursor = Some(rows);
        Ok(())
    }

    async fn fetch_rows(&mut self, max: usize) -> Result<Vec<SourceRow>> {
        let cursor = self
            .cursor
            .as_mut()
            .ok_or_else(|| MigrateError::transfer("cursor", "no open cursor"))?;
        let take = max.min(cursor.len());
        Ok(cursor.drain(..take).collect())
    }

    async fn close_rows(&mut self) -> Result<()> {
        self.record("close_rows");
        self.cursor = None;
        Ok(())
    }

    async fn install_lo_size_probe(&mut self) -> Result<()> {
        self.record("install_probe");
        Ok(())
    }

    async fn drop_lo_size_probe(&mut self) -> Result<()> {
        self.record("drop_probe");
        Ok(())
    }

    async fn lo_size(&mut self, oid: u32) -> Result<i64> {
        self.require_transaction("lo_size")?;
        if let Some(size) = self.lo_size_override {
            return Ok(size);
        }
        self.large_objects
            .get(&oid)
            .map(|b| b.len() as i64)
            .ok_or_else(|| MigrateError::large_object(oid, "does not exist"))
    }

    async fn lo_open(&mut self, oid: u32) -> Result<i32> {
        self.require_transaction("lo_open")?;
        if !self.large_objects.contains_key(&oid) {
            return Err(MigrateError::large_object(oid, "does not exist"));
        }
        self.next_fd += 1;
        self.open_fds.insert(self.next_fd, (oid, 0));
        Ok(self.next_fd)
    }

    async fn lo_read(&mut self, fd: i32, len: usize) -> Result<Vec<u8>> {
        let (oid, pos) = self
            .open_fds
            .get_mut(&fd)
            .ok_or_else(|| MigrateError::transfer("lo_read", "invalid descriptor"))?;
        let bytes = &self.large_objects[&*oid];
        let end = (*pos + len).min(bytes.len());
        let chunk = bytes[*pos..end].to_vec();
        *pos = end;
        Ok(chunk)
    }

    async fn lo_close(&mut self, fd: i32) -> Result<()> {
        if self.fail_lo_close {
            return Err(MigrateError::transfer("lo_close", "invalid large-object descriptor"));
        }
        self.open_fds.remove(&fd);
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&mut self) {
        self.record("close");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_patterns() {
        assert!(like("audit_log", "audit_%"));
        assert!(like("audit_", "audit_%"));
        assert!(!like("audi", "audit_%"));
        assert!(like("tmp1", "tmp_"));
        assert!(!like("tmp12", "tmp_"));
        assert!(like("orders", "orders"));
        assert!(like("anything", "%"));
    }
}
