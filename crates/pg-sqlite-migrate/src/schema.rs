//! Schema enumeration.

use crate::error::{MigrateError, Result};
use crate::source::{RawColumn, SourceCatalog, Table, TableCandidate};
use std::collections::HashSet;
use crate::typemap::map_column;
use tracing::{debug, info};

/// Tables selected for migration.
#[derive(Debug, Clone, Default)]
pub struct TablePlan {
    /// Tables to migrate, in listing order.
    pub tables: Vec<TableCandidate>,

    /// Child tables left out because their rows are read via the parent.
    pub skipped_children: Vec<String>,
}

/// Lists and describes source tables.
pub struct SchemaEnumerator<'a> {
    exclude: &'a [String],
    select_only: bool,
    time_zone: &'a str,
}

impl<'a> SchemaEnumerator<'a> {
    pub fn new(exclude: &'a [String], select_only: bool, time_zone: &'a str) -> Self {
        Self {
            exclude,
            select_only,
            time_zone,
        }
    }

    /// List candidate tables and apply the child table policy.
    pub async fn plan(&self, source: &mut dyn SourceCatalog) -> Result<TablePlan> {
        if !self.exclude.is_empty() {
            info!("Excluding tables matching: {}", self.exclude.join(", "));
        }

        let candidates = source.list_tables(self.exclude).await?;
        let mut plan = TablePlan::default();
        for candidate in candidates {
            if candidate.is_child && !self.select_only {
                info!(
                    "Skipping child table {} (rows are read through its parent)",
                    candidate.full_name()
                );
                plan.skipped_children.push(candidate.name);
                continue;
            }
            plan.tables.push(candidate);
        }

        info!(
            "Found {} tables to migrate ({} child tables skipped)",
            plan.tables.len(),
            plan.skipped_children.len()
        );
        Ok(plan)
    }

    /// Load and map the columns of one table.
    pub async fn describe(
        &self,
        source: &mut dyn SourceCatalog,
        candidate: &TableCandidate,
    ) -> Result<Table> {
        let mut raw = source.load_columns(&candidate.schema, &candidate.name).await?;
        check_columns(candidate, &raw)?;
        raw.sort_by_key(|c| c.ordinal_pos);

        let mut columns = Vec::with_capacity(raw.len());
        let mut triggers = Vec::new();
        for col in &raw {
            let mapped = map_column(&candidate.name, col, self.time_zone);
            columns.push(mapped.column);
            triggers.extend(mapped.trigger);
        }

        debug!(
            "{}: {} columns, {} triggers",
            candidate.full_name(),
            columns.len(),
            triggers.len()
        );

        Ok(Table {
            schema: candidate.schema.clone(),
            name: candidate.name.clone(),
            is_child: candidate.is_child,
            columns,
            triggers,
            size: None,
        })
    }
}

/// Reject column records the type mapper cannot use.
fn check_columns(candidate: &TableCandidate, raw: &[RawColumn]) -> Result<()> {
    let mut seen = HashSet::with_capacity(raw.len());
    for col in raw {
        let problem = if col.name.is_empty() {
            Some("empty column name")
        } else if col.data_type.trim().is_empty() {
            Some("missing data type")
        } else if col.ordinal_pos < 1 {
            Some("invalid ordinal position")
        } else if !seen.insert(col.ordinal_pos) {
            Some("duplicate ordinal position")
        } else {
            None
        };
        if let Some(problem) = problem {
            return Err(MigrateError::SchemaExtraction(format!(
                "{}: column {:?} (position {}): {}",
                candidate.full_name(),
                col.name,
                col.ordinal_pos,
                problem
            )));
        }
    }
    Ok(())
}
