//! Row-level data comparison.
//!
//! Rows are matched by composite primary key. Keys only in the source become
//! inserts, keys only in the target become deletes and keys on both sides
//! whose rows differ become updates.
//!
//! Output order: inserts and updates follow the source's fetch order, then
//! deletes follow the target's fetch order. No other sorting is applied.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::rows::{KeyedRows, PrimaryKeyValue, RowRecord, rows_equal};
use crate::statement::StatementBuilder;

/// Kind of a row difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataDiffKind {
    /// Row exists only in the source.
    Insert,
    /// Row exists on both sides with different values.
    Update,
    /// Row exists only in the target.
    Delete,
}

/// One row difference with the statement that resolves it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataDiffEntry {
    /// Kind of difference.
    pub kind: DataDiffKind,
    /// Affected table.
    pub table: String,
    /// Primary-key values of the row.
    pub primary_key: PrimaryKeyValue,
    /// Target row (updates and deletes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_values: Option<RowRecord>,
    /// Source row (inserts and updates).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_values: Option<RowRecord>,
    /// Statement to run against the target.
    pub statement: String,
}

/// Which kinds of row differences to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Report rows missing from the target.
    pub insert: bool,
    /// Report rows that differ.
    pub update: bool,
    /// Report rows missing from the source.
    pub delete: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            insert: true,
            update: true,
            delete: true,
        }
    }
}

impl SyncOptions {
    /// Returns whether entries of `kind` are reported.
    #[must_use]
    pub fn allows(&self, kind: DataDiffKind) -> bool {
        match kind {
            DataDiffKind::Insert => self.insert,
            DataDiffKind::Update => self.update,
            DataDiffKind::Delete => self.delete,
        }
    }
}

/// Compares keyed row sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataComparator {
    statements: StatementBuilder,
    options: SyncOptions,
}

impl DataComparator {
    /// Creates a comparator using the default dialect's quoting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a comparator quoting identifiers for `dialect`.
    #[must_use]
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            statements: StatementBuilder::new(dialect),
            options: SyncOptions::default(),
        }
    }

    /// Restricts the reported kinds.
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the differences that turn `target`'s rows into `source`'s.
    ///
    /// Both row sets must be keyed by the same primary-key columns; the
    /// source's key columns are used for statements. `columns` fixes the
    /// column order of generated statements.
    #[must_use]
    pub fn compare(
        &self,
        table: &str,
        source: &KeyedRows,
        target: &KeyedRows,
        columns: &[String],
    ) -> Vec<DataDiffEntry> {
        let primary_key = source.primary_key();
        let mut results = Vec::new();

        for (key, source_row) in source.iter() {
            match target.get(key) {
                None if self.options.insert => {
                    results.push(DataDiffEntry {
                        kind: DataDiffKind::Insert,
                        table: table.to_string(),
                        primary_key: PrimaryKeyValue::from_row(source_row, primary_key),
                        old_values: None,
                        new_values: Some(source_row.clone()),
                        statement: self.statements.insert(table, source_row, columns),
                    });
                }
                Some(target_row) if self.options.update && !rows_equal(source_row, target_row) => {
                    if source_row.len() != target_row.len() {
                        warn!(
                            table,
                            key = %key,
                            source_columns = source_row.len(),
                            target_columns = target_row.len(),
                            "Rows carry different column sets"
                        );
                    }
                    results.push(DataDiffEntry {
                        kind: DataDiffKind::Update,
                        table: table.to_string(),
                        primary_key: PrimaryKeyValue::from_row(source_row, primary_key),
                        old_values: Some(target_row.clone()),
                        new_values: Some(source_row.clone()),
                        statement: self.statements.update(table, source_row, primary_key, columns),
                    });
                }
                _ => {}
            }
        }

        if self.options.delete {
            for (key, target_row) in target.iter() {
                if !source.contains_key(key) {
                    let pk = PrimaryKeyValue::from_row(target_row, primary_key);
                    results.push(DataDiffEntry {
                        kind: DataDiffKind::Delete,
                        table: table.to_string(),
                        statement: self.statements.delete(table, &pk),
                        primary_key: pk,
                        old_values: Some(target_row.clone()),
                        new_values: None,
                    });
                }
            }
        }

        debug!(
            table,
            source_rows = source.len(),
            target_rows = target.len(),
            differences = results.len(),
            "Compared table data"
        );

        results
    }
}

/// Keys both row lists by `primary_key` and compares them using the default
/// dialect's quoting.
///
/// Fails with [`SyncError::NoPrimaryKey`](crate::error::SyncError::NoPrimaryKey)
/// before looking at any row when `primary_key` is empty.
pub fn compare_table_data(
    table: &str,
    source_rows: &[RowRecord],
    target_rows: &[RowRecord],
    primary_key: &[String],
    columns: &[String],
) -> Result<Vec<DataDiffEntry>> {
    let source = KeyedRows::from_rows(table, primary_key, source_rows.iter().cloned())?;
    let target = KeyedRows::from_rows(table, primary_key, target_rows.iter().cloned())?;
    Ok(DataComparator::new().compare(table, &source, &target, columns))
}

/// Per-table counts of a data comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSyncSummary {
    /// Table name.
    pub table: String,
    /// Primary-key columns.
    pub primary_keys: Vec<String>,
    /// All columns.
    pub columns: Vec<String>,
    /// Rows in the source table.
    pub source_count: u64,
    /// Rows in the target table.
    pub target_count: u64,
    /// Number of inserts.
    pub insert_count: usize,
    /// Number of updates.
    pub update_count: usize,
    /// Number of deletes.
    pub delete_count: usize,
}

impl DataSyncSummary {
    /// Tallies the entries of one comparison.
    #[must_use]
    pub fn from_entries(
        table: impl Into<String>,
        primary_keys: Vec<String>,
        columns: Vec<String>,
        entries: &[DataDiffEntry],
    ) -> Self {
        let count = |kind| entries.iter().filter(|e| e.kind == kind).count();
        Self {
            table: table.into(),
            primary_keys,
            columns,
            source_count: 0,
            target_count: 0,
            insert_count: count(DataDiffKind::Insert),
            update_count: count(DataDiffKind::Update),
            delete_count: count(DataDiffKind::Delete),
        }
    }

    /// Sets the row counts of both sides.
    #[must_use]
    pub fn with_counts(mut self, source_count: u64, target_count: u64) -> Self {
        self.source_count = source_count;
        self.target_count = target_count;
        self
    }

    /// Returns whether the two tables already match.
    #[must_use]
    pub fn in_sync(&self) -> bool {
        self.insert_count == 0 && self.update_count == 0 && self.delete_count == 0
    }
}
