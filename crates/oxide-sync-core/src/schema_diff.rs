//! Schema comparison.
//!
//! This module compares a source and a target [`SchemaSnapshot`] and produces
//! the statements that bring the target's structure in line with the source.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dialect::Dialect;
use crate::snapshot::{ColumnDescriptor, IndexDescriptor, SchemaSnapshot, TableSnapshot};
use crate::statement::{ColumnPosition, StatementBuilder};

/// Kind of a structural difference.
///
/// The declaration order is the sort precedence of the result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Table exists only in the source.
    Added,
    /// Table exists on both sides with column or index differences.
    Modified,
    /// Table exists only in the target.
    Removed,
}

/// One structural difference with the statement that resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Kind of difference.
    pub kind: DiffKind,
    /// Affected table.
    pub table: String,
    /// Human-readable description.
    pub detail: String,
    /// Statement to run against the target.
    pub statement: String,
}

impl DiffEntry {
    fn new(
        kind: DiffKind,
        table: &str,
        detail: impl Into<String>,
        statement: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            table: table.to_string(),
            detail: detail.into(),
            statement: statement.into(),
        }
    }
}

/// Columns of one index, quoted and in index order.
#[derive(Debug, PartialEq, Eq)]
struct IndexColumns {
    columns: Vec<String>,
    unique: bool,
}

/// Compares schema snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaComparator {
    statements: StatementBuilder,
}

impl SchemaComparator {
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
        }
    }

    /// Returns the differences that turn `target` into `source`.
    ///
    /// Entries are sorted by kind (`added`, `modified`, `removed`), then by
    /// table name. Entries of the same table keep their generation order.
    #[must_use]
    pub fn compare(&self, source: &SchemaSnapshot, target: &SchemaSnapshot) -> Vec<DiffEntry> {
        let mut results = Vec::new();

        // Tables only in source
        for (name, table) in &source.tables {
            if !target.tables.contains_key(name) {
                results.push(DiffEntry::new(
                    DiffKind::Added,
                    name,
                    "Table exists in source but not in target",
                    self.statements.create_table(table),
                ));
            }
        }

        // Tables only in target
        for name in target.tables.keys() {
            if !source.tables.contains_key(name) {
                results.push(DiffEntry::new(
                    DiffKind::Removed,
                    name,
                    "Table exists in target but not in source",
                    self.statements.drop_table(name),
                ));
            }
        }

        // Tables on both sides
        for (name, source_table) in &source.tables {
            if let Some(target_table) = target.tables.get(name) {
                results.extend(self.compare_table(name, source_table, target_table));
            }
        }

        results.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.table.cmp(&b.table)));

        debug!(
            source_db = %source.database,
            target_db = %target.database,
            differences = results.len(),
            "Compared schemas"
        );

        results
    }

    /// Compares one table present on both sides.
    fn compare_table(
        &self,
        table: &str,
        source: &TableSnapshot,
        target: &TableSnapshot,
    ) -> Vec<DiffEntry> {
        let mut results = self.compare_columns(table, source, target);
        results.extend(self.compare_indexes(table, &source.indexes, &target.indexes));
        results
    }

    fn compare_columns(
        &self,
        table: &str,
        source: &TableSnapshot,
        target: &TableSnapshot,
    ) -> Vec<DiffEntry> {
        let mut results = Vec::new();

        let source_cols: HashMap<&str, &ColumnDescriptor> =
            source.columns.iter().map(|c| (c.name.as_str(), c)).collect();
        let target_cols: HashMap<&str, &ColumnDescriptor> =
            target.columns.iter().map(|c| (c.name.as_str(), c)).collect();

        let source_ordered = by_position(&source.columns);
        let target_ordered = by_position(&target.columns);

        // New columns
        for col in &source_ordered {
            if !target_cols.contains_key(col.name.as_str()) {
                let position = column_position(source, col);
                results.push(DiffEntry::new(
                    DiffKind::Modified,
                    table,
                    format!("Add column: {}", col.name),
                    self.statements.add_column(table, col, &position),
                ));
            }
        }

        // Dropped columns
        for col in &target_ordered {
            if !source_cols.contains_key(col.name.as_str()) {
                results.push(DiffEntry::new(
                    DiffKind::Modified,
                    table,
                    format!("Drop column: {}", col.name),
                    self.statements.drop_column(table, &col.name),
                ));
            }
        }

        // Changed columns
        for col in &source_ordered {
            if let Some(target_col) = target_cols.get(col.name.as_str()) {
                if !col.same_definition(target_col) {
                    results.push(DiffEntry::new(
                        DiffKind::Modified,
                        table,
                        format!(
                            "Modify column: {} ({} -> {})",
                            col.name, target_col.data_type, col.data_type
                        ),
                        self.statements.modify_column(table, col),
                    ));
                }
            }
        }

        results
    }

    fn compare_indexes(
        &self,
        table: &str,
        source: &[IndexDescriptor],
        target: &[IndexDescriptor],
    ) -> Vec<DiffEntry> {
        let mut results = Vec::new();

        let source_map = self.index_map(source);
        let target_map = self.index_map(target);

        for (&name, source_idx) in &source_map {
            match target_map.get(name) {
                None => results.push(DiffEntry::new(
                    DiffKind::Modified,
                    table,
                    format!("Add index: {}", name),
                    self.statements
                        .add_index(table, name, &source_idx.columns, source_idx.unique),
                )),
                Some(target_idx) if target_idx.columns != source_idx.columns => {
                    results.push(DiffEntry::new(
                        DiffKind::Modified,
                        table,
                        format!("Recreate index: {}", name),
                        self.statements.recreate_index(
                            table,
                            name,
                            &source_idx.columns,
                            source_idx.unique,
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        for &name in target_map.keys() {
            if !source_map.contains_key(name) {
                results.push(DiffEntry::new(
                    DiffKind::Modified,
                    table,
                    format!("Drop index: {}", name),
                    self.statements.drop_index(table, name),
                ));
            }
        }

        results
    }

    /// Groups index entries by name, skipping the primary-key index.
    fn index_map<'a>(&self, indexes: &'a [IndexDescriptor]) -> BTreeMap<&'a str, IndexColumns> {
        let mut grouped: BTreeMap<&str, Vec<&IndexDescriptor>> = BTreeMap::new();
        for idx in indexes.iter().filter(|idx| !idx.is_primary()) {
            grouped.entry(idx.name.as_str()).or_default().push(idx);
        }

        grouped
            .into_iter()
            .map(|(name, mut entries)| {
                entries.sort_by_key(|idx| idx.seq_in_index);
                let unique = entries.iter().all(|idx| !idx.non_unique);
                let columns = entries
                    .iter()
                    .map(|idx| self.statements.quote(&idx.column))
                    .collect();
                (name, IndexColumns { columns, unique })
            })
            .collect()
    }
}

/// Compares two snapshots using the default dialect's quoting.
#[must_use]
pub fn compare_schemas(source: &SchemaSnapshot, target: &SchemaSnapshot) -> Vec<DiffEntry> {
    SchemaComparator::new().compare(source, target)
}

fn by_position(columns: &[ColumnDescriptor]) -> Vec<&ColumnDescriptor> {
    let mut ordered: Vec<&ColumnDescriptor> = columns.iter().collect();
    ordered.sort_by_key(|c| c.position);
    ordered
}

/// Places a new column after its predecessor in the source ordering.
fn column_position(source: &TableSnapshot, column: &ColumnDescriptor) -> ColumnPosition {
    if column.position <= 1 {
        return ColumnPosition::First;
    }
    source
        .column_at(column.position - 1)
        .map_or(ColumnPosition::Unspecified, |previous| {
            ColumnPosition::After(previous.name.clone())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(columns: Vec<ColumnDescriptor>) -> SchemaSnapshot {
        let mut table = TableSnapshot::new("users").create_sql("CREATE TABLE `users` (...)");
        for col in columns {
            table = table.column(col);
        }
        SchemaSnapshot::new("app").table(table)
    }

    fn id() -> ColumnDescriptor {
        ColumnDescriptor::new("id", "int", 1).primary_key()
    }

    #[test]
    fn test_detect_new_table() {
        let source = users(vec![id()]);
        let target = SchemaSnapshot::new("app");

        let diffs = compare_schemas(&source, &target);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Added);
        assert_eq!(diffs[0].table, "users");
        assert_eq!(diffs[0].statement, "CREATE TABLE `users` (...);");
    }

    #[test]
    fn test_detect_dropped_table() {
        let source = SchemaSnapshot::new("app");
        let target = users(vec![id()]);

        let diffs = compare_schemas(&source, &target);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DiffKind::Removed);
        assert_eq!(diffs[0].statement, "DROP TABLE `users`;");
    }

    #[test]
    fn test_table_names_are_case_sensitive() {
        let source = users(vec![id()]);
        let target = SchemaSnapshot::new("app").table(TableSnapshot::new("Users"));

        let diffs = compare_schemas(&source, &target);
        let kinds: Vec<(DiffKind, &str)> =
            diffs.iter().map(|d| (d.kind, d.table.as_str())).collect();
        assert_eq!(
            kinds,
            vec![(DiffKind::Added, "users"), (DiffKind::Removed, "Users")]
        );
    }

    #[test]
    fn test_new_column_after_predecessor() {
        let source = users(vec![
            id(),
            ColumnDescriptor::new("email", "varchar(255)", 2).not_null(),
            ColumnDescriptor::new("name", "varchar(100)", 3),
        ]);
        let target = users(vec![id(), ColumnDescriptor::new("name", "varchar(100)", 2)]);

        let diffs = compare_schemas(&source, &target);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].detail, "Add column: email");
        assert_eq!(
            diffs[0].statement,
            "ALTER TABLE `users` ADD COLUMN `email` varchar(255) NOT NULL AFTER `id`;"
        );
    }

    #[test]
    fn test_new_first_column() {
        let source = users(vec![
            ColumnDescriptor::new("tenant", "int", 1).not_null().default("0"),
            ColumnDescriptor::new("id", "int", 2).primary_key(),
        ]);
        let target = users(vec![id()]);

        let diffs = compare_schemas(&source, &target);
        let add = diffs
            .iter()
            .find(|d| d.detail == "Add column: tenant")
            .unwrap();
        assert_eq!(
            add.statement,
            "ALTER TABLE `users` ADD COLUMN `tenant` int NOT NULL DEFAULT 0 FIRST;"
        );
    }

    #[test]
    fn test_default_change_is_modification() {
        let source = users(vec![
            id(),
            ColumnDescriptor::new("status", "varchar(10)", 2).default("active"),
        ]);
        let target = users(vec![id(), ColumnDescriptor::new("status", "varchar(10)", 2)]);

        let diffs = compare_schemas(&source, &target);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].detail, "Modify column: status (varchar(10) -> varchar(10))");
        assert_eq!(
            diffs[0].statement,
            "ALTER TABLE `users` MODIFY COLUMN `status` varchar(10) DEFAULT 'active';"
        );
    }

    #[test]
    fn test_position_only_change_is_ignored() {
        let source = users(vec![
            id(),
            ColumnDescriptor::new("a", "int", 2),
            ColumnDescriptor::new("b", "int", 3),
        ]);
        let target = users(vec![
            id(),
            ColumnDescriptor::new("b", "int", 2),
            ColumnDescriptor::new("a", "int", 3),
        ]);

        assert!(compare_schemas(&source, &target).is_empty());
    }

    #[test]
    fn test_index_changes() {
        let source = SchemaSnapshot::new("app").table(
            TableSnapshot::new("t")
                .column(id())
                .index(IndexDescriptor::new("PRIMARY", "id", 1))
                .index(IndexDescriptor::new("idx_ab", "b", 2))
                .index(IndexDescriptor::new("idx_ab", "a", 1))
                .index(IndexDescriptor::new("idx_new", "c", 1).unique())
                .index(IndexDescriptor::new("idx_same", "d", 1)),
        );
        let target = SchemaSnapshot::new("app").table(
            TableSnapshot::new("t")
                .column(id())
                .index(IndexDescriptor::new("PRIMARY", "other", 1))
                .index(IndexDescriptor::new("idx_ab", "a", 1))
                .index(IndexDescriptor::new("idx_old", "e", 1))
                .index(IndexDescriptor::new("idx_same", "d", 1)),
        );

        let diffs = compare_schemas(&source, &target);
        let statements: Vec<&str> = diffs.iter().map(|d| d.statement.as_str()).collect();
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE `t` DROP INDEX `idx_ab`, ADD INDEX `idx_ab` (`a`, `b`);",
                "ALTER TABLE `t` ADD UNIQUE INDEX `idx_new` (`c`);",
                "ALTER TABLE `t` DROP INDEX `idx_old`;",
            ]
        );
    }

    #[test]
    fn test_flagged_primary_index_is_skipped() {
        let source = SchemaSnapshot::new("app").table(
            TableSnapshot::new("t")
                .column(id())
                .index(IndexDescriptor::new("t_pkey", "id", 1).primary()),
        );
        let target = SchemaSnapshot::new("app").table(TableSnapshot::new("t").column(id()));

        assert!(compare_schemas(&source, &target).is_empty());
    }

    #[test]
    fn test_dialect_quoting() {
        let source = users(vec![id(), ColumnDescriptor::new("age", "integer", 2)]);
        let target = users(vec![id()]);

        let diffs = SchemaComparator::for_dialect(Dialect::Postgres).compare(&source, &target);
        assert_eq!(
            diffs[0].statement,
            "ALTER TABLE \"users\" ADD COLUMN \"age\" integer AFTER \"id\";"
        );
    }

    #[test]
    fn test_no_changes() {
        let schema = users(vec![id(), ColumnDescriptor::new("name", "text", 2)]);
        assert!(compare_schemas(&schema, &schema).is_empty());
    }

    #[test]
    fn test_entry_serializes_lowercase_kind() {
        let diffs = compare_schemas(&users(vec![id()]), &SchemaSnapshot::new("app"));
        let json = serde_json::to_value(&diffs[0]).unwrap();
        assert_eq!(json["kind"], "added");
        assert_eq!(json["table"], "users");
    }
}
