//! Comparison orchestration.
//!
//! Each operation reads what it needs from the adapters, then hands the
//! snapshots or row sets to the engine. Statements are generated for the
//! target's dialect. Adapter errors are returned as-is; nothing is retried.

use futures::try_join;
use oxide_sync_core::{
    DataComparator, DataDiffEntry, DataSyncSummary, DiffEntry, KeyedRows, SchemaComparator,
    SchemaSnapshot, SyncError, SyncOptions,
};
use tracing::info;

use crate::adapter::DialectAdapter;
use crate::error::Result;

/// Result of comparing one table's data.
#[derive(Debug, Clone)]
pub struct TableDataDiff {
    /// Primary-key columns, from the source.
    pub primary_key: Vec<String>,
    /// Column names in source ordinal order.
    pub columns: Vec<String>,
    /// Row differences.
    pub entries: Vec<DataDiffEntry>,
}

/// Compares the structure of two databases.
pub async fn compare_databases(
    source: &dyn DialectAdapter,
    target: &dyn DialectAdapter,
) -> Result<Vec<DiffEntry>> {
    let (source_schema, target_schema) =
        try_join!(source.schema_snapshot(), target.schema_snapshot())?;

    let entries =
        SchemaComparator::for_dialect(target.dialect()).compare(&source_schema, &target_schema);
    info!(
        source_db = %source.database(),
        target_db = %target.database(),
        differences = entries.len(),
        "Schema comparison complete"
    );
    Ok(entries)
}

/// Compares one table's rows.
///
/// Fails with [`SyncError::NoPrimaryKey`] before fetching any row when the
/// source table has no primary key. Target rows are read with the source's
/// column list, so a column that exists only in the target is ignored and a
/// source column missing from the target is a database error.
pub async fn compare_table_data(
    source: &dyn DialectAdapter,
    target: &dyn DialectAdapter,
    table: &str,
    options: SyncOptions,
) -> Result<Vec<DataDiffEntry>> {
    Ok(diff_table(source, target, table, options).await?.entries)
}

/// Compares one table's rows and keeps the key and column lists.
pub async fn diff_table(
    source: &dyn DialectAdapter,
    target: &dyn DialectAdapter,
    table: &str,
    options: SyncOptions,
) -> Result<TableDataDiff> {
    let primary_key = source.primary_key_columns(table).await?;
    if primary_key.is_empty() {
        return Err(SyncError::NoPrimaryKey {
            table: table.to_string(),
        }
        .into());
    }

    // Both sides are read with the source's columns.
    let source_columns = source.column_descriptors(table).await?;
    let (source_rows, target_rows) = try_join!(
        source.fetch_all_rows(table, &source_columns, &primary_key),
        target.fetch_all_rows(table, &source_columns, &primary_key)
    )?;

    let source_keyed = KeyedRows::from_rows(table, &primary_key, source_rows)?;
    let target_keyed = KeyedRows::from_rows(table, &primary_key, target_rows)?;

    let columns: Vec<String> = source_columns.into_iter().map(|c| c.name).collect();
    let entries = DataComparator::for_dialect(target.dialect())
        .with_options(options)
        .compare(table, &source_keyed, &target_keyed, &columns);

    info!(
        table = %table,
        source_rows = source_keyed.len(),
        target_rows = target_keyed.len(),
        differences = entries.len(),
        "Data comparison complete"
    );

    Ok(TableDataDiff {
        primary_key,
        columns,
        entries,
    })
}

/// Summarizes a table comparison: row counts on both sides plus per-kind
/// difference counts.
pub async fn data_sync_summary(
    source: &dyn DialectAdapter,
    target: &dyn DialectAdapter,
    table: &str,
) -> Result<DataSyncSummary> {
    let diff = diff_table(source, target, table, SyncOptions::default()).await?;
    let (source_count, target_count) =
        try_join!(source.count_rows(table), target.count_rows(table))?;

    Ok(
        DataSyncSummary::from_entries(table, diff.primary_key, diff.columns, &diff.entries)
            .with_counts(source_count, target_count),
    )
}

/// Reads the structure of one table, or of every table when `table` is
/// `None`.
pub async fn read_schema(
    adapter: &dyn DialectAdapter,
    table: Option<&str>,
) -> Result<SchemaSnapshot> {
    match table {
        Some(table) => {
            let mut snapshot = SchemaSnapshot::new(adapter.database());
            snapshot.insert(adapter.table_snapshot(table).await?);
            Ok(snapshot)
        }
        None => adapter.schema_snapshot().await,
    }
}

/// Lists every table with its primary key, columns and row count.
///
/// Only the source side is read, so target and difference counts are zero.
pub async fn tables_for_sync(adapter: &dyn DialectAdapter) -> Result<Vec<DataSyncSummary>> {
    let mut tables = Vec::new();
    for table in adapter.list_tables().await? {
        let primary_keys = adapter.primary_key_columns(&table).await?;
        let columns = adapter.columns(&table).await?;
        let count = adapter.count_rows(&table).await?;
        tables.push(DataSyncSummary {
            table,
            primary_keys,
            columns,
            source_count: count,
            ..DataSyncSummary::default()
        });
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SqliteAdapter;
    use crate::error::Error;
    use oxide_sync_core::{DataDiffKind, DiffKind};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn database(name: &str, statements: &[&str]) -> SqliteAdapter {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        for sql in statements {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        SqliteAdapter::new(pool, name)
    }

    const PEOPLE: &str = "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT)";

    async fn people_pair() -> (SqliteAdapter, SqliteAdapter) {
        let source = database(
            "source",
            &[
                PEOPLE,
                "INSERT INTO people VALUES (1, 'a'), (2, 'b'), (4, 'O''Brien'), (5, NULL)",
            ],
        )
        .await;
        let target = database(
            "target",
            &[
                PEOPLE,
                "INSERT INTO people VALUES (2, 'B'), (3, 'c'), (4, 'OBrien'), (5, '')",
            ],
        )
        .await;
        (source, target)
    }

    #[tokio::test]
    async fn test_compare_databases() {
        let source = database(
            "source",
            &[
                "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)",
                "CREATE INDEX idx_users_email ON users (email)",
                "CREATE TABLE orders (id INTEGER PRIMARY KEY)",
            ],
        )
        .await;
        let target = database(
            "target",
            &[
                "CREATE TABLE users (id INTEGER PRIMARY KEY)",
                "CREATE TABLE legacy (id INTEGER PRIMARY KEY)",
            ],
        )
        .await;

        let entries = compare_databases(&source, &target).await.unwrap();
        let listing: Vec<(DiffKind, &str, &str)> = entries
            .iter()
            .map(|e| (e.kind, e.table.as_str(), e.statement.as_str()))
            .collect();

        assert_eq!(
            listing,
            vec![
                (
                    DiffKind::Added,
                    "orders",
                    "CREATE TABLE orders (id INTEGER PRIMARY KEY);"
                ),
                (
                    DiffKind::Modified,
                    "users",
                    "ALTER TABLE \"users\" ADD COLUMN \"email\" TEXT NOT NULL AFTER \"id\";"
                ),
                (
                    DiffKind::Modified,
                    "users",
                    "ALTER TABLE \"users\" ADD INDEX \"idx_users_email\" (\"email\");"
                ),
                (DiffKind::Removed, "legacy", "DROP TABLE \"legacy\";"),
            ]
        );
    }

    #[tokio::test]
    async fn test_same_database_has_no_schema_differences() {
        let (source, _) = people_pair().await;
        assert!(compare_databases(&source, &source).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compare_table_data() {
        let (source, target) = people_pair().await;
        let entries = compare_table_data(&source, &target, "people", SyncOptions::default())
            .await
            .unwrap();

        let statements: Vec<(DataDiffKind, &str)> = entries
            .iter()
            .map(|e| (e.kind, e.statement.as_str()))
            .collect();
        assert_eq!(
            statements,
            vec![
                (
                    DataDiffKind::Insert,
                    "INSERT INTO \"people\" (\"id\", \"name\") VALUES (1, 'a');"
                ),
                (
                    DataDiffKind::Update,
                    "UPDATE \"people\" SET \"name\" = 'b' WHERE \"id\" = 2;"
                ),
                (
                    DataDiffKind::Update,
                    "UPDATE \"people\" SET \"name\" = 'O''Brien' WHERE \"id\" = 4;"
                ),
                (
                    DataDiffKind::Update,
                    "UPDATE \"people\" SET \"name\" = NULL WHERE \"id\" = 5;"
                ),
                (DataDiffKind::Delete, "DELETE FROM \"people\" WHERE \"id\" = 3;"),
            ]
        );
    }

    #[tokio::test]
    async fn test_executing_statements_converges() {
        let (source, target) = people_pair().await;
        let entries = compare_table_data(&source, &target, "people", SyncOptions::default())
            .await
            .unwrap();
        assert!(!entries.is_empty());

        for entry in &entries {
            sqlx::query(&entry.statement)
                .execute(target.pool())
                .await
                .unwrap();
        }

        let remaining = compare_table_data(&source, &target, "people", SyncOptions::default())
            .await
            .unwrap();
        assert!(remaining.is_empty(), "leftover differences: {remaining:?}");
    }

    #[tokio::test]
    async fn test_extra_target_column_is_ignored() {
        let source = database(
            "source",
            &[PEOPLE, "INSERT INTO people VALUES (1, 'a'), (2, 'b'), (3, 'c')"],
        )
        .await;
        let target = database(
            "target",
            &[
                "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, legacy TEXT)",
                "INSERT INTO people VALUES (1, 'a', 'x'), (2, 'B', 'y'), (4, 'd', NULL)",
            ],
        )
        .await;

        let entries = compare_table_data(&source, &target, "people", SyncOptions::default())
            .await
            .unwrap();
        let statements: Vec<&str> = entries.iter().map(|e| e.statement.as_str()).collect();
        assert_eq!(
            statements,
            vec![
                "UPDATE \"people\" SET \"name\" = 'b' WHERE \"id\" = 2;",
                "INSERT INTO \"people\" (\"id\", \"name\") VALUES (3, 'c');",
                "DELETE FROM \"people\" WHERE \"id\" = 4;",
            ]
        );

        for entry in &entries {
            sqlx::query(&entry.statement)
                .execute(target.pool())
                .await
                .unwrap();
        }
        let remaining = compare_table_data(&source, &target, "people", SyncOptions::default())
            .await
            .unwrap();
        assert!(remaining.is_empty(), "leftover differences: {remaining:?}");
    }

    #[tokio::test]
    async fn test_key_only_source_table() {
        let source = database(
            "source",
            &[
                "CREATE TABLE tags (id INTEGER PRIMARY KEY)",
                "INSERT INTO tags VALUES (1), (2)",
            ],
        )
        .await;
        let target = database(
            "target",
            &[
                "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT)",
                "INSERT INTO tags VALUES (1, 'x'), (3, 'z')",
            ],
        )
        .await;

        let entries = compare_table_data(&source, &target, "tags", SyncOptions::default())
            .await
            .unwrap();
        let listing: Vec<(DataDiffKind, &str)> = entries
            .iter()
            .map(|e| (e.kind, e.statement.as_str()))
            .collect();
        assert_eq!(
            listing,
            vec![
                (DataDiffKind::Insert, "INSERT INTO \"tags\" (\"id\") VALUES (2);"),
                (DataDiffKind::Delete, "DELETE FROM \"tags\" WHERE \"id\" = 3;"),
            ]
        );
    }

    #[tokio::test]
    async fn test_options_restrict_kinds() {
        let (source, target) = people_pair().await;
        let options = SyncOptions {
            insert: true,
            update: false,
            delete: false,
        };
        let entries = compare_table_data(&source, &target, "people", options)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DataDiffKind::Insert);
    }

    #[tokio::test]
    async fn test_table_without_primary_key() {
        let source = database("source", &["CREATE TABLE audit (event TEXT)"]).await;
        let target = database("target", &[]).await;

        // The target has no such table; the key check fails first.
        let err = compare_table_data(&source, &target, "audit", SyncOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Sync(SyncError::NoPrimaryKey { ref table }) if table == "audit"
        ));
    }

    #[tokio::test]
    async fn test_data_sync_summary() {
        let (source, target) = people_pair().await;
        let summary = data_sync_summary(&source, &target, "people").await.unwrap();

        assert_eq!(summary.table, "people");
        assert_eq!(summary.primary_keys, vec!["id".to_string()]);
        assert_eq!(summary.columns, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(summary.source_count, 4);
        assert_eq!(summary.target_count, 4);
        assert_eq!(summary.insert_count, 1);
        assert_eq!(summary.update_count, 3);
        assert_eq!(summary.delete_count, 1);
    }

    #[tokio::test]
    async fn test_read_schema() {
        let adapter = database("app", &[PEOPLE, "CREATE TABLE audit (event TEXT)"]).await;

        let all = read_schema(&adapter, None).await.unwrap();
        assert_eq!(all.tables.keys().collect::<Vec<_>>(), vec!["audit", "people"]);

        let one = read_schema(&adapter, Some("people")).await.unwrap();
        assert_eq!(one.database, "app");
        assert_eq!(one.tables.keys().collect::<Vec<_>>(), vec!["people"]);
        assert_eq!(
            one.get_table("people").map(|t| t.primary_key_columns()),
            Some(vec!["id".to_string()])
        );

        let err = read_schema(&adapter, Some("missing")).await.unwrap_err();
        assert!(matches!(err, Error::Metadata { ref table, .. } if table == "missing"));
    }

    #[tokio::test]
    async fn test_tables_for_sync() {
        let adapter = database(
            "app",
            &[
                PEOPLE,
                "CREATE TABLE audit (event TEXT)",
                "INSERT INTO people VALUES (1, 'a'), (2, 'b')",
            ],
        )
        .await;

        let tables = tables_for_sync(&adapter).await.unwrap();
        assert_eq!(tables.len(), 2);

        assert_eq!(tables[0].table, "audit");
        assert!(tables[0].primary_keys.is_empty());
        assert_eq!(tables[0].source_count, 0);

        assert_eq!(tables[1].table, "people");
        assert_eq!(tables[1].primary_keys, vec!["id".to_string()]);
        assert_eq!(tables[1].source_count, 2);
        assert_eq!(tables[1].target_count, 0);
    }
}
