//! SQLite adapter.
//!
//! Metadata comes from `sqlite_master` and the `pragma_table_info`,
//! `pragma_index_list` and `pragma_index_info` table-valued functions.

use async_trait::async_trait;
use oxide_sync_core::snapshot::{ColumnDescriptor, IndexDescriptor, PRIMARY_KEY_ROLE};
use oxide_sync_core::{Dialect, RowRecord, Value};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::{DialectAdapter, normalize_default, order_by};
use crate::error::{Error, Result};
use crate::target::{ACQUIRE_TIMEOUT, ConnectionTarget};

/// Index origin SQLite reports for the primary-key index.
const PRIMARY_KEY_ORIGIN: &str = "pk";

/// Adapter over a SQLite database.
pub struct SqliteAdapter {
    pool: SqlitePool,
    database: String,
}

impl SqliteAdapter {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Connects to the target's database file.
    pub async fn connect(target: &ConnectionTarget) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&target.url)
            .await?;
        Ok(Self::new(pool, target.database_name()))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn quote(&self, name: &str) -> String {
        Dialect::Sqlite.quote_identifier(name)
    }
}

#[async_trait]
impl DialectAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM pragma_database_list WHERE name <> 'temp' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn create_statement(&self, table: &str) -> Result<String> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&self.pool)
                .await?;

        row.and_then(|(sql,)| sql).ok_or_else(|| Error::Metadata {
            table: table.to_string(),
            message: "no CREATE statement in sqlite_master".to_string(),
        })
    }

    async fn column_descriptors(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (name, data_type, not_null, default, pk))| {
                let mut column = ColumnDescriptor::new(name, data_type, i + 1);
                column.nullable = not_null == 0 && pk == 0;
                column.default = default.as_deref().map(normalize_default);
                if pk > 0 {
                    column.key = PRIMARY_KEY_ROLE.to_string();
                }
                column
            })
            .collect())
    }

    async fn index_descriptors(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let rows: Vec<(String, Option<String>, i64, i64, String)> = sqlx::query_as(
            r#"SELECT il.name, ii.name, il."unique", ii.seqno, il.origin
               FROM pragma_index_list(?) AS il, pragma_index_info(il.name) AS ii
               ORDER BY il.name, ii.seqno"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut indexes = Vec::with_capacity(rows.len());
        for (name, column, unique, seqno, origin) in rows {
            // Expression index columns have no name.
            let Some(column) = column else { continue };
            let seq = usize::try_from(seqno).unwrap_or_default() + 1;
            let mut index = IndexDescriptor::new(name, column, seq);
            if unique != 0 {
                index = index.unique();
            }
            if origin == PRIMARY_KEY_ORIGIN {
                index = index.primary();
            }
            indexes.push(index);
        }
        Ok(indexes)
    }

    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk")
                .bind(table)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.quote(table)))
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch_all_rows(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        primary_key: &[String],
    ) -> Result<Vec<RowRecord>> {
        let projection: Vec<String> = columns
            .iter()
            .map(|c| format!("CAST({} AS TEXT)", self.quote(&c.name)))
            .collect();
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.join(", "),
            self.quote(table),
            order_by(Dialect::Sqlite, primary_key)
        );
        debug!(sql = %sql, "Fetching rows");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, columns)).collect()
    }
}

fn decode_row(row: &SqliteRow, columns: &[ColumnDescriptor]) -> Result<RowRecord> {
    let mut record = RowRecord::new();
    for (i, column) in columns.iter().enumerate() {
        let text: Option<String> = row.try_get(i)?;
        record.insert(
            column.name.clone(),
            Value::from_column_text(&column.data_type, text),
        );
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn adapter() -> SqliteAdapter {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();

        for sql in [
            "CREATE TABLE customers (
                id INTEGER PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                status TEXT DEFAULT 'active',
                score REAL DEFAULT 0,
                active BOOLEAN,
                UNIQUE (name)
            )",
            "CREATE INDEX idx_customers_status ON customers (status, score)",
            "CREATE TABLE order_items (order_id INTEGER, line INTEGER, qty INTEGER, PRIMARY KEY (order_id, line))",
            "INSERT INTO customers (id, name, status, score, active) VALUES (2, 'O''Brien', NULL, 1.5, 1)",
            "INSERT INTO customers (id, name, score, active) VALUES (1, 'Ada', 3, 0)",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }

        SqliteAdapter::new(pool, "main")
    }

    #[tokio::test]
    async fn test_ping_and_list_databases() {
        let adapter = adapter().await;
        adapter.ping().await.unwrap();
        assert_eq!(adapter.list_databases().await.unwrap(), vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn test_attached_database_is_listed() {
        let adapter = adapter().await;
        sqlx::query("ATTACH DATABASE ':memory:' AS archive")
            .execute(adapter.pool())
            .await
            .unwrap();
        assert_eq!(
            adapter.list_databases().await.unwrap(),
            vec!["archive".to_string(), "main".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_tables() {
        let adapter = adapter().await;
        assert_eq!(
            adapter.list_tables().await.unwrap(),
            vec!["customers".to_string(), "order_items".to_string()]
        );
    }

    #[tokio::test]
    async fn test_column_descriptors() {
        let adapter = adapter().await;
        let columns = adapter.column_descriptors("customers").await.unwrap();

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "status", "score", "active"]);

        assert!(columns[0].is_primary_key());
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].data_type, "VARCHAR(100)");
        assert!(!columns[1].nullable);
        assert_eq!(columns[2].default.as_deref(), Some("active"));
        assert_eq!(columns[3].default.as_deref(), Some("0"));
        assert_eq!(columns[4].position, 5);
    }

    #[tokio::test]
    async fn test_index_descriptors() {
        let adapter = adapter().await;
        let indexes = adapter.index_descriptors("customers").await.unwrap();

        let status: Vec<(&str, usize)> = indexes
            .iter()
            .filter(|i| i.name == "idx_customers_status")
            .map(|i| (i.column.as_str(), i.seq_in_index))
            .collect();
        assert_eq!(status, vec![("status", 1), ("score", 2)]);

        let unique = indexes.iter().find(|i| i.column == "name").unwrap();
        assert!(!unique.non_unique);
        assert!(!unique.is_primary());
    }

    #[tokio::test]
    async fn test_composite_primary_key_index_is_flagged() {
        let adapter = adapter().await;
        let indexes = adapter.index_descriptors("order_items").await.unwrap();
        assert!(!indexes.is_empty());
        assert!(indexes.iter().all(IndexDescriptor::is_primary));

        assert_eq!(
            adapter.primary_key_columns("order_items").await.unwrap(),
            vec!["order_id".to_string(), "line".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_all_rows_typed_and_ordered() {
        let adapter = adapter().await;
        let columns = adapter.column_descriptors("customers").await.unwrap();
        let rows = adapter
            .fetch_all_rows("customers", &columns, &["id".to_string()])
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("active"), Some(&Value::Bool(false)));
        assert_eq!(rows[0].get("status"), Some(&Value::from("active")));
        assert_eq!(rows[1].get("name"), Some(&Value::from("O'Brien")));
        assert_eq!(rows[1].get("status"), Some(&Value::Null));
        assert_eq!(rows[1].get("score"), Some(&Value::from("1.5")));
    }

    #[tokio::test]
    async fn test_schema_snapshot() {
        let adapter = adapter().await;
        let snapshot = adapter.schema_snapshot().await.unwrap();

        assert_eq!(snapshot.database, "main");
        let customers = snapshot.get_table("customers").unwrap();
        assert!(customers.create_sql.starts_with("CREATE TABLE customers"));
        assert_eq!(customers.primary_key_columns(), vec!["id".to_string()]);
        assert_eq!(adapter.count_rows("customers").await.unwrap(), 2);
        assert_eq!(
            adapter.columns("order_items").await.unwrap(),
            vec!["order_id", "line", "qty"]
        );
    }

    #[tokio::test]
    async fn test_missing_table_create_statement() {
        let adapter = adapter().await;
        let err = adapter.create_statement("nope").await.unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
    }
}
