//! MySQL / MariaDB adapter.
//!
//! Metadata comes from `information_schema` and `SHOW CREATE TABLE`.
//! Catalog values are cast to `CHAR` because some servers report them with a
//! binary collation.

use async_trait::async_trait;
use oxide_sync_core::snapshot::{ColumnDescriptor, IndexDescriptor};
use oxide_sync_core::{Dialect, RowRecord, Value};
use sqlx::Row;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use tracing::debug;

use super::{DialectAdapter, normalize_default, order_by};
use crate::error::Result;
use crate::target::{ACQUIRE_TIMEOUT, ConnectionTarget};

const LIST_DATABASES_SQL: &str = r"
SELECT CAST(SCHEMA_NAME AS CHAR)
FROM information_schema.SCHEMATA
WHERE SCHEMA_NAME NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
ORDER BY SCHEMA_NAME
";

const LIST_TABLES_SQL: &str = r"
SELECT CAST(TABLE_NAME AS CHAR)
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME
";

const COLUMNS_SQL: &str = r"
SELECT CAST(COLUMN_NAME AS CHAR),
       CAST(COLUMN_TYPE AS CHAR),
       CAST(IS_NULLABLE AS CHAR),
       CAST(COLUMN_KEY AS CHAR),
       CAST(COLUMN_DEFAULT AS CHAR),
       CAST(EXTRA AS CHAR),
       CAST(ORDINAL_POSITION AS SIGNED)
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION
";

const INDEXES_SQL: &str = r"
SELECT CAST(INDEX_NAME AS CHAR),
       CAST(COLUMN_NAME AS CHAR),
       CAST(NON_UNIQUE AS SIGNED),
       CAST(SEQ_IN_INDEX AS SIGNED)
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY INDEX_NAME, SEQ_IN_INDEX
";

const PRIMARY_KEY_SQL: &str = r"
SELECT CAST(COLUMN_NAME AS CHAR)
FROM information_schema.KEY_COLUMN_USAGE
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
ORDER BY ORDINAL_POSITION
";

/// Adapter over a MySQL or MariaDB database.
pub struct MySqlAdapter {
    pool: MySqlPool,
    database: String,
}

impl MySqlAdapter {
    /// Wraps an existing pool.
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Connects to the target's server and schema.
    pub async fn connect(target: &ConnectionTarget) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&target.url)
            .await?;

        let (current,): (Option<String>,) = sqlx::query_as("SELECT CAST(DATABASE() AS CHAR)")
            .fetch_one(&pool)
            .await?;
        let database = target
            .database
            .clone()
            .or(current)
            .unwrap_or_else(|| target.database_name());

        Ok(Self::new(pool, database))
    }

    fn quote(&self, name: &str) -> String {
        Dialect::MySql.quote_identifier(name)
    }
}

#[async_trait]
impl DialectAdapter for MySqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(LIST_DATABASES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(LIST_TABLES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn create_statement(&self, table: &str) -> Result<String> {
        let row = sqlx::query(&format!("SHOW CREATE TABLE {}", self.quote(table)))
            .fetch_one(&self.pool)
            .await?;
        let bytes: Vec<u8> = row.try_get(1)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn column_descriptors(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        #[allow(clippy::type_complexity)]
        let rows: Vec<(String, String, String, String, Option<String>, String, i64)> =
            sqlx::query_as(COLUMNS_SQL)
                .bind(table)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(
                |(name, data_type, is_nullable, key, default, extra, position)| {
                    let mut column = ColumnDescriptor::new(
                        name,
                        data_type,
                        usize::try_from(position).unwrap_or_default(),
                    )
                    .key(key)
                    .extra(extra);
                    column.nullable = is_nullable.eq_ignore_ascii_case("YES");
                    column.default = default.as_deref().map(normalize_default);
                    column
                },
            )
            .collect())
    }

    async fn index_descriptors(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let rows: Vec<(String, Option<String>, i64, i64)> = sqlx::query_as(INDEXES_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(name, column, non_unique, seq)| {
                // Functional index parts have no column.
                let column = column?;
                let mut index =
                    IndexDescriptor::new(name, column, usize::try_from(seq).unwrap_or_default());
                if non_unique == 0 {
                    index = index.unique();
                }
                Some(index)
            })
            .collect())
    }

    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(PRIMARY_KEY_SQL)
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
            .map(|c| format!("CAST({} AS BINARY)", self.quote(&c.name)))
            .collect();
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.join(", "),
            self.quote(table),
            order_by(Dialect::MySql, primary_key)
        );
        debug!(sql = %sql, "Fetching rows");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, columns)).collect()
    }
}

/// Reads every column as raw bytes and decodes them lossily as UTF-8.
fn decode_row(row: &MySqlRow, columns: &[ColumnDescriptor]) -> Result<RowRecord> {
    let mut record = RowRecord::new();
    for (i, column) in columns.iter().enumerate() {
        let bytes: Option<Vec<u8>> = row.try_get(i)?;
        let text = bytes.map(|b| String::from_utf8_lossy(&b).into_owned());
        record.insert(
            column.name.clone(),
            Value::from_column_text(&column.data_type, text),
        );
    }
    Ok(record)
}
