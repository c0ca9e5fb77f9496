//! PostgreSQL adapter.
//!
//! Metadata comes from `pg_catalog` for the connection's current schema.
//! PostgreSQL has no `SHOW CREATE TABLE`, so the CREATE statement is rebuilt
//! from the column metadata.

use async_trait::async_trait;
use oxide_sync_core::snapshot::{ColumnDescriptor, IndexDescriptor};
use oxide_sync_core::{Dialect, RowRecord, Value};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::debug;

use super::{DialectAdapter, mark_primary_key, normalize_default, order_by};
use crate::error::{Error, Result};
use crate::target::{ACQUIRE_TIMEOUT, ConnectionTarget};

const LIST_DATABASES_SQL: &str = r"
SELECT datname::text
FROM pg_database
WHERE NOT datistemplate AND datname <> 'postgres'
ORDER BY datname
";

const LIST_TABLES_SQL: &str = r"
SELECT c.relname::text
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p')
ORDER BY c.relname
";

const COLUMNS_SQL: &str = r"
SELECT a.attname::text,
       format_type(a.atttypid, a.atttypmod),
       NOT a.attnotnull,
       pg_get_expr(d.adbin, d.adrelid),
       a.attidentity::text
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE n.nspname = current_schema() AND c.relname = $1
  AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum
";

const INDEXES_SQL: &str = r"
SELECT ic.relname::text,
       a.attname::text,
       NOT i.indisunique,
       k.ord,
       i.indisprimary
FROM pg_index i
JOIN pg_class c ON c.oid = i.indrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_class ic ON ic.oid = i.indexrelid
CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
WHERE n.nspname = current_schema() AND c.relname = $1
ORDER BY ic.relname, k.ord
";

const PRIMARY_KEY_SQL: &str = r"
SELECT a.attname::text
FROM pg_index i
JOIN pg_class c ON c.oid = i.indrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
WHERE n.nspname = current_schema() AND c.relname = $1 AND i.indisprimary
ORDER BY k.ord
";

/// Adapter over a PostgreSQL database.
pub struct PostgresAdapter {
    pool: PgPool,
    database: String,
}

impl PostgresAdapter {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Connects to the target's database.
    pub async fn connect(target: &ConnectionTarget) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&target.url)
            .await?;

        let database = match target.database {
            Some(ref name) => name.clone(),
            None => {
                let (current,): (String,) = sqlx::query_as("SELECT current_database()::text")
                    .fetch_one(&pool)
                    .await?;
                current
            }
        };

        Ok(Self::new(pool, database))
    }

    fn quote(&self, name: &str) -> String {
        Dialect::Postgres.quote_identifier(name)
    }
}

#[async_trait]
impl DialectAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        let columns = self.column_descriptors(table).await?;
        if columns.is_empty() {
            return Err(Error::Metadata {
                table: table.to_string(),
                message: "table has no columns in the current schema".to_string(),
            });
        }
        let primary_key = self.primary_key_columns(table).await?;
        Ok(synthesize_create(table, &columns, &primary_key))
    }

    async fn column_descriptors(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows: Vec<(String, String, bool, Option<String>, String)> =
            sqlx::query_as(COLUMNS_SQL)
                .bind(table)
                .fetch_all(&self.pool)
                .await?;

        let mut columns: Vec<ColumnDescriptor> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (name, data_type, nullable, default, identity))| {
                let mut column =
                    ColumnDescriptor::new(name, data_type, i + 1).extra(identity_clause(&identity));
                column.nullable = nullable;
                column.default = default.as_deref().map(normalize_default);
                column
            })
            .collect();

        let primary_key = self.primary_key_columns(table).await?;
        mark_primary_key(&mut columns, &primary_key);
        Ok(columns)
    }

    async fn index_descriptors(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let rows: Vec<(String, String, bool, i64, bool)> = sqlx::query_as(INDEXES_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, column, non_unique, ord, primary)| {
                let mut index =
                    IndexDescriptor::new(name, column, usize::try_from(ord).unwrap_or_default());
                if !non_unique {
                    index = index.unique();
                }
                if primary {
                    index = index.primary();
                }
                index
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
            .map(|c| format!("{}::text", self.quote(&c.name)))
            .collect();
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection.join(", "),
            self.quote(table),
            order_by(Dialect::Postgres, primary_key)
        );
        debug!(sql = %sql, "Fetching rows");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, columns)).collect()
    }
}

fn decode_row(row: &PgRow, columns: &[ColumnDescriptor]) -> Result<RowRecord> {
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

/// Renders `pg_attribute.attidentity`.
fn identity_clause(identity: &str) -> &'static str {
    match identity {
        "a" => "GENERATED ALWAYS AS IDENTITY",
        "d" => "GENERATED BY DEFAULT AS IDENTITY",
        _ => "",
    }
}

/// Rebuilds a CREATE TABLE statement from column metadata.
fn synthesize_create(table: &str, columns: &[ColumnDescriptor], primary_key: &[String]) -> String {
    let quote = |name: &str| Dialect::Postgres.quote_identifier(name);

    let mut lines: Vec<String> = columns
        .iter()
        .map(|column| {
            let mut line = format!("{} {}", quote(&column.name), column.data_type);
            if !column.extra.is_empty() {
                line.push(' ');
                line.push_str(&column.extra);
            }
            if !column.nullable {
                line.push_str(" NOT NULL");
            }
            if let Some(ref default) = column.default {
                line.push_str(" DEFAULT ");
                line.push_str(&oxide_sync_core::defaults::render_default(default));
            }
            line
        })
        .collect();

    if !primary_key.is_empty() {
        let keys: Vec<String> = primary_key.iter().map(|k| quote(k)).collect();
        lines.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!("CREATE TABLE {} (\n  {}\n)", quote(table), lines.join(",\n  "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_create() {
        let columns = vec![
            ColumnDescriptor::new("id", "integer", 1)
                .not_null()
                .extra("GENERATED ALWAYS AS IDENTITY"),
            ColumnDescriptor::new("status", "character varying(10)", 2).default("new"),
            ColumnDescriptor::new("created_at", "timestamp with time zone", 3)
                .not_null()
                .default("now()"),
        ];
        let sql = synthesize_create("orders", &columns, &["id".to_string()]);
        assert_eq!(
            sql,
            "CREATE TABLE \"orders\" (\n  \
             \"id\" integer GENERATED ALWAYS AS IDENTITY NOT NULL,\n  \
             \"status\" character varying(10) DEFAULT 'new',\n  \
             \"created_at\" timestamp with time zone NOT NULL DEFAULT now(),\n  \
             PRIMARY KEY (\"id\")\n)"
        );
    }

    #[test]
    fn test_identity_clause() {
        assert_eq!(identity_clause("a"), "GENERATED ALWAYS AS IDENTITY");
        assert_eq!(identity_clause("d"), "GENERATED BY DEFAULT AS IDENTITY");
        assert_eq!(identity_clause(""), "");
    }
}
