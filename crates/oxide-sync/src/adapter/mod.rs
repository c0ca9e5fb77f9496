//! Database adapters.
//!
//! An adapter reads metadata and rows from one live database and hands them
//! to the engine as snapshots and row records. Each dialect with a sqlx
//! driver has its own adapter; they share the [`DialectAdapter`] capability
//! trait so the orchestration layer never needs to know which one it holds.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use async_trait::async_trait;
use oxide_sync_core::snapshot::{
    ColumnDescriptor, IndexDescriptor, PRIMARY_KEY_ROLE, SchemaSnapshot, TableSnapshot,
};
use oxide_sync_core::value::unescape_literal;
use oxide_sync_core::{Dialect, RowRecord};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::target::ConnectionTarget;

/// Read access to one database.
#[async_trait]
pub trait DialectAdapter: Send + Sync {
    /// Returns the dialect of the connected database.
    fn dialect(&self) -> Dialect;

    /// Returns the catalog name.
    fn database(&self) -> &str;

    /// Runs a trivial query to check the connection.
    async fn ping(&self) -> Result<()>;

    /// Lists the user catalogs reachable through this connection, sorted by
    /// name. System catalogs are left out.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Lists base tables, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Returns the table's CREATE statement.
    async fn create_statement(&self, table: &str) -> Result<String>;

    /// Describes the table's columns in ordinal order.
    async fn column_descriptors(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Describes the table's indexes, one entry per indexed column.
    async fn index_descriptors(&self, table: &str) -> Result<Vec<IndexDescriptor>>;

    /// Returns the primary-key columns in key order. Empty when the table
    /// has no primary key.
    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Counts the table's rows.
    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Fetches every row of the table ordered by primary key.
    ///
    /// Values are read as text and converted back to typed values for
    /// integer and boolean declared types.
    async fn fetch_all_rows(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        primary_key: &[String],
    ) -> Result<Vec<RowRecord>>;

    /// Returns the column names in ordinal order.
    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .column_descriptors(table)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Captures one table's structure.
    async fn table_snapshot(&self, table: &str) -> Result<TableSnapshot> {
        let create_sql = self.create_statement(table).await?;
        let mut snapshot = TableSnapshot::new(table).create_sql(create_sql);
        snapshot.columns = self.column_descriptors(table).await?;
        snapshot.indexes = self.index_descriptors(table).await?;
        Ok(snapshot)
    }

    /// Captures the structure of every table.
    async fn schema_snapshot(&self) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::new(self.database());
        for table in self.list_tables().await? {
            debug!(table = %table, "Reading table metadata");
            snapshot.insert(self.table_snapshot(&table).await?);
        }
        info!(
            database = %self.database(),
            tables = snapshot.tables.len(),
            "Captured schema snapshot"
        );
        Ok(snapshot)
    }
}

/// Opens an adapter for a connection target.
pub async fn connect(target: &ConnectionTarget) -> Result<Box<dyn DialectAdapter>> {
    info!(url = %target.redacted_url(), dialect = %target.dialect, "Connecting");
    match target.dialect {
        Dialect::Sqlite => Ok(Box::new(SqliteAdapter::connect(target).await?)),
        Dialect::MySql => Ok(Box::new(MySqlAdapter::connect(target).await?)),
        Dialect::Postgres => Ok(Box::new(PostgresAdapter::connect(target).await?)),
        Dialect::SqlServer => Err(Error::AdapterUnavailable(target.dialect)),
    }
}

/// Strips the quoting a database applies to string defaults in its catalog.
///
/// `'active'` and `'active'::character varying` both become `active`;
/// anything else is returned unchanged.
pub(crate) fn normalize_default(raw: &str) -> String {
    let literal = match raw.rsplit_once("::") {
        Some((value, _cast)) if value.ends_with('\'') => value,
        _ => raw,
    };
    unescape_literal(literal).unwrap_or_else(|| raw.to_string())
}

/// Marks the primary-key columns of a descriptor list.
pub(crate) fn mark_primary_key(columns: &mut [ColumnDescriptor], primary_key: &[String]) {
    for column in columns.iter_mut() {
        if primary_key.contains(&column.name) {
            column.key = PRIMARY_KEY_ROLE.to_string();
        }
    }
}

/// `ORDER BY` clause over the primary key, empty without one.
pub(crate) fn order_by(dialect: Dialect, primary_key: &[String]) -> String {
    if primary_key.is_empty() {
        return String::new();
    }
    let keys: Vec<String> = primary_key
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_default() {
        assert_eq!(normalize_default("'active'"), "active");
        assert_eq!(normalize_default("'O''Brien'"), "O'Brien");
        assert_eq!(normalize_default("'a::b'::text"), "a::b");
        assert_eq!(normalize_default("'{}'::jsonb"), "{}");
        assert_eq!(normalize_default("0"), "0");
        assert_eq!(normalize_default("CURRENT_TIMESTAMP"), "CURRENT_TIMESTAMP");
        assert_eq!(
            normalize_default("nextval('t_id_seq'::regclass)"),
            "nextval('t_id_seq'::regclass)"
        );
    }

    #[test]
    fn test_order_by() {
        assert_eq!(order_by(Dialect::Sqlite, &[]), "");
        assert_eq!(
            order_by(Dialect::MySql, &["a".to_string(), "b".to_string()]),
            " ORDER BY `a`, `b`"
        );
    }

    #[test]
    fn test_connect_sql_server_unavailable() {
        let target = ConnectionTarget::new(Dialect::SqlServer, "mssql://sa@localhost/app");
        let err = tokio_test::block_on(connect(&target))
            .err()
            .map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("No database adapter available for sqlserver")
        );
    }
}
