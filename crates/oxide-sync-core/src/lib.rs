//! # oxide-sync-core
//!
//! Schema and row-level comparison of two relational databases.
//!
//! This crate provides:
//! - A schema comparator that turns two [`SchemaSnapshot`]s into the DDL
//!   bringing the target in line with the source
//! - A data comparator that matches rows by composite primary key and emits
//!   `INSERT`, `UPDATE` and `DELETE` statements
//! - Dialect-aware identifier quoting and SQL literal escaping
//!
//! Nothing here talks to a database. Adapters in `oxide-sync` produce the
//! snapshots and row sets this crate consumes.
//!
//! ## Schema Comparison
//!
//! ```rust
//! use oxide_sync_core::prelude::*;
//!
//! let source = SchemaSnapshot::new("app").table(
//!     TableSnapshot::new("users")
//!         .column(ColumnDescriptor::new("id", "int", 1).primary_key())
//!         .column(ColumnDescriptor::new("email", "varchar(255)", 2)),
//! );
//! let target = SchemaSnapshot::new("app").table(
//!     TableSnapshot::new("users").column(ColumnDescriptor::new("id", "int", 1).primary_key()),
//! );
//!
//! let diffs = compare_schemas(&source, &target);
//! assert_eq!(
//!     diffs[0].statement,
//!     "ALTER TABLE `users` ADD COLUMN `email` varchar(255) AFTER `id`;"
//! );
//! ```
//!
//! ## Data Comparison
//!
//! ```rust
//! use oxide_sync_core::prelude::*;
//!
//! let row = |id: i64, name: &str| -> RowRecord {
//!     [("id".to_string(), Value::Int(id)), ("name".to_string(), Value::from(name))]
//!         .into_iter()
//!         .collect()
//! };
//! let pk = vec!["id".to_string()];
//!
//! let diffs = compare_table_data("people", &[row(1, "O'Brien")], &[], &pk, &[]).unwrap();
//! assert_eq!(
//!     diffs[0].statement,
//!     "INSERT INTO `people` (`id`, `name`) VALUES (1, 'O''Brien');"
//! );
//! ```

pub mod data_diff;
pub mod defaults;
pub mod dialect;
pub mod error;
pub mod rows;
pub mod schema_diff;
pub mod snapshot;
pub mod statement;
pub mod value;

pub use data_diff::{
    DataComparator, DataDiffEntry, DataDiffKind, DataSyncSummary, SyncOptions, compare_table_data,
};
pub use dialect::Dialect;
pub use error::{Result, SyncError};
pub use rows::{KeyedRows, PrimaryKeyValue, RowRecord};
pub use schema_diff::{DiffEntry, DiffKind, SchemaComparator, compare_schemas};
pub use snapshot::{ColumnDescriptor, IndexDescriptor, SchemaSnapshot, TableSnapshot};
pub use statement::StatementBuilder;
pub use value::{Value, escape_value};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::data_diff::{
        DataComparator, DataDiffEntry, DataDiffKind, DataSyncSummary, SyncOptions,
        compare_table_data,
    };
    pub use crate::dialect::Dialect;
    pub use crate::error::SyncError;
    pub use crate::rows::{KeyedRows, PrimaryKeyValue, RowRecord};
    pub use crate::schema_diff::{DiffEntry, DiffKind, SchemaComparator, compare_schemas};
    pub use crate::snapshot::{ColumnDescriptor, IndexDescriptor, SchemaSnapshot, TableSnapshot};
    pub use crate::value::Value;
}
