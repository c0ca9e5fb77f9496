//! Schema and data comparison between two live databases.
//!
//! `oxide-sync` connects to a source and a target database, reads their
//! structure and rows, and reports the SQL that would bring the target in
//! line with the source. It never executes the generated statements.
//!
//! # Architecture
//!
//! - **Adapters** - Read metadata and rows from SQLite, MySQL and PostgreSQL
//! - **Compare** - Fetches from both sides and runs the `oxide-sync-core` engines
//! - **Profiles** - Named connection targets stored in a JSON file
//! - **Target** - Dialect plus connection URL
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_sync::prelude::*;
//!
//! # async fn run() -> oxide_sync::error::Result<()> {
//! let source = connect(&ConnectionTarget::from_url("sqlite:prod.db")?).await?;
//! let target = connect(&ConnectionTarget::from_url("sqlite:staging.db")?).await?;
//!
//! for entry in compare_databases(source.as_ref(), target.as_ref()).await? {
//!     println!("{}", entry.statement);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Check a connection and show one table
//! oxide-sync ping --source prod
//! oxide-sync schema --source prod --table customers
//!
//! # Structural differences
//! oxide-sync schema-diff --source prod --target mysql://root@localhost/staging
//!
//! # Row differences of one table
//! oxide-sync data-diff --source prod --target staging --table customers
//!
//! # Save a connection profile
//! oxide-sync profile save prod postgres://app@db.internal/shop
//! ```

pub mod adapter;
pub mod compare;
pub mod error;
pub mod profiles;
pub mod target;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::adapter::{
        DialectAdapter, MySqlAdapter, PostgresAdapter, SqliteAdapter, connect,
    };
    pub use crate::compare::{
        TableDataDiff, compare_databases, compare_table_data, data_sync_summary, diff_table,
        read_schema, tables_for_sync,
    };
    pub use crate::error::{Error, Result};
    pub use crate::profiles::{Profile, ProfileStore};
    pub use crate::target::ConnectionTarget;
    pub use oxide_sync_core::prelude::*;
}
