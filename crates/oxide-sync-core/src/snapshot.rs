//! Schema snapshot types.
//!
//! A snapshot is the structural description of one database as reported by a
//! dialect adapter: tables, their columns in ordinal order and their indexes.
//! The schema comparator works purely on these types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key-role tag of a primary-key column.
pub const PRIMARY_KEY_ROLE: &str = "PRI";

/// Name under which MySQL reports the primary-key index.
pub const PRIMARY_INDEX_NAME: &str = "PRIMARY";

/// Description of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Declared type text, verbatim from the database (e.g. `varchar(255)`).
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Key-role tag (`PRI`, `UNI`, `MUL` or empty).
    #[serde(default)]
    pub key: String,
    /// Default value text, if the column has one.
    #[serde(default)]
    pub default: Option<String>,
    /// Extra attributes (e.g. `auto_increment`).
    #[serde(default)]
    pub extra: String,
    /// 1-based ordinal position within the table.
    pub position: usize,
}

impl ColumnDescriptor {
    /// Creates a nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            key: String::new(),
            default: None,
            extra: String::new(),
            position,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.key = PRIMARY_KEY_ROLE.to_string();
        self.nullable = false;
        self
    }

    /// Sets the key-role tag.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the default value text.
    #[must_use]
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the extra attribute text.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Returns whether this column is part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.key == PRIMARY_KEY_ROLE
    }

    /// Column equality as used by the schema comparator.
    ///
    /// Compares type text, nullability, extra attributes and the default.
    /// Two absent defaults are equal; an absent default never equals a
    /// present one, even an empty one.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.nullable == other.nullable
            && self.extra == other.extra
            && self.default == other.default
    }
}

/// One column of an index.
///
/// A composite index is represented by several descriptors sharing a name,
/// ordered by `seq_in_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Indexed column.
    pub column: String,
    /// Whether the index allows duplicate values.
    pub non_unique: bool,
    /// 1-based position of the column within the index.
    pub seq_in_index: usize,
    /// Whether this index backs the primary key.
    #[serde(default)]
    pub primary: bool,
}

impl IndexDescriptor {
    /// Creates a non-unique index entry.
    ///
    /// An entry named `PRIMARY` is flagged as the primary-key index.
    #[must_use]
    pub fn new(name: impl Into<String>, column: impl Into<String>, seq_in_index: usize) -> Self {
        let name = name.into();
        let primary = name == PRIMARY_INDEX_NAME;
        Self {
            name,
            column: column.into(),
            non_unique: !primary,
            seq_in_index,
            primary,
        }
    }

    /// Marks the entry as belonging to a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.non_unique = false;
        self
    }

    /// Marks the entry as belonging to the primary-key index.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.non_unique = false;
        self
    }

    /// Returns whether this entry belongs to the primary-key index.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary || self.name == PRIMARY_INDEX_NAME
    }
}

/// Structure of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table name.
    pub name: String,
    /// Dialect-rendered CREATE statement, used verbatim for new tables.
    pub create_sql: String,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnDescriptor>,
    /// Index entries.
    pub indexes: Vec<IndexDescriptor>,
}

impl TableSnapshot {
    /// Creates an empty table snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            create_sql: String::new(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Sets the CREATE statement text.
    #[must_use]
    pub fn create_sql(mut self, sql: impl Into<String>) -> Self {
        self.create_sql = sql.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends an index entry.
    #[must_use]
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets the column at a 1-based ordinal position.
    #[must_use]
    pub fn column_at(&self, position: usize) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.position == position)
    }

    /// Returns the primary-key column names in ordinal order.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<String> {
        let mut columns: Vec<&ColumnDescriptor> =
            self.columns.iter().filter(|c| c.is_primary_key()).collect();
        columns.sort_by_key(|c| c.position);
        columns.into_iter().map(|c| c.name.clone()).collect()
    }
}

/// Structure of a whole database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Database or catalog name.
    pub database: String,
    /// Tables keyed by exact, case-sensitive name.
    pub tables: BTreeMap<String, TableSnapshot>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a table.
    #[must_use]
    pub fn table(mut self, table: TableSnapshot) -> Self {
        self.insert(table);
        self
    }

    /// Inserts (or replaces) a table.
    pub fn insert(&mut self, table: TableSnapshot) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }

    /// Returns table names in ascending order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
