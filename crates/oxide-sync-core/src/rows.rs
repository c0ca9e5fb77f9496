//! Row records and primary-key indexing.
//!
//! The data comparator needs both tables' full extents in memory, each
//! indexed by a composite primary-key string. There is no streaming mode:
//! tables whose rows do not fit in memory cannot be compared.

use std::collections::{BTreeMap, HashMap};

use serde::ser::{Serialize, Serializer};
use tracing::warn;

use crate::error::{Result, SyncError};
use crate::value::Value;

/// A fetched row: column name to normalized value.
pub type RowRecord = BTreeMap<String, Value>;

/// Separator between the components of a composite key.
pub const KEY_DELIMITER: char = '|';

/// Primary-key values of one row, in primary-key column order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyValue {
    parts: Vec<(String, Value)>,
}

impl PrimaryKeyValue {
    /// Extracts the primary-key values of a row.
    ///
    /// A key column missing from the row is treated as NULL.
    #[must_use]
    pub fn from_row(row: &RowRecord, primary_key: &[String]) -> Self {
        let parts = primary_key
            .iter()
            .map(|column| {
                let value = row.get(column).cloned().unwrap_or(Value::Null);
                (column.clone(), value)
            })
            .collect();
        Self { parts }
    }

    /// Returns the value of one key column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.parts
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Iterates over `(column, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.parts.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the lookup string for this key.
    ///
    /// Components are the values' text forms joined by [`KEY_DELIMITER`],
    /// so `1` and `'1'` address the same record.
    ///
    /// The encoding is not injective. A NULL component renders as `NULL`
    /// and matches the text value `'NULL'`, and a component containing the
    /// delimiter can shift a boundary (`("a|b", "c")` and `("a", "b|c")`
    /// share a key). Such keys address the same record.
    #[must_use]
    pub fn composite_key(&self) -> String {
        let mut key = String::new();
        for (i, (_, value)) in self.parts.iter().enumerate() {
            if i > 0 {
                key.push(KEY_DELIMITER);
            }
            key.push_str(&value.to_string());
        }
        key
    }
}

impl Serialize for PrimaryKeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.parts.iter().map(|(name, value)| (name, value)))
    }
}

/// Builds the composite key of a row.
#[must_use]
pub fn composite_key(row: &RowRecord, primary_key: &[String]) -> String {
    PrimaryKeyValue::from_row(row, primary_key).composite_key()
}

/// Compares two rows by the text form of every column.
///
/// Rows with a different number of columns are never equal.
#[must_use]
pub fn rows_equal(a: &RowRecord, b: &RowRecord) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(column, value)| value.text() == b.get(column).and_then(Value::text))
}

/// A table's rows indexed by composite primary key.
///
/// Iteration follows insertion (fetch) order. Pushing a row whose key is
/// already present replaces the earlier row in place.
#[derive(Debug, Clone)]
pub struct KeyedRows {
    primary_key: Vec<String>,
    order: Vec<String>,
    rows: HashMap<String, RowRecord>,
}

impl KeyedRows {
    /// Creates an empty row set for a table.
    ///
    /// Fails with [`SyncError::NoPrimaryKey`] when `primary_key` is empty.
    pub fn new(table: &str, primary_key: &[String]) -> Result<Self> {
        if primary_key.is_empty() {
            return Err(SyncError::NoPrimaryKey {
                table: table.to_string(),
            });
        }
        Ok(Self {
            primary_key: primary_key.to_vec(),
            order: Vec::new(),
            rows: HashMap::new(),
        })
    }

    /// Creates a row set from fetched rows.
    pub fn from_rows(
        table: &str,
        primary_key: &[String],
        rows: impl IntoIterator<Item = RowRecord>,
    ) -> Result<Self> {
        let mut keyed = Self::new(table, primary_key)?;
        for row in rows {
            keyed.push(row);
        }
        Ok(keyed)
    }

    /// Adds a row.
    pub fn push(&mut self, row: RowRecord) {
        let key = composite_key(&row, &self.primary_key);
        if self.rows.insert(key.clone(), row).is_some() {
            warn!(key = %key, "Duplicate primary key in row set, keeping the later row");
        } else {
            self.order.push(key);
        }
    }

    /// Returns the primary-key columns.
    #[must_use]
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Gets a row by composite key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RowRecord> {
        self.rows.get(key)
    }

    /// Returns whether a composite key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Iterates over `(key, row)` pairs in fetch order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowRecord)> {
        self.order
            .iter()
            .filter_map(|key| self.rows.get(key).map(|row| (key.as_str(), row)))
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
