//! SQL statement generation shared by both diff engines.
//!
//! Every identifier goes through the dialect's quoting and every row value
//! through [`escape_value`]. Each generated statement is terminated with `;`
//! and can be executed on its own.

use crate::defaults::render_default;
use crate::dialect::Dialect;
use crate::rows::{PrimaryKeyValue, RowRecord};
use crate::snapshot::{ColumnDescriptor, TableSnapshot};
use crate::value::escape_value;

/// Where an added column is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// `FIRST`
    First,
    /// `AFTER <column>`
    After(String),
    /// No positional clause.
    Unspecified,
}

/// Generates statements for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementBuilder {
    dialect: Dialect,
}

impl StatementBuilder {
    /// Creates a builder for a dialect.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Quotes an identifier.
    #[must_use]
    pub fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Renders a column definition (everything after the column name).
    #[must_use]
    pub fn column_definition(&self, column: &ColumnDescriptor) -> String {
        let mut parts = vec![column.data_type.clone()];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(ref default) = column.default {
            parts.push(format!("DEFAULT {}", render_default(default)));
        }

        if !column.extra.is_empty() {
            parts.push(column.extra.clone());
        }

        parts.join(" ")
    }

    /// Returns the table's stored CREATE statement, terminated once.
    #[must_use]
    pub fn create_table(&self, table: &TableSnapshot) -> String {
        terminate(&table.create_sql)
    }

    /// `DROP TABLE`
    #[must_use]
    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {};", self.quote(table))
    }

    /// `ALTER TABLE ... ADD COLUMN` with an optional positional clause.
    #[must_use]
    pub fn add_column(
        &self,
        table: &str,
        column: &ColumnDescriptor,
        position: &ColumnPosition,
    ) -> String {
        let placement = match position {
            ColumnPosition::First => " FIRST".to_string(),
            ColumnPosition::After(previous) => format!(" AFTER {}", self.quote(previous)),
            ColumnPosition::Unspecified => String::new(),
        };
        format!(
            "ALTER TABLE {} ADD COLUMN {} {}{};",
            self.quote(table),
            self.quote(&column.name),
            self.column_definition(column),
            placement
        )
    }

    /// `ALTER TABLE ... DROP COLUMN`
    #[must_use]
    pub fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {};",
            self.quote(table),
            self.quote(column)
        )
    }

    /// `ALTER TABLE ... MODIFY COLUMN` restating the full definition.
    #[must_use]
    pub fn modify_column(&self, table: &str, column: &ColumnDescriptor) -> String {
        format!(
            "ALTER TABLE {} MODIFY COLUMN {} {};",
            self.quote(table),
            self.quote(&column.name),
            self.column_definition(column)
        )
    }

    /// `ALTER TABLE ... ADD INDEX` over already-quoted columns.
    #[must_use]
    pub fn add_index(&self, table: &str, index: &str, columns: &[String], unique: bool) -> String {
        format!(
            "ALTER TABLE {} {};",
            self.quote(table),
            self.add_index_clause(index, columns, unique)
        )
    }

    /// Drops and re-adds an index in one statement.
    #[must_use]
    pub fn recreate_index(
        &self,
        table: &str,
        index: &str,
        columns: &[String],
        unique: bool,
    ) -> String {
        format!(
            "ALTER TABLE {} DROP INDEX {}, {};",
            self.quote(table),
            self.quote(index),
            self.add_index_clause(index, columns, unique)
        )
    }

    /// `ALTER TABLE ... DROP INDEX`
    #[must_use]
    pub fn drop_index(&self, table: &str, index: &str) -> String {
        format!(
            "ALTER TABLE {} DROP INDEX {};",
            self.quote(table),
            self.quote(index)
        )
    }

    fn add_index_clause(&self, index: &str, columns: &[String], unique: bool) -> String {
        format!(
            "ADD {}INDEX {} ({})",
            if unique { "UNIQUE " } else { "" },
            self.quote(index),
            columns.join(", ")
        )
    }

    /// `INSERT` of every listed column present in the row.
    ///
    /// With an empty column list, all of the row's columns are used.
    #[must_use]
    pub fn insert(&self, table: &str, row: &RowRecord, columns: &[String]) -> String {
        let (names, values): (Vec<String>, Vec<String>) = present_columns(row, columns)
            .into_iter()
            .filter_map(|column| {
                row.get(column)
                    .map(|value| (self.quote(column), escape_value(value)))
            })
            .unzip();

        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.quote(table),
            names.join(", "),
            values.join(", ")
        )
    }

    /// `UPDATE` setting every non-key column to the row's value.
    ///
    /// A row with no non-key column sets its key columns to their current
    /// values, so the statement still matches the row and changes nothing.
    #[must_use]
    pub fn update(
        &self,
        table: &str,
        row: &RowRecord,
        primary_key: &[String],
        columns: &[String],
    ) -> String {
        let assign = |column: &str| {
            row.get(column)
                .map(|value| format!("{} = {}", self.quote(column), escape_value(value)))
        };

        let mut sets: Vec<String> = present_columns(row, columns)
            .into_iter()
            .filter(|column| !primary_key.iter().any(|pk| pk.as_str() == *column))
            .filter_map(&assign)
            .collect();
        if sets.is_empty() {
            sets = primary_key.iter().filter_map(|pk| assign(pk)).collect();
        }

        let key = PrimaryKeyValue::from_row(row, primary_key);
        format!(
            "UPDATE {} SET {} WHERE {};",
            self.quote(table),
            sets.join(", "),
            self.key_predicate(&key)
        )
    }

    /// `DELETE` by primary key.
    #[must_use]
    pub fn delete(&self, table: &str, key: &PrimaryKeyValue) -> String {
        format!(
            "DELETE FROM {} WHERE {};",
            self.quote(table),
            self.key_predicate(key)
        )
    }

    /// AND-joined equality over every key column.
    fn key_predicate(&self, key: &PrimaryKeyValue) -> String {
        key.iter()
            .map(|(column, value)| format!("{} = {}", self.quote(column), escape_value(value)))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// Columns to emit for a row: the listed ones it has, or all of its own.
fn present_columns<'a>(row: &'a RowRecord, columns: &'a [String]) -> Vec<&'a str> {
    if columns.is_empty() {
        row.keys().map(String::as_str).collect()
    } else {
        columns
            .iter()
            .filter(|column| row.contains_key(column.as_str()))
            .map(String::as_str)
            .collect()
    }
}

fn terminate(sql: &str) -> String {
    let trimmed = sql.trim_end();
    let body = trimmed.trim_end_matches(';').trim_end();
    format!("{};", body)
}
