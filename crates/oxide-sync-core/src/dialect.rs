//! SQL dialect tags and identifier quoting.
//!
//! Everything dialect-specific that the diff engines need lives in the
//! [`DIALECTS`] table: the tag spellings, the URL schemes that select the
//! dialect, and the identifier quote pair. The engines never branch on the
//! dialect themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB. Also the dialect used when none is given.
    #[default]
    MySql,
    /// PostgreSQL.
    #[serde(alias = "postgresql")]
    Postgres,
    /// SQLite.
    Sqlite,
    /// Microsoft SQL Server.
    #[serde(alias = "mssql")]
    SqlServer,
}

/// Static per-dialect configuration.
#[derive(Debug)]
pub struct DialectRules {
    /// The dialect these rules describe.
    pub dialect: Dialect,
    /// Canonical tag.
    pub tag: &'static str,
    /// Additional accepted spellings of the tag.
    pub aliases: &'static [&'static str],
    /// URL scheme prefixes that select this dialect.
    pub url_schemes: &'static [&'static str],
    /// Opening identifier quote.
    pub quote_open: char,
    /// Closing identifier quote.
    pub quote_close: char,
}

/// The dialect table.
pub static DIALECTS: [DialectRules; 4] = [
    DialectRules {
        dialect: Dialect::MySql,
        tag: "mysql",
        aliases: &["", "mariadb"],
        url_schemes: &["mysql://", "mariadb://"],
        quote_open: '`',
        quote_close: '`',
    },
    DialectRules {
        dialect: Dialect::Postgres,
        tag: "postgres",
        aliases: &["postgresql", "pg"],
        url_schemes: &["postgres://", "postgresql://"],
        quote_open: '"',
        quote_close: '"',
    },
    DialectRules {
        dialect: Dialect::Sqlite,
        tag: "sqlite",
        aliases: &["sqlite3"],
        url_schemes: &["sqlite:"],
        quote_open: '"',
        quote_close: '"',
    },
    DialectRules {
        dialect: Dialect::SqlServer,
        tag: "sqlserver",
        aliases: &["mssql"],
        url_schemes: &["mssql://", "sqlserver://"],
        quote_open: '[',
        quote_close: ']',
    },
];

impl Dialect {
    /// Returns the static rules for this dialect.
    #[must_use]
    pub fn rules(self) -> &'static DialectRules {
        DIALECTS
            .iter()
            .find(|rules| rules.dialect == self)
            .unwrap_or(&DIALECTS[0])
    }

    /// Returns the canonical tag.
    #[must_use]
    pub fn tag(self) -> &'static str {
        self.rules().tag
    }

    /// Infers the dialect from a connection URL's scheme.
    pub fn from_url(url: &str) -> Result<Self, SyncError> {
        let lower = url.to_ascii_lowercase();
        DIALECTS
            .iter()
            .find(|rules| rules.url_schemes.iter().any(|s| lower.starts_with(s)))
            .map(|rules| rules.dialect)
            .ok_or_else(|| {
                let scheme = url.split(':').next().unwrap_or(url);
                SyncError::UnsupportedDialect(scheme.to_string())
            })
    }

    /// Quotes an identifier (table, column or index name).
    ///
    /// A closing quote character inside the name is doubled.
    #[must_use]
    pub fn quote_identifier(self, name: &str) -> String {
        let rules = self.rules();
        let mut quoted = String::with_capacity(name.len() + 2);
        quoted.push(rules.quote_open);
        for ch in name.chars() {
            if ch == rules.quote_close {
                quoted.push(ch);
            }
            quoted.push(ch);
        }
        quoted.push(rules.quote_close);
        quoted
    }
}

impl FromStr for Dialect {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        DIALECTS
            .iter()
            .find(|rules| rules.tag == tag || rules.aliases.contains(&tag.as_str()))
            .map(|rules| rules.dialect)
            .ok_or_else(|| SyncError::UnsupportedDialect(s.to_string()))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_per_dialect() {
        assert_eq!(Dialect::MySql.quote_identifier("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::Sqlite.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::SqlServer.quote_identifier("users"), "[users]");
    }

    #[test]
    fn test_default_dialect_uses_backticks() {
        assert_eq!(Dialect::default(), Dialect::MySql);
        assert_eq!(Dialect::default().quote_identifier("t"), "`t`");
    }

    #[test]
    fn test_quote_identifier_escapes_closing_quote() {
        assert_eq!(Dialect::MySql.quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(Dialect::SqlServer.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(Dialect::Postgres.quote_identifier("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("mssql".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert_eq!(
            "oracle".parse::<Dialect>(),
            Err(SyncError::UnsupportedDialect("oracle".to_string()))
        );
    }

    #[test]
    fn test_from_url() {
        assert_eq!(
            Dialect::from_url("mysql://root@localhost/app").unwrap(),
            Dialect::MySql
        );
        assert_eq!(
            Dialect::from_url("postgresql://localhost/app").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert_eq!(
            Dialect::from_url("sqlserver://db:1433").unwrap(),
            Dialect::SqlServer
        );
        assert!(matches!(
            Dialect::from_url("oracle://db"),
            Err(SyncError::UnsupportedDialect(scheme)) if scheme == "oracle"
        ));
    }

    #[test]
    fn test_serde_tags() {
        let json = serde_json::to_string(&Dialect::SqlServer).unwrap();
        assert_eq!(json, "\"sqlserver\"");
        let parsed: Dialect = serde_json::from_str("\"postgresql\"").unwrap();
        assert_eq!(parsed, Dialect::Postgres);
    }
}
