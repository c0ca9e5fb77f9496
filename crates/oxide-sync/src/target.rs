//! Connection targets.

use std::fmt;
use std::time::Duration;

use oxide_sync_core::Dialect;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How long an adapter waits for a pooled connection.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// A database to compare: dialect plus connection URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Database dialect.
    pub dialect: Dialect,
    /// Connection URL, passed to the driver unchanged.
    pub url: String,
    /// Catalog name shown in reports. Defaults to the URL's path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl ConnectionTarget {
    /// Creates a target, inferring the dialect from the URL scheme.
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let dialect = Dialect::from_url(&url)?;
        Ok(Self {
            dialect,
            url,
            database: None,
        })
    }

    /// Creates a target with an explicit dialect.
    pub fn new(dialect: Dialect, url: impl Into<String>) -> Self {
        Self {
            dialect,
            url: url.into(),
            database: None,
        }
    }

    /// Sets the catalog name shown in reports.
    #[must_use]
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = Some(name.into());
        self
    }

    /// Returns the catalog name: the explicit one, else the last URL path
    /// segment without query string.
    #[must_use]
    pub fn database_name(&self) -> String {
        if let Some(ref name) = self.database {
            return name.clone();
        }
        let without_query = self.url.split('?').next().unwrap_or_default();
        let after_scheme = without_query
            .split_once("://")
            .map_or(without_query, |(_, rest)| rest);
        let path = after_scheme
            .strip_prefix("sqlite:")
            .unwrap_or(after_scheme);
        path.rsplit('/').next().unwrap_or_default().to_string()
    }

    /// Returns the URL with any password replaced by `****`.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let Some((userinfo, host)) = rest.split_once('@') else {
            return self.url.clone();
        };
        match userinfo.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:****@{host}"),
            None => self.url.clone(),
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.redacted_url(), self.dialect)
    }
}
