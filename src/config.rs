//! Configuration management for db-query.
//!
//! Handles loading named data sources from TOML files and environment
//! variables. A data source is a driver identifier, a connection URL and
//! optional credentials.

use crate::db::DatabaseBackend;
use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the data source used when none is requested.
pub const DEFAULT_DATASOURCE: &str = "default";

/// Main configuration structure for db-query.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named data sources.
    #[serde(default)]
    pub datasources: HashMap<String, DataSourceConfig>,
}

/// Data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Driver identifier ("postgres" or "sqlite"). Inferred from the URL when absent.
    pub driver: Option<String>,

    /// Connection URL, e.g. `postgres://host:5432/app` or `sqlite://app.db`.
    pub url: Option<String>,

    /// Database user.
    pub user: Option<String>,

    /// Database password (not recommended to store in config).
    pub password: Option<String>,
}

impl DataSourceConfig {
    /// Creates a data source from a connection URL.
    ///
    /// Credentials embedded in a PostgreSQL URL are moved into `user` and
    /// `password`.
    pub fn from_url(url: &str) -> Result<Self> {
        let backend = DatabaseBackend::from_url(url).ok_or_else(|| {
            DbError::config(format!(
                "Cannot determine the driver for '{}'. Expected a postgres:// or sqlite: URL",
                mask_url(url)
            ))
        })?;

        match backend {
            DatabaseBackend::Sqlite => Ok(Self {
                url: Some(url.to_string()),
                ..Default::default()
            }),
            DatabaseBackend::Postgres => {
                let mut parsed = Url::parse(url)
                    .map_err(|e| DbError::config(format!("Invalid connection URL: {e}")))?;

                let user = if parsed.username().is_empty() {
                    None
                } else {
                    Some(parsed.username().to_string())
                };
                let password = parsed.password().map(String::from);

                // Url only refuses credentials on cannot-be-a-base URLs, which postgres:// is not.
                let _ = parsed.set_username("");
                let _ = parsed.set_password(None);

                Ok(Self {
                    driver: None,
                    url: Some(parsed.to_string()),
                    user,
                    password,
                })
            }
        }
    }

    /// Resolves the backend: the explicit driver wins, otherwise the URL scheme decides.
    pub fn backend(&self) -> Result<DatabaseBackend> {
        if let Some(driver) = &self.driver {
            return DatabaseBackend::parse(driver).ok_or_else(|| {
                DbError::config(format!(
                    "Unknown driver '{driver}'. Expected 'postgres' or 'sqlite'"
                ))
            });
        }

        let url = self.require_url()?;
        DatabaseBackend::from_url(url).ok_or_else(|| {
            DbError::config(format!(
                "Cannot determine the driver for '{}'. Set 'driver' explicitly",
                mask_url(url)
            ))
        })
    }

    /// Builds the URL handed to the driver.
    ///
    /// PostgreSQL URLs get `user`/`password` injected; SQLite URLs are used as-is.
    pub fn to_connection_string(&self) -> Result<String> {
        let url = self.require_url()?;

        match self.backend()? {
            DatabaseBackend::Sqlite => Ok(url.to_string()),
            DatabaseBackend::Postgres => {
                if self.user.is_none() && self.password.is_none() {
                    return Ok(url.to_string());
                }

                let mut parsed = Url::parse(url)
                    .map_err(|e| DbError::config(format!("Invalid connection URL: {e}")))?;

                if let Some(user) = &self.user {
                    parsed
                        .set_username(user)
                        .map_err(|_| DbError::config("Connection URL cannot carry a user"))?;
                }
                if let Some(password) = &self.password {
                    parsed
                        .set_password(Some(password))
                        .map_err(|_| DbError::config("Connection URL cannot carry a password"))?;
                }

                Ok(parsed.to_string())
            }
        }
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &DataSourceConfig) {
        if other.driver.is_some() {
            self.driver = other.driver.clone();
        }
        if other.url.is_some() {
            self.url = other.url.clone();
        }
        if other.user.is_some() {
            self.user = other.user.clone();
        }
        if other.password.is_some() {
            self.password = other.password.clone();
        }
    }

    /// Applies environment variables (`DBQ_DRIVER`, `DBQ_URL`/`DATABASE_URL`,
    /// `DBQ_USER`, `DBQ_PASSWORD`) as defaults.
    pub fn apply_env_defaults(&mut self) {
        self.apply_defaults_from(|key| std::env::var(key).ok());
    }

    /// `DBQ_DRIVER` only applies when the URL also comes from the environment,
    /// or when the configured URL's scheme does not name a driver.
    fn apply_defaults_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let url_from_env = self.url.is_none();
        if url_from_env {
            self.url = lookup("DBQ_URL").or_else(|| lookup("DATABASE_URL"));
        }
        if self.driver.is_none() {
            let scheme_known = self
                .url
                .as_deref()
                .and_then(DatabaseBackend::from_url)
                .is_some();
            if url_from_env || !scheme_known {
                self.driver = lookup("DBQ_DRIVER");
            }
        }
        if self.user.is_none() {
            self.user = lookup("DBQ_USER");
        }
        if self.password.is_none() {
            self.password = lookup("DBQ_PASSWORD");
        }
    }

    /// Returns a display-safe string (no password) for logs and errors.
    pub fn display_string(&self) -> String {
        let url = self.url.as_deref().map(mask_url).unwrap_or_else(|| "<no url>".to_string());
        match &self.user {
            Some(user) => format!("{url} as {user}"),
            None => url,
        }
    }

    fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| DbError::config("Connection URL is required"))
    }
}

/// Replaces any password in `url` with `***`.
fn mask_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-query")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DbError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            DbError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named data source, or the default one if name is None.
    pub fn get_datasource(&self, name: Option<&str>) -> Option<&DataSourceConfig> {
        let key = name.unwrap_or(DEFAULT_DATASOURCE);
        self.datasources.get(key)
    }
}
