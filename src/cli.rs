//! Command-line argument parsing for dbq.

use clap::{Parser, Subcommand, ValueEnum};
use db_query::config::DataSourceConfig;
use db_query::db::Value;
use std::path::PathBuf;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The result container's text rendering.
    #[default]
    Text,
    /// JSON documents.
    Json,
}

/// Run SQL statements against a configured data source.
#[derive(Parser, Debug)]
#[command(name = "dbq")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Use named data source from config
    #[arg(short = 'd', long, value_name = "NAME", global = true)]
    pub datasource: Option<String>,

    /// Connection URL (e.g., postgres://host:5432/app or sqlite://app.db)
    #[arg(long, value_name = "URL", global = true)]
    pub url: Option<String>,

    /// Driver identifier (postgres or sqlite); inferred from the URL when omitted
    #[arg(long, value_name = "DRIVER", global = true)]
    pub driver: Option<String>,

    /// Database user
    #[arg(short = 'U', long, value_name = "USER", global = true)]
    pub user: Option<String>,

    /// Database password
    #[arg(
        long,
        value_name = "PASSWORD",
        env = "DBQ_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub password: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run a query and print its rows
    Select {
        /// SQL text with `?` placeholders
        sql: String,

        /// Placeholder value, in order (null, true/false, integer, float, else text)
        #[arg(short = 'p', long = "param", value_name = "VALUE", value_parser = parse_param)]
        params: Vec<Value>,
    },

    /// Run a data-changing statement and print the affected row count
    Update {
        /// SQL text with `?` placeholders
        sql: String,

        /// Placeholder value, in order (null, true/false, integer, float, else text)
        #[arg(short = 'p', long = "param", value_name = "VALUE", value_parser = parse_param)]
        params: Vec<Value>,
    },

    /// Run a counting query and print the number
    Count {
        /// SQL text with `?` placeholders
        sql: String,

        /// Placeholder value, in order (null, true/false, integer, float, else text)
        #[arg(short = 'p', long = "param", value_name = "VALUE", value_parser = parse_param)]
        params: Vec<Value>,
    },

    /// Run every statement of a SQL script on one connection
    Batch {
        /// Script path, or "-" for stdin
        #[arg(value_name = "FILE")]
        file: String,
    },
}

/// Parses a placeholder value given on the command line.
pub fn parse_param(s: &str) -> Result<Value, String> {
    if s.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if s.eq_ignore_ascii_case("true") {
        return Ok(Value::Bool(true));
    }
    if s.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(false));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Value::Float(f)),
        _ => Ok(Value::String(s.to_string())),
    }
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Builds a data source from the connection flags only.
    ///
    /// Returns `None` when no connection flag was given.
    pub fn to_datasource_config(&self) -> db_query::Result<Option<DataSourceConfig>> {
        let mut config = match &self.url {
            Some(url) => DataSourceConfig::from_url(url)?,
            None => DataSourceConfig::default(),
        };
        config.merge(&DataSourceConfig {
            driver: self.driver.clone(),
            url: None,
            user: self.user.clone(),
            password: self.password.clone(),
        });

        if config == DataSourceConfig::default() {
            return Ok(None);
        }
        Ok(Some(config))
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(db_query::config::Config::default_path)
    }

    /// Returns the named data source to use, if specified.
    pub fn datasource_name(&self) -> Option<&str> {
        self.datasource.as_deref()
    }
}
