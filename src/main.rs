//! dbq - Run SQL statements against a configured data source.

mod cli;

use cli::{Cli, Command, OutputFormat};
use db_query::config::{Config, DataSourceConfig};
use db_query::db::{split_script, QueryResult};
use db_query::error::{DbError, Result};
use db_query::{logging, DbQuery};
use std::io::Read;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => logging::init_file_logging(path),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let datasource = resolve_datasource(&cli, &config)?;
    info!("Data source: {}", datasource.display_string());

    let dbq = DbQuery::connect(&datasource).await?;
    let outcome = execute(&dbq, cli.command, cli.format).await;
    dbq.close().await?;
    outcome
}

async fn execute(dbq: &DbQuery, command: Command, format: OutputFormat) -> Result<()> {
    match command {
        Command::Select { sql, params } => {
            let result = dbq.select_with(&sql, &params).await?;
            print_result(&result, format)
        }
        Command::Update { sql, params } => {
            let affected = dbq.update_with(&sql, &params).await?;
            print_number("affected", affected, format)
        }
        Command::Count { sql, params } => {
            let count = dbq.count_with(&sql, &params).await?;
            print_number("count", count, format)
        }
        Command::Batch { file } => {
            let script = read_script(&file)?;
            let statements = split_script(&script);
            info!("Running {} statements from {}", statements.len(), file);
            let counts = dbq.batch(statements).await?;
            match format {
                OutputFormat::Text => {
                    for count in counts {
                        println!("{count}");
                    }
                }
                OutputFormat::Json => print_json(&serde_json::json!({ "affected": counts }))?,
            }
            Ok(())
        }
    }
}

/// Resolves the final data source from CLI args, config file, and environment.
fn resolve_datasource(cli: &Cli, config: &Config) -> Result<DataSourceConfig> {
    // Precedence:
    // 1. CLI arguments (highest)
    // 2. Named data source from config
    // 3. Default data source from config
    // 4. Environment variables
    let cli_datasource = cli.to_datasource_config()?;

    let mut datasource = match cli.datasource_name() {
        Some(name) => config.get_datasource(Some(name)).cloned().ok_or_else(|| {
            DbError::config(format!("Data source '{name}' not found in config file"))
        })?,
        None if cli.url.is_none() => config.get_datasource(None).cloned().unwrap_or_default(),
        None => DataSourceConfig::default(),
    };

    if let Some(overrides) = &cli_datasource {
        datasource.merge(overrides);
    }
    datasource.apply_env_defaults();

    if datasource.url.is_none() {
        return Err(DbError::config(
            "No data source configured. Pass --url, use --datasource, or set DATABASE_URL",
        ));
    }
    Ok(datasource)
}

fn read_script(file: &str) -> Result<String> {
    if file == "-" {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .map_err(|e| DbError::internal(format!("Failed to read stdin: {e}")))?;
        return Ok(script);
    }
    std::fs::read_to_string(file)
        .map_err(|e| DbError::internal(format!("Failed to read {file}: {e}")))
}

fn print_result(result: &QueryResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{result}");
            Ok(())
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "columns": result.column_names(),
            "types": result.type_names(),
            "rows": result.to_json_rows(),
        })),
    }
}

fn print_number<N>(key: &str, n: N, format: OutputFormat) -> Result<()>
where
    N: std::fmt::Display + serde::Serialize,
{
    match format {
        OutputFormat::Text => {
            println!("{n}");
            Ok(())
        }
        OutputFormat::Json => print_json(&serde_json::json!({ key: n })),
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DbError::internal(format!("Failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}
