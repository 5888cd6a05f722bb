//! bq-abtest: run BigQuery SQL and A/B test two product events from the terminal.
//!
//! `show` opens a keyboard-driven dashboard with a SQL editor, column pickers,
//! conversion and posterior charts; `report` runs one query and prints the
//! same analysis as text or JSON.

mod analysis;
mod app;
mod cli;
mod logging;
mod secrets;
mod ui;
mod warehouse;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use analysis::AbTestReport;
use app::SharedRunner;
use cli::{AppConfig, Cli, Commands, OutputFormat};
use warehouse::{BigQueryClient, CachedRunner, QueryResult, QueryRunner};

/// Load credentials and build the cached BigQuery runner
fn connect(config: &AppConfig) -> Result<(String, SharedRunner)> {
    let key = config.credentials.load().context(
        "No BigQuery credentials found; pass --key-file or --secrets, or set GOOGLE_APPLICATION_CREDENTIALS",
    )?;
    let client = BigQueryClient::connect(key, config.project.clone(), config.client.clone())
        .context("Failed to create BigQuery client")?;
    let project = client.project_id().to_string();
    info!(project = %project, "connected");

    let inner: Box<dyn QueryRunner + Send + Sync> = Box::new(client);
    let runner: SharedRunner = Arc::new(CachedRunner::new(inner, config.cache_ttl));
    Ok((project, runner))
}

/// Tab-separated first rows of the result
fn sample_text(result: &QueryResult, rows: usize) -> String {
    let mut lines = vec![result.column_names().join("\t")];
    for row in result.head(rows) {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        lines.push(cells.join("\t"));
    }
    lines.join("\n")
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Show {
            connection,
            analysis,
            query_file,
            log_file,
        } => {
            let config = AppConfig::new(connection, analysis, query_file, log_file)?;
            let _guard = logging::init_file(&config.log_file)?;
            let (project, runner) = connect(&config)?;

            // Run the TUI application
            app::run(config, runner, project)?;
        }
        Commands::Report {
            connection,
            analysis,
            query_file,
            format,
        } => {
            logging::init_stderr()?;
            let config = AppConfig::new(connection, analysis, Some(query_file), None)?;
            let selection = config.columns.selection()?;
            let (_, runner) = connect(&config)?;

            let cached = runner
                .run(&config.initial_query)
                .context("An error occurred while running the query")?;
            let report = AbTestReport::build(&cached.result, selection, config.alpha);

            match format {
                OutputFormat::Text => {
                    println!("Sample Data:");
                    println!("{}", sample_text(&cached.result, config.sample_rows));
                    println!();
                    print!("{}", report.render_text());
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report.to_json())?);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{Column, Value};

    #[test]
    fn test_sample_text() {
        let result = QueryResult::new(
            vec![Column::new("variant", "STRING"), Column::new("n", "INT64")],
            vec![
                vec![Value::String("A".into()), Value::Int(1)],
                vec![Value::String("B".into()), Value::Null],
                vec![Value::String("A".into()), Value::Int(3)],
            ],
        );
        assert_eq!(sample_text(&result, 2), "variant\tn\nA\t1\nB\tnull");
    }
}
