//! Command-line interface argument parsing for bq-abtest.
//!
//! - `bq-abtest show` launches the dashboard
//! - `bq-abtest show --query-file funnel.sql --event1 viewed_at --event2 purchased_at --assignment variant`
//! - `bq-abtest report --query-file funnel.sql --event1 ... --format json` runs headless

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::analysis::{ColumnSelection, DEFAULT_ALPHA};
use crate::secrets::CredentialSources;
use crate::warehouse::{ClientConfig, DEFAULT_TTL};

/// Query BigQuery and A/B test two product events from the terminal.
#[derive(Parser, Debug)]
#[command(name = "bq-abtest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive dashboard
    Show {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Pre-fill the SQL editor from this file
        #[arg(long)]
        query_file: Option<PathBuf>,

        /// Write logs here instead of the default data directory
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Run a query once and print the A/B report
    Report {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// File containing the SQL to run
        #[arg(long)]
        query_file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Credential and warehouse options
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// TOML secrets file with a [gcp_service_account] table
    #[arg(long)]
    pub secrets: Option<PathBuf>,

    /// Service-account JSON key file
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Billing project (defaults to the key's project_id)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Seconds a query result stays cached
    #[arg(long, default_value_t = DEFAULT_TTL.as_secs())]
    pub cache_ttl: u64,

    /// Stop fetching after this many rows
    #[arg(long, default_value_t = 100_000)]
    pub max_rows: usize,
}

/// Column roles and test settings
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Exposure event column
    #[arg(long)]
    pub event1: Option<String>,

    /// Conversion event column (non-NULL means converted)
    #[arg(long)]
    pub event2: Option<String>,

    /// Variant assignment column (values A and B)
    #[arg(long)]
    pub assignment: Option<String>,

    /// Significance level for the chi-squared test
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f64,

    /// Rows shown in the sample table
    #[arg(long, default_value_t = 10)]
    pub sample_rows: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Preferred column names, each applied when the result contains it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnPreferences {
    pub event1: Option<String>,
    pub event2: Option<String>,
    pub assignment: Option<String>,
}

impl ColumnPreferences {
    /// All three roles, required by the headless report
    pub fn selection(&self) -> Result<ColumnSelection> {
        let missing: Vec<&str> = [
            ("--event1", &self.event1),
            ("--event2", &self.event2),
            ("--assignment", &self.assignment),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(flag, _)| flag)
        .collect();
        if !missing.is_empty() {
            anyhow::bail!("Missing column arguments: {}", missing.join(", "));
        }

        Ok(ColumnSelection {
            event1: self.event1.clone().unwrap_or_default(),
            event2: self.event2.clone().unwrap_or_default(),
            assignment: self.assignment.clone().unwrap_or_default(),
        })
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: CredentialSources,
    pub project: Option<String>,
    pub client: ClientConfig,
    pub cache_ttl: Duration,
    pub columns: ColumnPreferences,
    pub alpha: f64,
    pub sample_rows: usize,
    pub initial_query: String,
    pub log_file: PathBuf,
}

impl AppConfig {
    /// Build the config shared by both subcommands
    pub fn new(
        connection: ConnectionArgs,
        analysis: AnalysisArgs,
        query_file: Option<PathBuf>,
        log_file: Option<PathBuf>,
    ) -> Result<Self> {
        if !(analysis.alpha > 0.0 && analysis.alpha < 1.0) {
            anyhow::bail!("--alpha must be between 0 and 1, got {}", analysis.alpha);
        }

        let initial_query = match query_file {
            Some(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read query file: {path:?}"))?,
            None => String::new(),
        };

        let log_file = log_file.unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("bq-abtest")
                .join("bq-abtest.log")
        });

        Ok(AppConfig {
            credentials: CredentialSources::from_env(connection.key_file, connection.secrets),
            project: connection.project,
            client: ClientConfig {
                max_rows: connection.max_rows,
                ..ClientConfig::default()
            },
            cache_ttl: Duration::from_secs(connection.cache_ttl),
            columns: ColumnPreferences {
                event1: analysis.event1,
                event2: analysis.event2,
                assignment: analysis.assignment,
            },
            alpha: analysis.alpha,
            sample_rows: analysis.sample_rows,
            initial_query,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn defaults() -> (ConnectionArgs, AnalysisArgs) {
        let cli = Cli::parse_from(["bq-abtest", "show"]);
        match cli.command {
            Commands::Show {
                connection,
                analysis,
                ..
            } => (connection, analysis),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_default_config() {
        let (connection, analysis) = defaults();
        let config = AppConfig::new(connection, analysis, None, None).unwrap();
        assert_eq!(config.alpha, 0.05);
        assert_eq!(config.sample_rows, 10);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.client.max_rows, 100_000);
        assert_eq!(config.columns, ColumnPreferences::default());
        assert!(config.initial_query.is_empty());
        assert!(config.log_file.ends_with("bq-abtest.log"));
    }

    #[test]
    fn test_report_arguments() {
        let cli = Cli::parse_from([
            "bq-abtest",
            "report",
            "--query-file",
            "q.sql",
            "--event1",
            "viewed",
            "--event2",
            "purchased",
            "--assignment",
            "variant",
            "--alpha",
            "0.01",
            "--format",
            "json",
        ]);
        match cli.command {
            Commands::Report {
                analysis,
                query_file,
                format,
                ..
            } => {
                assert_eq!(query_file, PathBuf::from("q.sql"));
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(analysis.event2.as_deref(), Some("purchased"));
                assert_eq!(analysis.alpha, 0.01);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_query_file_prefills_editor() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "SELECT * FROM `proj.dataset.events`").unwrap();

        let (connection, analysis) = defaults();
        let config =
            AppConfig::new(connection, analysis, Some(file.path().to_path_buf()), None).unwrap();
        assert_eq!(config.initial_query, "SELECT * FROM `proj.dataset.events`");
    }

    #[test]
    fn test_report_requires_all_columns() {
        let mut prefs = ColumnPreferences {
            event1: Some("viewed".into()),
            ..Default::default()
        };
        let err = prefs.selection().unwrap_err();
        assert_eq!(err.to_string(), "Missing column arguments: --event2, --assignment");

        prefs.event2 = Some("purchased".into());
        prefs.assignment = Some("variant".into());
        let selection = prefs.selection().unwrap();
        assert_eq!(selection.assignment, "variant");
    }

    #[test]
    fn test_alpha_out_of_range() {
        let (connection, mut analysis) = defaults();
        analysis.alpha = 1.5;
        assert!(AppConfig::new(connection, analysis, None, None).is_err());
    }
}
