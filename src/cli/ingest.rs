//! `ingest` subcommand
//!
//! Wires configuration, database pool, source, and executor together and
//! runs one complete ingestion. Errors here are startup errors; once the
//! executor is running, failures are absorbed per page and only show up in
//! the printed outcome.

use anyhow::Context;
use chrono::NaiveDate;
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config::{IngestConfig, SourceKind, DEFAULT_BASE_URL, DEFAULT_FILE_HOST};
use crate::fetcher::create_source;
use crate::ingestor::IngestExecutor;
use crate::repository::PgTradeRepository;
use crate::shutdown::SharedShutdown;

/// Output format for the run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One human-readable summary line
    Human,
    /// Single JSON object on stdout
    Json,
}

/// Arguments for the `ingest` subcommand
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Listing page URL (page 1)
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Host that relative report-file hrefs are joined against
    #[arg(long, default_value = DEFAULT_FILE_HOST)]
    pub file_host: String,

    /// Report variant published by the source
    #[arg(long, value_enum, default_value_t = SourceKind::Spreadsheet)]
    pub source: SourceKind,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Ignore reports dated before this date (YYYY-MM-DD)
    #[arg(long)]
    pub cutoff_date: Option<NaiveDate>,

    /// Maximum concurrent page pipelines
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// How to print the run outcome
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Show a page-level progress bar
    #[arg(long)]
    pub progress: bool,
}

impl IngestArgs {
    /// Execute the ingest command.
    pub async fn execute(&self, shutdown: SharedShutdown) -> anyhow::Result<()> {
        if let Some(addr) = self.metrics_addr {
            crate::metrics::install_prometheus(addr)
                .context("failed to install Prometheus exporter")?;
        }

        let mut config = IngestConfig {
            base_url: self.base_url.clone(),
            file_host: self.file_host.clone(),
            source_kind: self.source,
            ..IngestConfig::default()
        };
        if let Some(cutoff) = self.cutoff_date {
            config.cutoff_date = cutoff;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }

        info!(
            base_url = %config.base_url,
            source = ?config.source_kind,
            cutoff = %config.cutoff_date,
            concurrency = config.concurrency,
            "starting ingestion run"
        );

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&self.database_url)
            .await
            .context("failed to connect to Postgres")?;

        let (source, parser) =
            create_source(&config).context("failed to build report source")?;
        let sink = Arc::new(PgTradeRepository::new(pool));

        let executor = IngestExecutor::new(source, parser, sink)
            .with_concurrency(config.concurrency)
            .with_shutdown(shutdown)
            .with_progress(self.progress);

        let outcome = executor.run().await.context("ingestion run failed")?;

        match self.format {
            OutputFormat::Human => println!("{outcome}"),
            OutputFormat::Json => println!("{}", serde_json::to_string(&outcome)?),
        }

        Ok(())
    }
}
