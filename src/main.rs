//! Binary entry point.
//!
//! Initializes tracing, installs the Ctrl+C handler, and dispatches to the
//! selected subcommand.

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use trade_results_ingestor::cli::{Cli, Commands};
use trade_results_ingestor::shutdown::ShutdownCoordinator;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trade_results_ingestor=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::shared();

    let handler_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, finishing in-flight pages");
            handler_shutdown.request_shutdown();
        }
    });

    let result = match cli.command {
        Commands::Ingest(args) => args.execute(shutdown).await,
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}
