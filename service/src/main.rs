#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use camara_despesas::{
    camara::HttpCamaraClient,
    config::Config,
    export::{sink_from_config, SnapshotExporter},
    pipeline,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Export Câmara dos Deputados expenses, enriched with legislator metadata,
/// as a dated CSV snapshot.
#[derive(Debug, Parser)]
#[command(name = "camara-despesas", version, about)]
struct Cli {
    /// YAML configuration file (optional; CAMARA_* environment variables win)
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Snapshot date in YYYY-MM-DD form (defaults to today, local time)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Load and validate configuration first (fail-fast)
    let config = Config::load_from(&cli.config).map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.api.base_url,
        years = ?config.expenses.years,
        "camara-despesas starting up"
    );

    let client = HttpCamaraClient::from_config(&config.api, &config.expenses)?;
    let exporter = SnapshotExporter::from_config(sink_from_config(&config.export), &config.export);
    let as_of = cli.as_of.unwrap_or_else(|| Local::now().date_naive());

    let summary = pipeline::run(&client, &exporter, as_of).await?;

    tracing::info!(
        legislators = summary.legislators,
        expenses = summary.expenses,
        profiles = summary.profiles,
        incomplete_sequences = summary.incomplete_sequences,
        rows = summary.rows,
        location = %summary.artifact.location,
        "export finished"
    );

    Ok(())
}
