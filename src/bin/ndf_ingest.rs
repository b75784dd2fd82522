//! Ingestion entrypoint.
//!
//! Scans `DOC_ROOT/level1/level2/**`, extracts text through Tika and upserts one record per file
//! into OpenSearch. With `--watch` it keeps running and re-indexes files as they change.
use anyhow::{Context, Result};
use clap::Parser;
use ndf_search::ingest::{IngestService, IngestSettings, watch};
use ndf_search::opensearch::{IndexStatus, OpenSearchService, load_mapping};
use ndf_search::tika::TikaClient;
use ndf_search::{config, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ndf-ingest",
    about = "Index office documents from a level1/level2 folder tree into OpenSearch"
)]
struct Cli {
    /// Keep running and re-index files created or modified under the root.
    #[arg(long)]
    watch: bool,
    /// Skip the initial full scan.
    #[arg(long)]
    no_initial: bool,
    /// Override `DOC_ROOT`.
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config().context("Invalid configuration")?;
    logging::init_tracing("ndf-ingest");
    let config = config::get_config();
    config.log_summary();

    let opensearch = OpenSearchService::new(config).context("Invalid OpenSearch settings")?;
    opensearch
        .ping()
        .await
        .with_context(|| format!("OpenSearch unreachable at {}", config.opensearch_url))?;
    let mapping = load_mapping(&config.index_mapping_file);
    match opensearch
        .ensure_index(&mapping)
        .await
        .with_context(|| format!("Failed to prepare index {}", config.index_name))?
    {
        IndexStatus::Created => tracing::info!(index = %config.index_name, "Index created"),
        IndexStatus::Existing => tracing::info!(index = %config.index_name, "Index exists"),
    }

    let tika = TikaClient::new(config).context("Invalid Tika settings")?;
    if let Err(error) = tika.probe().await {
        tracing::warn!(
            tika_url = %config.tika_url,
            error = %error,
            "Tika not reachable; extraction will be retried per file"
        );
    }

    let mut settings = IngestSettings::from_config(config);
    if let Some(root) = cli.root {
        settings.root = root;
    }
    let service = IngestService::new(Box::new(tika), Box::new(opensearch), settings);

    if !cli.no_initial {
        service.run_initial().await;
    }
    if cli.watch {
        watch::watch(&service).await.context("Watch mode failed")?;
    } else if cli.no_initial {
        tracing::info!("Nothing to do: initial scan skipped and watch mode disabled");
    }
    Ok(())
}
