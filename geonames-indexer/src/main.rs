use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use geonames_indexer::{Dependencies, IndexingError, Settings};
use geonames_indexer_pipeline::IngestionConfig;
use geonames_indexer_repository::IndexName;

#[derive(Parser)]
#[command(name = "geonames-indexer")]
#[command(about = "Bulk-load a GeoNames dump into an OpenSearch index", long_about = None)]
struct Cli {
    /// Tab-separated GeoNames dump to load
    source: PathBuf,

    /// Name of the target index
    index: String,

    /// Maximum documents per bulk request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum estimated bytes per bulk request
    #[arg(long)]
    batch_bytes: Option<usize>,

    /// Number of bulk requests in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Total attempts per bulk request on transient failures
    #[arg(long)]
    max_retries: Option<u32>,

    /// Stop on the first failed record
    #[arg(long)]
    fail_fast: bool,

    /// Number of failed records tolerated before exiting with an error
    #[arg(long, default_value = "0")]
    max_failures: u64,

    /// Delete and recreate the index if it already exists
    #[arg(long)]
    recreate_index: bool,

    /// Write the final report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn ingestion_config(&self) -> IngestionConfig {
        let mut config = IngestionConfig::default().with_fail_fast(self.fail_fast);
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(batch_bytes) = self.batch_bytes {
            config = config.with_batch_bytes(batch_bytes);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(max_retries) = self.max_retries {
            config = config.with_max_retries(max_retries);
        }
        config
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!(error = %e, "Indexing failed");
            eprintln!("Error: {}", e);

            let mut source = e.source();
            while let Some(err) = source {
                eprintln!("  Caused by: {}", err);
                source = err.source();
            }

            std::process::exit(1);
        }
    }
}

/// Run the import. Returns whether the run is considered successful.
async fn run(cli: Cli) -> Result<bool, IndexingError> {
    let index = IndexName::parse(cli.index.as_str())?;
    let file = tokio::fs::File::open(&cli.source)
        .await
        .map_err(|e| IndexingError::source_file(&cli.source, e))?;

    let settings = Settings::from_env()?;
    let dependencies = Dependencies::new(&settings, index, cli.ingestion_config(), cli.recreate_index).await?;
    let coordinator = dependencies.coordinator;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            cancel.cancel();
        }
    });

    info!(source = %cli.source.display(), "Loading records");
    let report = coordinator.run(file).await?;
    println!("{}", report);

    if let Some(path) = &cli.report {
        let json = serde_json::to_vec_pretty(&report)?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), "Report written");
    }

    Ok(!report.cancelled && !report.exceeds_failure_threshold(cli.max_failures))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positionals_required() {
        assert!(Cli::try_parse_from(["geonames-indexer"]).is_err());
        assert!(Cli::try_parse_from(["geonames-indexer", "allCountries.txt"]).is_err());
    }

    #[test]
    fn test_extra_positional_rejected() {
        let result = Cli::try_parse_from(["geonames-indexer", "allCountries.txt", "geonames", "extra"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::try_parse_from(["geonames-indexer", "allCountries.txt", "geonames"]).unwrap();

        assert_eq!(cli.source, PathBuf::from("allCountries.txt"));
        assert_eq!(cli.index, "geonames");
        assert_eq!(cli.max_failures, 0);
        assert!(cli.report.is_none());

        let config = cli.ingestion_config();
        let defaults = IngestionConfig::default();
        assert_eq!(config.max_batch_documents, defaults.max_batch_documents);
        assert_eq!(config.max_in_flight_batches, defaults.max_in_flight_batches);
        assert!(!config.fail_fast);
    }

    #[test]
    fn test_flags_reach_ingestion_config() {
        let cli = Cli::try_parse_from([
            "geonames-indexer",
            "allCountries.txt",
            "geonames",
            "--batch-size",
            "200",
            "--batch-bytes",
            "1048576",
            "--concurrency",
            "8",
            "--max-retries",
            "5",
            "--fail-fast",
            "--max-failures",
            "10",
            "--recreate-index",
            "--report",
            "report.json",
            "--log-format",
            "json",
        ])
        .unwrap();

        let config = cli.ingestion_config();
        assert_eq!(config.max_batch_documents, 200);
        assert_eq!(config.max_batch_bytes, 1_048_576);
        assert_eq!(config.max_in_flight_batches, 8);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.max_retries, 5);
        assert!(config.fail_fast);

        assert_eq!(cli.max_failures, 10);
        assert!(cli.recreate_index);
        assert_eq!(cli.report, Some(PathBuf::from("report.json")));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }
}
