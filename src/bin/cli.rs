//! Tender feed CLI
//!
//! Local execution entry point. Raw batches are expected under the data
//! directory, written there by the fetchers.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tender_feed::{
    error::Result,
    models::Config,
    observer::LogObserver,
    pipeline,
    storage::{LocalStorage, NoticeStorage, ProcessedKind},
};

/// tender-feed - Public tender notice aggregator
#[derive(Parser, Debug)]
#[command(
    name = "tender-feed",
    version,
    about = "Normalize, deduplicate and publish tender notices"
)]
struct Cli {
    /// Path to data directory containing config.toml and the batches
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize and deduplicate one day's raw batches
    Normalize {
        /// Batch day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Publish the latest deduplicated batch as the feed
    Publish,

    /// Run full pipeline: Normalize → Publish
    Pipeline {
        /// Batch day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Validate configuration file
    Validate,

    /// Show processed batches and feed info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Load and check the configuration, then open storage under `data_dir`.
fn open(data_dir: &Path) -> Result<(Config, LocalStorage)> {
    let config = Config::load_or_default(data_dir.join("config.toml"));
    config.validate()?;
    log::info!("Loaded configuration from {}", data_dir.display());

    let storage = LocalStorage::new(data_dir, config.paths.clone());
    Ok((config, storage))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("tender-feed starting...");

    match cli.command {
        Command::Validate => {
            log::info!("Validating configuration...");
            pipeline::run_validate(&cli.data_dir)?;
            log::info!("All validations passed!");
        }

        Command::Normalize { date } => {
            let (config, storage) = open(&cli.data_dir)?;
            let summary =
                pipeline::run_normalize(&config, &storage, date.unwrap_or_else(today), &LogObserver)
                    .await?;
            log::info!(
                "Normalize complete: {} raw, {} normalized, {} after dedup",
                summary.raw_count,
                summary.normalized_count,
                summary.deduped_count
            );
        }

        Command::Publish => {
            let (_, storage) = open(&cli.data_dir)?;
            let summary = pipeline::run_publish(&storage).await?;
            log::info!(
                "Published {} notices to {}",
                summary.notice_count,
                summary.feed_key
            );
        }

        Command::Pipeline { date } => {
            let (config, storage) = open(&cli.data_dir)?;
            pipeline::run_pipeline(&config, &storage, date.unwrap_or_else(today), &LogObserver)
                .await?;
        }

        Command::Info => {
            let (_, storage) = open(&cli.data_dir)?;
            let config_path = cli.data_dir.join("config.toml");
            log::info!("Data directory: {}", cli.data_dir.display());
            log::info!(
                "Config: {}",
                if config_path.exists() {
                    "config.toml"
                } else {
                    "defaults"
                }
            );

            for kind in [ProcessedKind::Normalized, ProcessedKind::Deduped] {
                let days = storage.processed_days(kind).await?;
                match days.last() {
                    Some(last) => log::info!("{kind} batches: {} (latest {last})", days.len()),
                    None => log::info!("{kind} batches: none"),
                }
            }

            match storage.load_feed().await? {
                Some(feed) => {
                    log::info!("Feed: {} notices", feed.notices.len());
                    log::info!("Last published: {}", feed.generated_at);
                }
                None => log::info!("No feed published yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
