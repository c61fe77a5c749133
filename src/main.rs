//! # Newslake
//!
//! A batch data lake pipeline that harvests news articles from a search
//! API and refines them through four stages of increasingly curated
//! datasets: landing (raw JSON), bronze (dated parquet snapshots), silver
//! (cumulative cleaned dataset), and gold (aggregates, dimensions, and a
//! fact table).
//!
//! ## Features
//!
//! - Lands paginated search results as pretty-printed JSON pages, one file
//!   per page, keeping whatever was persisted when a fetch fails mid-run
//! - Promotes raw pages into an immutable dated bronze snapshot and clears
//!   the intake area
//! - Refines the latest snapshot into a deduplicated, normalized silver
//!   dataset that accumulates across runs
//! - Recomputes seven `number_articles` aggregates, two dimension tables,
//!   and the `articles` fact table on every gold run
//! - Ranks word frequencies across silver descriptions
//!
//! ## Usage
//!
//! ```sh
//! newslake run -q bolsa -s 2024-03-05T00:00:00 -e 2024-03-05T23:59:59
//! ```
//!
//! ## Architecture
//!
//! The application follows a staged pipeline, each stage reading only the
//! previous stage's output:
//! 1. **Landing**: POST the search window to the API, one request per page
//! 2. **Bronze**: parse and deduplicate landed pages into a dated snapshot
//! 3. **Silver**: normalize and merge the snapshot into the cumulative set
//! 4. **Gold**: recompute every aggregate, dimension, and fact artifact

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod models;
mod stages;
mod store;
mod utils;

use api::SearchClient;
use cli::{Cli, Command};
use config::{ApiConfig, LakePaths};
use stages::landing::{LandingOutcome, LandingRequest};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newslake starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.data_root, ?args.endpoint, ?args.page_size, "Parsed CLI arguments");

    let paths = LakePaths::new(&args.data_root);
    let mut api_config = ApiConfig::new(args.endpoint.clone()).with_page_size(args.page_size);
    if let Some(secs) = args.timeout_secs {
        api_config = api_config.with_timeout(Duration::from_secs(secs));
    }

    match args.command {
        Command::Land(window) => {
            let client = SearchClient::new(api_config)?;
            let request: LandingRequest = window.into();
            let outcome = stages::landing::land(&client, &paths, &request).await;
            report_landing(&outcome);
        }
        Command::Bronze => {
            let report = stages::bronze::bronze(&paths).await?;
            info!(
                files = report.files_consumed,
                rows = report.rows_written,
                "bronze stage finished"
            );
        }
        Command::Silver => {
            let report = stages::silver::silver(&paths).await?;
            info!(
                source = %report.source_snapshot.display(),
                rows_in = report.rows_in,
                rows_total = report.rows_total,
                "silver stage finished"
            );
        }
        Command::Gold => {
            let report = stages::gold::gold(&paths).await?;
            info!(
                silver_rows = report.silver_rows,
                artifacts = report.artifacts_written,
                authors = report.distinct_authors,
                sources = report.distinct_sources,
                "gold stage finished"
            );
        }
        Command::Run(window) => {
            // ---- Land ----
            let client = SearchClient::new(api_config)?;
            let request: LandingRequest = window.into();
            let outcome = stages::landing::land(&client, &paths, &request).await;
            report_landing(&outcome);
            if !outcome.is_success() {
                warn!("landing was incomplete; continuing with what landed");
            }

            // ---- Bronze ----
            let bronze = stages::bronze::bronze(&paths).await?;
            info!(
                files = bronze.files_consumed,
                rows = bronze.rows_written,
                "bronze stage finished"
            );

            // ---- Silver ----
            let silver = stages::silver::silver(&paths).await?;
            info!(
                source = %silver.source_snapshot.display(),
                rows_in = silver.rows_in,
                rows_total = silver.rows_total,
                "silver stage finished"
            );

            // ---- Gold ----
            let gold = stages::gold::gold(&paths).await?;
            info!(
                silver_rows = gold.silver_rows,
                artifacts = gold.artifacts_written,
                "gold stage finished"
            );
        }
        Command::Words { limit } => {
            let mut ranked = analysis::word_frequencies(&paths).await?;
            if let Some(limit) = limit {
                ranked.truncate(limit);
            }
            for entry in &ranked {
                println!("{}\t{}", entry.word, entry.count);
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Log the landing outcome. A landing failure is reported but never turned
/// into a process error: pages persisted before the failure stay on disk
/// and the exit code stays zero.
fn report_landing(outcome: &LandingOutcome) {
    info!(
        pages_expected = outcome.pages_expected,
        pages_written = outcome.pages_written,
        pages_skipped = outcome.pages_skipped,
        "landing stage finished"
    );
    if let Some(failure) = &outcome.failure {
        error!(error = %failure, "landing ended early; pages persisted so far were kept");
    }
}
