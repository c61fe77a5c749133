//! Command-line interface definitions for Newslake.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Global options can be provided via command-line flags or environment
//! variables; each pipeline stage is a subcommand.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::stages::landing::LandingRequest;

/// Command-line arguments for the Newslake application.
///
/// Global options configure the search API and the data lake root; the
/// subcommand selects which stage (or stage chain) to run.
///
/// # Examples
///
/// ```sh
/// # Land one search window
/// newslake land -q bolsa -s 2024-03-05T00:00:00 -e 2024-03-05T23:59:59
///
/// # Promote landed pages and refine
/// newslake bronze
/// newslake silver
/// newslake gold
///
/// # Everything in one go
/// newslake run -q bolsa -s 2024-03-05T00:00:00
///
/// # Top 20 words across silver descriptions
/// newslake words -l 20
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Search API endpoint to POST queries to
    #[arg(
        long,
        env = "NEWSLAKE_ENDPOINT",
        default_value = "http://127.0.0.1:5000/NewsApi/get_everything"
    )]
    pub endpoint: Url,

    /// Articles per result page, used to derive how many pages to fetch
    #[arg(
        long,
        env = "NEWSLAKE_PAGE_SIZE",
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub page_size: u32,

    /// HTTP request timeout in seconds (no timeout when omitted)
    #[arg(long, env = "NEWSLAKE_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Root directory of the data lake (raw/, bronze/, silver/, gold/)
    #[arg(long, env = "NEWSLAKE_DATA_ROOT", default_value = "data")]
    pub data_root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Search window shared by `land` and `run`.
#[derive(Args, Debug)]
pub struct WindowArgs {
    /// Search term
    #[arg(short, long)]
    pub query: String,

    /// Article language code
    #[arg(short, long, default_value = "pt")]
    pub language: String,

    /// Window start, e.g. 2024-03-05T00:00:00
    #[arg(short, long)]
    pub start_time: String,

    /// Window end; open-ended when omitted
    #[arg(short, long)]
    pub end_time: Option<String>,
}

impl From<WindowArgs> for LandingRequest {
    fn from(args: WindowArgs) -> Self {
        LandingRequest {
            query: args.query,
            language: args.language,
            start_time: args.start_time,
            end_time: args.end_time,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one search window from the API into the raw intake area
    Land(WindowArgs),
    /// Promote landed raw pages into a dated bronze snapshot
    Bronze,
    /// Refine the latest bronze snapshot into the cumulative silver dataset
    Silver,
    /// Recompute all gold aggregates, dimensions, and the fact table
    Gold,
    /// Run land, bronze, silver, and gold back to back
    Run(WindowArgs),
    /// Print word frequencies across silver descriptions
    Words {
        /// Only print the top N words
        #[arg(short, long)]
        limit: Option<usize>,
    },
}
