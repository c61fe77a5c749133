//! Runtime configuration for the pipeline.
//!
//! Both halves of the configuration are explicit values passed into the
//! code that needs them; there is no module-level endpoint constant or
//! global data directory:
//!
//! - [`ApiConfig`]: where and how the extraction helper talks to the
//!   search endpoint. Tests point this at a mock server.
//! - [`LakePaths`]: the lake directory tree under one data root. Tests
//!   point this at a temp directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use url::Url;

/// Result-page size of the upstream search API.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Connection settings for the article-search endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Endpoint receiving the search POST requests.
    pub endpoint: Url,
    /// Rows per result page. Drives pagination math only; the upstream
    /// payload does not carry it.
    pub page_size: u32,
    /// Per-request timeout. `None` leaves requests unbounded, which is the
    /// upstream-compatible default.
    pub timeout: Option<Duration>,
}

impl ApiConfig {
    /// Configuration with the default page size and no timeout.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            page_size: DEFAULT_PAGE_SIZE,
            timeout: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The lake directory tree:
///
/// ```text
/// {root}/
/// ├── raw/        intake area: one JSON file per landed page
/// ├── bronze/     dated immutable snapshots, one per bronze run
/// ├── silver/     silver.parquet, the cumulative clean dataset
/// └── gold/       aggregate, dimension, and fact artifacts
/// ```
#[derive(Debug, Clone)]
pub struct LakePaths {
    root: PathBuf,
}

impl LakePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Intake area holding raw landed pages.
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.root.join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.root.join("silver")
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.root.join("gold")
    }

    /// Path for one landed page: `{date}.json` when the window fits in a
    /// single page, `{date} (Page N).json` when it spans several.
    pub fn raw_page_file(&self, start_date: &str, page: Option<u32>) -> PathBuf {
        let name = match page {
            Some(page) => format!("{start_date} (Page {page}).json"),
            None => format!("{start_date}.json"),
        };
        self.raw_dir().join(name)
    }

    /// Dated bronze snapshot written by one bronze run.
    pub fn bronze_snapshot(&self, date: NaiveDate) -> PathBuf {
        self.bronze_dir().join(format!("{date}.parquet"))
    }

    /// The single cumulative silver artifact.
    pub fn silver_file(&self) -> PathBuf {
        self.silver_dir().join("silver.parquet")
    }

    /// Gold artifact path for a file stem such as `aggregateByYear`.
    pub fn gold_file(&self, stem: &str) -> PathBuf {
        self.gold_dir().join(format!("{stem}.parquet"))
    }
}
