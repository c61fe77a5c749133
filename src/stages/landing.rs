//! Landing stage: fetch raw search pages and persist them to the intake area.
//!
//! One landing run covers one query window. The initial response sizes the
//! pagination loop via `totalResults`; every page that carries articles is
//! written to the intake area exactly as the API sent it, pretty-printed
//! with a 1-space indent.
//!
//! # Failure Policy
//!
//! [`land`] never returns `Err`. Whatever goes wrong (transport, status,
//! serialization, disk) is logged and recorded on the returned
//! [`LandingOutcome`], and pages persisted before the failure stay on disk
//! for the bronze stage to pick up.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::api::{SearchClient, page_count};
use crate::config::LakePaths;
use crate::error::LandingError;
use crate::utils::start_date_key;

/// Parameters of one landing run.
#[derive(Debug, Clone)]
pub struct LandingRequest {
    /// Search query string.
    pub query: String,
    /// Two-letter article language code.
    pub language: String,
    /// Window start, ISO-8601. Its date part names the raw files.
    pub start_time: String,
    /// Window end, ISO-8601; open-ended when `None`.
    pub end_time: Option<String>,
}

/// What a landing run did.
///
/// `pages_skipped` counts pages whose article list was empty, a notice
/// rather than an error. `failure` is set when the run stopped early; the
/// counters then cover only the pages handled before the stop.
#[derive(Debug, Default)]
pub struct LandingOutcome {
    /// Pages the initial `totalResults` called for.
    pub pages_expected: u64,
    /// Pages persisted to the intake area.
    pub pages_written: u64,
    /// Pages skipped because they carried no articles.
    pub pages_skipped: u64,
    /// Why the run stopped early, if it did.
    pub failure: Option<LandingError>,
}

impl LandingOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Run the landing stage for one window.
#[instrument(level = "info", skip_all, fields(query = %request.query, start_time = %request.start_time))]
pub async fn land(
    client: &SearchClient,
    paths: &LakePaths,
    request: &LandingRequest,
) -> LandingOutcome {
    let mut outcome = LandingOutcome::default();
    if let Err(e) = run(client, paths, request, &mut outcome).await {
        error!(error = %e, "landing run failed; keeping pages persisted so far");
        outcome.failure = Some(e);
    }
    info!(
        pages_expected = outcome.pages_expected,
        pages_written = outcome.pages_written,
        pages_skipped = outcome.pages_skipped,
        success = outcome.is_success(),
        "landing run finished"
    );
    outcome
}

async fn run(
    client: &SearchClient,
    paths: &LakePaths,
    request: &LandingRequest,
    outcome: &mut LandingOutcome,
) -> Result<(), LandingError> {
    let first = client
        .search(
            &request.query,
            &request.language,
            &request.start_time,
            request.end_time.as_deref(),
            None,
        )
        .await?;

    let total = total_results(&first)?;
    let pages = page_count(total, client.page_size());
    outcome.pages_expected = pages;
    info!(total_results = total, pages, "search window sized");

    if pages == 0 {
        info!("window returned no results; nothing to land");
        return Ok(());
    }

    let start_date = start_date_key(&request.start_time);
    if pages == 1 {
        let path = paths.raw_page_file(start_date, None);
        persist_page(&first, &path, outcome).await?;
        return Ok(());
    }

    let path = paths.raw_page_file(start_date, Some(1));
    persist_page(&first, &path, outcome).await?;
    for page in 2..=pages {
        let doc = client
            .search(
                &request.query,
                &request.language,
                &request.start_time,
                request.end_time.as_deref(),
                Some(page as u32),
            )
            .await?;
        let path = paths.raw_page_file(start_date, Some(page as u32));
        persist_page(&doc, &path, outcome).await?;
    }
    Ok(())
}

fn total_results(doc: &Value) -> Result<u64, LandingError> {
    match doc.get("totalResults").and_then(Value::as_u64) {
        Some(total) => Ok(total),
        None => Err(LandingError::TotalResults {
            value: doc
                .get("totalResults")
                .cloned()
                .unwrap_or(Value::Null)
                .to_string(),
        }),
    }
}

/// Persist one raw page, unless its article list is empty or missing.
/// That means "no new articles for this window": a notice, not an error,
/// and no empty file either.
async fn persist_page(
    doc: &Value,
    path: &Path,
    outcome: &mut LandingOutcome,
) -> Result<(), LandingError> {
    let has_articles = doc
        .get("articles")
        .and_then(Value::as_array)
        .is_some_and(|articles| !articles.is_empty());
    if !has_articles {
        info!(path = %path.display(), "page carried no articles; skipping persistence");
        outcome.pages_skipped += 1;
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, to_pretty_json(doc)?).await?;
    outcome.pages_written += 1;
    info!(path = %path.display(), "landed raw page");
    Ok(())
}

/// Raw documents stay human-readable: pretty-printed with a 1-space indent.
fn to_pretty_json(doc: &Value) -> Result<Vec<u8>, LandingError> {
    let mut buf = Vec::with_capacity(1024);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut serializer)?;
    Ok(buf)
}
