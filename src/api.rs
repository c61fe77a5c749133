//! HTTP extraction against the article-search endpoint.
//!
//! The landing stage talks to a single search endpoint over HTTP POST.
//! [`SearchClient`] owns the connection settings and raises typed
//! [`ApiError`]s. It performs exactly one attempt per call, no retry or
//! backoff; what a failed page means is the landing stage's call.
//!
//! # Request Shape
//!
//! ```text
//! POST {endpoint}
//! { "q": "...", "language": "pt", "from": "...", "to": "...", "page": 2 }
//! ```
//!
//! `to` and `page` are null on the initial request. The response body is
//! returned as parsed JSON without projecting it through a typed model, so
//! the landing stage can persist it byte-faithfully.

use std::time::Instant;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::utils::truncate_for_log;

/// Client for the article-search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    config: ApiConfig,
    http: Client,
}

impl SearchClient {
    /// Build a client from explicit configuration.
    ///
    /// The timeout, when configured, bounds each request end to end;
    /// without one a hung upstream call blocks the stage indefinitely.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { config, http })
    }

    /// Page size used for pagination math.
    ///
    /// The payload sent upstream never carries it; the server's own page
    /// length is taken as-is.
    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    /// Issue one search request and return the parsed response body.
    ///
    /// # Arguments
    ///
    /// * `query` - Search query string
    /// * `language` - Two-letter article language code
    /// * `from` / `to` - Window bounds, ISO-8601; `to` may be open
    /// * `page` - Result page to fetch; `None` on the initial request
    ///
    /// # Errors
    ///
    /// Non-success statuses, connection failures, and non-JSON bodies are
    /// logged here and raised as [`ApiError`]; the caller decides whether
    /// to absorb them.
    #[instrument(level = "info", skip_all, fields(page = ?page))]
    pub async fn search(
        &self,
        query: &str,
        language: &str,
        from: &str,
        to: Option<&str>,
        page: Option<u32>,
    ) -> Result<Value, ApiError> {
        let payload = json!({
            "q": query,
            "language": language,
            "from": from,
            "to": to,
            "page": page,
        });

        let t0 = Instant::now();
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, endpoint = %self.config.endpoint, "search request failed");
                ApiError::Transport(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(error = %e, "could not read search response body");
            ApiError::Transport(e)
        })?;

        if !status.is_success() {
            error!(
                %status,
                body = %truncate_for_log(&body, 300),
                "search endpoint returned an error status"
            );
            return Err(ApiError::Status { status, body });
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %truncate_for_log(&body, 300),
                "search response was not valid JSON"
            );
            ApiError::Body(e)
        })?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = body.len(),
            "search request completed"
        );
        Ok(parsed)
    }
}

/// Number of result pages needed to cover `total_results`.
///
/// `page_size` must be nonzero; the CLI enforces that. Zero results need
/// zero pages, so the landing stage lands nothing for an empty window.
pub fn page_count(total_results: u64, page_size: u32) -> u64 {
    total_results.div_ceil(page_size as u64)
}
