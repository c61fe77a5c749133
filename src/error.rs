//! Error types for the pipeline.
//!
//! Failures fall into three tiers with different handling:
//!
//! - [`ApiError`]: transport-level failures raised by the extraction helper.
//!   Logged where they happen and re-raised to the landing stage.
//! - [`LandingError`]: anything that stops a landing run. Absorbed by the
//!   landing stage, which records it on its outcome instead of returning
//!   `Err`; a failed landing run must not abort a scheduled pipeline.
//! - [`StageError`]: failures in bronze, silver, or gold. These propagate
//!   uncaught to the driver; the later stages have no fallback behavior.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias for the uncaught stage tier.
pub type Result<T> = std::result::Result<T, StageError>;

/// Failures raised by the extraction helper while talking to the search
/// endpoint.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never completed (connection refused, DNS, timeout, ...).
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("search endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The endpoint answered 2xx but the body was not valid JSON.
    #[error("malformed search response body: {0}")]
    Body(#[from] serde_json::Error),
}

/// Failures that stop a landing run. Never escape the landing stage.
#[derive(Error, Debug)]
pub enum LandingError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("could not persist raw document: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not serialize raw document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The initial response carried no usable `totalResults` value, so the
    /// page count cannot be computed.
    #[error("response carries no usable totalResults (got {value})")]
    TotalResults { value: String },
}

/// Failures in the bronze, silver, and gold stages. No stage catches
/// these; the driver sees them and exits nonzero.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet failure: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow failure: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An intake file did not parse as a raw search page.
    #[error("malformed raw document {path}: {source}")]
    RawDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The silver stage needs at least one bronze snapshot to read.
    #[error("no bronze snapshot found in {0}")]
    NoBronzeSnapshot(PathBuf),

    /// A parquet file is missing a column, or the column has an
    /// unexpected type.
    #[error("column {name} is missing or not of the expected type ({expected})")]
    Column {
        name: String,
        expected: &'static str,
    },

    /// A row reached silver without a source object to flatten.
    #[error("row {row}: source must be an object carrying id and name")]
    SourceShape { row: usize },

    /// A row reached silver without a parseable publishedAt timestamp.
    #[error("row {row}: cannot parse publishedAt {value:?}")]
    Timestamp { row: usize, value: Option<String> },
}
