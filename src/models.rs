//! Data models for search results and their staged representations.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`SearchPage`]: one raw result page as returned by the search API
//! - [`Article`] / [`SourceRef`]: a single article record and its nested source
//! - [`BronzeRow`]: an article stamped with the bronze load date
//! - [`SilverRow`]: the cleaned, flattened record held in the silver dataset
//!
//! The wire models use camelCase field names to match the JSON returned by
//! the search API, hence the `#[allow(non_snake_case)]` attributes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One page of search results.
///
/// `totalResults` counts matches across the whole window, not just this
/// page; the landing stage uses it to size the pagination loop. Unknown
/// top-level fields are ignored here; landing persists the raw body
/// untouched, so nothing is lost by the typed view.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchPage {
    /// Total matches for the query window, across all pages.
    #[serde(default)]
    pub totalResults: u64,
    /// The articles on this page, in upstream order.
    pub articles: Vec<Article>,
}

/// A single article record as returned by the search API.
///
/// Every field is optional: the upstream feed routinely omits authors,
/// descriptions, and images, and retracted articles arrive with most
/// fields nulled out.
#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// The publishing outlet, a nested `{id, name}` object.
    #[serde(default)]
    pub source: Option<SourceRef>,
    /// Author byline; frequently missing.
    #[serde(default)]
    pub author: Option<String>,
    /// Article headline. Retracted articles carry the literal `[Removed]`.
    #[serde(default)]
    pub title: Option<String>,
    /// Short teaser text.
    #[serde(default)]
    pub description: Option<String>,
    /// Canonical article URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Lead image URL.
    #[serde(default)]
    pub urlToImage: Option<String>,
    /// Publication timestamp, ISO-8601 as sent by the API.
    #[serde(default)]
    pub publishedAt: Option<String>,
    /// Truncated article body.
    #[serde(default)]
    pub content: Option<String>,
}

/// The nested source object carried by every article.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceRef {
    /// Machine identifier of the outlet; null for long-tail sources.
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable outlet name.
    #[serde(default)]
    pub name: Option<String>,
}

/// One bronze row: an article plus the date the bronze job ran.
#[derive(Debug, Clone, PartialEq)]
pub struct BronzeRow {
    pub article: Article,
    pub load_date: NaiveDate,
}

impl BronzeRow {
    /// Key under which bronze rows count as duplicates of each other.
    pub fn dedup_key(&self) -> (Option<String>, Option<String>) {
        (
            self.article.title.clone(),
            self.article.publishedAt.clone(),
        )
    }
}

/// One silver row after cleaning and normalization.
///
/// `Eq`/`Hash` cover every field, so the silver dedup pass removes exact
/// full-row duplicates only: the same article re-ingested under a
/// different `load_date` is a distinct row, as the accumulated dataset
/// records each load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SilverRow {
    /// Author byline; never null in silver (missing values are filled
    /// with the sentinel before the row is written).
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    /// Publication date, time-of-day discarded.
    pub published_at: NaiveDate,
    pub content: Option<String>,
    pub load_date: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    /// Outlet id as sent by the API (not the gold surrogate).
    pub source_id: Option<String>,
    pub source_name: Option<String>,
}
