//! Silver stage: clean and normalize the latest bronze snapshot and fold it
//! into the cumulative silver dataset.
//!
//! Exactly one bronze snapshot feeds each silver run: the one with the
//! most recent modification time. The cleaning rules, in order:
//!
//! 1. Drop rows whose title is exactly `[Removed]` (retracted articles)
//! 2. Fill missing authors with [`UNKNOWN_AUTHOR`]
//! 3. Parse `publishedAt`, derive year/month/day, keep the date only
//! 4. Flatten the nested source into `source_id` / `source_name`
//!
//! The result is concatenated with the prior silver dataset (new rows
//! first), exact full-row duplicates are removed, and the union overwrites
//! `silver/silver.parquet`.

use std::path::PathBuf;

use chrono::Datelike;
use itertools::Itertools;
use tracing::{info, instrument};

use crate::config::LakePaths;
use crate::error::{Result, StageError};
use crate::models::{BronzeRow, SilverRow};
use crate::store::{self, parquet};
use crate::utils::parse_published_at;

/// Author value written when the upstream record carries none.
pub const UNKNOWN_AUTHOR: &str = "Não Informado";

/// Title marking a retracted article; such rows never reach silver.
pub const REMOVED_TITLE: &str = "[Removed]";

/// Summary of one silver run.
#[derive(Debug)]
pub struct SilverReport {
    /// The bronze snapshot this run consumed.
    pub source_snapshot: PathBuf,
    /// Rows read from the snapshot, before cleaning.
    pub rows_in: usize,
    /// Rows in the silver dataset after the merge.
    pub rows_total: usize,
}

/// Run the silver stage.
///
/// # Errors
///
/// Fails with [`StageError::NoBronzeSnapshot`] when the bronze area holds
/// no snapshot to read. Rows with an unparseable `publishedAt` or without
/// a source object fail the run; like every silver failure they propagate
/// to the driver.
#[instrument(level = "info", skip_all)]
pub async fn silver(paths: &LakePaths) -> Result<SilverReport> {
    let bronze_dir = paths.bronze_dir();
    let snapshot = store::latest_modified(&bronze_dir, "parquet")
        .await?
        .ok_or_else(|| StageError::NoBronzeSnapshot(bronze_dir.clone()))?;
    info!(path = %snapshot.display(), "silver stage reading latest bronze snapshot");

    let mut bronze_rows: Vec<BronzeRow> = Vec::new();
    for batch in parquet::read_batches(&snapshot)? {
        bronze_rows.extend(parquet::batch_to_bronze_rows(&batch)?);
    }
    let rows_in = bronze_rows.len();

    let fresh = normalize(bronze_rows)?;
    info!(rows_in, rows_kept = fresh.len(), "bronze rows normalized");

    let silver_file = paths.silver_file();
    let mut combined = fresh;
    if tokio::fs::try_exists(&silver_file).await? {
        let mut prior: Vec<SilverRow> = Vec::new();
        for batch in parquet::read_batches(&silver_file)? {
            prior.extend(parquet::batch_to_silver_rows(&batch)?);
        }
        info!(rows_prior = prior.len(), "merging with existing silver dataset");
        combined.extend(prior);
    }

    let before_dedup = combined.len();
    let combined = combined.into_iter().unique().collect::<Vec<_>>();
    let batch = parquet::silver_rows_to_batch(&combined)?;
    parquet::write_batch(&silver_file, &batch)?;
    info!(
        rows = combined.len(),
        duplicates = before_dedup - combined.len(),
        path = %silver_file.display(),
        "silver dataset written"
    );

    Ok(SilverReport {
        source_snapshot: snapshot,
        rows_in,
        rows_total: combined.len(),
    })
}

/// Apply the cleaning rules to one snapshot's rows.
fn normalize(rows: Vec<BronzeRow>) -> Result<Vec<SilverRow>> {
    let mut out = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        if row.article.title.as_deref() == Some(REMOVED_TITLE) {
            continue;
        }

        let source = row
            .article
            .source
            .ok_or(StageError::SourceShape { row: index })?;
        let published = match row
            .article
            .publishedAt
            .as_deref()
            .and_then(parse_published_at)
        {
            Some(parsed) => parsed,
            None => {
                return Err(StageError::Timestamp {
                    row: index,
                    value: row.article.publishedAt,
                });
            }
        };

        let date = published.date();
        out.push(SilverRow {
            author: Some(
                row.article
                    .author
                    .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            ),
            title: row.article.title,
            description: row.article.description,
            url: row.article.url,
            url_to_image: row.article.urlToImage,
            published_at: date,
            content: row.article.content,
            load_date: row.load_date,
            year: date.year(),
            month: date.month() as i32,
            day: date.day() as i32,
            source_id: source.id,
            source_name: source.name,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, SourceRef};
    use chrono::NaiveDate;

    fn bronze_row(title: &str, author: Option<&str>, published_at: &str) -> BronzeRow {
        BronzeRow {
            article: Article {
                source: Some(SourceRef {
                    id: Some("globo".to_string()),
                    name: Some("Globo".to_string()),
                }),
                author: author.map(str::to_string),
                title: Some(title.to_string()),
                description: Some("resumo".to_string()),
                url: None,
                urlToImage: None,
                publishedAt: Some(published_at.to_string()),
                content: Some("texto".to_string()),
            },
            load_date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
        }
    }

    #[test]
    fn test_normalize_drops_removed_titles() {
        let rows = vec![
            bronze_row("[Removed]", Some("X"), "2024-03-05T10:00:00Z"),
            bronze_row("Kept", Some("Ana"), "2024-03-05T10:00:00Z"),
        ];
        let silver = normalize(rows).unwrap();
        assert_eq!(silver.len(), 1);
        assert_eq!(silver[0].title.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_normalize_fills_missing_author_with_sentinel() {
        let rows = vec![bronze_row("T", None, "2024-03-05T10:00:00Z")];
        let silver = normalize(rows).unwrap();
        assert_eq!(silver[0].author.as_deref(), Some(UNKNOWN_AUTHOR));
    }

    #[test]
    fn test_normalize_decomposes_published_at() {
        let rows = vec![bronze_row("T", Some("Ana"), "2024-03-05T10:00:00")];
        let silver = normalize(rows).unwrap();
        let row = &silver[0];
        assert_eq!(row.year, 2024);
        assert_eq!(row.month, 3);
        assert_eq!(row.day, 5);
        assert_eq!(
            row.published_at,
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
    }

    #[test]
    fn test_normalize_flattens_source() {
        let rows = vec![bronze_row("T", Some("Ana"), "2024-03-05T10:00:00Z")];
        let silver = normalize(rows).unwrap();
        assert_eq!(silver[0].source_id.as_deref(), Some("globo"));
        assert_eq!(silver[0].source_name.as_deref(), Some("Globo"));
    }

    #[test]
    fn test_normalize_requires_a_source_object() {
        let mut row = bronze_row("T", Some("Ana"), "2024-03-05T10:00:00Z");
        row.article.source = None;
        let err = normalize(vec![row]).unwrap_err();
        assert!(matches!(err, StageError::SourceShape { row: 0 }));
    }

    #[test]
    fn test_normalize_rejects_bad_timestamps() {
        let row = bronze_row("T", Some("Ana"), "05/03/2024");
        let err = normalize(vec![row]).unwrap_err();
        assert!(matches!(err, StageError::Timestamp { .. }));

        let mut row = bronze_row("T", Some("Ana"), "ignored");
        row.article.publishedAt = None;
        let err = normalize(vec![row]).unwrap_err();
        assert!(matches!(err, StageError::Timestamp { value: None, .. }));
    }

    #[test]
    fn test_removed_rows_are_skipped_before_shape_checks() {
        // A retracted article with no source must not fail the run.
        let mut row = bronze_row("[Removed]", None, "2024-03-05T10:00:00Z");
        row.article.source = None;
        let silver = normalize(vec![row]).unwrap();
        assert!(silver.is_empty());
    }

    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn write_snapshot(paths: &LakePaths, name: &str, titles: &[&str], age_secs: u64) {
        let rows: Vec<BronzeRow> = titles
            .iter()
            .map(|t| bronze_row(t, Some("Ana"), "2024-03-05T10:00:00Z"))
            .collect();
        let batch = parquet::bronze_rows_to_batch(&rows).unwrap();
        let path = paths.bronze_dir().join(name);
        parquet::write_batch(&path, &batch).unwrap();
        if age_secs > 0 {
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
                .unwrap();
        }
    }

    fn read_silver_titles(path: &Path) -> Vec<String> {
        let mut titles = Vec::new();
        for batch in parquet::read_batches(path).unwrap() {
            for row in parquet::batch_to_silver_rows(&batch).unwrap() {
                titles.push(row.title.unwrap());
            }
        }
        titles.sort();
        titles
    }

    #[tokio::test]
    async fn test_silver_requires_a_bronze_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LakePaths::new(dir.path());

        let err = silver(&paths).await.unwrap_err();
        assert!(matches!(err, StageError::NoBronzeSnapshot(_)));
    }

    #[tokio::test]
    async fn test_silver_reads_only_the_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LakePaths::new(dir.path());
        write_snapshot(&paths, "2024-03-05.parquet", &["Old"], 3600);
        write_snapshot(&paths, "2024-03-06.parquet", &["New"], 0);

        let report = silver(&paths).await.unwrap();
        assert_eq!(report.rows_in, 1);
        assert_eq!(
            report.source_snapshot,
            paths.bronze_dir().join("2024-03-06.parquet")
        );
        assert_eq!(read_silver_titles(&paths.silver_file()), vec!["New"]);
    }

    #[tokio::test]
    async fn test_silver_drops_removed_and_fills_sentinel_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LakePaths::new(dir.path());

        let mut retracted = bronze_row("[Removed]", None, "2024-03-05T10:00:00Z");
        retracted.article.source = None;
        let anonymous = bronze_row("Anon", None, "2024-03-05T10:00:00Z");
        let batch = parquet::bronze_rows_to_batch(&[retracted, anonymous]).unwrap();
        parquet::write_batch(&paths.bronze_dir().join("2024-03-05.parquet"), &batch).unwrap();

        let report = silver(&paths).await.unwrap();
        assert_eq!(report.rows_in, 2);
        assert_eq!(report.rows_total, 1);

        let mut rows = Vec::new();
        for batch in parquet::read_batches(&paths.silver_file()).unwrap() {
            rows.extend(parquet::batch_to_silver_rows(&batch).unwrap());
        }
        assert_eq!(rows[0].title.as_deref(), Some("Anon"));
        assert_eq!(rows[0].author.as_deref(), Some(UNKNOWN_AUTHOR));
    }

    #[tokio::test]
    async fn test_silver_accumulates_and_reruns_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LakePaths::new(dir.path());

        write_snapshot(&paths, "2024-03-05.parquet", &["A"], 3600);
        let report = silver(&paths).await.unwrap();
        assert_eq!(report.rows_total, 1);

        write_snapshot(&paths, "2024-03-06.parquet", &["B", "C"], 0);
        let report = silver(&paths).await.unwrap();
        assert_eq!(report.rows_in, 2);
        assert_eq!(report.rows_total, 3);
        assert_eq!(read_silver_titles(&paths.silver_file()), vec!["A", "B", "C"]);

        // Re-running over the same snapshot adds nothing.
        let report = silver(&paths).await.unwrap();
        assert_eq!(report.rows_total, 3);
    }
}
