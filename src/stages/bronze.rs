//! Bronze stage: drain the intake area into a dated, deduplicated snapshot.
//!
//! Every raw page in the intake area is parsed, its articles concatenated
//! in file-name order (intra-file order preserved), stamped with the run
//! date, and deduplicated by (title, publishedAt). The survivors land in
//! `bronze/{date}.parquet`; prior dated snapshots are never touched.
//!
//! The intake area is cleared afterwards, also when it produced no rows,
//! so a raw page is consumed exactly once. Deletion happens only after the
//! snapshot write succeeded; on error the files stay put and the error
//! propagates.

use std::path::PathBuf;

use chrono::Local;
use itertools::Itertools;
use tracing::{info, instrument};

use crate::config::LakePaths;
use crate::error::{Result, StageError};
use crate::models::{BronzeRow, SearchPage};
use crate::store::{self, parquet};

/// Summary of one bronze run.
#[derive(Debug)]
pub struct BronzeReport {
    /// Intake files consumed (and deleted).
    pub files_consumed: usize,
    /// Rows in the snapshot after dedup; 0 when no snapshot was written.
    pub rows_written: usize,
    /// The snapshot path, when one was written.
    pub snapshot: Option<PathBuf>,
}

/// Run the bronze stage.
///
/// # Errors
///
/// Malformed intake files, parquet encoding failures, and I/O failures all
/// propagate; this stage has no fallback behavior.
#[instrument(level = "info", skip_all)]
pub async fn bronze(paths: &LakePaths) -> Result<BronzeReport> {
    let intake = store::list_files_sorted(&paths.raw_dir()).await?;
    info!(files = intake.len(), "bronze stage draining intake area");

    let load_date = Local::now().date_naive();
    let mut rows: Vec<BronzeRow> = Vec::new();
    for path in &intake {
        let body = tokio::fs::read_to_string(path).await?;
        let page: SearchPage =
            serde_json::from_str(&body).map_err(|e| StageError::RawDocument {
                path: path.clone(),
                source: e,
            })?;
        rows.extend(
            page.articles
                .into_iter()
                .map(|article| BronzeRow { article, load_date }),
        );
    }

    let mut snapshot = None;
    let mut rows_written = 0;
    if rows.is_empty() {
        info!("intake produced no rows; no snapshot written");
    } else {
        let before = rows.len();
        let rows = dedup_last_wins(rows);
        let path = paths.bronze_snapshot(load_date);
        let batch = parquet::bronze_rows_to_batch(&rows)?;
        parquet::write_batch(&path, &batch)?;
        info!(
            rows = rows.len(),
            duplicates = before - rows.len(),
            path = %path.display(),
            "bronze snapshot written"
        );
        rows_written = rows.len();
        snapshot = Some(path);
    }

    // The intake area is cleared even when nothing was written.
    for path in &intake {
        tokio::fs::remove_file(path).await?;
    }
    info!(files = intake.len(), "intake area cleared");

    Ok(BronzeReport {
        files_consumed: intake.len(),
        rows_written,
        snapshot,
    })
}

/// Deduplicate by (title, publishedAt); the last occurrence wins and the
/// survivors keep their relative order.
fn dedup_last_wins(rows: Vec<BronzeRow>) -> Vec<BronzeRow> {
    let mut deduped = rows
        .into_iter()
        .rev()
        .unique_by(|row| row.dedup_key())
        .collect::<Vec<_>>();
    deduped.reverse();
    deduped
}
