//! Gold stage: aggregate, dimension, and fact artifacts.
//!
//! Every run recomputes all ten artifacts from the silver dataset and
//! overwrites them:
//!
//! - seven `number_articles` aggregates, one per grouping key set:
//!   {year}, {month}, {day}, {year,month,day}, {source_name}, {author},
//!   {source_name,author}
//! - two dimension tables (`dim_author`, `dim_source`)
//! - the `articles` fact table, which keeps the dimension surrogate ids
//!   and drops the raw author/source_name text
//!
//! `number_articles` counts non-null `content` values per group; rows
//! whose group key is null still form a group of their own. Dimension ids
//! are handed out 0..n in first-seen row order and rebuilt from scratch on
//! every run. They are not stable across runs, and nothing downstream may
//! persist them.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use tracing::{info, instrument};

use crate::config::LakePaths;
use crate::error::Result;
use crate::models::SilverRow;
use crate::store::parquet;
use crate::utils::cmp_nulls_last;

pub const AGG_BY_YEAR: &str = "aggregateByYear";
pub const AGG_BY_MONTH: &str = "aggregateByMonth";
pub const AGG_BY_DAY: &str = "aggregateByDay";
pub const AGG_BY_YEAR_MONTH_DAY: &str = "aggregateByYearMonthDay_path";
pub const AGG_BY_SOURCE: &str = "aggregateBySource";
pub const AGG_BY_AUTHOR: &str = "aggregateByAuthor";
pub const AGG_BY_SOURCE_AUTHOR: &str = "aggregateBySourceAuthor";
pub const DIM_AUTHOR: &str = "dim_author";
pub const DIM_SOURCE: &str = "dim_source";
pub const FACT_ARTICLES: &str = "articles";

/// Count column shared by every aggregate artifact.
pub const COL_NUMBER_ARTICLES: &str = "number_articles";
/// Surrogate key column of the author dimension.
pub const COL_ID_AUTHORS: &str = "id_authors";

/// Summary of one gold run.
#[derive(Debug)]
pub struct GoldReport {
    /// Silver rows the artifacts were computed from.
    pub silver_rows: usize,
    /// Artifacts written (always the full set).
    pub artifacts_written: usize,
    /// Distinct authors in the author dimension.
    pub distinct_authors: usize,
    /// Distinct sources in the source dimension.
    pub distinct_sources: usize,
}

/// Run the gold stage.
#[instrument(level = "info", skip_all)]
pub async fn gold(paths: &LakePaths) -> Result<GoldReport> {
    let mut rows: Vec<SilverRow> = Vec::new();
    for batch in parquet::read_batches(&paths.silver_file())? {
        rows.extend(parquet::batch_to_silver_rows(&batch)?);
    }
    info!(rows = rows.len(), "gold stage loaded silver dataset");

    let authors = Dimension::build(rows.iter().map(|r| r.author.clone()));
    let sources = Dimension::build(rows.iter().map(|r| r.source_name.clone()));

    let artifacts: Vec<(&str, RecordBatch)> = vec![
        (AGG_BY_YEAR, aggregate_by_year(&rows)?),
        (AGG_BY_MONTH, aggregate_by_month(&rows)?),
        (AGG_BY_DAY, aggregate_by_day(&rows)?),
        (AGG_BY_YEAR_MONTH_DAY, aggregate_by_year_month_day(&rows)?),
        (AGG_BY_SOURCE, aggregate_by_source(&rows)?),
        (AGG_BY_AUTHOR, aggregate_by_author(&rows)?),
        (AGG_BY_SOURCE_AUTHOR, aggregate_by_source_author(&rows)?),
        (
            DIM_AUTHOR,
            dimension_batch(COL_ID_AUTHORS, parquet::COL_AUTHOR, &authors)?,
        ),
        (
            DIM_SOURCE,
            dimension_batch(parquet::COL_SOURCE_ID, parquet::COL_SOURCE_NAME, &sources)?,
        ),
        (FACT_ARTICLES, fact_batch(&rows, &authors, &sources)?),
    ];

    let artifacts_written = artifacts.len();
    for (stem, batch) in artifacts {
        let path = paths.gold_file(stem);
        parquet::write_batch(&path, &batch)?;
        info!(path = %path.display(), rows = batch.num_rows(), "gold artifact written");
    }

    Ok(GoldReport {
        silver_rows: rows.len(),
        artifacts_written,
        distinct_authors: authors.entries.len(),
        distinct_sources: sources.entries.len(),
    })
}

/// A dimension: distinct values in first-seen row order, each with a fresh
/// surrogate id starting at 0, plus the per-row id assignment for the fact
/// table join.
struct Dimension {
    /// (surrogate id, natural value), ordered by id.
    entries: Vec<(i64, Option<String>)>,
    /// The surrogate id of each input row, in row order.
    row_ids: Vec<i64>,
}

impl Dimension {
    fn build(values: impl Iterator<Item = Option<String>>) -> Self {
        let mut index: HashMap<Option<String>, i64> = HashMap::new();
        let mut entries = Vec::new();
        let mut row_ids = Vec::new();
        for value in values {
            let id = match index.get(&value) {
                Some(id) => *id,
                None => {
                    let id = entries.len() as i64;
                    entries.push((id, value.clone()));
                    index.insert(value, id);
                    id
                }
            };
            row_ids.push(id);
        }
        Self { entries, row_ids }
    }
}

/// Count of non-null `content` per group key. Every row registers its
/// group, so a group whose rows all lack content still appears, with 0.
fn count_non_null_content<K, F>(rows: &[SilverRow], key: F) -> Vec<(K, i64)>
where
    K: std::hash::Hash + Eq,
    F: Fn(&SilverRow) -> K,
{
    let mut counts: HashMap<K, i64> = HashMap::new();
    for row in rows {
        let entry = counts.entry(key(row)).or_insert(0);
        if row.content.is_some() {
            *entry += 1;
        }
    }
    counts.into_iter().collect()
}

fn aggregate_by_year(rows: &[SilverRow]) -> Result<RecordBatch> {
    let mut groups = count_non_null_content(rows, |r| r.year);
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    int_aggregate_batch(parquet::COL_YEAR, &groups)
}

fn aggregate_by_month(rows: &[SilverRow]) -> Result<RecordBatch> {
    let mut groups = count_non_null_content(rows, |r| r.month);
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    int_aggregate_batch(parquet::COL_MONTH, &groups)
}

fn aggregate_by_day(rows: &[SilverRow]) -> Result<RecordBatch> {
    let mut groups = count_non_null_content(rows, |r| r.day);
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    int_aggregate_batch(parquet::COL_DAY, &groups)
}

fn aggregate_by_year_month_day(rows: &[SilverRow]) -> Result<RecordBatch> {
    let mut groups = count_non_null_content(rows, |r| (r.year, r.month, r.day));
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    let schema = Arc::new(Schema::new(vec![
        Field::new(parquet::COL_YEAR, DataType::Int32, false),
        Field::new(parquet::COL_MONTH, DataType::Int32, false),
        Field::new(parquet::COL_DAY, DataType::Int32, false),
        Field::new(COL_NUMBER_ARTICLES, DataType::Int64, false),
    ]));
    let years = Int32Array::from(groups.iter().map(|((y, _, _), _)| *y).collect::<Vec<_>>());
    let months = Int32Array::from(groups.iter().map(|((_, m, _), _)| *m).collect::<Vec<_>>());
    let days = Int32Array::from(groups.iter().map(|((_, _, d), _)| *d).collect::<Vec<_>>());
    let counts = Int64Array::from(groups.iter().map(|(_, c)| *c).collect::<Vec<_>>());
    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(years) as ArrayRef,
            Arc::new(months),
            Arc::new(days),
            Arc::new(counts),
        ],
    )?)
}

fn aggregate_by_source(rows: &[SilverRow]) -> Result<RecordBatch> {
    let mut groups = count_non_null_content(rows, |r| r.source_name.clone());
    groups.sort_by(|a, b| cmp_nulls_last(&a.0, &b.0));
    string_aggregate_batch(parquet::COL_SOURCE_NAME, &groups)
}

fn aggregate_by_author(rows: &[SilverRow]) -> Result<RecordBatch> {
    let mut groups = count_non_null_content(rows, |r| r.author.clone());
    groups.sort_by(|a, b| cmp_nulls_last(&a.0, &b.0));
    string_aggregate_batch(parquet::COL_AUTHOR, &groups)
}

fn aggregate_by_source_author(rows: &[SilverRow]) -> Result<RecordBatch> {
    let mut groups =
        count_non_null_content(rows, |r| (r.source_name.clone(), r.author.clone()));
    groups.sort_by(|((s1, a1), _), ((s2, a2), _)| {
        cmp_nulls_last(s1, s2).then_with(|| cmp_nulls_last(a1, a2))
    });

    let schema = Arc::new(Schema::new(vec![
        Field::new(parquet::COL_SOURCE_NAME, DataType::Utf8, true),
        Field::new(parquet::COL_AUTHOR, DataType::Utf8, true),
        Field::new(COL_NUMBER_ARTICLES, DataType::Int64, false),
    ]));
    let source_names = groups
        .iter()
        .map(|((s, _), _)| s.clone())
        .collect::<StringArray>();
    let authors = groups
        .iter()
        .map(|((_, a), _)| a.clone())
        .collect::<StringArray>();
    let counts = Int64Array::from(groups.iter().map(|(_, c)| *c).collect::<Vec<_>>());
    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(source_names) as ArrayRef,
            Arc::new(authors),
            Arc::new(counts),
        ],
    )?)
}

fn int_aggregate_batch(key_name: &str, groups: &[(i32, i64)]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(key_name, DataType::Int32, false),
        Field::new(COL_NUMBER_ARTICLES, DataType::Int64, false),
    ]));
    let keys = Int32Array::from(groups.iter().map(|(k, _)| *k).collect::<Vec<_>>());
    let counts = Int64Array::from(groups.iter().map(|(_, c)| *c).collect::<Vec<_>>());
    Ok(RecordBatch::try_new(
        schema,
        vec![Arc::new(keys) as ArrayRef, Arc::new(counts)],
    )?)
}

fn string_aggregate_batch(
    key_name: &str,
    groups: &[(Option<String>, i64)],
) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(key_name, DataType::Utf8, true),
        Field::new(COL_NUMBER_ARTICLES, DataType::Int64, false),
    ]));
    let keys = groups.iter().map(|(k, _)| k.clone()).collect::<StringArray>();
    let counts = Int64Array::from(groups.iter().map(|(_, c)| *c).collect::<Vec<_>>());
    Ok(RecordBatch::try_new(
        schema,
        vec![Arc::new(keys) as ArrayRef, Arc::new(counts)],
    )?)
}

fn dimension_batch(
    id_name: &str,
    value_name: &str,
    dimension: &Dimension,
) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(id_name, DataType::Int64, false),
        Field::new(value_name, DataType::Utf8, true),
    ]));
    let ids = Int64Array::from(
        dimension
            .entries
            .iter()
            .map(|(id, _)| *id)
            .collect::<Vec<_>>(),
    );
    let values = dimension
        .entries
        .iter()
        .map(|(_, v)| v.clone())
        .collect::<StringArray>();
    Ok(RecordBatch::try_new(
        schema,
        vec![Arc::new(ids) as ArrayRef, Arc::new(values)],
    )?)
}

/// The articles fact table: silver columns with the raw `author` and
/// `source_name` replaced by the dimension surrogate ids. The upstream
/// `source_id` string is dropped in favor of the surrogate of the same
/// name.
fn fact_batch(rows: &[SilverRow], authors: &Dimension, sources: &Dimension) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(parquet::COL_TITLE, DataType::Utf8, true),
        Field::new(parquet::COL_DESCRIPTION, DataType::Utf8, true),
        Field::new(parquet::COL_URL, DataType::Utf8, true),
        Field::new(parquet::COL_URL_TO_IMAGE, DataType::Utf8, true),
        Field::new(parquet::COL_PUBLISHED_AT, DataType::Date32, false),
        Field::new(parquet::COL_CONTENT, DataType::Utf8, true),
        Field::new(parquet::COL_LOAD_DATE, DataType::Date32, false),
        Field::new(parquet::COL_YEAR, DataType::Int32, false),
        Field::new(parquet::COL_MONTH, DataType::Int32, false),
        Field::new(parquet::COL_DAY, DataType::Int32, false),
        Field::new(COL_ID_AUTHORS, DataType::Int64, false),
        Field::new(parquet::COL_SOURCE_ID, DataType::Int64, false),
    ]));

    let titles = rows.iter().map(|r| r.title.clone()).collect::<StringArray>();
    let descriptions = rows
        .iter()
        .map(|r| r.description.clone())
        .collect::<StringArray>();
    let urls = rows.iter().map(|r| r.url.clone()).collect::<StringArray>();
    let images = rows
        .iter()
        .map(|r| r.url_to_image.clone())
        .collect::<StringArray>();
    let published = Date32Array::from(
        rows.iter()
            .map(|r| Date32Type::from_naive_date(r.published_at))
            .collect::<Vec<_>>(),
    );
    let contents = rows
        .iter()
        .map(|r| r.content.clone())
        .collect::<StringArray>();
    let load_dates = Date32Array::from(
        rows.iter()
            .map(|r| Date32Type::from_naive_date(r.load_date))
            .collect::<Vec<_>>(),
    );
    let years = Int32Array::from(rows.iter().map(|r| r.year).collect::<Vec<_>>());
    let months = Int32Array::from(rows.iter().map(|r| r.month).collect::<Vec<_>>());
    let days = Int32Array::from(rows.iter().map(|r| r.day).collect::<Vec<_>>());
    let author_ids = Int64Array::from(authors.row_ids.clone());
    let source_ids = Int64Array::from(sources.row_ids.clone());

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(titles) as ArrayRef,
            Arc::new(descriptions),
            Arc::new(urls),
            Arc::new(images),
            Arc::new(published),
            Arc::new(contents),
            Arc::new(load_dates),
            Arc::new(years),
            Arc::new(months),
            Arc::new(days),
            Arc::new(author_ids),
            Arc::new(source_ids),
        ],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use chrono::NaiveDate;

    fn silver_row(
        year: i32,
        author: Option<&str>,
        source_name: Option<&str>,
        content: Option<&str>,
    ) -> SilverRow {
        SilverRow {
            author: author.map(str::to_string),
            title: Some("t".to_string()),
            description: None,
            url: None,
            url_to_image: None,
            published_at: NaiveDate::from_ymd_opt(year, 3, 5).unwrap(),
            content: content.map(str::to_string),
            load_date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
            year,
            month: 3,
            day: 5,
            source_id: None,
            source_name: source_name.map(str::to_string),
        }
    }

    #[test]
    fn test_aggregate_by_year_counts_non_null_content() {
        let rows = vec![
            silver_row(2023, Some("A"), Some("S"), Some("x")),
            silver_row(2023, Some("A"), Some("S"), Some("x")),
            silver_row(2024, Some("A"), Some("S"), Some("x")),
            silver_row(2024, Some("A"), Some("S"), Some("x")),
            silver_row(2024, Some("A"), Some("S"), Some("x")),
        ];
        let batch = aggregate_by_year(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let years = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        let counts = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!((years.value(0), counts.value(0)), (2023, 2));
        assert_eq!((years.value(1), counts.value(1)), (2024, 3));
    }

    #[test]
    fn test_null_content_still_registers_the_group() {
        let rows = vec![
            silver_row(2023, Some("A"), Some("S"), None),
            silver_row(2024, Some("A"), Some("S"), Some("x")),
        ];
        let batch = aggregate_by_year(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let counts = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(counts.value(0), 0);
        assert_eq!(counts.value(1), 1);
    }

    #[test]
    fn test_null_source_forms_its_own_group_sorted_last() {
        let rows = vec![
            silver_row(2024, Some("A"), None, Some("x")),
            silver_row(2024, Some("A"), Some("Globo"), Some("x")),
            silver_row(2024, Some("A"), None, Some("x")),
        ];
        let batch = aggregate_by_source(&rows).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let names = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let counts = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(names.value(0), "Globo");
        assert_eq!(counts.value(0), 1);
        assert!(names.is_null(1));
        assert_eq!(counts.value(1), 2);
    }

    #[test]
    fn test_dimension_ids_are_first_seen_order_from_zero() {
        let values = vec![
            Some("Ana".to_string()),
            Some("Bruno".to_string()),
            Some("Ana".to_string()),
            None,
        ];
        let dim = Dimension::build(values.into_iter());

        assert_eq!(dim.entries.len(), 3);
        assert_eq!(dim.entries[0], (0, Some("Ana".to_string())));
        assert_eq!(dim.entries[1], (1, Some("Bruno".to_string())));
        assert_eq!(dim.entries[2], (2, None));
        assert_eq!(dim.row_ids, vec![0, 1, 0, 2]);
    }

    #[tokio::test]
    async fn test_gold_overwrites_all_ten_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LakePaths::new(dir.path());
        let rows = vec![
            silver_row(2023, Some("Ana"), Some("Globo"), Some("x")),
            silver_row(2024, Some("Bruno"), Some("Folha"), Some("y")),
            silver_row(2024, Some("Ana"), Some("Globo"), None),
        ];
        let batch = parquet::silver_rows_to_batch(&rows).unwrap();
        parquet::write_batch(&paths.silver_file(), &batch).unwrap();

        let report = gold(&paths).await.unwrap();
        assert_eq!(report.silver_rows, 3);
        assert_eq!(report.artifacts_written, 10);
        assert_eq!(report.distinct_authors, 2);
        assert_eq!(report.distinct_sources, 2);

        for stem in [
            AGG_BY_YEAR,
            AGG_BY_MONTH,
            AGG_BY_DAY,
            AGG_BY_YEAR_MONTH_DAY,
            AGG_BY_SOURCE,
            AGG_BY_AUTHOR,
            AGG_BY_SOURCE_AUTHOR,
            DIM_AUTHOR,
            DIM_SOURCE,
            FACT_ARTICLES,
        ] {
            assert!(paths.gold_file(stem).exists(), "missing {stem}");
        }

        // Year groups are sorted and count only rows with content.
        let batches = parquet::read_batches(&paths.gold_file(AGG_BY_YEAR)).unwrap();
        let batch = &batches[0];
        let years = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        let counts = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!((years.value(0), counts.value(0)), (2023, 1));
        assert_eq!((years.value(1), counts.value(1)), (2024, 1));
    }

    #[test]
    fn test_fact_batch_swaps_text_for_surrogates() {
        let rows = vec![
            silver_row(2024, Some("Ana"), Some("Globo"), Some("x")),
            silver_row(2024, Some("Bruno"), Some("Globo"), Some("y")),
        ];
        let authors = Dimension::build(rows.iter().map(|r| r.author.clone()));
        let sources = Dimension::build(rows.iter().map(|r| r.source_name.clone()));
        let batch = fact_batch(&rows, &authors, &sources).unwrap();

        // No raw text keys in the fact schema.
        assert!(batch.column_by_name(parquet::COL_AUTHOR).is_none());
        assert!(batch.column_by_name(parquet::COL_SOURCE_NAME).is_none());

        let author_ids = batch
            .column_by_name(COL_ID_AUTHORS)
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .unwrap();
        let source_ids = batch
            .column_by_name(parquet::COL_SOURCE_ID)
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .unwrap();
        assert_eq!(author_ids.values().to_vec(), vec![0, 1]);
        assert_eq!(source_ids.values().to_vec(), vec![0, 0]);
    }
}
