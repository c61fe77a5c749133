//! RecordBatch conversions and parquet I/O for the lake's tabular artifacts.
//!
//! Bronze keeps the upstream `source` object as a nested struct column, the
//! tabular equivalent of the raw JSON. Silver flattens it: the struct's
//! child arrays are projected wholesale when a bronze batch is decoded, so
//! the flattening never walks rows looking up fields.
//!
//! Column names stay camelCase where the wire format is camelCase
//! (`urlToImage`, `publishedAt`) so the columns line up with the raw
//! documents they came from.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, Int32Array, StringArray, StructArray};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Date32Type, Field, Fields, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{Result, StageError};
use crate::models::{Article, BronzeRow, SilverRow, SourceRef};

pub const COL_SOURCE: &str = "source";
pub const COL_AUTHOR: &str = "author";
pub const COL_TITLE: &str = "title";
pub const COL_DESCRIPTION: &str = "description";
pub const COL_URL: &str = "url";
pub const COL_URL_TO_IMAGE: &str = "urlToImage";
pub const COL_PUBLISHED_AT: &str = "publishedAt";
pub const COL_CONTENT: &str = "content";
pub const COL_LOAD_DATE: &str = "load_date";
pub const COL_YEAR: &str = "year";
pub const COL_MONTH: &str = "month";
pub const COL_DAY: &str = "day";
pub const COL_SOURCE_ID: &str = "source_id";
pub const COL_SOURCE_NAME: &str = "source_name";

fn source_fields() -> Fields {
    Fields::from(vec![
        Field::new("id", DataType::Utf8, true),
        Field::new("name", DataType::Utf8, true),
    ])
}

/// Schema of a bronze snapshot. `publishedAt` stays a raw string here;
/// parsing it is silver's job.
pub fn bronze_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(COL_SOURCE, DataType::Struct(source_fields()), true),
        Field::new(COL_AUTHOR, DataType::Utf8, true),
        Field::new(COL_TITLE, DataType::Utf8, true),
        Field::new(COL_DESCRIPTION, DataType::Utf8, true),
        Field::new(COL_URL, DataType::Utf8, true),
        Field::new(COL_URL_TO_IMAGE, DataType::Utf8, true),
        Field::new(COL_PUBLISHED_AT, DataType::Utf8, true),
        Field::new(COL_CONTENT, DataType::Utf8, true),
        Field::new(COL_LOAD_DATE, DataType::Date32, false),
    ]))
}

/// Schema of the silver dataset.
pub fn silver_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(COL_AUTHOR, DataType::Utf8, true),
        Field::new(COL_TITLE, DataType::Utf8, true),
        Field::new(COL_DESCRIPTION, DataType::Utf8, true),
        Field::new(COL_URL, DataType::Utf8, true),
        Field::new(COL_URL_TO_IMAGE, DataType::Utf8, true),
        Field::new(COL_PUBLISHED_AT, DataType::Date32, false),
        Field::new(COL_CONTENT, DataType::Utf8, true),
        Field::new(COL_LOAD_DATE, DataType::Date32, false),
        Field::new(COL_YEAR, DataType::Int32, false),
        Field::new(COL_MONTH, DataType::Int32, false),
        Field::new(COL_DAY, DataType::Int32, false),
        Field::new(COL_SOURCE_ID, DataType::Utf8, true),
        Field::new(COL_SOURCE_NAME, DataType::Utf8, true),
    ]))
}

/// Write one batch to `path`, creating parent directories as needed.
/// An existing file is overwritten.
pub fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Read every batch from the parquet file at `path`.
pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Encode bronze rows into a batch matching [`bronze_schema`].
pub fn bronze_rows_to_batch(rows: &[BronzeRow]) -> Result<RecordBatch> {
    let source_ids = rows
        .iter()
        .map(|r| r.article.source.as_ref().and_then(|s| s.id.clone()))
        .collect::<StringArray>();
    let source_names = rows
        .iter()
        .map(|r| r.article.source.as_ref().and_then(|s| s.name.clone()))
        .collect::<StringArray>();
    let source_validity =
        NullBuffer::from(rows.iter().map(|r| r.article.source.is_some()).collect::<Vec<_>>());
    let source = StructArray::try_new(
        source_fields(),
        vec![
            Arc::new(source_ids) as ArrayRef,
            Arc::new(source_names) as ArrayRef,
        ],
        Some(source_validity),
    )?;

    let authors = rows
        .iter()
        .map(|r| r.article.author.clone())
        .collect::<StringArray>();
    let titles = rows
        .iter()
        .map(|r| r.article.title.clone())
        .collect::<StringArray>();
    let descriptions = rows
        .iter()
        .map(|r| r.article.description.clone())
        .collect::<StringArray>();
    let urls = rows
        .iter()
        .map(|r| r.article.url.clone())
        .collect::<StringArray>();
    let images = rows
        .iter()
        .map(|r| r.article.urlToImage.clone())
        .collect::<StringArray>();
    let published = rows
        .iter()
        .map(|r| r.article.publishedAt.clone())
        .collect::<StringArray>();
    let contents = rows
        .iter()
        .map(|r| r.article.content.clone())
        .collect::<StringArray>();
    let load_dates = Date32Array::from(
        rows.iter()
            .map(|r| Date32Type::from_naive_date(r.load_date))
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        bronze_schema(),
        vec![
            Arc::new(source) as ArrayRef,
            Arc::new(authors),
            Arc::new(titles),
            Arc::new(descriptions),
            Arc::new(urls),
            Arc::new(images),
            Arc::new(published),
            Arc::new(contents),
            Arc::new(load_dates),
        ],
    )?;
    Ok(batch)
}

/// Decode a bronze batch back into rows.
///
/// The `source` struct is decoded through its child arrays (`id`, `name`),
/// projected once for the whole batch.
pub fn batch_to_bronze_rows(batch: &RecordBatch) -> Result<Vec<BronzeRow>> {
    let source = typed_column::<StructArray>(batch, COL_SOURCE, "Struct")?;
    let source_ids = struct_string_child(source, "id")?;
    let source_names = struct_string_child(source, "name")?;
    let authors = typed_column::<StringArray>(batch, COL_AUTHOR, "Utf8")?;
    let titles = typed_column::<StringArray>(batch, COL_TITLE, "Utf8")?;
    let descriptions = typed_column::<StringArray>(batch, COL_DESCRIPTION, "Utf8")?;
    let urls = typed_column::<StringArray>(batch, COL_URL, "Utf8")?;
    let images = typed_column::<StringArray>(batch, COL_URL_TO_IMAGE, "Utf8")?;
    let published = typed_column::<StringArray>(batch, COL_PUBLISHED_AT, "Utf8")?;
    let contents = typed_column::<StringArray>(batch, COL_CONTENT, "Utf8")?;
    let load_dates = typed_column::<Date32Array>(batch, COL_LOAD_DATE, "Date32")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let source = if source.is_null(i) {
            None
        } else {
            Some(SourceRef {
                id: opt_string(source_ids, i),
                name: opt_string(source_names, i),
            })
        };
        rows.push(BronzeRow {
            article: Article {
                source,
                author: opt_string(authors, i),
                title: opt_string(titles, i),
                description: opt_string(descriptions, i),
                url: opt_string(urls, i),
                urlToImage: opt_string(images, i),
                publishedAt: opt_string(published, i),
                content: opt_string(contents, i),
            },
            load_date: Date32Type::to_naive_date(load_dates.value(i)),
        });
    }
    Ok(rows)
}

/// Encode silver rows into a batch matching [`silver_schema`].
pub fn silver_rows_to_batch(rows: &[SilverRow]) -> Result<RecordBatch> {
    let authors = rows.iter().map(|r| r.author.clone()).collect::<StringArray>();
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
    let source_ids = rows
        .iter()
        .map(|r| r.source_id.clone())
        .collect::<StringArray>();
    let source_names = rows
        .iter()
        .map(|r| r.source_name.clone())
        .collect::<StringArray>();

    let batch = RecordBatch::try_new(
        silver_schema(),
        vec![
            Arc::new(authors) as ArrayRef,
            Arc::new(titles),
            Arc::new(descriptions),
            Arc::new(urls),
            Arc::new(images),
            Arc::new(published),
            Arc::new(contents),
            Arc::new(load_dates),
            Arc::new(years),
            Arc::new(months),
            Arc::new(days),
            Arc::new(source_ids),
            Arc::new(source_names),
        ],
    )?;
    Ok(batch)
}

/// Decode a silver batch back into rows.
pub fn batch_to_silver_rows(batch: &RecordBatch) -> Result<Vec<SilverRow>> {
    let authors = typed_column::<StringArray>(batch, COL_AUTHOR, "Utf8")?;
    let titles = typed_column::<StringArray>(batch, COL_TITLE, "Utf8")?;
    let descriptions = typed_column::<StringArray>(batch, COL_DESCRIPTION, "Utf8")?;
    let urls = typed_column::<StringArray>(batch, COL_URL, "Utf8")?;
    let images = typed_column::<StringArray>(batch, COL_URL_TO_IMAGE, "Utf8")?;
    let published = typed_column::<Date32Array>(batch, COL_PUBLISHED_AT, "Date32")?;
    let contents = typed_column::<StringArray>(batch, COL_CONTENT, "Utf8")?;
    let load_dates = typed_column::<Date32Array>(batch, COL_LOAD_DATE, "Date32")?;
    let years = typed_column::<Int32Array>(batch, COL_YEAR, "Int32")?;
    let months = typed_column::<Int32Array>(batch, COL_MONTH, "Int32")?;
    let days = typed_column::<Int32Array>(batch, COL_DAY, "Int32")?;
    let source_ids = typed_column::<StringArray>(batch, COL_SOURCE_ID, "Utf8")?;
    let source_names = typed_column::<StringArray>(batch, COL_SOURCE_NAME, "Utf8")?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        rows.push(SilverRow {
            author: opt_string(authors, i),
            title: opt_string(titles, i),
            description: opt_string(descriptions, i),
            url: opt_string(urls, i),
            url_to_image: opt_string(images, i),
            published_at: Date32Type::to_naive_date(published.value(i)),
            content: opt_string(contents, i),
            load_date: Date32Type::to_naive_date(load_dates.value(i)),
            year: years.value(i),
            month: months.value(i),
            day: days.value(i),
            source_id: opt_string(source_ids, i),
            source_name: opt_string(source_names, i),
        });
    }
    Ok(rows)
}

fn typed_column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
    expected: &'static str,
) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<T>())
        .ok_or_else(|| StageError::Column {
            name: name.to_string(),
            expected,
        })
}

fn struct_string_child<'a>(array: &'a StructArray, name: &str) -> Result<&'a StringArray> {
    array
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StageError::Column {
            name: format!("{COL_SOURCE}.{name}"),
            expected: "Utf8",
        })
}

fn opt_string(column: &StringArray, row: usize) -> Option<String> {
    if column.is_null(row) {
        None
    } else {
        Some(column.value(row).to_string())
    }
}
