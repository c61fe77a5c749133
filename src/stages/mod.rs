//! The four pipeline stages, one module per lake area.
//!
//! Each stage is a batch job: it reads the previous stage's durable output
//! and produces its own, then returns a small report for the driver's logs.
//! Stages share no state beyond the files on disk.
//!
//! # Stages
//!
//! | Stage | Module | Reads | Writes |
//! |-------|--------|-------|--------|
//! | Landing | [`landing`] | search API | `raw/*.json` |
//! | Bronze | [`bronze`] | `raw/*.json` | `bronze/{date}.parquet` |
//! | Silver | [`silver`] | latest bronze + prior silver | `silver/silver.parquet` |
//! | Gold | [`gold`] | `silver/silver.parquet` | ten `gold/*.parquet` artifacts |
//!
//! # Failure Policy
//!
//! Landing absorbs its failures into [`landing::LandingOutcome`]: a failed
//! fetch must not abort a scheduled run. Bronze, silver, and gold have no
//! such shield; their errors propagate to the driver untouched.

pub mod bronze;
pub mod gold;
pub mod landing;
pub mod silver;
