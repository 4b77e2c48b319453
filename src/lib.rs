//! A lazy reader of Apache Parquet files over asynchronous byte sources.
//!
//! Given a row range and a column subset, the planner ([`plan`]) selects the
//! intersecting row groups, the prefetch cache ([`prefetch`]) coalesces the
//! chunks' byte ranges into few reads, and the per-column pipeline
//! ([`read`]) walks page streams, decompresses and decodes them, and
//! reassembles nested records from their repetition and definition levels.
//!
//! The entry points live on [`read::ParquetFile`].
pub mod compression;
pub mod convert;
pub mod encoding;
pub mod error;
pub mod metadata;
pub mod page;
pub mod plan;
pub mod prefetch;
pub mod read;
pub mod schema;
pub mod source;
pub mod types;
pub mod value;

mod assemble;
mod decode;

pub use error::{Error, Result};
pub use read::{DataChunk, ParquetFile, ReadRequest, RowFormat};
