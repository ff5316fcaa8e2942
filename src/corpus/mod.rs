//! Task corpus loading.
//!
//! A corpus is an ordered collection of records with a `text` field. Tasks
//! come from the HuggingFace rows API or from a local JSONL/Parquet export.

pub mod huggingface;
pub mod local;
pub mod types;

pub use huggingface::{HuggingFaceRowsSource, RowsApiConfig, DEFAULT_SPLIT, HUGGINGFACE_ROWS_API};
pub use local::{open_local, JsonlSource, ParquetSource};
pub use types::{Task, TaskSelection, TaskSource};
