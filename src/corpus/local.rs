//! Local corpus files: JSON Lines and Parquet exports of a dataset.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use arrow::array::{Array, LargeStringArray, StringArray};
use async_trait::async_trait;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use super::types::{Task, TaskSelection, TaskSource};
use crate::error::CorpusError;

const TEXT_FIELD: &str = "text";

/// One JSON object per line, each with a `text` field. Blank lines are skipped.
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_texts(&self) -> Result<Vec<String>, CorpusError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut texts = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: serde_json::Value = serde_json::from_str(&line)?;
            let text = record
                .get(TEXT_FIELD)
                .and_then(|v| v.as_str())
                .ok_or_else(|| CorpusError::MissingField {
                    index: texts.len(),
                    field: TEXT_FIELD.to_string(),
                })?;
            texts.push(text.to_string());
        }

        Ok(texts)
    }
}

#[async_trait]
impl TaskSource for JsonlSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self, selection: &TaskSelection) -> Result<Vec<Task>, CorpusError> {
        let texts = self.read_texts()?;
        let tasks = selection.apply(texts);
        info!(source = %self.describe(), loaded = tasks.len(), "Loaded tasks");
        Ok(tasks)
    }
}

/// Parquet file with a string `text` column.
pub struct ParquetSource {
    path: PathBuf,
}

impl ParquetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_texts(&self) -> Result<Vec<String>, CorpusError> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .and_then(|builder| builder.build())
            .map_err(|e| CorpusError::Parquet(e.to_string()))?;

        let mut texts = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| CorpusError::Parquet(e.to_string()))?;
            let column = batch
                .column_by_name(TEXT_FIELD)
                .ok_or_else(|| CorpusError::MissingField {
                    index: texts.len(),
                    field: TEXT_FIELD.to_string(),
                })?;

            let base = texts.len();
            let mut push = |i: usize, null: bool, value: &str| -> Result<(), CorpusError> {
                if null {
                    return Err(CorpusError::MissingField {
                        index: base + i,
                        field: TEXT_FIELD.to_string(),
                    });
                }
                texts.push(value.to_string());
                Ok(())
            };

            if let Some(arr) = column.as_any().downcast_ref::<StringArray>() {
                for i in 0..arr.len() {
                    push(i, arr.is_null(i), arr.value(i))?;
                }
            } else if let Some(arr) = column.as_any().downcast_ref::<LargeStringArray>() {
                for i in 0..arr.len() {
                    push(i, arr.is_null(i), arr.value(i))?;
                }
            } else {
                return Err(CorpusError::Parquet(format!(
                    "column '{TEXT_FIELD}' has type {}, expected a string",
                    column.data_type()
                )));
            }
        }

        Ok(texts)
    }
}

#[async_trait]
impl TaskSource for ParquetSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self, selection: &TaskSelection) -> Result<Vec<Task>, CorpusError> {
        let texts = self.read_texts()?;
        let tasks = selection.apply(texts);
        info!(source = %self.describe(), loaded = tasks.len(), "Loaded tasks");
        Ok(tasks)
    }
}

/// Pick a local source by file extension.
pub fn open_local(path: &Path) -> Result<Box<dyn TaskSource>, CorpusError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jsonl") | Some("ndjson") => Ok(Box::new(JsonlSource::new(path))),
        Some("parquet") => Ok(Box::new(ParquetSource::new(path))),
        _ => Err(CorpusError::UnsupportedFormat(path.display().to_string())),
    }
}
