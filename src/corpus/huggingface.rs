//! HuggingFace datasets-server source.
//!
//! Pages through the public rows API, which serves at most 100 rows per
//! request, so large windows such as "skip 100, take 100" map onto a handful
//! of offset/length calls without downloading the full dataset.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{Task, TaskSelection, TaskSource};
use crate::error::CorpusError;

/// Base URL for HuggingFace datasets server rows API.
pub const HUGGINGFACE_ROWS_API: &str = "https://datasets-server.huggingface.co/rows";

/// Default split to read.
pub const DEFAULT_SPLIT: &str = "train";

/// Record field holding the instruction text.
const TEXT_FIELD: &str = "text";

/// Paging and retry settings for the rows API.
#[derive(Debug, Clone)]
pub struct RowsApiConfig {
    /// Delay between page requests in milliseconds.
    pub rate_limit_delay_ms: u64,
    /// Maximum rows per request (the server caps this at 100).
    pub max_page_size: usize,
    /// Attempts per page when rate limited.
    pub max_retries: u32,
}

impl Default for RowsApiConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_ms: 100,
            max_page_size: 100,
            max_retries: 3,
        }
    }
}

/// Task source backed by a HuggingFace dataset.
pub struct HuggingFaceRowsSource {
    http_client: Client,
    dataset: String,
    split: String,
    base_url: String,
    config: RowsApiConfig,
}

impl HuggingFaceRowsSource {
    pub fn new(dataset: impl Into<String>, split: impl Into<String>) -> Result<Self, CorpusError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CorpusError::HttpError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            dataset: dataset.into(),
            split: split.into(),
            base_url: HUGGINGFACE_ROWS_API.to_string(),
            config: RowsApiConfig::default(),
        })
    }

    /// Point at a different rows endpoint (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_config(mut self, config: RowsApiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn split(&self) -> &str {
        &self.split
    }

    /// Full URL of one rows page.
    pub fn page_url(&self, offset: usize, length: usize) -> String {
        format!(
            "{}?dataset={}&config=default&split={}&offset={}&length={}",
            self.base_url,
            urlencoding::encode(&self.dataset),
            urlencoding::encode(&self.split),
            offset,
            length
        )
    }

    /// Fetch one page, retrying when rate limited.
    async fn fetch_page(&self, offset: usize, length: usize) -> Result<RowsResponse, CorpusError> {
        let url = self.page_url(offset, length);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.fetch_page_once(&url).await {
                Err(CorpusError::RateLimited { retry_after }) if attempt < self.config.max_retries => {
                    let wait = retry_after.unwrap_or(1 << attempt);
                    warn!(offset, attempt, wait_secs = wait, "Rows API rate limited, backing off");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                other => return other,
            }
        }
    }

    async fn fetch_page_once(&self, url: &str) -> Result<RowsResponse, CorpusError> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CorpusError::HttpError(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(CorpusError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CorpusError::HttpError(format!(
                "API returned status {status}: {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CorpusError::ParseError(format!("Failed to parse rows response: {e}")))
    }
}

#[async_trait]
impl TaskSource for HuggingFaceRowsSource {
    fn describe(&self) -> String {
        format!("hf://{}/{}", self.dataset, self.split)
    }

    async fn load(&self, selection: &TaskSelection) -> Result<Vec<Task>, CorpusError> {
        let wanted = selection.take.unwrap_or(usize::MAX);
        let mut tasks = Vec::new();
        let mut offset = selection.skip;

        while tasks.len() < wanted {
            let length = (wanted - tasks.len()).min(self.config.max_page_size);
            let page = self.fetch_page(offset, length).await?;
            let fetched = page.rows.len();
            debug!(offset, fetched, "Fetched rows page");

            for row in page.rows {
                let text = extract_text(&row.row).ok_or_else(|| CorpusError::MissingField {
                    index: row.row_idx.unwrap_or(offset),
                    field: TEXT_FIELD.to_string(),
                })?;
                tasks.push(Task::new(tasks.len(), text));
            }

            offset += fetched;
            let exhausted = page.num_rows_total.is_some_and(|total| offset >= total);
            if fetched == 0 || exhausted {
                break;
            }

            if self.config.rate_limit_delay_ms > 0 && tasks.len() < wanted {
                tokio::time::sleep(Duration::from_millis(self.config.rate_limit_delay_ms)).await;
            }
        }

        info!(source = %self.describe(), skip = selection.skip, loaded = tasks.len(), "Loaded tasks");
        Ok(tasks)
    }
}

fn extract_text(row: &serde_json::Value) -> Option<String> {
    row.get(TEXT_FIELD)?.as_str().map(str::to_string)
}

/// Response structure from HuggingFace rows API.
#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<RowEnvelope>,
    num_rows_total: Option<usize>,
}

/// A single row from the HuggingFace dataset.
#[derive(Debug, Deserialize)]
struct RowEnvelope {
    row_idx: Option<usize>,
    row: serde_json::Value,
}
