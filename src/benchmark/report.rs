//! Run reports and their on-disk sink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::aggregate::ConfigurationResult;
use crate::error::ReportError;

/// Terminal artifact of a run: one aggregate per configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub configurations: BTreeMap<String, ConfigurationResult>,
}

impl Report {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            configurations: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, result: ConfigurationResult) {
        self.configurations.insert(name.into(), result);
    }

    pub fn get(&self, name: &str) -> Option<&ConfigurationResult> {
        self.configurations.get(name)
    }

    /// Configuration names in key order.
    pub fn names(&self) -> Vec<&str> {
        self.configurations.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

/// Writes reports as pretty JSON under a results directory.
#[derive(Debug, Clone)]
pub struct ReportSink {
    dir: PathBuf,
    prefix: String,
}

impl ReportSink {
    /// `prefix` starts default filenames, e.g. `benchmark_results`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<prefix>_<YYYYmmdd_HHMMSS>.json` in local time.
    pub fn default_filename(&self) -> String {
        format!("{}_{}.json", self.prefix, Local::now().format("%Y%m%d_%H%M%S"))
    }

    /// Serialize `report` to `filename` (or a timestamped default) and return its path.
    ///
    /// Writing the same filename twice replaces the earlier file.
    pub fn save(&self, report: &Report, filename: Option<&str>) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(&self.dir)?;

        let name = filename
            .map(str::to_string)
            .unwrap_or_else(|| self.default_filename());
        let path = self.dir.join(name);

        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!(path = %path.display(), configurations = report.configurations.len(), "Report saved");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Report, ReportError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{TaskOutcome, TaskResult, TokenUsage};
    use tempfile::TempDir;

    fn sample_report(successes: usize) -> Report {
        let mut result = ConfigurationResult::new();
        for i in 0..3 {
            let outcome = if i < successes {
                TaskOutcome::Success
            } else {
                TaskOutcome::GenerationFailed
            };
            result.record(&TaskResult::new(i, outcome, 1.0, TokenUsage::new(1, 1, 2)));
        }
        let mut report = Report::new(Utc::now());
        report.insert("openai/gpt-oss-20b:free", result.finalize());
        report
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = TempDir::new().expect("tempdir");
        let sink = ReportSink::new(dir.path().join("results/model_benchmark"), "benchmark_results");

        let path = sink.save(&sample_report(2), None).expect("save");
        assert!(path.exists());
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("benchmark_results_"));
        assert!(name.ends_with(".json"));
        // benchmark_results_YYYYmmdd_HHMMSS.json
        assert_eq!(name.len(), "benchmark_results_".len() + 15 + ".json".len());
    }

    #[test]
    fn test_save_twice_overwrites() {
        let dir = TempDir::new().expect("tempdir");
        let sink = ReportSink::new(dir.path(), "r");

        sink.save(&sample_report(3), Some("fixed.json")).expect("first");
        let second = sample_report(1);
        let path = sink.save(&second, Some("fixed.json")).expect("second");

        let loaded = ReportSink::load(&path).expect("load");
        assert_eq!(loaded, second);
        assert_eq!(
            loaded.get("openai/gpt-oss-20b:free").map(|r| r.success_count),
            Some(1)
        );
    }

    #[test]
    fn test_saved_fields() {
        let dir = TempDir::new().expect("tempdir");
        let path = ReportSink::new(dir.path(), "r")
            .save(&sample_report(2), Some("out.json"))
            .expect("save");

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains('\n'), "pretty printed");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
        let entry = &json["configurations"]["openai/gpt-oss-20b:free"];
        for field in [
            "success_rate",
            "success_count",
            "total_tasks",
            "avg_time",
            "total_time",
            "token_usage",
            "errors",
            "successful_indices",
        ] {
            assert!(entry.get(field).is_some(), "missing {field}");
        }
        assert_eq!(entry["successful_indices"], serde_json::json!([0, 1]));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ReportSink::load(Path::new("/nonexistent/report.json")),
            Err(ReportError::Io(_))
        ));
    }
}
