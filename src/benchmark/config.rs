//! Benchmark configurations and YAML suites.
//!
//! A [`Configuration`] is an immutable value naming one model plus one way of
//! choosing the system prompt. A [`BenchmarkSuite`] bundles several of them
//! with the task window they run against.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::corpus::TaskSelection;
use crate::error::BenchmarkError;
use crate::routing::PromptVariant;
use crate::runner::DEFAULT_ARTIFACT_NAME;

/// How a configuration picks the system prompt for each task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PromptStrategy {
    /// One built-in prompt for every task.
    Fixed { variant: PromptVariant },
    /// Caller-supplied prompt text for every task.
    Custom { text: String },
    /// Per-task prompt chosen by the routing classifier.
    Routed,
}

/// One model/prompt combination under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Report key. Must be unique within a run.
    pub name: String,
    pub model: String,
    pub prompt: PromptStrategy,
}

impl Configuration {
    pub fn fixed(name: impl Into<String>, model: impl Into<String>, variant: PromptVariant) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            prompt: PromptStrategy::Fixed { variant },
        }
    }

    pub fn custom(
        name: impl Into<String>,
        model: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            prompt: PromptStrategy::Custom { text: text.into() },
        }
    }

    pub fn routed(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            prompt: PromptStrategy::Routed,
        }
    }

    /// Prompt text shared by every task, or `None` when routed.
    pub fn system_prompt(&self) -> Option<&str> {
        match &self.prompt {
            PromptStrategy::Fixed { variant } => Some(variant.text()),
            PromptStrategy::Custom { text } => Some(text),
            PromptStrategy::Routed => None,
        }
    }

    /// Character count of the fixed prompt.
    pub fn prompt_length(&self) -> Option<usize> {
        self.system_prompt().map(|p| p.chars().count())
    }

    pub fn is_routed(&self) -> bool {
        matches!(self.prompt, PromptStrategy::Routed)
    }

    /// Reject prompts that give the model no artifact name to rewrite.
    ///
    /// Success is judged by the per-run deck file, which only exists in the
    /// prompt when the text mentions [`DEFAULT_ARTIFACT_NAME`].
    pub fn validate(&self) -> Result<(), BenchmarkError> {
        match self.system_prompt() {
            Some(text) if !text.contains(DEFAULT_ARTIFACT_NAME) => {
                Err(BenchmarkError::PromptWithoutArtifact {
                    name: self.name.clone(),
                    artifact: DEFAULT_ARTIFACT_NAME.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Routing inputs for suites with routed configurations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSettings {
    pub classifier: PathBuf,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

/// A named set of configurations run against one task window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub name: String,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub selection: TaskSelection,
    pub configurations: Vec<Configuration>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub routing: Option<RoutingSettings>,
}

impl BenchmarkSuite {
    pub fn from_yaml_file(path: &Path) -> Result<Self, BenchmarkError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, BenchmarkError> {
        let suite: BenchmarkSuite = serde_yaml::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Structural checks that do not need any backend.
    pub fn validate(&self) -> Result<(), BenchmarkError> {
        if self.configurations.is_empty() {
            return Err(BenchmarkError::InvalidSuite(format!(
                "suite '{}' has no configurations",
                self.name
            )));
        }
        if self.concurrency == Some(0) {
            return Err(BenchmarkError::InvalidConcurrency);
        }

        let mut seen = HashSet::new();
        for config in &self.configurations {
            if !seen.insert(config.name.as_str()) {
                return Err(BenchmarkError::DuplicateConfiguration(config.name.clone()));
            }
            if config.is_routed() && self.routing.is_none() {
                return Err(BenchmarkError::RouterMissing(config.name.clone()));
            }
            config.validate()?;
        }
        Ok(())
    }

    pub fn has_routed(&self) -> bool {
        self.configurations.iter().any(Configuration::is_routed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
name: nightly
dataset: mikeoxmaul/opengamma-prs-dedup
selection:
  skip: 100
  take: 20
concurrency: 4
routing:
  classifier: classifier_tensors.json
configurations:
  - name: original
    model: ibm-granite/granite-4.0-h-micro
    prompt:
      mode: fixed
      variant: original
  - name: short
    model: openai/gpt-oss-20b:free
    prompt:
      mode: custom
      text: "Write python-pptx code that saves test.pptx"
  - name: routed
    model: ibm-granite/granite-4.0-h-micro
    prompt:
      mode: routed
"#;

    #[test]
    fn test_parse_suite() {
        let suite = BenchmarkSuite::from_yaml_str(SUITE).expect("parse");
        assert_eq!(suite.name, "nightly");
        assert_eq!(suite.selection, TaskSelection::window(100, 20));
        assert_eq!(suite.concurrency, Some(4));
        assert_eq!(suite.configurations.len(), 3);
        assert_eq!(
            suite.configurations[0].prompt,
            PromptStrategy::Fixed {
                variant: PromptVariant::Original
            }
        );
        assert!(suite.configurations[2].is_routed());
        assert!(suite.has_routed());
        assert_eq!(
            suite.routing.as_ref().map(|r| r.classifier.clone()),
            Some(PathBuf::from("classifier_tensors.json"))
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let yaml = r#"
name: dup
configurations:
  - {name: a, model: m, prompt: {mode: fixed, variant: basic}}
  - {name: a, model: n, prompt: {mode: fixed, variant: minimal}}
"#;
        assert!(matches!(
            BenchmarkSuite::from_yaml_str(yaml),
            Err(BenchmarkError::DuplicateConfiguration(name)) if name == "a"
        ));
    }

    #[test]
    fn test_routed_without_classifier_rejected() {
        let yaml = r#"
name: r
configurations:
  - {name: routed, model: m, prompt: {mode: routed}}
"#;
        assert!(matches!(
            BenchmarkSuite::from_yaml_str(yaml),
            Err(BenchmarkError::RouterMissing(_))
        ));
    }

    #[test]
    fn test_empty_suite_rejected() {
        assert!(matches!(
            BenchmarkSuite::from_yaml_str("name: empty\nconfigurations: []"),
            Err(BenchmarkError::InvalidSuite(_))
        ));
    }

    #[test]
    fn test_custom_prompt_must_name_artifact() {
        let yaml = r#"
name: other-file
configurations:
  - name: deck
    model: m
    prompt:
      mode: custom
      text: "Write python-pptx code and save it as deck.pptx"
"#;
        assert!(matches!(
            BenchmarkSuite::from_yaml_str(yaml),
            Err(BenchmarkError::PromptWithoutArtifact { name, .. }) if name == "deck"
        ));

        assert!(Configuration::custom("c", "m", "no file named").validate().is_err());
        assert!(Configuration::custom("c", "m", "prs.save('test.pptx')")
            .validate()
            .is_ok());
        assert!(Configuration::routed("r", "m").validate().is_ok());
        for variant in PromptVariant::ALL {
            assert!(Configuration::fixed("f", "m", variant).validate().is_ok());
        }
    }

    #[test]
    fn test_prompt_length_counts_chars() {
        let config = Configuration::custom("c", "m", "héllo");
        assert_eq!(config.prompt_length(), Some(5));
        assert_eq!(Configuration::routed("r", "m").prompt_length(), None);

        let fixed = Configuration::fixed("f", "m", PromptVariant::Minimal);
        assert_eq!(fixed.system_prompt(), Some(PromptVariant::Minimal.text()));
    }
}
