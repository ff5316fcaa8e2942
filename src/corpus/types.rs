//! Task records and the source abstraction they are loaded through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CorpusError;

/// One natural-language instruction. Identity is its position in the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub index: usize,
    pub text: String,
}

impl Task {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// First `max_chars` characters, for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

/// "Skip N then take M" window over an ordered corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSelection {
    #[serde(default)]
    pub skip: usize,
    /// `None` takes everything after `skip`.
    #[serde(default)]
    pub take: Option<usize>,
}

impl TaskSelection {
    pub fn first(n: usize) -> Self {
        Self {
            skip: 0,
            take: Some(n),
        }
    }

    pub fn window(skip: usize, take: usize) -> Self {
        Self {
            skip,
            take: Some(take),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    /// Apply the window to already-loaded texts, numbering from zero.
    pub fn apply<I>(&self, texts: I) -> Vec<Task>
    where
        I: IntoIterator<Item = String>,
    {
        texts
            .into_iter()
            .skip(self.skip)
            .take(self.take.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(index, text)| Task::new(index, text))
            .collect()
    }
}

/// An ordered collection of records exposing a `text` field.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    /// Load the selected window. Task indices are relative to the window.
    async fn load(&self, selection: &TaskSelection) -> Result<Vec<Task>, CorpusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("task {i}")).collect()
    }

    #[test]
    fn test_first_n() {
        let tasks = TaskSelection::first(3).apply(texts(10));
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[2], Task::new(2, "task 2"));
    }

    #[test]
    fn test_window_indices_are_relative() {
        let tasks = TaskSelection::window(4, 2).apply(texts(10));
        assert_eq!(tasks, vec![Task::new(0, "task 4"), Task::new(1, "task 5")]);
    }

    #[test]
    fn test_window_past_end_is_empty() {
        assert!(TaskSelection::window(20, 5).apply(texts(10)).is_empty());
    }

    #[test]
    fn test_all() {
        assert_eq!(TaskSelection::all().apply(texts(7)).len(), 7);
    }

    #[test]
    fn test_preview() {
        let task = Task::new(0, "Create a deck about penguins");
        assert_eq!(task.preview(8), "Create a...");
        assert_eq!(task.preview(100), "Create a deck about penguins");
    }

    #[test]
    fn test_selection_yaml() {
        let selection: TaskSelection = serde_yaml::from_str("skip: 100\ntake: 100").expect("parse");
        assert_eq!(selection, TaskSelection::window(100, 100));
        let open: TaskSelection = serde_yaml::from_str("skip: 5").expect("parse");
        assert_eq!(open.take, None);
    }
}
