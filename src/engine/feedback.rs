//! Feedback capture.
//!
//! Every rated exchange is appended to a JSONL log. `good` entries can
//! later be harvested as extra training examples; `bad` entries are kept
//! for offline inspection and `neutral` ones only for counting.

use crate::engine::classifier::TrainingExample;
use crate::engine::intent::Intent;
use crate::errors::QuipError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Bad,
    Neutral,
}

impl Quality {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "good" => Some(Self::Good),
            "bad" => Some(Self::Bad),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Bad => write!(f, "bad"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    /// Stable id so an entry can be referenced after the fact.
    #[serde(default = "new_entry_id")]
    pub id: String,
    pub user_id: String,
    pub user_input: String,
    pub response: String,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    pub timestamp: String,
}

fn new_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub good: usize,
    pub bad: usize,
    pub neutral: usize,
}

/// Append-only JSONL store for rated exchanges.
pub struct FeedbackStore {
    path: PathBuf,
}

impl FeedbackStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &FeedbackEntry) -> Result<(), QuipError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating feedback dir {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(entry)
            .context("serializing feedback entry")?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening feedback log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("appending feedback entry")?;
        debug!(quality = %entry.quality, "recorded feedback");
        Ok(())
    }

    /// Read the whole log, skipping lines that no longer parse.
    pub async fn load(&self) -> Result<Vec<FeedbackEntry>, QuipError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(QuipError::Internal(anyhow::Error::new(e).context(format!(
                    "reading feedback log {}",
                    self.path.display()
                ))));
            }
        };
        let mut entries = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedbackEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("skipping malformed feedback line {}: {}", index + 1, e),
            }
        }
        Ok(entries)
    }

    pub async fn stats(&self) -> Result<FeedbackStats, QuipError> {
        let entries = self.load().await?;
        let mut stats = FeedbackStats {
            total: entries.len(),
            ..FeedbackStats::default()
        };
        for entry in &entries {
            match entry.quality {
                Quality::Good => stats.good += 1,
                Quality::Bad => stats.bad += 1,
                Quality::Neutral => stats.neutral += 1,
            }
        }
        Ok(stats)
    }

    /// Harvest `good` exchanges with a known intent as extra training
    /// examples. `neutral` and `bad` entries are never harvested.
    pub async fn harvest_training_examples(&self) -> Result<Vec<TrainingExample>, QuipError> {
        let entries = self.load().await?;
        let examples = entries
            .into_iter()
            .filter(|entry| entry.quality == Quality::Good)
            .filter_map(|entry| {
                entry.intent.filter(|i| *i != Intent::Unknown).map(|intent| {
                    TrainingExample {
                        text: entry.user_input,
                        intent: intent.label().to_string(),
                    }
                })
            })
            .collect();
        Ok(examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(input: &str, quality: Quality, intent: Option<Intent>) -> FeedbackEntry {
        FeedbackEntry {
            id: new_entry_id(),
            user_id: "tester".to_string(),
            user_input: input.to_string(),
            response: "ok".to_string(),
            quality,
            intent,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_append_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::new(dir.path().join("feedback.jsonl"));

        store
            .append(&entry("hello", Quality::Good, Some(Intent::Greeting)))
            .await
            .unwrap();
        store
            .append(&entry("blargh", Quality::Bad, None))
            .await
            .unwrap();

        let entries = store.load().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_input, "hello");
        assert_eq!(entries[0].quality, Quality::Good);
        assert_eq!(entries[1].quality, Quality::Bad);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::new(dir.path().join("absent.jsonl"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feedback.jsonl");
        let store = FeedbackStore::new(path.clone());
        store
            .append(&entry("hi", Quality::Neutral, None))
            .await
            .unwrap();
        tokio::fs::write(
            &path,
            format!(
                "{}not json\n",
                tokio::fs::read_to_string(&path).await.unwrap()
            ),
        )
        .await
        .unwrap();

        let entries = store.load().await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_harvest_only_good_with_intent() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::new(dir.path().join("feedback.jsonl"));
        store
            .append(&entry("hello there", Quality::Good, Some(Intent::Greeting)))
            .await
            .unwrap();
        store
            .append(&entry("bye", Quality::Neutral, Some(Intent::Farewell)))
            .await
            .unwrap();
        store
            .append(&entry("bad one", Quality::Bad, Some(Intent::Help)))
            .await
            .unwrap();
        store
            .append(&entry("no intent", Quality::Good, None))
            .await
            .unwrap();
        store
            .append(&entry("mystery", Quality::Good, Some(Intent::Unknown)))
            .await
            .unwrap();

        let examples = store.harvest_training_examples().await.unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].text, "hello there");
        assert_eq!(examples[0].intent, "greeting");
    }

    #[tokio::test]
    async fn test_stats_counts_by_quality() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::new(dir.path().join("feedback.jsonl"));
        store
            .append(&entry("a", Quality::Good, None))
            .await
            .unwrap();
        store
            .append(&entry("b", Quality::Good, None))
            .await
            .unwrap();
        store.append(&entry("c", Quality::Bad, None)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.good, 2);
        assert_eq!(stats.bad, 1);
        assert_eq!(stats.neutral, 0);
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!(Quality::parse("good"), Some(Quality::Good));
        assert_eq!(Quality::parse("BAD"), Some(Quality::Bad));
        assert_eq!(Quality::parse("Neutral"), Some(Quality::Neutral));
        assert_eq!(Quality::parse("great"), None);
    }
}
