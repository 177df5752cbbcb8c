use crate::errors::QuipError;
use crate::utils::{atomic_write, ensure_dir, safe_filename};
use anyhow::Context;
use chrono::Utc;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const CACHE_CAPACITY: usize = 256;

/// One side of a remembered exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTurn {
    pub speaker: String,
    pub text: String,
    pub timestamp: String,
}

/// Everything the bot knows about one user. Persisted as a single JSON
/// file per user; unknown keys land in `extra` so arbitrary values
/// survive a round trip.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    pub name: Option<String>,
    pub bot_name: Option<String>,
    pub favorites: BTreeMap<String, String>,
    pub extra: BTreeMap<String, String>,
    pub history: Vec<HistoryTurn>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRecord {
    fn fresh() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            created_at: now.clone(),
            updated_at: now,
            ..Self::default()
        }
    }

    /// Route a generic key read through the typed fields.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "name" => self.name.clone(),
            "bot_name" => self.bot_name.clone(),
            _ => {
                if let Some(category) = key.strip_prefix("favorite_") {
                    self.favorites.get(category).cloned()
                } else {
                    self.extra.get(key).cloned()
                }
            }
        }
    }

    /// Route a generic key write; last write wins.
    pub fn set(&mut self, key: &str, value: String) {
        match key {
            "name" => self.name = Some(value),
            "bot_name" => self.bot_name = Some(value),
            _ => {
                if let Some(category) = key.strip_prefix("favorite_") {
                    self.favorites.insert(category.to_string(), value);
                } else {
                    self.extra.insert(key.to_string(), value);
                }
            }
        }
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// Per-user persistent memory. Each user gets an isolated JSON file under
/// the users directory; a shared LRU cache fronts the disk and a mutex
/// serializes writers.
pub struct MemoryStore {
    dir: PathBuf,
    history_turns: usize,
    cache: Mutex<LruCache<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new(dir: PathBuf, history_turns: usize) -> Result<Self, QuipError> {
        ensure_dir(&dir).map_err(|e| QuipError::Memory {
            message: format!("cannot create users dir {}: {e:#}", dir.display()),
        })?;
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            dir,
            history_turns,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn user_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_filename(user_id)))
    }

    fn read_record(path: &Path) -> UserRecord {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("corrupt user record {}, starting fresh: {}", path.display(), e);
                    UserRecord::fresh()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => UserRecord::fresh(),
            Err(e) => {
                warn!("unreadable user record {}: {}", path.display(), e);
                UserRecord::fresh()
            }
        }
    }

    fn persist(&self, user_id: &str, record: &UserRecord) {
        let path = self.user_path(user_id);
        let result = serde_json::to_string_pretty(record)
            .context("serializing user record")
            .and_then(|content| {
                atomic_write(&path, &content)
                    .with_context(|| format!("writing user record {}", path.display()))
            });
        // Disk trouble must not break the conversation; the cached copy
        // keeps serving until the next successful write.
        if let Err(e) = result {
            warn!("failed to persist memory for {}: {:#}", user_id, e);
        }
    }

    /// Snapshot of a user's record, loading from disk on cache miss.
    pub async fn record(&self, user_id: &str) -> UserRecord {
        let mut cache = self.cache.lock().await;
        if let Some(record) = cache.get(user_id) {
            return record.clone();
        }
        let record = Self::read_record(&self.user_path(user_id));
        cache.put(user_id.to_string(), record.clone());
        record
    }

    pub async fn get(&self, user_id: &str, key: &str) -> Option<String> {
        self.record(user_id).await.get(key)
    }

    pub async fn set(&self, user_id: &str, key: &str, value: String) {
        let mut cache = self.cache.lock().await;
        let mut record = match cache.get(user_id) {
            Some(record) => record.clone(),
            None => Self::read_record(&self.user_path(user_id)),
        };
        record.set(key, value);
        self.persist(user_id, &record);
        debug!(user_id, key, "memory updated");
        cache.put(user_id.to_string(), record);
    }

    /// Append one exchange (user line then bot line), trimming to the
    /// configured history bound.
    pub async fn append_exchange(&self, user_id: &str, user_text: &str, bot_text: &str) {
        let mut cache = self.cache.lock().await;
        let mut record = match cache.get(user_id) {
            Some(record) => record.clone(),
            None => Self::read_record(&self.user_path(user_id)),
        };
        let now = Utc::now().to_rfc3339();
        record.history.push(HistoryTurn {
            speaker: "user".to_string(),
            text: user_text.to_string(),
            timestamp: now.clone(),
        });
        record.history.push(HistoryTurn {
            speaker: "bot".to_string(),
            text: bot_text.to_string(),
            timestamp: now.clone(),
        });
        let max = self.history_turns * 2;
        if record.history.len() > max {
            let excess = record.history.len() - max;
            record.history.drain(..excess);
        }
        record.updated_at = now;
        self.persist(user_id, &record);
        cache.put(user_id.to_string(), record);
    }

    /// Number of user record files on disk.
    pub fn user_count(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }
}
