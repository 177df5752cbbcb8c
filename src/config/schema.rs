use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Default display name; users can override it per user record.
    #[serde(default = "default_bot_name", rename = "botName")]
    pub bot_name: String,
    /// Turns of conversation history kept per user (ring-bounded).
    #[serde(default = "default_history_turns", rename = "historyTurns")]
    pub history_turns: usize,
}

fn default_bot_name() -> String {
    crate::DEFAULT_BOT_NAME.to_string()
}

fn default_history_turns() -> usize {
    20
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            history_turns: default_history_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassifierConfig {
    /// Path to the trained model blob. Relative paths resolve under the
    /// quip home directory. Missing/corrupt model degrades to pattern
    /// matching only.
    #[serde(default, rename = "modelPath")]
    pub model_path: Option<String>,
    /// Path to a JSON training dataset of `[{text, intent}]` entries.
    /// When absent, `quip train` uses the embedded sample set.
    #[serde(default, rename = "trainingDataPath")]
    pub training_data_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Data directory override, set programmatically (tests, embedding).
    /// Never persisted; normal resolution is `QUIP_HOME` then `~/.quip`.
    #[serde(skip)]
    pub home_override: Option<PathBuf>,
}

impl Config {
    /// Pin all data paths under `dir` instead of the ambient home.
    pub fn with_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_override = Some(dir.into());
        self
    }

    fn home(&self) -> anyhow::Result<PathBuf> {
        match &self.home_override {
            Some(dir) => Ok(dir.clone()),
            None => crate::utils::get_quip_home(),
        }
    }

    /// Resolve the model blob path, defaulting to `<home>/intent_model.json`.
    pub fn model_path(&self) -> anyhow::Result<PathBuf> {
        let home = self.home()?;
        Ok(match &self.classifier.model_path {
            Some(p) if PathBuf::from(p).is_absolute() => PathBuf::from(p),
            Some(p) => home.join(p),
            None => home.join("intent_model.json"),
        })
    }

    /// Resolve the users directory where per-user records live.
    pub fn users_dir(&self) -> anyhow::Result<PathBuf> {
        Ok(self.home()?.join("users"))
    }

    /// Resolve the feedback log path.
    pub fn feedback_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.home()?.join("feedback.jsonl"))
    }
}
