//! Conversation engine.
//!
//! Wires the pipeline together: entity extraction and intent
//! classification run on every message, the composer folds them with
//! per-user memory into a reply, and the memory store absorbs any writes
//! the turn produced. The engine is shared behind `Arc` by the CLI REPL
//! and the HTTP gateway alike.

pub mod classifier;
pub mod composer;
pub mod entities;
pub mod feedback;
pub mod intent;
pub mod patterns;

use crate::config::Config;
use crate::errors::QuipError;
use async_trait::async_trait;
use chrono::Utc;
use classifier::{IntentClassifier, TrainingExample, sample_training_data};
use composer::{Composer, Reply, SPECIAL_WEATHER, TurnContext};
use feedback::{FeedbackEntry, FeedbackStore, Quality};
use intent::{Intent, IntentPrediction};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// External weather collaborator. The engine only ever hands it a city it
/// has already extracted; implementations decide where the forecast comes
/// from.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn describe(&self, city: &str) -> Result<String, QuipError>;
}

pub struct ChatEngine {
    config: Config,
    classifier: Option<IntentClassifier>,
    composer: Composer,
    memory: crate::memory::MemoryStore,
    feedback: FeedbackStore,
    weather: Option<Arc<dyn WeatherLookup>>,
}

impl ChatEngine {
    /// Build the engine from config. Tries the saved model blob first,
    /// retrains from the configured (or embedded) dataset if the blob is
    /// missing or stale, and degrades to pattern-only operation if even
    /// that fails.
    pub fn new(config: Config) -> Result<Self, QuipError> {
        let users_dir = config
            .users_dir()
            .map_err(|e| QuipError::Config(format!("cannot resolve users dir: {e:#}")))?;
        let feedback_path = config
            .feedback_path()
            .map_err(|e| QuipError::Config(format!("cannot resolve feedback path: {e:#}")))?;
        let memory = crate::memory::MemoryStore::new(users_dir, config.bot.history_turns)?;
        let feedback = FeedbackStore::new(feedback_path);
        let classifier = Self::build_classifier(&config);
        Ok(Self {
            config,
            classifier,
            composer: Composer::new(),
            memory,
            feedback,
            weather: None,
        })
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherLookup>) -> Self {
        self.weather = Some(weather);
        self
    }

    fn build_classifier(config: &Config) -> Option<IntentClassifier> {
        let model_path = match config.model_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("cannot resolve model path, running pattern-only: {e:#}");
                return None;
            }
        };
        match IntentClassifier::load(&model_path) {
            Ok(classifier) => {
                info!("loaded intent model from {}", model_path.display());
                return Some(classifier);
            }
            Err(e) => debug!("no usable model blob ({e:#}), training"),
        }
        let examples = match &config.classifier.training_data_path {
            Some(path) => match classifier::load_dataset(std::path::Path::new(path)) {
                Ok(examples) => examples,
                Err(e) => {
                    warn!("failed to read training data {path}: {e:#}, using built-in samples");
                    sample_training_data()
                }
            },
            None => sample_training_data(),
        };
        match IntentClassifier::train(&examples) {
            Ok((classifier, report)) => {
                info!(
                    "trained intent model: {} examples, {} classes, {:.1}% training accuracy",
                    report.examples,
                    report.classes,
                    report.training_accuracy * 100.0
                );
                if let Err(e) = classifier.save(&model_path) {
                    warn!("could not save model blob: {e:#}");
                }
                Some(classifier)
            }
            Err(e) => {
                warn!("classifier training failed, running pattern-only: {e:#}");
                None
            }
        }
    }

    pub fn classifier_ready(&self) -> bool {
        self.classifier.is_some()
    }

    /// Classifier handle for callers that need a hard failure instead of
    /// the engine's degraded pattern-only operation.
    pub fn classifier(&self) -> Result<&IntentClassifier, QuipError> {
        self.classifier.as_ref().ok_or_else(|| {
            QuipError::ClassifierUnavailable(
                "no trained model is loaded; run `quip train`".to_string(),
            )
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &crate::memory::MemoryStore {
        &self.memory
    }

    pub fn feedback(&self) -> &FeedbackStore {
        &self.feedback
    }

    /// The name this user knows the bot by.
    pub async fn bot_name_for(&self, user_id: &str) -> String {
        self.memory
            .get(user_id, "bot_name")
            .await
            .unwrap_or_else(|| self.config.bot.bot_name.clone())
    }

    /// Run one message through the full pipeline and persist its effects.
    pub async fn process_message(&self, user_id: &str, text: &str) -> Reply {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Reply {
                text: "Say something and I'll do my best to help!".to_string(),
                intent: Intent::Unknown,
                confidence: 0.0,
                entities: entities::EntitySet::new(),
                special_handling: None,
                params: std::collections::BTreeMap::new(),
            };
        }

        let record = self.memory.record(user_id).await;
        let ctx = TurnContext {
            user_name: record.name.clone(),
            bot_name: record
                .bot_name
                .clone()
                .unwrap_or_else(|| self.config.bot.bot_name.clone()),
            favorites: record.favorites.clone(),
        };

        let extracted = entities::extract(trimmed);
        let prediction = self
            .classifier
            .as_ref()
            .map_or_else(IntentPrediction::none, |c| c.predict(trimmed));
        debug!(
            user_id,
            intent = %prediction.intent,
            confidence = prediction.confidence,
            "classified message"
        );

        let mut composition = self.composer.compose(trimmed, prediction, extracted, &ctx);

        if composition.reply.special_handling.as_deref() == Some(SPECIAL_WEATHER) {
            if let (Some(weather), Some(city)) =
                (&self.weather, composition.reply.params.get("city").cloned())
            {
                match weather.describe(&city).await {
                    Ok(forecast) => composition.reply.text = forecast,
                    Err(e) => {
                        warn!("weather lookup for {city} failed: {e}");
                        composition.reply.text = format!(
                            "I couldn't reach the weather service for {city} right now. Try again in a bit?"
                        );
                    }
                }
            }
        }

        for write in &composition.writes {
            self.memory
                .set(user_id, &write.key, write.value.clone())
                .await;
        }
        self.memory
            .append_exchange(user_id, trimmed, &composition.reply.text)
            .await;

        composition.reply
    }

    pub async fn record_feedback(
        &self,
        user_id: &str,
        user_input: &str,
        response: &str,
        quality: Quality,
        intent: Option<Intent>,
    ) -> Result<(), QuipError> {
        self.feedback
            .append(&FeedbackEntry {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                user_input: user_input.to_string(),
                response: response.to_string(),
                quality,
                intent,
                timestamp: Utc::now().to_rfc3339(),
            })
            .await
    }
}

/// Train a model from the given dataset (plus harvested feedback when
/// requested) and persist the blob. Used by the `train` subcommand.
pub async fn train_and_save(
    config: &Config,
    dataset: Option<&std::path::Path>,
    include_feedback: bool,
) -> Result<classifier::TrainReport, QuipError> {
    let mut examples: Vec<TrainingExample> = match dataset {
        Some(path) => classifier::load_dataset(path)
            .map_err(|e| QuipError::TrainingData(format!("{e:#}")))?,
        None => match &config.classifier.training_data_path {
            Some(path) => classifier::load_dataset(std::path::Path::new(path))
                .map_err(|e| QuipError::TrainingData(format!("{e:#}")))?,
            None => sample_training_data(),
        },
    };
    if include_feedback {
        let store = FeedbackStore::new(config.feedback_path()?);
        let harvested = store.harvest_training_examples().await?;
        info!("merged {} feedback examples into training set", harvested.len());
        examples.extend(harvested);
    }
    let (classifier, report) = IntentClassifier::train(&examples)
        .map_err(|e| QuipError::TrainingData(format!("{e:#}")))?;
    let model_path = config
        .model_path()
        .map_err(|e| QuipError::Config(format!("cannot resolve model path: {e:#}")))?;
    classifier.save(&model_path)?;
    Ok(report)
}
