//! Statistical intent classification.
//!
//! A TF-IDF weighted multinomial naive Bayes model over lowercased
//! alphanumeric tokens. Deliberately small and deterministic: it trains in
//! milliseconds from an embedded sample set or a JSON dataset, serializes
//! to a versioned JSON blob, and produces a softmax confidence the
//! composer gates against the `MEDIUM_CONFIDENCE` threshold.
//!
//! The classifier is an explicitly constructed, read-only service object.
//! It is built (or loaded) once at startup and shared behind `Arc`; there
//! is no hidden module singleton and no runtime mutation.

use crate::engine::intent::{Intent, IntentPrediction};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Bump when the blob layout changes; older blobs are rejected on load and
/// the caller retrains instead of misreading weights.
const MODEL_VERSION: u32 = 1;

/// Laplace smoothing constant for class-conditional token probabilities.
const SMOOTHING_ALPHA: f32 = 1.0;

/// One labeled training utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub intent: String,
}

/// Summary returned by `IntentClassifier::train`.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub examples: usize,
    pub classes: usize,
    pub vocab_size: usize,
    /// Accuracy re-scoring the training set itself. An eyeball check that
    /// training converged, not a generalization estimate.
    pub training_accuracy: f32,
}

/// Serialized model: everything `predict` needs, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IntentModel {
    version: u32,
    /// Class labels in score order. Stored as strings so a retrained blob
    /// with new labels still loads; unknown labels predict `Intent::Unknown`.
    classes: Vec<String>,
    vocab: HashMap<String, usize>,
    /// Inverse document frequency per vocab index.
    idf: Vec<f32>,
    /// ln P(class), indexed by class.
    class_log_priors: Vec<f32>,
    /// ln P(token | class), flattened `[classes * vocab]`.
    token_log_probs: Vec<f32>,
}

pub struct IntentClassifier {
    model: IntentModel,
}

impl IntentClassifier {
    /// Train from labeled examples. Needs at least two intent classes with
    /// at least one example each.
    pub fn train(examples: &[TrainingExample]) -> Result<(Self, TrainReport)> {
        if examples.is_empty() {
            bail!("training dataset is empty");
        }

        let mut classes: Vec<String> = examples.iter().map(|e| e.intent.clone()).collect();
        classes.sort();
        classes.dedup();
        if classes.len() < 2 {
            bail!("need at least 2 intent classes, got {}", classes.len());
        }
        let class_index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        // Vocabulary and document frequencies
        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<u32> = Vec::new();
        for example in examples {
            let mut seen = std::collections::HashSet::new();
            for tok in tokenize(&example.text) {
                let idx = *vocab.entry(tok.clone()).or_insert_with(|| {
                    doc_freq.push(0);
                    doc_freq.len() - 1
                });
                if seen.insert(idx) {
                    doc_freq[idx] += 1;
                }
            }
        }
        let vocab_size = vocab.len().max(1);
        let n_docs = examples.len() as f32;
        let idf: Vec<f32> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f32)).ln() + 1.0)
            .collect();

        // TF-IDF weighted token mass per class
        let n_classes = classes.len();
        let mut class_doc_counts = vec![0u32; n_classes];
        let mut weighted_counts = vec![0f32; n_classes * vocab_size];
        let mut class_totals = vec![0f32; n_classes];

        for example in examples {
            let c = class_index[example.intent.as_str()];
            class_doc_counts[c] += 1;
            for tok in tokenize(&example.text) {
                let ti = vocab[&tok];
                let w = idf[ti];
                weighted_counts[c * vocab_size + ti] += w;
                class_totals[c] += w;
            }
        }

        let class_log_priors: Vec<f32> = class_doc_counts
            .iter()
            .map(|&count| {
                ((count as f32 + SMOOTHING_ALPHA)
                    / (n_docs + SMOOTHING_ALPHA * n_classes as f32))
                    .ln()
            })
            .collect();

        let mut token_log_probs = vec![0f32; n_classes * vocab_size];
        for c in 0..n_classes {
            let denom = class_totals[c] + SMOOTHING_ALPHA * vocab_size as f32;
            for ti in 0..vocab_size {
                let count = weighted_counts[c * vocab_size + ti];
                token_log_probs[c * vocab_size + ti] = ((count + SMOOTHING_ALPHA) / denom).ln();
            }
        }

        let classifier = Self {
            model: IntentModel {
                version: MODEL_VERSION,
                classes,
                vocab,
                idf,
                class_log_priors,
                token_log_probs,
            },
        };

        let correct = examples
            .iter()
            .filter(|e| classifier.predict(&e.text).intent == Intent::from_label(&e.intent))
            .count();
        let report = TrainReport {
            examples: examples.len(),
            classes: classifier.model.classes.len(),
            vocab_size: classifier.model.vocab.len(),
            training_accuracy: correct as f32 / examples.len() as f32,
        };

        info!(
            "trained intent model: {} examples, {} classes, {} tokens, accuracy {:.2}",
            report.examples, report.classes, report.vocab_size, report.training_accuracy
        );

        Ok((classifier, report))
    }

    /// Score an utterance against every class; the winner's softmax share
    /// is the confidence. Utterances with no in-vocabulary token at all get
    /// `Intent::Unknown` at confidence 0, and the composer then defers to
    /// the pattern matcher.
    pub fn predict(&self, text: &str) -> IntentPrediction {
        let model = &self.model;
        let n_classes = model.classes.len();
        let vocab_size = model.vocab.len().max(1);

        let mut scores = model.class_log_priors.clone();
        let mut any_token = false;

        // Query-side term frequency
        let mut tf: HashMap<usize, f32> = HashMap::new();
        for tok in tokenize(text) {
            if let Some(&ti) = model.vocab.get(&tok) {
                any_token = true;
                *tf.entry(ti).or_insert(0.0) += 1.0;
            }
        }

        if !any_token {
            return IntentPrediction::none();
        }

        for (&ti, &count) in &tf {
            let weight = count * model.idf[ti];
            for (c, score) in scores.iter_mut().enumerate().take(n_classes) {
                *score += weight * model.token_log_probs[c * vocab_size + ti];
            }
        }

        // Softmax with max-shift for numeric stability
        let max_score = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp_sum: f32 = scores.iter().map(|s| (s - max_score).exp()).sum();
        let (best, best_score) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));
        let confidence = (best_score - max_score).exp() / exp_sum;

        let intent = Intent::from_label(&model.classes[best]);
        debug!(
            "intent prediction: {} (confidence {:.3}) for {:?}",
            intent, confidence, text
        );

        IntentPrediction { intent, confidence }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let blob = serde_json::to_string(&self.model)?;
        crate::utils::atomic_write(path, &blob)
            .with_context(|| format!("Failed to write model to {}", path.display()))?;
        info!("intent model saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let blob = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {}", path.display()))?;
        let model: IntentModel = serde_json::from_str(&blob)
            .with_context(|| format!("Failed to parse model blob {}", path.display()))?;
        if model.version != MODEL_VERSION {
            bail!(
                "model blob version {} does not match supported version {}",
                model.version,
                MODEL_VERSION
            );
        }
        // `predict` indexes idf and token_log_probs by vocab entry, so a
        // truncated blob must be rejected here rather than panic later.
        let vocab_size = model.vocab.len().max(1);
        if model.idf.len() != model.vocab.len()
            || model.class_log_priors.len() != model.classes.len()
            || model.token_log_probs.len() != model.classes.len() * vocab_size
            || model.vocab.values().any(|&ti| ti >= model.vocab.len())
        {
            bail!("model blob {} is internally inconsistent", path.display());
        }
        info!(
            "intent model loaded from {} with {} classes",
            path.display(),
            model.classes.len()
        );
        Ok(Self { model })
    }

    pub fn classes(&self) -> &[String] {
        &self.model.classes
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Load a `[{text, intent}]` dataset from disk.
pub fn load_dataset(path: &Path) -> Result<Vec<TrainingExample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training data from {}", path.display()))?;
    let examples: Vec<TrainingExample> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse training data from {}", path.display()))?;
    Ok(examples)
}

/// Embedded training set covering the ten supported intents. Used when no
/// dataset file is configured and as the startup fallback when no trained
/// model blob exists yet.
pub fn sample_training_data() -> Vec<TrainingExample> {
    const SAMPLES: &[(&str, &str)] = &[
        // Greetings
        ("hello", "greeting"),
        ("hi there", "greeting"),
        ("hey", "greeting"),
        ("good morning", "greeting"),
        ("good afternoon", "greeting"),
        ("good evening", "greeting"),
        ("what's up", "greeting"),
        ("hello there", "greeting"),
        ("hi, how are you", "greeting"),
        ("hey, how's it going", "greeting"),
        ("howdy", "greeting"),
        ("nice to meet you", "greeting"),
        // Farewells
        ("goodbye", "farewell"),
        ("bye", "farewell"),
        ("see you later", "farewell"),
        ("see you soon", "farewell"),
        ("have a good day", "farewell"),
        ("talk to you later", "farewell"),
        ("i have to go", "farewell"),
        ("i'm leaving", "farewell"),
        ("catch you later", "farewell"),
        ("until next time", "farewell"),
        ("good night", "farewell"),
        // Weather queries
        ("what's the weather like", "weather"),
        ("how's the weather today", "weather"),
        ("weather forecast", "weather"),
        ("is it going to rain today", "weather"),
        ("what's the temperature outside", "weather"),
        ("how hot is it", "weather"),
        ("how cold is it", "weather"),
        ("will it be sunny tomorrow", "weather"),
        ("check the weather for me", "weather"),
        ("what's the weather like in new york", "weather"),
        ("tell me about the weather in chicago", "weather"),
        ("weather in paris", "weather"),
        ("is it snowing", "weather"),
        // Bot name queries
        ("what's your name", "name"),
        ("who are you", "name"),
        ("what should i call you", "name"),
        ("tell me your name", "name"),
        ("do you have a name", "name"),
        ("what are you called", "name"),
        // Set user name
        ("my name is john", "set_name"),
        ("i'm sarah", "set_name"),
        ("you can call me mike", "set_name"),
        ("i am david", "set_name"),
        ("call me alex", "set_name"),
        ("name's james", "set_name"),
        // Help
        ("help", "help"),
        ("what can you do", "help"),
        ("show me what you can do", "help"),
        ("how do you work", "help"),
        ("i need help", "help"),
        ("what are your capabilities", "help"),
        ("tell me about your features", "help"),
        ("what commands do you understand", "help"),
        // Thanks
        ("thank you", "thanks"),
        ("thanks", "thanks"),
        ("appreciate it", "thanks"),
        ("thanks a lot", "thanks"),
        ("thank you very much", "thanks"),
        ("thanks for your help", "thanks"),
        ("great, thanks", "thanks"),
        // Get favorites
        ("what's my favorite color", "get_favorite"),
        ("what is my favorite color", "get_favorite"),
        ("what is my favorite food", "get_favorite"),
        ("tell me my favorite food", "get_favorite"),
        ("what food do i like", "get_favorite"),
        ("what's my favorite movie", "get_favorite"),
        ("what is my favorite animal", "get_favorite"),
        ("do you know my favorite book", "get_favorite"),
        ("which color do i like", "get_favorite"),
        // Set favorites
        ("my favorite color is blue", "set_favorite"),
        ("my favourite colour is green", "set_favorite"),
        ("i like the color red", "set_favorite"),
        ("my favorite food is pizza", "set_favorite"),
        ("i love sushi", "set_favorite"),
        ("my favorite movie is inception", "set_favorite"),
        ("i like star wars", "set_favorite"),
        ("my favorite animal is dog", "set_favorite"),
        ("my favorite song is yesterday", "set_favorite"),
        // Rename bot
        ("change your name", "rename_bot"),
        ("i want to call you alfred", "rename_bot"),
        ("your name should be siri", "rename_bot"),
        ("can i rename you", "rename_bot"),
        ("call you jarvis", "rename_bot"),
        ("i will name you friday", "rename_bot"),
    ];

    SAMPLES
        .iter()
        .map(|(text, intent)| TrainingExample {
            text: (*text).to_string(),
            intent: (*intent).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained() -> IntentClassifier {
        let (classifier, _) = IntentClassifier::train(&sample_training_data()).unwrap();
        classifier
    }

    #[test]
    fn test_train_report_sane() {
        let (_, report) = IntentClassifier::train(&sample_training_data()).unwrap();
        assert_eq!(report.classes, 10);
        assert!(report.examples > 50);
        assert!(report.vocab_size > 50);
        assert!(report.training_accuracy > 0.8);
    }

    #[test]
    fn test_train_rejects_empty() {
        assert!(IntentClassifier::train(&[]).is_err());
    }

    #[test]
    fn test_train_rejects_single_class() {
        let examples = vec![
            TrainingExample {
                text: "hello".into(),
                intent: "greeting".into(),
            },
            TrainingExample {
                text: "hi".into(),
                intent: "greeting".into(),
            },
        ];
        assert!(IntentClassifier::train(&examples).is_err());
    }

    #[test]
    fn test_greeting_prediction_high_confidence() {
        let prediction = trained().predict("Hello");
        assert_eq!(prediction.intent, Intent::Greeting);
        assert!(
            prediction.confidence >= 0.8,
            "confidence was {}",
            prediction.confidence
        );
    }

    #[test]
    fn test_core_intent_predictions() {
        let classifier = trained();
        let cases = [
            ("goodbye now", Intent::Farewell),
            ("what's the weather like today", Intent::Weather),
            ("weather in Paris", Intent::Weather),
            ("what's your name", Intent::Name),
            ("my name is Alice", Intent::SetName),
            ("what can you do", Intent::Help),
            ("thanks for your help", Intent::Thanks),
            ("what is my favorite color", Intent::GetFavorite),
            ("my favorite color is blue", Intent::SetFavorite),
            ("i want to call you alfred", Intent::RenameBot),
        ];
        for (text, expected) in cases {
            let prediction = classifier.predict(text);
            assert_eq!(
                prediction.intent, expected,
                "text {:?} predicted {} at {:.2}",
                text, prediction.intent, prediction.confidence
            );
        }
    }

    #[test]
    fn test_out_of_vocabulary_returns_none() {
        let prediction = trained().predict("zxqv blorptastic");
        assert_eq!(prediction.intent, Intent::Unknown);
        assert!(prediction.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let classifier = trained();
        let a = classifier.predict("how are you");
        let b = classifier.predict("how are you");
        assert_eq!(a.intent, b.intent);
        assert!((a.confidence - b.confidence).abs() < f32::EPSILON);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let classifier = trained();
        classifier.save(&path).unwrap();

        let loaded = IntentClassifier::load(&path).unwrap();
        let before = classifier.predict("weather in Paris");
        let after = loaded.predict("weather in Paris");
        assert_eq!(before.intent, after.intent);
        assert!((before.confidence - after.confidence).abs() < 1e-5);
    }

    #[test]
    fn test_load_rejects_wrong_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let classifier = trained();
        let mut value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&classifier.model).unwrap()).unwrap();
        value["version"] = serde_json::json!(999);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        assert!(IntentClassifier::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_truncated_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let classifier = trained();
        let mut value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&classifier.model).unwrap()).unwrap();
        // A valid-JSON blob with the right version but short vectors would
        // make predict index out of bounds if load accepted it.
        value["token_log_probs"] = serde_json::json!([0.0]);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        assert!(IntentClassifier::load(&path).is_err());

        let mut value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&classifier.model).unwrap()).unwrap();
        value["idf"] = serde_json::json!([]);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        assert!(IntentClassifier::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_corrupt_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(IntentClassifier::load(&path).is_err());
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
        assert_eq!(tokenize("what's up"), vec!["what", "s", "up"]);
        assert!(tokenize("!!!").is_empty());
    }
}
