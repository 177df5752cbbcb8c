use thiserror::Error;

/// Typed error hierarchy for quip.
///
/// Use at module boundaries (classifier training, memory store, config,
/// gateway). Internal/leaf functions can continue using `anyhow::Result`;
/// the `Internal` variant allows seamless conversion via the `?` operator.
///
/// Nothing here is fatal to a chat turn: the engine converts every failure
/// on the response path into degraded behavior (pattern-matcher-only
/// operation, in-memory-only state, or the generic fallback text).
#[derive(Debug, Error)]
pub enum QuipError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Invalid training data: {0}")]
    TrainingData(String),

    #[error("Memory store error: {message}")]
    Memory { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl QuipError {
    /// Whether the chat pipeline can keep serving turns despite this error.
    /// Only configuration problems require operator intervention up front.
    pub fn is_degradable(&self) -> bool {
        match self {
            Self::ClassifierUnavailable(_) | Self::Memory { .. } | Self::Internal(_) => true,
            Self::Config(_) | Self::TrainingData(_) => false,
        }
    }
}
