//! Recognized conversational intents.
//!
//! Intents travel as a closed enum rather than bare strings: the composer
//! dispatches on an exhaustive match, and labels that the classifier was
//! never trained on route to `Unknown` instead of silently falling through
//! a string lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
    Weather,
    Name,
    SetName,
    RenameBot,
    Help,
    Thanks,
    GetFavorite,
    SetFavorite,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 10] = [
        Intent::Greeting,
        Intent::Farewell,
        Intent::Weather,
        Intent::Name,
        Intent::SetName,
        Intent::RenameBot,
        Intent::Help,
        Intent::Thanks,
        Intent::GetFavorite,
        Intent::SetFavorite,
    ];

    /// Parse a dataset label. Unrecognized labels map to `Unknown` so stale
    /// or hand-edited training files cannot crash prediction.
    pub fn from_label(label: &str) -> Intent {
        match label {
            "greeting" => Intent::Greeting,
            "farewell" => Intent::Farewell,
            "weather" => Intent::Weather,
            "name" => Intent::Name,
            "set_name" => Intent::SetName,
            "rename_bot" => Intent::RenameBot,
            "help" => Intent::Help,
            "thanks" => Intent::Thanks,
            "get_favorite" => Intent::GetFavorite,
            "set_favorite" => Intent::SetFavorite,
            _ => Intent::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Weather => "weather",
            Intent::Name => "name",
            Intent::SetName => "set_name",
            Intent::RenameBot => "rename_bot",
            Intent::Help => "help",
            Intent::Thanks => "thanks",
            Intent::GetFavorite => "get_favorite",
            Intent::SetFavorite => "set_favorite",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classifier verdict for one utterance. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentPrediction {
    pub intent: Intent,
    /// In `[0, 1]`; softmax over class log-scores.
    pub confidence: f32,
}

impl IntentPrediction {
    pub fn none() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_roundtrip() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_label(intent.label()), intent);
        }
    }

    #[test]
    fn test_unrecognized_label_maps_to_unknown() {
        assert_eq!(Intent::from_label("order_pizza"), Intent::Unknown);
        assert_eq!(Intent::from_label(""), Intent::Unknown);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Intent::SetFavorite).unwrap();
        assert_eq!(json, "\"set_favorite\"");
        let back: Intent = serde_json::from_str("\"get_favorite\"").unwrap();
        assert_eq!(back, Intent::GetFavorite);
    }
}
