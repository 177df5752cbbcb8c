//! Response composition.
//!
//! Merges the classifier verdict, extracted entities, and per-user state
//! into the final reply. Below `MEDIUM_CONFIDENCE` the composer gets out of
//! the way entirely and returns the pattern matcher's text unchanged; above
//! it, an exhaustive per-intent handler table takes over. A missing
//! required entity always produces a clarifying question, never an error,
//! and never reaches a collaborator with partial data.

use crate::engine::entities::{
    self, ENTITY_BOT_NAME, ENTITY_CITY, ENTITY_FAVORITE_CATEGORY, ENTITY_FAVORITE_ITEM,
    ENTITY_PERSON_NAME, EntitySet,
};
use crate::engine::intent::{Intent, IntentPrediction};
use crate::engine::patterns::PatternMatcher;
use chrono::Timelike;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Confidence at or above which the enthusiastic phrasing band is used.
pub const HIGH_CONFIDENCE: f32 = 0.8;

/// Confidence at or above which classifier output drives the response at
/// all. Below this the pattern matcher answers alone. Both thresholds are
/// boundary-inclusive.
pub const MEDIUM_CONFIDENCE: f32 = 0.5;

/// `special_handling` marker for the external weather collaborator.
pub const SPECIAL_WEATHER: &str = "weather";

/// Final reply plus the metadata every front end receives.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub text: String,
    pub intent: Intent,
    pub confidence: f32,
    pub entities: EntitySet,
    /// Set when an external collaborator should take over (currently only
    /// `"weather"`); `params` then carries its arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_handling: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// Per-user state the composer reads. A snapshot, not a live handle: the
/// composer itself is pure and returns requested writes instead of
/// performing them.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub user_name: Option<String>,
    pub bot_name: String,
    pub favorites: BTreeMap<String, String>,
}

/// Memory mutations the engine should persist after the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryWrite {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub reply: Reply,
    pub writes: Vec<MemoryWrite>,
}

pub struct Composer {
    matcher: PatternMatcher,
}

impl Composer {
    pub fn new() -> Self {
        Self {
            matcher: PatternMatcher::new(),
        }
    }

    /// Expose the underlying matcher for fallback-only operation.
    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn compose(
        &self,
        text: &str,
        prediction: IntentPrediction,
        entities: EntitySet,
        ctx: &TurnContext,
    ) -> Composition {
        // Low confidence: the classifier's opinion is ignored entirely and
        // the reply is exactly what the pattern matcher says.
        if prediction.confidence < MEDIUM_CONFIDENCE {
            debug!(
                "confidence {:.2} below medium threshold, deferring to pattern matcher",
                prediction.confidence
            );
            return Composition {
                reply: Reply {
                    text: self.matcher.respond(text, &ctx.bot_name),
                    intent: prediction.intent,
                    confidence: prediction.confidence,
                    entities,
                    special_handling: None,
                    params: BTreeMap::new(),
                },
                writes: Vec::new(),
            };
        }

        let high = prediction.confidence >= HIGH_CONFIDENCE;
        let mut writes = Vec::new();
        let mut special_handling = None;
        let mut params = BTreeMap::new();

        let text_out = match prediction.intent {
            Intent::Greeting => {
                if high {
                    let time_prefix = time_greeting(chrono::Local::now().hour());
                    match &ctx.user_name {
                        Some(name) => {
                            format!("{}Hello, {}! How can I help you today?", time_prefix, name)
                        }
                        None => format!(
                            "{}Hello there! I'm {}. How can I help you today?",
                            time_prefix, ctx.bot_name
                        ),
                    }
                } else {
                    "Hi! What can I do for you?".to_string()
                }
            }
            Intent::Farewell => {
                if high {
                    "Goodbye! Have a wonderful day!".to_string()
                } else {
                    "See you later!".to_string()
                }
            }
            Intent::Thanks => {
                if high {
                    "You're very welcome! Is there anything else I can help with?".to_string()
                } else {
                    "No problem! Let me know if you need anything else.".to_string()
                }
            }
            Intent::Help => concat!(
                "I can help you with several things:\n",
                "- Chat with you about various topics\n",
                "- Check the weather for different cities\n",
                "- Remember your preferences and favorite things\n",
                "- Change my name if you'd like to call me something else\n",
                "What would you like to do?"
            )
            .to_string(),
            Intent::Weather => match entities.get(ENTITY_CITY) {
                Some(city) => {
                    special_handling = Some(SPECIAL_WEATHER.to_string());
                    params.insert("city".to_string(), city.clone());
                    format!("Let me check the weather in {} for you.", city)
                }
                None => {
                    "I can check the weather for you. Which city are you interested in?"
                        .to_string()
                }
            },
            Intent::Name => format!("My name is {}. How can I help you?", ctx.bot_name),
            Intent::SetName => match entities.get(ENTITY_PERSON_NAME) {
                Some(name) => {
                    writes.push(MemoryWrite {
                        key: "name".to_string(),
                        value: name.clone(),
                    });
                    format!("Nice to meet you, {}! I'll remember your name.", name)
                }
                None => "I'd be happy to call you by name. What is your name?".to_string(),
            },
            Intent::RenameBot => match entities.get(ENTITY_BOT_NAME) {
                Some(new_name) => {
                    writes.push(MemoryWrite {
                        key: "bot_name".to_string(),
                        value: new_name.clone(),
                    });
                    format!("I'll respond to {} from now on!", new_name)
                }
                None => {
                    "I'd be happy to change my name. What would you like to call me?".to_string()
                }
            },
            Intent::GetFavorite => {
                let category = entities
                    .get(ENTITY_FAVORITE_CATEGORY)
                    .cloned()
                    .or_else(|| entities::mentioned_category(text));
                match category {
                    Some(category) => match ctx.favorites.get(&category) {
                        Some(item) => format!("Your favorite {} is {}!", category, item),
                        None => format!(
                            "I don't know your favorite {} yet. What is it?",
                            category
                        ),
                    },
                    None => {
                        "I'm not sure which favorite thing you're asking about. Could you specify?"
                            .to_string()
                    }
                }
            }
            Intent::SetFavorite => {
                match (
                    entities.get(ENTITY_FAVORITE_CATEGORY),
                    entities.get(ENTITY_FAVORITE_ITEM),
                ) {
                    (Some(category), Some(item)) => {
                        writes.push(MemoryWrite {
                            key: format!("favorite_{}", category),
                            value: item.clone(),
                        });
                        format!("I'll remember that your favorite {} is {}!", category, item)
                    }
                    _ => {
                        "I'm not sure what favorite thing you're telling me about. Could you be more specific?"
                            .to_string()
                    }
                }
            }
            // A trained-but-unmapped label: answer usefully, never error
            Intent::Unknown => {
                "I'm not sure how to help with that yet. Ask me what I can do!".to_string()
            }
        };

        Composition {
            reply: Reply {
                text: text_out,
                intent: prediction.intent,
                confidence: prediction.confidence,
                entities,
                special_handling,
                params,
            },
            writes,
        }
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

fn time_greeting(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning! ",
        12..=17 => "Good afternoon! ",
        18..=21 => "Good evening! ",
        _ => "",
    }
}
