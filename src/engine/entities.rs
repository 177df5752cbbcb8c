//! Regex-based entity extraction.
//!
//! Each extractor runs independently against the raw utterance; the result
//! map may carry zero or more keys. Matching is case-insensitive, captured
//! values keep their original casing and are trimmed. The whole pass is a
//! pure function: extracting twice from the same text yields the same map.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Entity-name → extracted value for one utterance.
pub type EntitySet = BTreeMap<String, String>;

pub const ENTITY_CITY: &str = "city";
pub const ENTITY_PERSON_NAME: &str = "person_name";
pub const ENTITY_FAVORITE_CATEGORY: &str = "favorite_category";
pub const ENTITY_FAVORITE_ITEM: &str = "favorite_item";
pub const ENTITY_BOT_NAME: &str = "bot_name";

static CITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)weather (?:in|at|for) ([\w\s]+)").unwrap());

static PERSON_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:my name is|i am|i'm|call me) ([\w\s]+)").unwrap());

static FAVORITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:favorite|favourite)s? (color|colour|food|movie|film|book|animal|music|song) (?:is|are) ([\w\s]+)",
    )
    .unwrap()
});

/// Rename targets. "your name" alone is deliberately not enough, since
/// "what's your name" is a query, not a rename.
static BOT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:call you|name you|rename you(?: to)?|your name (?:should be|will be|is now)) ([\w\s]+)",
    )
    .unwrap()
});

/// Bare category mention, for "what is my favorite color"-style queries
/// where no `is/are VALUE` clause follows.
static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(color|colour|food|movie|film|book|animal|music|song)\b").unwrap()
});

/// British spellings and synonyms fold onto one storage key, so "favourite
/// colour" and "favorite color" read and write the same slot.
pub fn normalize_category(category: &str) -> String {
    match category.to_lowercase().as_str() {
        "colour" => "color".to_string(),
        "film" => "movie".to_string(),
        other => other.to_string(),
    }
}

/// Run every extractor over `text` and collect whatever matched.
pub fn extract(text: &str) -> EntitySet {
    let mut entities = EntitySet::new();

    if let Some(caps) = CITY_RE.captures(text) {
        entities.insert(ENTITY_CITY.to_string(), caps[1].trim().to_string());
    }

    if let Some(caps) = PERSON_NAME_RE.captures(text) {
        entities.insert(ENTITY_PERSON_NAME.to_string(), caps[1].trim().to_string());
    }

    if let Some(caps) = FAVORITE_RE.captures(text) {
        entities.insert(
            ENTITY_FAVORITE_CATEGORY.to_string(),
            normalize_category(&caps[1]),
        );
        entities.insert(ENTITY_FAVORITE_ITEM.to_string(), caps[2].trim().to_string());
    }

    if let Some(caps) = BOT_NAME_RE.captures(text) {
        entities.insert(ENTITY_BOT_NAME.to_string(), caps[1].trim().to_string());
    }

    entities
}

/// Find a known favorite category mentioned anywhere in the utterance.
/// Used by the composer when `get_favorite` fires without a full
/// `favorite X is Y` clause.
pub fn mentioned_category(text: &str) -> Option<String> {
    CATEGORY_RE
        .captures(text)
        .map(|caps| normalize_category(&caps[1]))
}
