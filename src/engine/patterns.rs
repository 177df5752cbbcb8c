//! Ordered regex rule matching with pronoun reflection.
//!
//! The pattern matcher is the bottom of the response pipeline: it always
//! produces *something*, which is what lets every other component degrade
//! gracefully. Rules are scanned in a fixed order and the first matching
//! regex terminates the scan.
//!
//! Template selection is deterministic: index = trimmed input length modulo
//! the template count. Identical inputs always get identical replies (the
//! low-confidence equivalence with the composer depends on this), while
//! different phrasings still rotate through the variants.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Reply used when no rule matches. With the catch-all rule installed this
/// is unreachable in practice, but the matcher must never return nothing.
pub const FALLBACK_RESPONSE: &str = "I'm not sure I understand. Can you rephrase that?";

/// Word-by-word grammatical person swaps applied to capture groups before
/// they are inserted into a response template. Unknown words pass through.
static REFLECTIONS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("i", "you"),
        ("i'm", "you're"),
        ("i'd", "you'd"),
        ("i've", "you've"),
        ("i'll", "you'll"),
        ("me", "you"),
        ("my", "your"),
        ("mine", "yours"),
        ("am", "are"),
        ("was", "were"),
        ("you", "me"),
        ("you're", "i'm"),
        ("your", "my"),
        ("yours", "mine"),
    ])
});

enum RuleKind {
    Pattern(Regex),
    /// Direct address by the bot's current display name ("Wicked, ...").
    /// The name is per-user state, so this rule matches at respond time
    /// instead of holding a compiled regex.
    DirectAddress,
}

struct PatternRule {
    kind: RuleKind,
    templates: Vec<&'static str>,
}

pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

impl PatternMatcher {
    /// Build the default ruleset: name exchange, small talk, rename,
    /// direct address, help, goodbyes, and a catch-all.
    pub fn new() -> Self {
        let rule = |pattern: &str, templates: Vec<&'static str>| PatternRule {
            kind: RuleKind::Pattern(
                Regex::new(&format!("(?i){}", pattern)).expect("builtin pattern must compile"),
            ),
            templates,
        };

        let rules = vec![
            rule(
                r"my name is (.*)",
                vec![
                    "Hello %1! How can I help you today?",
                    "Nice to meet you, %1! What can I do for you?",
                ],
            ),
            rule(
                r"(?:what(?:'s| is) your name|who are you)\??",
                vec![
                    "I'm {bot_name}, your friendly assistant!",
                    "My name is {bot_name}. How can I assist you today?",
                    "I go by {bot_name}. What can I help you with?",
                ],
            ),
            rule(
                r"how are you\??",
                vec![
                    "I'm doing well, thanks for asking!",
                    "All systems operational! How about you?",
                    "I'm great! How can I help you today?",
                ],
            ),
            rule(
                r"(?:call|name) you (.*)",
                vec![
                    "I'll respond to %1 from now on!",
                    "I like the name %1! Let's continue our chat.",
                ],
            ),
            rule(
                r"how did you get your name\??",
                vec![
                    "My creator named me {bot_name}! I think it's a great name, don't you?",
                    "I was born with the name {bot_name}. Do you like it?",
                ],
            ),
            PatternRule {
                kind: RuleKind::DirectAddress,
                templates: vec![
                    "Yes, I'm listening! About '%1'...",
                    "I'm here! Regarding '%1'...",
                ],
            },
            rule(
                r"\b(?:help|what can you do|your abilities)\b\??",
                vec![
                    "I can chat with you about various topics, remember your name, and even change my name if you'd like!",
                    "I'm a simple chatbot that can have conversations, remember names, and respond to basic queries.",
                ],
            ),
            rule(
                r"\b(?:quit|exit|bye|goodbye)\b",
                vec![
                    "Goodbye! Have a great day!",
                    "See you later!",
                    "Until next time!",
                ],
            ),
            rule(
                r"(.*)",
                vec![
                    "I'm not sure I understand. Could you rephrase that?",
                    "Interesting. Tell me more about that.",
                    "I'm still learning. Can you elaborate?",
                ],
            ),
        ];

        Self { rules }
    }

    /// Match `input` against the ruleset and render the selected template.
    ///
    /// Pure over `(input, bot_name)`: no side effects, no hidden state.
    /// Rename-style matches only produce text here; persistence is the
    /// composer's job when the classifier is confident enough.
    pub fn respond(&self, input: &str, bot_name: &str) -> String {
        let input = input.trim();

        for rule in &self.rules {
            let captured: Option<Vec<String>> = match &rule.kind {
                RuleKind::Pattern(re) => re
                    .captures(input)
                    .map(|caps| {
                        (1..caps.len())
                            .map(|i| caps.get(i).map_or(String::new(), |m| m.as_str().to_string()))
                            .collect()
                    }),
                RuleKind::DirectAddress => strip_direct_address(input, bot_name).map(|rest| vec![rest]),
            };

            if let Some(groups) = captured {
                let template = select_template(&rule.templates, input);
                return render(template, &groups, bot_name);
            }
        }

        FALLBACK_RESPONSE.to_string()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed selection policy: trimmed input length modulo template count.
fn select_template<'a>(templates: &[&'a str], input: &str) -> &'a str {
    templates[input.len() % templates.len()]
}

/// "Wicked, what's up" → Some("what's up"). Case-insensitive on the name.
fn strip_direct_address(input: &str, bot_name: &str) -> Option<String> {
    if bot_name.is_empty() || input.len() <= bot_name.len() {
        return None;
    }
    // get() rather than split_at: the name length may not fall on a char
    // boundary of arbitrary user input
    let head = input.get(..bot_name.len())?;
    if !head.eq_ignore_ascii_case(bot_name) {
        return None;
    }
    let rest = &input[bot_name.len()..];
    // The name must end at a word boundary, otherwise "Wickedness is
    // everywhere" would read as addressing Wicked.
    if !rest.starts_with(',') && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.strip_prefix(',').unwrap_or(rest);
    let rest = rest.trim_start();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

/// Substitute `%N` placeholders with reflected capture groups and
/// `{bot_name}` with the current display name.
fn render(template: &str, groups: &[String], bot_name: &str) -> String {
    let mut out = template.replace("{bot_name}", bot_name);
    for (i, group) in groups.iter().enumerate() {
        let placeholder = format!("%{}", i + 1);
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, &reflect(group));
        }
    }
    out
}

/// Apply the reflection dictionary word by word, preserving words that have
/// no entry.
pub fn reflect(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            REFLECTIONS
                .get(word.to_lowercase().as_str())
                .copied()
                .unwrap_or(word)
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> PatternMatcher {
        PatternMatcher::new()
    }

    #[test]
    fn test_first_match_wins() {
        // "my name is X" precedes the catch-all
        let reply = matcher().respond("my name is Alice", "Wicked");
        assert!(reply.contains("Alice"), "reply was: {}", reply);
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let m = matcher();
        let a = m.respond("how are you?", "Wicked");
        let b = m.respond("how are you?", "Wicked");
        assert_eq!(a, b);
    }

    #[test]
    fn test_bot_name_substitution() {
        let reply = matcher().respond("what is your name", "Jarvis");
        assert!(reply.contains("Jarvis"), "reply was: {}", reply);
    }

    #[test]
    fn test_direct_address() {
        let reply = matcher().respond("Wicked, tell me a story", "Wicked");
        assert!(reply.contains("tell you a story"), "reply was: {}", reply);
    }

    #[test]
    fn test_direct_address_requires_name_match() {
        // Different bot name → falls through to later rules
        let reply = matcher().respond("Wicked, tell me a story", "Jarvis");
        assert!(!reply.contains("I'm listening"), "reply was: {}", reply);
    }

    #[test]
    fn test_direct_address_needs_word_boundary() {
        // A word that merely starts with the bot name is not an address
        assert_eq!(strip_direct_address("Wickedness is everywhere", "Wicked"), None);
        assert_eq!(
            strip_direct_address("Wicked, hello", "Wicked"),
            Some("hello".to_string())
        );
        assert_eq!(
            strip_direct_address("wicked hello", "Wicked"),
            Some("hello".to_string())
        );
    }

    #[test]
    fn test_catch_all_never_empty() {
        let m = matcher();
        for input in ["zxqv", "....", "asdf ghjk"] {
            let reply = m.respond(input, "Wicked");
            assert!(!reply.is_empty());
        }
    }

    #[test]
    fn test_case_insensitive_match() {
        let reply = matcher().respond("MY NAME IS Bob", "Wicked");
        assert!(reply.contains("Bob"), "reply was: {}", reply);
    }

    #[test]
    fn test_reflection_word_swaps() {
        assert_eq!(reflect("my dog"), "your dog");
        assert_eq!(reflect("i am happy"), "you are happy");
        assert_eq!(reflect("you"), "me");
        // Unknown words untouched
        assert_eq!(reflect("quantum flux"), "quantum flux");
    }

    #[test]
    fn test_reflection_applied_to_capture() {
        let reply = matcher().respond("Wicked, water my plants", "Wicked");
        assert!(reply.contains("water your plants"), "reply was: {}", reply);
    }

    #[test]
    fn test_template_selection_is_length_based() {
        let templates = ["a", "b", "c"];
        assert_eq!(select_template(&templates, "xx"), "c");
        assert_eq!(select_template(&templates, "xxx"), "a");
    }
}
