//! Topic-exchange routing patterns.
//!
//! Routing keys and patterns are dot-separated words. In a pattern, `*`
//! matches exactly one word and `#` matches zero or more words. Any other
//! word matches itself literally.

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Word {
    Literal(String),
    Star,
    Hash,
}

/// A parsed binding pattern.
///
/// # Example
///
/// ```
/// use conduit_server::TopicPattern;
///
/// let pattern = TopicPattern::new("jsontest.*.events").unwrap();
/// assert!(pattern.matches("jsontest.123456.events"));
/// assert!(!pattern.matches("jsontest.events"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    words: Vec<Word>,
}

impl TopicPattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidPattern`] for an empty pattern.
    pub fn new(pattern: &str) -> Result<Self, TransportError> {
        if pattern.is_empty() {
            return Err(TransportError::InvalidPattern {
                pattern: String::new(),
                reason: "pattern is empty".to_string(),
            });
        }

        let words = pattern
            .split('.')
            .map(|word| match word {
                "*" => Word::Star,
                "#" => Word::Hash,
                other => Word::Literal(other.to_string()),
            })
            .collect();

        Ok(Self {
            raw: pattern.to_string(),
            words,
        })
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if `routing_key` is selected by this pattern.
    #[must_use]
    pub fn matches(&self, routing_key: &str) -> bool {
        let key: Vec<&str> = routing_key.split('.').collect();
        match_words(&self.words, &key)
    }
}

impl std::fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_words(pattern: &[Word], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((Word::Hash, rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((Word::Star, rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((Word::Literal(word), rest)) => {
            key.first().is_some_and(|k| *k == word.as_str()) && match_words(rest, &key[1..])
        }
    }
}
