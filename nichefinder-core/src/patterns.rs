//! Problem-phrase patterns.
//!
//! Each phrase ("is there an app that") compiles to a case-insensitive
//! expression that matches the phrase as whole words with any run of
//! whitespace between them. Patterns are compiled once and kept in a fixed,
//! ordered table; filtering never rebuilds a regex per post.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::CoreError;

/// Phrases that tend to show up in posts describing an unmet need.
pub const DEFAULT_PHRASES: &[&str] = &[
    "i wish there was",
    "i wish there were",
    "is there an app",
    "is there an app that",
    "is there a tool",
    "is there a way to",
    "does anyone know",
    "looking for a",
    "i need a",
    "why is there no",
    "someone should make",
    "would pay for",
    "frustrated with",
    "struggling with",
];

static DEFAULT_SET: LazyLock<PhrasePatternSet> = LazyLock::new(|| {
    PhrasePatternSet::new(DEFAULT_PHRASES.iter().copied())
        .expect("static phrase list compiles")
});

#[derive(Debug, Clone)]
pub struct PhrasePattern {
    phrase: String,
    regex: Regex,
}

impl PhrasePattern {
    pub fn compile(phrase: &str) -> Result<Self, CoreError> {
        let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
        if words.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "phrase pattern must contain at least one word".to_string(),
            });
        }

        let regex = Regex::new(&format!(r"(?i)\b{}\b", words.join(r"\s+")))?;
        Ok(Self {
            phrase: words_to_phrase(phrase),
            regex,
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn words_to_phrase(phrase: &str) -> String {
    phrase.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered, immutable table of compiled phrase patterns.
#[derive(Debug, Clone)]
pub struct PhrasePatternSet {
    patterns: Vec<PhrasePattern>,
}

impl PhrasePatternSet {
    pub fn new<I, S>(phrases: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = phrases
            .into_iter()
            .map(|p| PhrasePattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The built-in phrase table, compiled on first use.
    pub fn default_set() -> &'static PhrasePatternSet {
        &DEFAULT_SET
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PhrasePattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Looks a pattern up by its phrase, ignoring case and spacing.
    pub fn get(&self, phrase: &str) -> Option<&PhrasePattern> {
        let wanted = words_to_phrase(phrase).to_lowercase();
        self.patterns
            .iter()
            .find(|p| p.phrase.to_lowercase() == wanted)
    }

    /// Phrases matched by `text`, in table order.
    pub fn matching<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.patterns
            .iter()
            .filter(move |p| p.is_match(text))
            .map(PhrasePattern::phrase)
    }

    pub fn phrases(&self) -> Vec<&str> {
        self.patterns.iter().map(PhrasePattern::phrase).collect()
    }
}

impl<'a> IntoIterator for &'a PhrasePatternSet {
    type Item = &'a PhrasePattern;
    type IntoIter = std::slice::Iter<'a, PhrasePattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}
