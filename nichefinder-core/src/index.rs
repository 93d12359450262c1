//! Offline subreddit index and fuzzy topic matching against it.
//!
//! The index is a JSON array of subreddit metadata collected from Reddit's
//! subreddit directory. Matching scores a topic against each entry's title
//! and description with the Sørensen-Dice coefficient over character
//! bigrams.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConfigError, CoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedSubreddit {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subscribers: Option<u64>,
    #[serde(default)]
    pub over18: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_lang() -> String {
    "en".to_string()
}

impl IndexedSubreddit {
    /// Lower-cased `title description`, the text topics are matched against.
    pub fn match_text(&self) -> String {
        format!(
            "{} {}",
            self.title.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexMatch {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubredditIndex {
    entries: Vec<IndexedSubreddit>,
}

impl SubredditIndex {
    pub fn new(entries: Vec<IndexedSubreddit>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[IndexedSubreddit] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path)?;
        let index: Self = serde_json::from_str(&raw)?;
        tracing::debug!("Loaded {} indexed subreddits from {}", index.len(), path.display());
        Ok(index)
    }

    /// Writes the index as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("Wrote {} entries to {}", self.len(), path.display());
        Ok(())
    }

    /// The `limit` entries most similar to `topic`, best first. Ties keep
    /// index order.
    pub fn best_matches(&self, topic: &str, limit: usize) -> Result<Vec<IndexMatch>, CoreError> {
        let topic = topic.trim().to_lowercase();
        if topic.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "topic is required".to_string(),
            });
        }

        let mut matches: Vec<IndexMatch> = self
            .entries
            .iter()
            .map(|entry| IndexMatch {
                name: entry.name.clone(),
                title: entry.title.clone(),
                description: entry.description.clone(),
                score: similarity(&topic, &entry.match_text()),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        Ok(matches)
    }
}

/// Dice coefficient of the character bigrams of `a` and `b`, whitespace
/// ignored. 1.0 for identical strings, 0.0 when either is shorter than two
/// characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b: Vec<char> = b.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return 1.0;
    }
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::new();
    for pair in a.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut shared = 0usize;
    for pair in b.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    (2 * shared) as f64 / (a.len() + b.len() - 2) as f64
}
