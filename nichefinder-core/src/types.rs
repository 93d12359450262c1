use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Which listing of a subreddit to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Hot,
    New,
    Top,
}

impl SortMode {
    pub const ALL: [SortMode; 3] = [SortMode::Hot, SortMode::New, SortMode::Top];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown sort mode '{}', expected hot, new or top", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubredditSuggestion {
    pub name: String,
    pub adult: bool,
    pub title: Option<String>,
    pub subscribers: Option<u64>,
}

/// One batch of suggestions plus the cursor for the next batch, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionPage {
    pub items: Vec<SubredditSuggestion>,
    pub next_cursor: Option<String>,
}

impl SuggestionPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub subreddit: String,
    pub title: String,
    pub score: i64,
    /// Canonical `https://reddit.com{permalink}` address, unique per post.
    pub url: String,
    pub sort_mode: SortMode,
    pub thumbnail: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Subreddits the user chose to aggregate over.
///
/// Names are stored lower-cased; adding a name twice is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedSubreddits {
    names: BTreeSet<String>,
}

impl TrackedSubreddits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the name was not tracked before.
    pub fn add(&mut self, name: &str) -> bool {
        let normalized = normalize_subreddit(name);
        if normalized.is_empty() {
            return false;
        }
        self.names.insert(normalized)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(&normalize_subreddit(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_subreddit(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

impl<S: AsRef<str>> FromIterator<S> for TrackedSubreddits {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tracked = TrackedSubreddits::new();
        for name in iter {
            tracked.add(name.as_ref());
        }
        tracked
    }
}

/// Lower-cases a subreddit name and strips an optional `r/` prefix.
pub fn normalize_subreddit(name: &str) -> String {
    let trimmed = name.trim();
    let stripped = trimmed
        .strip_prefix("/r/")
        .or_else(|| trimmed.strip_prefix("r/"))
        .unwrap_or(trimmed);
    stripped.trim_matches('/').to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    /// Keyword filter only.
    #[default]
    None,
    /// Every phrase pattern, capped per pattern.
    All,
    /// A single phrase from the pattern set, uncapped.
    Phrase(String),
}

impl FromStr for PatternMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(PatternMode::None),
            "all" => Ok(PatternMode::All),
            _ => Ok(PatternMode::Phrase(trimmed.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    #[default]
    AsFiltered,
    ScoreDescending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfiguration {
    pub keyword: String,
    pub pattern_mode: PatternMode,
    #[serde(default)]
    pub order: ResultOrder,
}

impl FilterConfiguration {
    pub fn new(keyword: impl Into<String>, pattern_mode: PatternMode) -> Self {
        Self {
            keyword: keyword.into(),
            pattern_mode,
            order: ResultOrder::AsFiltered,
        }
    }

    pub fn with_order(mut self, order: ResultOrder) -> Self {
        self.order = order;
        self
    }

    /// Lower-cased, trimmed keyword, or `None` when the keyword is blank.
    pub fn normalized_keyword(&self) -> Option<String> {
        let kw = self.keyword.trim();
        if kw.is_empty() {
            None
        } else {
            Some(kw.to_lowercase())
        }
    }
}

/// A fetch that failed during aggregation and contributed no posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub subreddit: String,
    pub sort_mode: SortMode,
    pub search_term: Option<String>,
    pub error_code: String,
    pub message: String,
}

/// Deduplicated posts from one aggregation run plus the fetches that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub posts: Vec<Post>,
    pub failures: Vec<FetchFailure>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Number of fetched posts from one subreddit that match the active pattern
/// selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubredditCount {
    pub subreddit: String,
    pub count: usize,
}
