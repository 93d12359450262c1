//! Keyword and phrase-pattern filtering of aggregated posts.

use std::collections::HashSet;

use crate::patterns::{PhrasePattern, PhrasePatternSet};
use crate::types::{
    normalize_subreddit, FilterConfiguration, PatternMode, Post, ResultOrder, SubredditCount,
};

/// Posts kept per phrase pattern in [`PatternMode::All`].
pub const PER_PATTERN_CAP: usize = 3;

/// Applies `config` to `posts` using the given pattern table.
///
/// In [`PatternMode::All`] the output is built pattern by pattern: each
/// pattern contributes at most [`PER_PATTERN_CAP`] posts, in input order. A
/// post already emitted for an earlier pattern is skipped and does not count
/// against a later pattern's cap.
pub fn filter_posts(
    posts: &[Post],
    config: &FilterConfiguration,
    patterns: &PhrasePatternSet,
) -> Vec<Post> {
    let keyword = config.normalized_keyword();

    let mut filtered = match &config.pattern_mode {
        PatternMode::None => posts
            .iter()
            .filter(|p| matches_keyword(&p.title, keyword.as_deref()))
            .cloned()
            .collect(),
        PatternMode::All => collect_per_pattern(posts, patterns, keyword.as_deref()),
        PatternMode::Phrase(phrase) => match patterns.get(phrase) {
            Some(pattern) => posts
                .iter()
                .filter(|p| {
                    pattern.is_match(&p.title) && matches_keyword(&p.title, keyword.as_deref())
                })
                .cloned()
                .collect(),
            None => {
                tracing::warn!("Unknown phrase pattern '{}', nothing matches", phrase);
                Vec::new()
            }
        },
    };

    if config.order == ResultOrder::ScoreDescending {
        sort_by_score(&mut filtered);
    }

    filtered
}

fn collect_per_pattern(
    posts: &[Post],
    patterns: &PhrasePatternSet,
    keyword: Option<&str>,
) -> Vec<Post> {
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut result = Vec::new();

    for pattern in patterns {
        let selected: Vec<&Post> = posts
            .iter()
            .filter(|p| !emitted.contains(p.url.as_str()))
            .filter(|p| pattern.is_match(&p.title) && matches_keyword(&p.title, keyword))
            .take(PER_PATTERN_CAP)
            .collect();

        tracing::debug!(
            "Pattern '{}' kept {} posts",
            pattern.phrase(),
            selected.len()
        );

        for post in selected {
            emitted.insert(post.url.as_str());
            result.push(post.clone());
        }
    }

    result
}

/// Case-insensitive substring test; a missing keyword matches everything.
///
/// `keyword` must already be lower-cased.
pub fn matches_keyword(title: &str, keyword: Option<&str>) -> bool {
    match keyword {
        Some(kw) => title.to_lowercase().contains(kw),
        None => true,
    }
}

/// Whether `title` qualifies for `pattern` under the given keyword.
pub fn matches_pattern(title: &str, pattern: &PhrasePattern, keyword: Option<&str>) -> bool {
    pattern.is_match(title) && matches_keyword(title, keyword)
}

/// Phrases from `patterns` that `title` matches, in table order.
pub fn matching_patterns<'a>(title: &'a str, patterns: &'a PhrasePatternSet) -> Vec<&'a str> {
    patterns.matching(title).collect()
}

/// Per-subreddit totals of `posts` under the pattern part of `config`.
///
/// [`PatternMode::None`] counts every post, `Phrase` counts posts matching
/// that phrase and `All` counts posts matching any phrase. The keyword and
/// the per-pattern cap do not apply. Output follows the order of
/// `subreddits`, zero counts included.
pub fn count_by_subreddit<S: AsRef<str>>(
    posts: &[Post],
    subreddits: &[S],
    config: &FilterConfiguration,
    patterns: &PhrasePatternSet,
) -> Vec<SubredditCount> {
    let counts_title = |title: &str| match &config.pattern_mode {
        PatternMode::None => true,
        PatternMode::All => patterns.iter().any(|p| p.is_match(title)),
        PatternMode::Phrase(phrase) => patterns.get(phrase).is_some_and(|p| p.is_match(title)),
    };

    subreddits
        .iter()
        .map(|s| {
            let subreddit = normalize_subreddit(s.as_ref());
            let count = posts
                .iter()
                .filter(|p| p.subreddit.eq_ignore_ascii_case(&subreddit))
                .filter(|p| counts_title(&p.title))
                .count();
            SubredditCount { subreddit, count }
        })
        .collect()
}

/// Stable descending sort by score.
pub fn sort_by_score(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.score.cmp(&a.score));
}
