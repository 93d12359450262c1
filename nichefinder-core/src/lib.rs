pub mod config;
pub mod dedup;
pub mod error;
pub mod error_utils;
pub mod filter;
pub mod index;
pub mod pagination;
pub mod patterns;
pub mod source;
pub mod types;

pub use config::AppConfig;
pub use dedup::dedup_by_url;
pub use error::*;
pub use error_utils::*;
pub use filter::{
    count_by_subreddit, filter_posts, matches_pattern, matching_patterns, PER_PATTERN_CAP,
};
pub use index::{similarity, IndexMatch, IndexedSubreddit, SubredditIndex};
pub use pagination::{page, page_count, Paginator};
pub use patterns::{PhrasePattern, PhrasePatternSet};
pub use source::{PostSource, SuggestionSource};
pub use types::*;
