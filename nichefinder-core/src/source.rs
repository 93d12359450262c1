//! Seams between the pipeline and whatever talks to Reddit.

use std::future::Future;

use crate::error::CoreError;
use crate::types::{Post, SortMode, SuggestionPage};

/// Subreddit search by free-text topic.
pub trait SuggestionSource {
    /// One batch of suggestions for `query`, continuing from `cursor` when given.
    fn suggest(
        &self,
        query: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<SuggestionPage, CoreError>> + Send;
}

/// Post listings and in-subreddit search.
pub trait PostSource {
    /// Posts for one subreddit and sort mode; a search term switches the
    /// request from a plain listing to a search restricted to the subreddit.
    fn fetch_posts(
        &self,
        subreddit: &str,
        sort: SortMode,
        search_term: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Post>, CoreError>> + Send;
}
