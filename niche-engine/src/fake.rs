//! In-memory source for engine tests.

use nichefinder_core::{
    CoreError, Post, PostSource, RedditApiError, SortMode, SubredditSuggestion, SuggestionPage,
    SuggestionSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn post(subreddit: &str, title: &str, score: i64) -> Post {
    Post {
        subreddit: subreddit.to_string(),
        title: title.to_string(),
        score,
        url: format!(
            "https://reddit.com/r/{}/comments/{}/",
            subreddit,
            title.to_lowercase().replace(' ', "_")
        ),
        sort_mode: SortMode::Top,
        thumbnail: None,
        created_at: None,
    }
}

pub fn suggestion(name: &str, adult: bool) -> SubredditSuggestion {
    SubredditSuggestion {
        name: name.to_string(),
        adult,
        title: None,
        subscribers: Some(1000),
    }
}

#[derive(Debug, Default)]
pub struct FakeSource {
    listings: HashMap<(String, SortMode), Result<Vec<Post>, RedditApiError>>,
    searches: HashMap<(String, String), Vec<Post>>,
    suggestions: HashMap<Option<String>, Result<SuggestionPage, RedditApiError>>,
    delays: HashMap<String, u64>,
    fetch_calls: AtomicUsize,
    suggest_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(mut self, subreddit: &str, sort: SortMode, posts: Vec<Post>) -> Self {
        let posts = posts
            .into_iter()
            .map(|p| Post { sort_mode: sort, ..p })
            .collect();
        self.listings.insert((subreddit.to_string(), sort), Ok(posts));
        self
    }

    pub fn with_error(mut self, subreddit: &str, sort: SortMode, error: RedditApiError) -> Self {
        self.listings.insert((subreddit.to_string(), sort), Err(error));
        self
    }

    pub fn with_search(mut self, subreddit: &str, term: &str, posts: Vec<Post>) -> Self {
        self.searches
            .insert((subreddit.to_string(), term.to_string()), posts);
        self
    }

    pub fn with_suggestions(mut self, cursor: Option<&str>, page: SuggestionPage) -> Self {
        self.suggestions.insert(cursor.map(str::to_string), Ok(page));
        self
    }

    pub fn with_suggestion_error(mut self, cursor: Option<&str>, error: RedditApiError) -> Self {
        self.suggestions.insert(cursor.map(str::to_string), Err(error));
        self
    }

    pub fn with_delay_ms(mut self, subreddit: &str, millis: u64) -> Self {
        self.delays.insert(subreddit.to_string(), millis);
        self
    }

    pub fn call_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn suggest_count(&self) -> usize {
        self.suggest_calls.load(Ordering::SeqCst)
    }
}

impl SuggestionSource for FakeSource {
    async fn suggest(&self, _query: &str, cursor: Option<&str>) -> Result<SuggestionPage, CoreError> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        match self.suggestions.get(&cursor.map(str::to_string)) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(e)) => Err(CoreError::RedditApi(e.clone())),
            None => Ok(SuggestionPage::empty()),
        }
    }
}

impl PostSource for FakeSource {
    async fn fetch_posts(
        &self,
        subreddit: &str,
        sort: SortMode,
        search_term: Option<&str>,
    ) -> Result<Vec<Post>, CoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(&millis) = self.delays.get(subreddit) {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        if let Some(term) = search_term {
            let key = (subreddit.to_string(), term.to_string());
            return Ok(self.searches.get(&key).cloned().unwrap_or_default());
        }

        match self.listings.get(&(subreddit.to_string(), sort)) {
            Some(Ok(posts)) => Ok(posts.clone()),
            Some(Err(e)) => Err(CoreError::RedditApi(e.clone())),
            None => Ok(Vec::new()),
        }
    }
}
