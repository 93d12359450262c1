pub mod api;
pub mod auth;
pub mod metrics;
pub mod pacing;
pub mod thumbnail;


pub use api::RedditApiClient;
pub use auth::{Clock, ManualClock, RedditToken, SystemClock, TokenProvider};
pub use metrics::ApiMetrics;

use nichefinder_core::{
    AppConfig, CoreError, ErrorExt, IndexedSubreddit, Post, PostSource, RedditApiError, SortMode,
    SubredditIndex, SuggestionPage, SuggestionSource, SubredditSuggestion,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Reddit's page size cap for the subreddit directory.
const DIRECTORY_PAGE_LIMIT: u32 = 100;

/// Reddit access for suggestions and post fetching.
///
/// Authenticates with the client-credentials grant when an id and secret are
/// configured, and reads the public JSON endpoints otherwise.
#[derive(Debug)]
pub struct RedditClient {
    api: RedditApiClient,
    token_provider: Option<TokenProvider>,
    public_base_url: String,
    oauth_base_url: String,
    post_limit: u32,
    suggestion_limit: u32,
    time_window: String,
}

impl RedditClient {
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, CoreError> {
        config.validate()?;

        let api = RedditApiClient::new(
            config.reddit.user_agent.clone(),
            Duration::from_secs(config.reddit.timeout_secs),
            Duration::from_millis(config.search.request_delay_ms),
        )?;

        let token_provider = match config.credentials() {
            Ok((client_id, client_secret)) => Some(TokenProvider::new(
                client_id,
                client_secret,
                &config.reddit.token_url,
                api.http_client().clone(),
                clock,
            )?),
            Err(_) => {
                info!("No Reddit credentials configured, using public endpoints");
                None
            }
        };

        Ok(Self {
            api,
            token_provider,
            public_base_url: config.reddit.public_base_url.clone(),
            oauth_base_url: config.reddit.oauth_base_url.clone(),
            post_limit: config.search.post_limit,
            suggestion_limit: config.search.suggestion_limit,
            time_window: config.search.time_window.clone(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token_provider.is_some()
    }

    pub fn token_provider(&self) -> Option<&TokenProvider> {
        self.token_provider.as_ref()
    }

    /// Base URL and bearer token for the next request.
    async fn access(&self) -> Result<(&str, Option<String>), CoreError> {
        match &self.token_provider {
            Some(provider) => {
                let token = provider.get_valid_token().await?;
                Ok((self.oauth_base_url.as_str(), Some(token)))
            }
            None => Ok((self.public_base_url.as_str(), None)),
        }
    }

    /// A rejected token is dropped so the next call re-authenticates.
    async fn note_failure(&self, error: &CoreError) {
        if let (CoreError::RedditApi(RedditApiError::InvalidToken), Some(provider)) =
            (error, &self.token_provider)
        {
            warn!("Access token rejected, discarding cached token");
            provider.invalidate().await;
        }
    }

    async fn fetch_suggestions(
        &self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<SuggestionPage, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SuggestionPage::empty());
        }

        let (base_url, token) = self.access().await?;
        let listing = self
            .api
            .search_subreddits(base_url, token.as_deref(), query, self.suggestion_limit, cursor)
            .await?;

        let items: Vec<SubredditSuggestion> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|data| !data.display_name.is_empty())
            .map(SubredditSuggestion::from)
            .collect();

        Ok(SuggestionPage {
            items,
            next_cursor: listing.data.after,
        })
    }

    async fn fetch_subreddit_posts(
        &self,
        subreddit: &str,
        sort: SortMode,
        search_term: Option<&str>,
    ) -> Result<Vec<Post>, CoreError> {
        let subreddit = nichefinder_core::normalize_subreddit(subreddit);
        api::validate_subreddit(&subreddit)?;
        let (base_url, token) = self.access().await?;
        let token = token.as_deref();

        let listing = match search_term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => {
                self.api
                    .search_subreddit_posts(
                        base_url,
                        token,
                        &subreddit,
                        term,
                        sort,
                        self.post_limit,
                        &self.time_window,
                    )
                    .await?
            }
            None => {
                self.api
                    .get_subreddit_posts(
                        base_url,
                        token,
                        &subreddit,
                        sort,
                        self.post_limit,
                        &self.time_window,
                    )
                    .await?
            }
        };

        Ok(listing
            .data
            .children
            .into_iter()
            .filter_map(|child| child.data.into_post(sort))
            .collect())
    }

    /// Like [`SuggestionSource::suggest`], but logs failures and returns an
    /// empty page instead.
    pub async fn suggest_or_empty(&self, query: &str, cursor: Option<&str>) -> SuggestionPage {
        match self.suggest(query, cursor).await {
            Ok(page) => page,
            Err(e) => {
                e.log_warn();
                SuggestionPage::empty()
            }
        }
    }

    /// Like [`PostSource::fetch_posts`], but logs failures and returns no posts.
    pub async fn fetch_posts_or_empty(
        &self,
        subreddit: &str,
        sort: SortMode,
        search_term: Option<&str>,
    ) -> Vec<Post> {
        match self.fetch_posts(subreddit, sort, search_term).await {
            Ok(posts) => posts,
            Err(e) => {
                e.log_warn();
                Vec::new()
            }
        }
    }

    /// Walks the popular-subreddit directory until `target_size` entries are
    /// collected or the directory ends.
    ///
    /// A non-fatal error stops the walk and keeps what was collected so far.
    pub async fn build_index(&self, target_size: usize) -> Result<SubredditIndex, CoreError> {
        let mut entries: Vec<IndexedSubreddit> = Vec::new();
        let mut cursor: Option<String> = None;

        while entries.len() < target_size {
            let page = match self.directory_page(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "Directory walk stopped after {} entries: {}",
                        entries.len(),
                        e
                    );
                    break;
                }
            };

            let fetched = page.data.children.len();
            entries.extend(
                page.data
                    .children
                    .into_iter()
                    .map(|child| child.data)
                    .filter(|data| !data.display_name.is_empty())
                    .map(IndexedSubreddit::from),
            );
            info!("Collected {} subreddits", entries.len());

            cursor = page.data.after;
            if cursor.is_none() || fetched == 0 {
                break;
            }
        }

        entries.truncate(target_size);
        Ok(SubredditIndex::new(entries))
    }

    async fn directory_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<api::RedditListing<api::RedditSubredditData>, CoreError> {
        let result = match self.access().await {
            Ok((base_url, token)) => {
                self.api
                    .list_popular_subreddits(base_url, token.as_deref(), DIRECTORY_PAGE_LIMIT, cursor)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.note_failure(e).await;
        }
        result
    }

    pub async fn get_api_metrics(&self) -> ApiMetrics {
        self.api.get_metrics().await
    }

    pub async fn reset_api_metrics(&self) {
        self.api.reset_metrics().await;
    }
}

impl SuggestionSource for RedditClient {
    async fn suggest(&self, query: &str, cursor: Option<&str>) -> Result<SuggestionPage, CoreError> {
        let result = self.fetch_suggestions(query, cursor).await;
        if let Err(e) = &result {
            self.note_failure(e).await;
        }
        result
    }
}

impl PostSource for RedditClient {
    async fn fetch_posts(
        &self,
        subreddit: &str,
        sort: SortMode,
        search_term: Option<&str>,
    ) -> Result<Vec<Post>, CoreError> {
        let result = self.fetch_subreddit_posts(subreddit, sort, search_term).await;
        if let Err(e) = &result {
            self.note_failure(e).await;
        }
        result
    }
}
