use crate::metrics::{MetricsCollector, RequestMetrics};
use crate::pacing::RequestPacer;
use crate::thumbnail::resolve_thumbnail;
use chrono::{DateTime, Utc};
use nichefinder_core::{
    ConfigError, CoreError, IndexedSubreddit, Post, RedditApiError, SortMode, SubredditSuggestion,
};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Upstream error bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 500;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    pub subreddit: String,
    pub permalink: String,
    pub url: Option<String>,
    pub score: i64,
    pub num_comments: u32,
    pub over_18: bool,
    pub created_utc: Option<f64>,
    pub thumbnail: Option<String>,
    pub post_hint: Option<String>,
    pub url_overridden_by_dest: Option<String>,
    pub preview: Option<RedditPreview>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditPreview {
    pub images: Vec<RedditPreviewImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditPreviewImage {
    pub source: Option<RedditImageSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditImageSource {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSubredditData {
    pub display_name: String,
    pub title: Option<String>,
    pub public_description: Option<String>,
    pub subscribers: Option<u64>,
    pub over18: Option<bool>,
    pub lang: Option<String>,
}

impl RedditPostData {
    /// Converts listing data into a [`Post`]; children without a permalink
    /// or title are not posts and yield `None`.
    pub fn into_post(self, sort_mode: SortMode) -> Option<Post> {
        if self.permalink.is_empty() || self.title.is_empty() {
            return None;
        }
        let thumbnail = resolve_thumbnail(&self);
        let created_at = self
            .created_utc
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));

        Some(Post {
            subreddit: self.subreddit.to_lowercase(),
            title: self.title,
            score: self.score,
            url: format!("https://reddit.com{}", self.permalink),
            sort_mode,
            thumbnail,
            created_at,
        })
    }
}

impl From<RedditSubredditData> for SubredditSuggestion {
    fn from(data: RedditSubredditData) -> Self {
        Self {
            name: data.display_name,
            adult: data.over18.unwrap_or(false),
            title: data.title.filter(|t| !t.trim().is_empty()),
            subscribers: data.subscribers,
        }
    }
}

impl From<RedditSubredditData> for IndexedSubreddit {
    fn from(data: RedditSubredditData) -> Self {
        Self {
            name: data.display_name,
            title: data.title,
            description: data.public_description,
            subscribers: data.subscribers,
            over18: data.over18.unwrap_or(false),
            lang: data
                .lang
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "en".to_string()),
        }
    }
}

/// Builds `base/seg1/seg2/...`, percent-encoding each segment.
pub fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, CoreError> {
    let mut url = Url::parse(base).map_err(|e| ConfigError::InvalidValue {
        field: "base_url".to_string(),
        value: format!("{} ({})", base, e),
    })?;
    url.path_segments_mut()
        .map_err(|_| ConfigError::InvalidValue {
            field: "base_url".to_string(),
            value: base.to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Rejects names Reddit would never route, before any request is made.
pub fn validate_subreddit(subreddit: &str) -> Result<(), CoreError> {
    if subreddit.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "subreddit name must not be empty".to_string(),
        });
    }
    if !subreddit
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+')
    {
        return Err(CoreError::InvalidInput {
            message: format!("'{}' is not a valid subreddit name", subreddit),
        });
    }
    Ok(())
}

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    pacer: Arc<RequestPacer>,
    metrics: Arc<MetricsCollector>,
}

impl RedditApiClient {
    pub fn new(user_agent: String, timeout: Duration, request_delay: Duration) -> Result<Self, CoreError> {
        // Reddit answers unknown subreddits with a redirect to search; keep it visible.
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            http_client,
            pacer: Arc::new(RequestPacer::new(request_delay)),
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Issues one GET, mapping non-success statuses to typed errors.
    ///
    /// `subreddit` names the subreddit the request is about, if any, so a
    /// redirect or 404 can be reported as a missing subreddit.
    pub async fn make_request(
        &self,
        url: Url,
        access_token: Option<&str>,
        subreddit: Option<&str>,
    ) -> Result<Response, CoreError> {
        let endpoint = url.path().to_string();
        let start_time = Instant::now();
        let mut status_code = None;
        let mut error_type = None;
        let mut rate_limited = false;

        let waited = self.pacer.wait_turn().await;
        if !waited.is_zero() {
            debug!("Paced {:?} before GET {}", waited, endpoint);
        }

        let mut request_builder = self.http_client.get(url);
        if let Some(token) = access_token {
            request_builder = request_builder.bearer_auth(token);
        }

        info!("Making Reddit API request: GET {}", endpoint);
        let outcome = match request_builder.send().await {
            Ok(response) => {
                let status = response.status();
                status_code = Some(status.as_u16());

                if status.is_success() {
                    debug!("Request successful: {} for {}", status, endpoint);
                    Ok(response)
                } else {
                    error!("Request failed with status: {} for {}", status, endpoint);
                    let err = Self::status_error(response, &endpoint, subreddit).await;
                    if let CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }) = err {
                        rate_limited = true;
                    }
                    error_type = Some(status_label(status).to_string());
                    Err(err)
                }
            }
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    error_type = Some("timeout".to_string());
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    error_type = Some("network_error".to_string());
                    Err(CoreError::Network(e))
                }
            }
        };

        self.metrics
            .record_request(RequestMetrics {
                endpoint,
                status_code,
                response_time: start_time.elapsed(),
                success: outcome.is_ok(),
                rate_limited,
                error_type,
            })
            .await;

        outcome
    }

    async fn status_error(response: Response, endpoint: &str, subreddit: Option<&str>) -> CoreError {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!("Rate limited, retry after {} seconds", retry_after);
            return CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after });
        }

        if let Some(name) = subreddit {
            if status.is_redirection() || status == StatusCode::NOT_FOUND {
                return CoreError::RedditApi(RedditApiError::SubredditNotFound {
                    subreddit: name.to_string(),
                });
            }
        }

        match status {
            StatusCode::UNAUTHORIZED => CoreError::RedditApi(RedditApiError::InvalidToken),
            StatusCode::FORBIDDEN => CoreError::RedditApi(RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            }),
            s if s.is_server_error() => CoreError::RedditApi(RedditApiError::ServerError {
                status_code: s.as_u16(),
            }),
            s => {
                let body = response.text().await.unwrap_or_default();
                CoreError::RedditApi(RedditApiError::UpstreamStatus {
                    status_code: s.as_u16(),
                    body: truncate_body(&body),
                })
            }
        }
    }

    /// Reads the body and decodes it; garbage is an `InvalidResponse`, never
    /// an empty listing.
    async fn read_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T, CoreError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse {}: {}", context, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse {}: {}", context, e),
            })
        })
    }

    pub async fn search_subreddits(
        &self,
        base_url: &str,
        access_token: Option<&str>,
        query: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditSubredditData>, CoreError> {
        let mut url = endpoint_url(base_url, &["subreddits", "search.json"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("limit", &limit.to_string());
            if let Some(cursor) = after {
                pairs.append_pair("after", cursor);
            }
        }

        let response = self.make_request(url, access_token, None).await?;
        let listing: RedditListing<RedditSubredditData> =
            Self::read_json(response, "subreddit search").await?;

        info!(
            "Retrieved {} subreddit suggestions for '{}'",
            listing.data.children.len(),
            query
        );
        Ok(listing)
    }

    /// One page of Reddit's popular-subreddit directory.
    pub async fn list_popular_subreddits(
        &self,
        base_url: &str,
        access_token: Option<&str>,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditSubredditData>, CoreError> {
        let mut url = endpoint_url(base_url, &["subreddits", "popular.json"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &limit.to_string());
            if let Some(cursor) = after {
                pairs.append_pair("after", cursor);
            }
        }

        let response = self.make_request(url, access_token, None).await?;
        let listing: RedditListing<RedditSubredditData> =
            Self::read_json(response, "subreddit directory").await?;

        debug!(
            "Retrieved {} directory entries",
            listing.data.children.len()
        );
        Ok(listing)
    }

    pub async fn get_subreddit_posts(
        &self,
        base_url: &str,
        access_token: Option<&str>,
        subreddit: &str,
        sort: SortMode,
        limit: u32,
        time_window: &str,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        validate_subreddit(subreddit)?;
        let listing_file = format!("{}.json", sort.as_str());
        let mut url = endpoint_url(base_url, &["r", subreddit, &listing_file])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("t", time_window);

        let response = self.make_request(url, access_token, Some(subreddit)).await?;
        let listing: RedditListing<RedditPostData> =
            Self::read_json(response, &format!("posts for r/{}", subreddit)).await?;

        info!(
            "Retrieved {} {} posts from r/{}",
            listing.data.children.len(),
            sort,
            subreddit
        );
        Ok(listing)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn search_subreddit_posts(
        &self,
        base_url: &str,
        access_token: Option<&str>,
        subreddit: &str,
        query: &str,
        sort: SortMode,
        limit: u32,
        time_window: &str,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        validate_subreddit(subreddit)?;
        let mut url = endpoint_url(base_url, &["r", subreddit, "search.json"])?;
        url.query_pairs_mut()
            .append_pair("restrict_sr", "true")
            .append_pair("sort", sort.as_str())
            .append_pair("t", time_window)
            .append_pair("limit", &limit.to_string())
            .append_pair("q", query);

        let response = self.make_request(url, access_token, Some(subreddit)).await?;
        let listing: RedditListing<RedditPostData> =
            Self::read_json(response, &format!("search results for r/{}", subreddit)).await?;

        info!(
            "Search '{}' in r/{} returned {} posts",
            query,
            subreddit,
            listing.data.children.len()
        );
        Ok(listing)
    }

    pub async fn get_metrics(&self) -> crate::metrics::ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }
}

fn status_label(status: StatusCode) -> &'static str {
    match status.as_u16() {
        429 => "rate_limited",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        300..=399 => "redirect",
        500..=599 => "server_error",
        _ => "client_error",
    }
}
