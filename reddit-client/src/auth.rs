//! Application-only OAuth2 (client-credentials grant).
//!
//! One token is cached per provider and reused until it is within
//! [`REFRESH_BUFFER`] of expiring. The cache sits behind an async mutex, so
//! callers that find it stale while a refresh is in flight wait for that
//! refresh instead of starting their own.

use nichefinder_core::{ConfigError, CoreError, RedditApiError};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub const REFRESH_BUFFER: Duration = Duration::from_secs(10);
/// Used when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Source of wall-clock time for token expiry checks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: SystemTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    /// True once `now` is inside the refresh buffer before expiry.
    pub fn needs_refresh(&self, now: SystemTime, buffer: Duration) -> bool {
        now + buffer >= self.expires_at
    }
}

#[derive(Debug)]
pub struct TokenProvider {
    oauth: BasicClient,
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
    refresh_buffer: Duration,
    cached: Mutex<Option<RedditToken>>,
}

impl TokenProvider {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        http_client: reqwest::Client,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        let token_url = TokenUrl::new(token_url.to_string()).map_err(|e| ConfigError::InvalidValue {
            field: "reddit.token_url".to_string(),
            value: format!("{} ({})", token_url, e),
        })?;
        // The grant never visits the authorize endpoint, but the client requires one.
        let auth_url = AuthUrl::new("https://www.reddit.com/api/v1/authorize".to_string()).map_err(
            |e| CoreError::Internal {
                message: format!("authorize URL: {}", e),
            },
        )?;

        let oauth = BasicClient::new(
            ClientId::new(client_id.to_string()),
            Some(ClientSecret::new(client_secret.to_string())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            oauth,
            http_client,
            clock,
            refresh_buffer: REFRESH_BUFFER,
            cached: Mutex::new(None),
        })
    }

    /// A bearer token valid for at least the refresh buffer.
    pub async fn get_valid_token(&self) -> Result<String, CoreError> {
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh(now, self.refresh_buffer) {
                return Ok(token.access_token.clone());
            }
            debug!("Cached access token is about to expire, refreshing");
        }

        let token = self.request_token(now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next call fetches a fresh one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    pub async fn cached_token(&self) -> Option<RedditToken> {
        self.cached.lock().await.clone()
    }

    async fn request_token(&self, now: SystemTime) -> Result<RedditToken, CoreError> {
        info!("Requesting application access token");

        let response = self
            .oauth
            .exchange_client_credentials()
            .request_async(|request| self.send(request))
            .await
            .map_err(|e| {
                let reason = match e {
                    RequestTokenError::ServerResponse(resp) => resp.to_string(),
                    RequestTokenError::Request(e) => format!("token request failed: {}", e),
                    RequestTokenError::Parse(e, _) => format!("unreadable token response: {}", e),
                    RequestTokenError::Other(message) => message,
                };
                error!("Token exchange failed: {}", reason);
                CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
            })?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.as_str().to_string()).collect())
            .unwrap_or_default();

        debug!("Access token valid for {:?}", lifetime);
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: now + lifetime,
            scope,
        })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
        let response = self
            .http_client
            .request(request.method, request.url.as_str())
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status_code = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiration() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_640_995_200);
        let token = RedditToken {
            access_token: "token".to_string(),
            expires_at: now + Duration::from_secs(60),
            scope: vec!["*".to_string()],
        };

        assert!(!token.needs_refresh(now, REFRESH_BUFFER));
        assert!(!token.needs_refresh(now + Duration::from_secs(49), REFRESH_BUFFER));
        assert!(token.needs_refresh(now + Duration::from_secs(50), REFRESH_BUFFER));
        assert!(token.needs_refresh(now + Duration::from_secs(120), REFRESH_BUFFER));
    }

    #[test]
    fn test_manual_clock() {
        let start = SystemTime::UNIX_EPOCH;
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), start + Duration::from_secs(5));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_token_serialization() {
        let token = RedditToken {
            access_token: "test_access_token".to_string(),
            expires_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_640_995_200),
            scope: vec!["read".to_string()],
        };

        let serialized = serde_json::to_string(&token).unwrap();
        let deserialized: RedditToken = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.access_token, token.access_token);
        assert_eq!(deserialized.expires_at, token.expires_at);
        assert_eq!(deserialized.scope, token.scope);
    }

    #[test]
    fn test_bad_token_url_is_config_error() {
        let result = TokenProvider::new(
            "id",
            "secret",
            "not a url",
            reqwest::Client::new(),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
