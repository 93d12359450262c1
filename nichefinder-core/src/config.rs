//! Application configuration.
//!
//! Read from an optional TOML file, then overridden by environment variables
//! (`REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `REDDIT_USER_AGENT`), then
//! validated. Every field has a default, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, CoreError};
use crate::pagination::{POSTS_PER_PAGE, SUGGESTION_PAGE_SIZE};
use crate::patterns::PhrasePatternSet;
use crate::types::SortMode;

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

const TIME_WINDOWS: [&str; 6] = ["hour", "day", "week", "month", "year", "all"];
/// Reddit caps `limit` at 100 for listings and search.
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub search: SearchConfig,
    pub paging: PagingConfig,
    pub index: IndexConfig,
    /// Replaces the built-in phrase table when set.
    pub patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: String,
    pub public_base_url: String,
    pub oauth_base_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
    /// Fail instead of falling back to anonymous access when credentials are missing.
    pub require_auth: bool,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: "nichefinder/0.1 (subreddit niche finder)".to_string(),
            public_base_url: "https://www.reddit.com".to_string(),
            oauth_base_url: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            timeout_secs: 30,
            require_auth: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub post_limit: u32,
    pub suggestion_limit: u32,
    pub time_window: String,
    /// Fixed pause between outbound requests; 0 disables pacing.
    pub request_delay_ms: u64,
    /// Fetches allowed in flight during aggregation; 1 keeps them sequential.
    pub max_in_flight: usize,
    pub default_sorts: Vec<SortMode>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            post_limit: 50,
            suggestion_limit: 100,
            time_window: "all".to_string(),
            request_delay_ms: 1000,
            max_in_flight: 1,
            default_sorts: vec![SortMode::Top],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub suggestion_page_size: usize,
    pub posts_per_page: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            suggestion_page_size: SUGGESTION_PAGE_SIZE,
            posts_per_page: POSTS_PER_PAGE,
        }
    }
}

/// Offline subreddit index used for topic matching without a live search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
    /// Entries to collect when building.
    pub target_size: usize,
    pub match_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/subreddit_index.json"),
            target_size: 5000,
            match_limit: 20,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads the file at `path`, applies environment overrides and validates.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup; blank values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = get(ENV_CLIENT_ID) {
            self.reddit.client_id = Some(id);
        }
        if let Some(secret) = get(ENV_CLIENT_SECRET) {
            self.reddit.client_secret = Some(secret);
        }
        if let Some(agent) = get(ENV_USER_AGENT) {
            self.reddit.user_agent = agent;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.user_agent".to_string(),
            });
        }
        for (field, value) in [
            ("reddit.public_base_url", &self.reddit.public_base_url),
            ("reddit.oauth_base_url", &self.reddit.oauth_base_url),
            ("reddit.token_url", &self.reddit.token_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }
        check_limit("search.post_limit", self.search.post_limit)?;
        check_limit("search.suggestion_limit", self.search.suggestion_limit)?;
        if !TIME_WINDOWS.contains(&self.search.time_window.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "search.time_window".to_string(),
                value: self.search.time_window.clone(),
            });
        }
        if self.search.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_in_flight".to_string(),
                value: "0".to_string(),
            });
        }
        if self.paging.suggestion_page_size == 0 || self.paging.posts_per_page == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "page sizes must be at least 1".to_string(),
            });
        }
        if self.index.target_size == 0 || self.index.match_limit == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "index.target_size and index.match_limit must be at least 1".to_string(),
            });
        }
        if self.reddit.require_auth {
            self.credentials()?;
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_ok()
    }

    /// Client id and secret for the client-credentials grant.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let id = self
            .reddit
            .client_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: ENV_CLIENT_ID.to_string(),
            })?;
        let secret = self
            .reddit
            .client_secret
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: ENV_CLIENT_SECRET.to_string(),
            })?;
        Ok((id, secret))
    }

    /// The configured phrase table, or the built-in one.
    pub fn pattern_set(&self) -> Result<PhrasePatternSet, CoreError> {
        match &self.patterns {
            Some(phrases) => PhrasePatternSet::new(phrases),
            None => Ok(PhrasePatternSet::default_set().clone()),
        }
    }
}

fn check_limit(field: &str, value: u32) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_LIMIT {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.search.post_limit, 50);
        assert_eq!(config.search.default_sorts, vec![SortMode::Top]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let raw = r#"
            patterns = ["i wish there was"]

            [search]
            post_limit = 25
            default_sorts = ["hot", "new"]

            [reddit]
            client_id = "abc"
        "#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.search.post_limit, 25);
        assert_eq!(config.search.time_window, "all");
        assert_eq!(config.search.default_sorts, vec![SortMode::Hot, SortMode::New]);
        assert_eq!(config.reddit.client_id.as_deref(), Some("abc"));
        assert_eq!(config.pattern_set().unwrap().len(), 1);
    }

    #[test]
    fn test_index_section() {
        let raw = r#"
            [index]
            path = "cache/subs.json"
            match_limit = 5
        "#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.index.path, PathBuf::from("cache/subs.json"));
        assert_eq!(config.index.match_limit, 5);
        assert_eq!(config.index.target_size, 5000);

        let mut config = AppConfig::default();
        config.index.match_limit = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let err = AppConfig::from_toml_str("[search\npost_limit = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "id-from-env"),
            (ENV_CLIENT_SECRET, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.reddit.client_id.as_deref(), Some("id-from-env"));
        assert_eq!(config.reddit.client_secret, None);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.search.post_limit = 500;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let mut config = AppConfig::default();
        config.search.time_window = "decade".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.search.max_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_auth_without_credentials_fails() {
        let mut config = AppConfig::default();
        config.reddit.require_auth = true;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingEnvironmentVariable { ref var_name } if var_name == ENV_CLIENT_ID
        ));

        config.reddit.client_id = Some("id".to_string());
        config.reddit.client_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.credentials().unwrap(), ("id", "secret"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = AppConfig::load(Path::new("/definitely/not/here/nichefinder.toml")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
