use nichefinder_core::{ConfigError, CoreError, ErrorExt, ErrorReporter, RedditApiError};

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "reddit.user_agent".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let input_error = CoreError::InvalidInput {
        message: "empty subreddit".to_string(),
    };
    assert_eq!(input_error.error_code(), "INVALID_INPUT");

    let upstream = RedditApiError::UpstreamStatus {
        status_code: 418,
        body: "teapot".to_string(),
    };
    assert_eq!(upstream.error_code(), "REDDIT_UPSTREAM_STATUS");
}

#[test]
fn test_fatal_errors() {
    let auth_error = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: "bad secret".to_string(),
    });
    assert!(auth_error.is_fatal());

    let missing_credentials = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "REDDIT_CLIENT_ID".to_string(),
    });
    assert!(missing_credentials.is_fatal());

    let rate_limited = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(!rate_limited.is_fatal());

    let not_found = CoreError::RedditApi(RedditApiError::SubredditNotFound {
        subreddit: "nope".to_string(),
    });
    assert!(!not_found.is_fatal());

    // a rejected token only fails the request it was sent with
    let rejected = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert!(!rejected.is_fatal());
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 30 });
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("30 seconds"));

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "REDDIT_CLIENT_SECRET".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("REDDIT_CLIENT_SECRET"));
}

#[test]
fn test_upstream_status_display_includes_body() {
    let error = RedditApiError::UpstreamStatus {
        status_code: 400,
        body: "{\"error\": \"bad request\"}".to_string(),
    };
    let rendered = error.to_string();
    assert!(rendered.contains("400"));
    assert!(rendered.contains("bad request"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(false);
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);

    // only checks the reporting paths don't panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
