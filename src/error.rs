use crate::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TweetStashError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Twitter API error: {0}")]
    Twitter(#[from] TwitterError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Application shutdown requested")]
    Shutdown,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[derive(Error, Debug, Clone)]
pub enum TwitterError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User not found: {username}")]
    UserNotFound { username: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create data directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Cache file {path} is not valid JSON: {source}")]
    InvalidCache {
        path: String,
        source: serde_json::Error,
    },
}

/// Error recovery strategies for different failure scenarios
pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Determine if an error is recoverable and suggest retry strategy
    pub fn is_recoverable(error: &TweetStashError) -> bool {
        match error {
            // Network errors are generally recoverable
            TweetStashError::Network(_) => true,

            // Specific Twitter API errors
            TweetStashError::Twitter(twitter_error) => match twitter_error {
                TwitterError::RateLimitExceeded { .. } => true,
                TwitterError::ApiRequestFailed(_) => true,
                TwitterError::AuthenticationFailed(_) => false,
                TwitterError::InvalidResponse(_) => false,
                TwitterError::InvalidInput(_) => false,
                TwitterError::UserNotFound { .. } => false,
            },

            // Configuration errors are not recoverable at runtime
            TweetStashError::Config(_) => false,

            // Other errors
            TweetStashError::Storage(_) => false,
            TweetStashError::Io(_) => true, // May be temporary
            TweetStashError::Json(_) => false,
            TweetStashError::Url(_) => false,
            TweetStashError::Shutdown => false,
            TweetStashError::InvalidData(_) => false,
        }
    }

    /// Get the recommended retry delay in seconds for recoverable errors
    pub fn retry_delay(error: &TweetStashError, attempt: u32) -> u64 {
        match error {
            TweetStashError::Twitter(twitter_error) => match twitter_error {
                // Rate limit errors should respect the exact retry_after value
                TwitterError::RateLimitExceeded { retry_after } => *retry_after,
                _ => {
                    // Apply exponential backoff, max 60 seconds
                    let base_delay = 2;
                    let exponential_delay = base_delay * 2_u64.pow(attempt.min(6));
                    exponential_delay.min(60)
                }
            },
            TweetStashError::Network(_) => {
                // Apply exponential backoff, max 60 seconds
                let base_delay = 2;
                let exponential_delay = base_delay * 2_u64.pow(attempt.min(6));
                exponential_delay.min(60)
            }
            _ => {
                let base_delay = 5;
                let exponential_delay = base_delay * 2_u64.pow(attempt.min(6));
                exponential_delay.min(60)
            }
        }
    }

    /// Get the maximum number of retry attempts for an error
    pub fn max_retries(error: &TweetStashError) -> u32 {
        match error {
            TweetStashError::Twitter(TwitterError::RateLimitExceeded { .. }) => 3,
            TweetStashError::Network(_) => 5,
            _ => 3,
        }
    }

    /// Determine if an error should cause application shutdown
    pub fn should_shutdown(error: &TweetStashError) -> bool {
        match error {
            TweetStashError::Config(_) => true, // Configuration errors are fatal
            TweetStashError::Shutdown => true,  // Intentional shutdown
            TweetStashError::Twitter(TwitterError::AuthenticationFailed(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tweetstash_error_display() {
        let config_error = ConfigError::MissingRequired("api.api_key".to_string());
        let error = TweetStashError::Config(config_error);
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("api.api_key"));
    }

    #[test]
    fn test_twitter_error_variants() {
        let auth_error = TwitterError::AuthenticationFailed("bad key".to_string());
        assert!(auth_error.to_string().contains("Authentication failed"));

        let rate_limit_error = TwitterError::RateLimitExceeded { retry_after: 60 };
        assert!(rate_limit_error.to_string().contains("Rate limit exceeded"));
        assert!(rate_limit_error.to_string().contains("60 seconds"));

        let input_error = TwitterError::InvalidInput("username is empty".to_string());
        assert!(input_error.to_string().contains("username is empty"));

        let not_found = TwitterError::UserNotFound {
            username: "ghost".to_string(),
        };
        assert!(not_found.to_string().contains("User not found: ghost"));
    }

    #[test]
    fn test_storage_error_variants() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = StorageError::Write {
            path: "data/csvs/tweets_test.csv".to_string(),
            source: io,
        };
        assert!(error.to_string().contains("Failed to write"));
        assert!(error.to_string().contains("tweets_test.csv"));
    }

    #[test]
    fn test_error_recovery_is_recoverable() {
        let io_error = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        let error = TweetStashError::Io(io_error);
        assert!(ErrorRecovery::is_recoverable(&error));

        let rate_limit =
            TweetStashError::Twitter(TwitterError::RateLimitExceeded { retry_after: 60 });
        assert!(ErrorRecovery::is_recoverable(&rate_limit));

        let request_failed =
            TweetStashError::Twitter(TwitterError::ApiRequestFailed("HTTP 502".to_string()));
        assert!(ErrorRecovery::is_recoverable(&request_failed));

        // Non-recoverable errors
        let config_error =
            TweetStashError::Config(ConfigError::MissingRequired("api.api_key".to_string()));
        assert!(!ErrorRecovery::is_recoverable(&config_error));

        let auth_error = TweetStashError::Twitter(TwitterError::AuthenticationFailed(
            "invalid key".to_string(),
        ));
        assert!(!ErrorRecovery::is_recoverable(&auth_error));

        let input_error =
            TweetStashError::Twitter(TwitterError::InvalidInput("empty".to_string()));
        assert!(!ErrorRecovery::is_recoverable(&input_error));
    }

    #[test]
    fn test_error_recovery_retry_delay() {
        let request_failed =
            TweetStashError::Twitter(TwitterError::ApiRequestFailed("HTTP 502".to_string()));

        assert_eq!(ErrorRecovery::retry_delay(&request_failed, 0), 2);
        assert_eq!(ErrorRecovery::retry_delay(&request_failed, 1), 4);
        assert_eq!(ErrorRecovery::retry_delay(&request_failed, 2), 8);

        // Test max delay cap
        assert_eq!(ErrorRecovery::retry_delay(&request_failed, 10), 60);

        // Rate limit delay should respect the retry_after value even if > 60
        let rate_limit_error =
            TweetStashError::Twitter(TwitterError::RateLimitExceeded { retry_after: 120 });
        assert_eq!(ErrorRecovery::retry_delay(&rate_limit_error, 0), 120);
    }

    #[test]
    fn test_error_recovery_should_shutdown() {
        let config_error =
            TweetStashError::Config(ConfigError::MissingRequired("api.api_key".to_string()));
        assert!(ErrorRecovery::should_shutdown(&config_error));

        let auth_error = TweetStashError::Twitter(TwitterError::AuthenticationFailed(
            "invalid key".to_string(),
        ));
        assert!(ErrorRecovery::should_shutdown(&auth_error));

        let rate_limit =
            TweetStashError::Twitter(TwitterError::RateLimitExceeded { retry_after: 60 });
        assert!(!ErrorRecovery::should_shutdown(&rate_limit));
    }

    #[test]
    fn test_error_conversion_from_std_errors() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = TweetStashError::from(io_error);
        assert!(matches!(error, TweetStashError::Io(_)));

        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error = TweetStashError::from(json_error);
        assert!(matches!(error, TweetStashError::Json(_)));

        let url_error = url::Url::parse("not a url").unwrap_err();
        let error = TweetStashError::from(url_error);
        assert!(matches!(error, TweetStashError::Url(_)));
    }
}
