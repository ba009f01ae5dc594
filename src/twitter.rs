use crate::config::ApiConfig;
use crate::error::TwitterError;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Lower bound for the followings page size accepted by the API
const MIN_PAGE_SIZE: u32 = 20;
/// Upper bound for the followings page size accepted by the API
const MAX_PAGE_SIZE: u32 = 200;

/// A single tweet record as returned by the advanced search endpoint.
///
/// Only the fields the application consumes are typed; everything else the
/// service returns is carried in `extra` so records round-trip unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "isReply", default)]
    pub is_reply: bool,
    #[serde(
        rename = "retweetCount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub retweet_count: Option<u64>,
    #[serde(rename = "replyCount", default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    #[serde(rename = "likeCount", default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde(rename = "viewCount", default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Author summary embedded in tweet records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A followed account as returned by the followings endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Following {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One page of advanced search results (wire format)
#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    tweets: Vec<Tweet>,
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// One page of followings results (wire format)
#[derive(Debug, Deserialize)]
struct FollowingsPage {
    #[serde(default)]
    followings: Vec<Following>,
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Error body occasionally returned by the API with non-2xx status codes
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
}

/// Accumulated tweets from one or more pages, truncated to the requested limit
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub tweets: Vec<Tweet>,
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
}

/// Accumulated followings, truncated to the requested limit
#[derive(Debug, Clone, Serialize)]
pub struct FollowingsResult {
    pub followings: Vec<Following>,
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
}

/// Options for user tweet fetches. All fields map to advanced search operators.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Include reply tweets in the result (adds `-is:reply` when false)
    pub include_replies: bool,
    /// Inclusive start date, `YYYY-MM-DD` (maps to `since:`)
    pub since: Option<String>,
    /// Exclusive end date, `YYYY-MM-DD` (maps to `until:`)
    pub until: Option<String>,
    /// Minimum number of likes (maps to `min_faves:`)
    pub min_faves: Option<u32>,
    /// Resume pagination from a previously returned cursor
    pub start_cursor: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            include_replies: true,
            since: None,
            until: None,
            min_faves: None,
            start_cursor: None,
        }
    }
}

/// TwitterAPI.io client with cursor pagination and retry handling
#[derive(Debug, Clone)]
pub struct TwitterClient {
    config: ApiConfig,
    http_client: Client,
}

impl TwitterClient {
    /// Create a new client
    pub fn new(config: ApiConfig) -> Self {
        let http_client = Self::client_builder(&config)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    /// Create a new client that routes requests through an HTTP proxy
    pub fn with_proxy(config: ApiConfig, proxy_url: &str) -> Result<Self, TwitterError> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| TwitterError::InvalidInput(format!("Invalid proxy URL: {e}")))?;
        let http_client = Self::client_builder(&config)
            .proxy(proxy)
            .build()
            .map_err(|e| TwitterError::ApiRequestFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn client_builder(config: &ApiConfig) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.unwrap_or(30)))
            .user_agent(format!("Tweetstash/{}", env!("CARGO_PKG_VERSION")))
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Strip a leading `@` and reject empty handles
    pub fn normalize_handle(username: &str) -> Result<&str, TwitterError> {
        let handle = username.trim().trim_start_matches('@');
        if handle.is_empty() {
            return Err(TwitterError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }
        Ok(handle)
    }

    /// Build an advanced search query for a user's tweets
    pub fn build_user_query(handle: &str, options: &FetchOptions) -> String {
        let mut parts = vec![format!("from:{handle}")];
        if let Some(ref since) = options.since {
            parts.push(format!("since:{since}"));
        }
        if let Some(ref until) = options.until {
            parts.push(format!("until:{until}"));
        }
        if let Some(min_faves) = options.min_faves {
            parts.push(format!("min_faves:{min_faves}"));
        }
        if !options.include_replies {
            parts.push("-is:reply".to_string());
        }
        parts.join(" ")
    }

    /// Fetch up to `limit` tweets for a user without exposing cursor handling
    pub async fn get_user_tweets(
        &self,
        username: &str,
        limit: usize,
        options: &FetchOptions,
    ) -> Result<FetchResult, TwitterError> {
        let handle = Self::normalize_handle(username)?;
        let query = Self::build_user_query(handle, options);
        debug!("Fetching up to {} tweets with query: {}", limit, query);
        self.search_tweets(&query, limit, options.start_cursor.clone())
            .await
    }

    /// Fetch up to `limit` tweets matching an advanced search query.
    ///
    /// Pages through results until `limit` tweets have been collected or the
    /// service reports no more data. Cursor pages can overlap at the edges, so
    /// tweets are deduplicated by id before counting against the limit.
    pub async fn search_tweets(
        &self,
        query: &str,
        limit: usize,
        start_cursor: Option<String>,
    ) -> Result<FetchResult, TwitterError> {
        if query.trim().is_empty() {
            return Err(TwitterError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        // A zero limit asks for nothing; don't touch the network.
        if limit == 0 {
            return Ok(FetchResult {
                tweets: Vec::new(),
                has_next_page: false,
                next_cursor: start_cursor,
            });
        }

        let url = format!("{}/twitter/tweet/advanced_search", self.base_url());

        let mut collected: Vec<Tweet> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut cursor = start_cursor;
        let mut has_next_page = true;

        while has_next_page && collected.len() < limit {
            let mut params = vec![
                ("query".to_string(), query.to_string()),
                ("queryType".to_string(), "Latest".to_string()),
            ];
            if let Some(ref c) = cursor {
                if !c.is_empty() {
                    params.push(("cursor".to_string(), c.clone()));
                }
            }

            let page: SearchPage = self.api_request_with_retry(&url, &params).await?;

            let page_len = page.tweets.len();
            let remaining = limit - collected.len();
            let new_tweets: Vec<Tweet> = page
                .tweets
                .into_iter()
                .filter(|t| seen_ids.insert(t.id.clone()))
                .take(remaining)
                .collect();

            debug!(
                "Search page returned {} tweets ({} new), {} collected so far",
                page_len,
                new_tweets.len(),
                collected.len() + new_tweets.len()
            );
            collected.extend(new_tweets);

            has_next_page = page.has_next_page;
            cursor = if has_next_page { page.next_cursor } else { None };

            if page_len == 0 {
                break;
            }
        }

        Ok(FetchResult {
            tweets: collected,
            has_next_page,
            next_cursor: cursor,
        })
    }

    /// Fetch up to `limit` followings for a user, most recently followed first
    pub async fn get_followings(
        &self,
        username: &str,
        limit: usize,
        start_cursor: Option<String>,
    ) -> Result<FollowingsResult, TwitterError> {
        let handle = Self::normalize_handle(username)?;

        if limit == 0 {
            return Ok(FollowingsResult {
                followings: Vec::new(),
                has_next_page: false,
                next_cursor: start_cursor,
            });
        }

        let url = format!("{}/twitter/user/followings", self.base_url());
        let page_size = Self::clamp_page_size(self.config.page_size.unwrap_or(MIN_PAGE_SIZE));

        let mut collected: Vec<Following> = Vec::new();
        let mut cursor = start_cursor;
        let mut has_next_page = true;

        while has_next_page && collected.len() < limit {
            let mut params = vec![
                ("userName".to_string(), handle.to_string()),
                ("pageSize".to_string(), page_size.to_string()),
            ];
            if let Some(ref c) = cursor {
                if !c.is_empty() {
                    params.push(("cursor".to_string(), c.clone()));
                }
            }

            let page: FollowingsPage = self.api_request_with_retry(&url, &params).await?;

            let page_len = page.followings.len();
            let remaining = limit - collected.len();
            collected.extend(page.followings.into_iter().take(remaining));

            debug!(
                "Followings page returned {} entries, {} collected so far",
                page_len,
                collected.len()
            );

            has_next_page = page.has_next_page;
            cursor = if has_next_page { page.next_cursor } else { None };

            if page_len == 0 {
                break;
            }
        }

        Ok(FollowingsResult {
            followings: collected,
            has_next_page,
            next_cursor: cursor,
        })
    }

    /// Clamp a followings page size to the 20..=200 range the API accepts
    pub fn clamp_page_size(page_size: u32) -> u32 {
        page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Perform a GET request with exponential backoff on recoverable failures
    async fn api_request_with_retry<T>(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<T, TwitterError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let max_retries = self.config.max_retries.unwrap_or(3);
        let mut attempt = 0;

        loop {
            debug!("Making API request to {} (attempt {})", url, attempt + 1);

            let result = self
                .http_client
                .get(url)
                .query(params)
                .header("x-api-key", &self.config.api_key)
                .send()
                .await
                .map_err(|e| TwitterError::ApiRequestFailed(format!("Request failed: {e}")));

            let outcome = match result {
                Ok(response) => self.handle_response::<T>(response).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(TwitterError::RateLimitExceeded { retry_after }) => {
                    if attempt >= max_retries {
                        error!("Max retries exceeded for rate limited request");
                        return Err(TwitterError::RateLimitExceeded { retry_after });
                    }
                    warn!("Rate limited, waiting {} seconds before retry", retry_after);
                    sleep(Duration::from_secs(retry_after)).await;
                    attempt += 1;
                }
                Err(TwitterError::ApiRequestFailed(msg)) => {
                    if attempt >= max_retries {
                        return Err(TwitterError::ApiRequestFailed(msg));
                    }
                    let delay = 2_u64.pow(attempt.min(5));
                    warn!(
                        "Request failed ({}), retrying in {} seconds (attempt {}/{})",
                        msg,
                        delay,
                        attempt + 1,
                        max_retries
                    );
                    sleep(Duration::from_secs(delay)).await;
                    attempt += 1;
                }
                // Authentication and parse errors won't improve on retry
                Err(e) => return Err(e),
            }
        }
    }

    /// Handle API response and extract errors
    async fn handle_response<T>(&self, response: Response) -> Result<T, TwitterError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        let headers = response.headers().clone();

        // Check for rate limiting
        if status == 429 {
            let retry_after = headers
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(5);

            warn!(
                "TwitterAPI.io rate limit exceeded, retry after {} seconds",
                retry_after
            );
            return Err(TwitterError::RateLimitExceeded { retry_after });
        }

        // Check for authentication errors
        if status == 401 || status == 403 {
            error!("TwitterAPI.io authentication failed - check API key");
            return Err(TwitterError::AuthenticationFailed(format!(
                "HTTP {status}"
            )));
        }

        let response_text = response.text().await.map_err(|e| {
            TwitterError::ApiRequestFailed(format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            // Try to surface the service's own error message
            if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&response_text) {
                if let Some(message) = body.message.or(body.msg) {
                    return Err(TwitterError::ApiRequestFailed(format!(
                        "HTTP {status}: {message}"
                    )));
                }
            }
            return Err(TwitterError::ApiRequestFailed(format!(
                "HTTP {status} - {response_text}"
            )));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse TwitterAPI.io response: {}", e);
            debug!("Response text: {}", response_text);
            TwitterError::InvalidResponse(format!("JSON parsing failed: {e}"))
        })
    }
}
