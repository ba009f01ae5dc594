use crate::error::TwitterError;
use crate::twitter::{Tweet, TwitterClient};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timestamp format the advanced search `since:`/`until:` operators expect
const WINDOW_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S_UTC";

/// Upper bound on tweets collected per check window
const WINDOW_FETCH_LIMIT: usize = 500;

/// Polls the advanced search endpoint for new tweets from one account.
///
/// Each check queries a `since:`/`until:` window from the last successful
/// check up to now; the window only advances when the check succeeds, so a
/// failed poll is retried over the same range on the next tick.
pub struct TweetMonitor {
    client: TwitterClient,
    handle: String,
    interval: Duration,
    last_checked: DateTime<Utc>,
}

impl TweetMonitor {
    /// Create a monitor; the first check covers the trailing hour
    pub fn new(
        client: TwitterClient,
        username: &str,
        interval_secs: u64,
    ) -> Result<Self, TwitterError> {
        let handle = TwitterClient::normalize_handle(username)?.to_string();
        Ok(Self {
            client,
            handle,
            interval: Duration::from_secs(interval_secs),
            last_checked: Utc::now() - ChronoDuration::hours(1),
        })
    }

    /// Build the windowed search query for one check
    pub fn window_query(handle: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> String {
        format!(
            "from:{} since:{} until:{} include:nativeretweets",
            handle,
            since.format(WINDOW_TIME_FORMAT),
            until.format(WINDOW_TIME_FORMAT)
        )
    }

    /// Query the current window once and advance it on success
    pub async fn check_once(&mut self) -> Result<Vec<Tweet>, TwitterError> {
        let until = Utc::now();
        let query = Self::window_query(&self.handle, self.last_checked, until);
        debug!("Checking for new tweets: {}", query);

        let result = self
            .client
            .search_tweets(&query, WINDOW_FETCH_LIMIT, None)
            .await?;

        self.last_checked = until;
        Ok(result.tweets)
    }

    /// Run the polling loop until the task is cancelled
    pub async fn run(&mut self) -> Result<(), TwitterError> {
        info!(
            "Monitoring @{} every {} seconds",
            self.handle,
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.check_once().await {
                Ok(tweets) if tweets.is_empty() => {
                    debug!("No new tweets from @{}", self.handle);
                }
                Ok(tweets) => {
                    info!("{} new tweet(s) from @{}", tweets.len(), self.handle);
                    for tweet in &tweets {
                        info!(
                            "  [{}] {}",
                            tweet.created_at.as_deref().unwrap_or("unknown time"),
                            tweet.text
                        );
                    }
                }
                Err(TwitterError::AuthenticationFailed(msg)) => {
                    // Bad credentials won't recover on their own
                    return Err(TwitterError::AuthenticationFailed(msg));
                }
                Err(e) => {
                    // Window was not advanced, the next tick retries the same range
                    warn!("Check failed, will retry next interval: {}", e);
                }
            }
        }
    }
}
