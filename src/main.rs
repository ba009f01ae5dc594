use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{self, EnvFilter};

use tweetstash::config::Config;
use tweetstash::error::{ErrorRecovery, TweetStashError};
use tweetstash::monitor::TweetMonitor;
use tweetstash::storage::Storage;
use tweetstash::twitter::{FetchOptions, TwitterClient};

#[derive(Parser)]
#[command(name = "tweetstash")]
#[command(about = "Fetches tweets and followings from TwitterAPI.io and caches them as CSV/JSON files")]
#[command(version)]
struct Cli {
    /// Path to configuration file (can also be set via TWEETSTASH_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable verbose logging (equivalent to --log-level debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report configuration status: API key presence and proxy settings
    Check,

    /// Fetch a user's tweets via advanced search
    Fetch {
        /// Twitter handle, with or without leading @
        username: String,

        /// Maximum number of tweets to return
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Include reply tweets
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        include_replies: bool,

        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Exclusive end date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Minimum number of likes
        #[arg(long)]
        min_faves: Option<u32>,

        /// Write a flattened CSV projection under <data_dir>/csvs
        #[arg(long)]
        csv: bool,

        /// Write the raw JSON response under <data_dir>/jsons
        #[arg(long)]
        json: bool,
    },

    /// Run a raw advanced search query
    Search {
        /// Full advanced search query string
        query: String,

        /// Maximum number of tweets to return
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Fetch the accounts a user follows, most recently followed first
    Followings {
        /// Twitter handle, with or without leading @
        username: String,

        /// Maximum number of followings to return
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Write a flattened CSV projection under <data_dir>/csvs
        #[arg(long)]
        csv: bool,

        /// Write the raw JSON response under <data_dir>/jsons
        #[arg(long)]
        json: bool,
    },

    /// Poll an account for new tweets on an interval
    Watch {
        /// Twitter handle, with or without leading @
        username: String,

        /// Seconds between checks
        #[arg(long, default_value_t = 300)]
        interval: u64,
    },
}

impl Cli {
    /// Get config path from CLI arg or TWEETSTASH_CONFIG environment variable
    fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var("TWEETSTASH_CONFIG").ok().map(PathBuf::from))
    }
}

/// Initialize structured logging with proper error handling
fn init_logging(config: &Config, cli: &Cli) -> Result<(), TweetStashError> {
    // Determine log level from CLI args, config, or environment
    let log_level = if cli.verbose {
        "debug"
    } else if let Some(ref level) = cli.log_level {
        level.as_str()
    } else {
        config.logging().level.as_deref().unwrap_or("info")
    };

    // Validate log level
    let _level = match log_level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => {
            return Err(TweetStashError::InvalidData(format!(
                "Invalid log level: {log_level}. Valid levels are: error, warn, info, debug, trace"
            )));
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| TweetStashError::InvalidData(format!("Failed to create log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .init();

    debug!("Logging initialized with level: {}", log_level);
    Ok(())
}

/// Handle application errors with appropriate logging
fn handle_error(error: &TweetStashError) {
    match error {
        TweetStashError::Config(_) => {
            error!("Configuration error: {}", error);
            error!("Please check your configuration file and environment variables");
        }
        TweetStashError::Network(_) => {
            warn!("Network error: {}", error);
            if ErrorRecovery::is_recoverable(error) {
                info!("Network error is recoverable, try again later");
            }
        }
        TweetStashError::Twitter(_) => {
            error!("Twitter API error: {}", error);
        }
        TweetStashError::Storage(_) => {
            error!("Storage error: {}", error);
        }
        _ => {
            error!("Application error: {}", error);
            debug!("Error details: {:?}", error);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), TweetStashError> {
    let cli = Cli::parse();

    // `check` reports configuration problems instead of failing on them
    if matches!(cli.command, Commands::Check) {
        tracing_subscriber::fmt().init();
        return run_check(&cli);
    }

    // Load configuration first
    let config = match Config::load(cli.config_path()) {
        Ok(config) => config,
        Err(e) => {
            // Initialize basic logging for configuration errors
            tracing_subscriber::fmt().init();
            let error = TweetStashError::Config(e);
            handle_error(&error);
            return Err(TweetStashError::Shutdown);
        }
    };

    if let Err(e) = init_logging(&config, &cli) {
        eprintln!("Failed to initialize logging: {e}");
        return Err(e);
    }

    info!("Starting tweetstash v{}", env!("CARGO_PKG_VERSION"));
    debug!("API base URL: {}", config.api.base_url);
    debug!("Data directory: {}", config.storage().data_dir);

    match run_command(&cli, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            handle_error(&e);
            Err(TweetStashError::Shutdown)
        }
    }
}

fn build_client(config: &Config) -> Result<TwitterClient, TweetStashError> {
    match config.proxy_url() {
        Some(proxy_url) => {
            info!("Routing requests through proxy");
            Ok(TwitterClient::with_proxy(config.api.clone(), proxy_url)?)
        }
        None => Ok(TwitterClient::new(config.api.clone())),
    }
}

async fn run_command(cli: &Cli, config: Config) -> Result<(), TweetStashError> {
    let client = build_client(&config)?;
    let storage = Storage::new(config.storage().data_dir.clone());

    match &cli.command {
        Commands::Check => unreachable!("handled before config load"),

        Commands::Fetch {
            username,
            limit,
            include_replies,
            since,
            until,
            min_faves,
            csv,
            json,
        } => {
            let options = FetchOptions {
                include_replies: *include_replies,
                since: since.clone(),
                until: until.clone(),
                min_faves: *min_faves,
                start_cursor: None,
            };

            let result = client.get_user_tweets(username, *limit, &options).await?;
            info!("Fetched {} tweets for {}", result.tweets.len(), username);

            for tweet in &result.tweets {
                println!("{}", tweet.text);
            }

            if *json {
                let path = storage.save_tweets(username, &result)?;
                println!("JSON cache written to {}", path.display());
            }
            if *csv {
                let path = storage.write_tweets_csv(username, &result)?;
                println!("CSV written to {}", path.display());
            }
            Ok(())
        }

        Commands::Search { query, limit } => {
            let result = client.search_tweets(query, *limit, None).await?;
            info!("Fetched {} tweets for query: {}", result.tweets.len(), query);

            for tweet in &result.tweets {
                println!("{}", tweet.text);
            }
            Ok(())
        }

        Commands::Followings {
            username,
            limit,
            csv,
            json,
        } => {
            let result = client.get_followings(username, *limit, None).await?;
            info!(
                "Fetched {} followings for {}",
                result.followings.len(),
                username
            );

            for following in &result.followings {
                println!(
                    "@{} ({})",
                    following.user_name,
                    following.name.as_deref().unwrap_or("")
                );
            }

            if *json {
                let path = storage.save_followings(username, &result)?;
                println!("JSON cache written to {}", path.display());
            }
            if *csv {
                let path = storage.write_followings_csv(username, &result)?;
                println!("CSV written to {}", path.display());
            }
            Ok(())
        }

        Commands::Watch { username, interval } => {
            let mut monitor = TweetMonitor::new(client, username, *interval)
                .map_err(TweetStashError::Twitter)?;

            tokio::select! {
                _ = setup_shutdown_signal() => {
                    info!("Shutdown signal received, stopping watch");
                    Ok(())
                }
                result = monitor.run() => result.map_err(TweetStashError::Twitter),
            }
        }
    }
}

/// Configuration/connectivity check: reports API key and proxy presence
/// without making any network calls
fn run_check(cli: &Cli) -> Result<(), TweetStashError> {
    match Config::load(cli.config_path()) {
        Ok(config) => {
            println!("API key: {}", mask_key(&config.api.api_key));
            println!("Base URL: {}", config.api.base_url);
            match config.proxy_url() {
                Some(_) => println!("Proxy: configured"),
                None => println!("Proxy: not set"),
            }
            println!("Data directory: {}", config.storage().data_dir);
            println!("Configuration OK");
            Ok(())
        }
        Err(e) => {
            println!("API key: not set");
            println!("Configuration check failed: {e}");
            Err(TweetStashError::Config(e))
        }
    }
}

/// Mask a credential for display: first and last few characters only
fn mask_key(key: &str) -> String {
    if key.len() > 14 {
        format!("{}...{}", &key[..10], &key[key.len() - 4..])
    } else if key.is_empty() {
        "not set".to_string()
    } else {
        "****".to_string()
    }
}

/// Set up graceful shutdown signal handling
async fn setup_shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, initiating graceful shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["tweetstash", "check"]);
        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Check));

        let cli = Cli::parse_from([
            "tweetstash",
            "--config",
            "/path/to/config.toml",
            "--log-level",
            "debug",
            "check",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_fetch_defaults() {
        let cli = Cli::parse_from(["tweetstash", "fetch", "nelvOfficial"]);
        match cli.command {
            Commands::Fetch {
                username,
                limit,
                include_replies,
                since,
                csv,
                json,
                ..
            } => {
                assert_eq!(username, "nelvOfficial");
                assert_eq!(limit, 20);
                assert!(include_replies);
                assert!(since.is_none());
                assert!(!csv);
                assert!(!json);
            }
            _ => panic!("Expected fetch command"),
        }
    }

    #[test]
    fn test_cli_fetch_smoke_test_invocation() {
        // The documented smoke test: 20 tweets with replies for a fixed account
        let cli = Cli::parse_from([
            "tweetstash",
            "fetch",
            "nelvOfficial",
            "--limit",
            "20",
            "--include-replies",
            "true",
        ]);
        match cli.command {
            Commands::Fetch {
                username,
                limit,
                include_replies,
                ..
            } => {
                assert_eq!(username, "nelvOfficial");
                assert_eq!(limit, 20);
                assert!(include_replies);
            }
            _ => panic!("Expected fetch command"),
        }
    }

    #[test]
    fn test_cli_watch_interval() {
        let cli = Cli::parse_from(["tweetstash", "watch", "nelvOfficial"]);
        match cli.command {
            Commands::Watch { interval, .. } => assert_eq!(interval, 300),
            _ => panic!("Expected watch command"),
        }

        let cli = Cli::parse_from(["tweetstash", "watch", "nelvOfficial", "--interval", "60"]);
        match cli.command {
            Commands::Watch { interval, .. } => assert_eq!(interval, 60),
            _ => panic!("Expected watch command"),
        }
    }

    #[test]
    fn test_tweetstash_config_env_var() {
        std::env::set_var("TWEETSTASH_CONFIG", "/env/path/to/config.toml");

        let cli = Cli::parse_from(["tweetstash", "check"]);
        assert_eq!(
            cli.config_path(),
            Some(PathBuf::from("/env/path/to/config.toml"))
        );

        // CLI arg overrides environment variable
        let cli = Cli::parse_from(["tweetstash", "--config", "/cli/path.toml", "check"]);
        assert_eq!(cli.config_path(), Some(PathBuf::from("/cli/path.toml")));

        std::env::remove_var("TWEETSTASH_CONFIG");

        let cli = Cli::parse_from(["tweetstash", "check"]);
        assert_eq!(cli.config_path(), None);
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "not set");
        assert_eq!(mask_key("short"), "****");
        assert_eq!(
            mask_key("abcdefghij1234567890wxyz"),
            "abcdefghij...wxyz"
        );
    }
}
