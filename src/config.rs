use crate::error::{AppError, Result};

pub const ETSY_API_URL: &str = "https://openapi.etsy.com/v2";
pub const ETSY_FEED_URL: &str = "https://api.etsy.com/v2";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Listing feed poll period (seconds).
pub const FEED_POLL_PERIOD_SECS: u64 = 20;

/// Wait before retrying the chat long poll after a failure (seconds).
pub const CHAT_FALLBACK_SECS: u64 = 20;

/// Long-poll wait passed to the chat getUpdates call (seconds).
pub const CHAT_LONGPOLL_SECS: u64 = 60;

/// Capacity of the listing-update queue between the poller and the workers.
/// Enqueue blocks when full — backpressure onto the poller, no drop policy.
pub const UPDATE_QUEUE_CAPACITY: usize = 1000;

/// Number of worker tasks draining the update queue.
pub const UPDATE_WORKER_COUNT: usize = 10;

/// Feed request page size and server-side time window cap (seconds).
pub const FEED_PAGE_LIMIT: u32 = 100;
pub const FEED_TIME_LIMIT_SECS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token for the chat API (TELEGRAM_BOT_TOKEN).
    pub telegram_token: String,
    /// Marketplace API key, doubles as the OAuth consumer key (ETSY_API_KEY).
    pub etsy_api_key: String,
    /// OAuth consumer secret (ETSY_SHARED_SECRET).
    pub etsy_shared_secret: String,
    pub etsy_api_url: String,
    pub etsy_feed_url: String,
    pub telegram_api_url: String,
    pub log_level: String,
    pub db_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            telegram_token: require("TELEGRAM_BOT_TOKEN")?,
            etsy_api_key: require("ETSY_API_KEY")?,
            etsy_shared_secret: require("ETSY_SHARED_SECRET")?,
            etsy_api_url: std::env::var("ETSY_API_URL").unwrap_or_else(|_| ETSY_API_URL.to_string()),
            etsy_feed_url: std::env::var("ETSY_FEED_URL")
                .unwrap_or_else(|_| ETSY_FEED_URL.to_string()),
            telegram_api_url: std::env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| TELEGRAM_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "shelfwatch.db".to_string()),
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| AppError::Config(format!("{name} must be set")))
}
