use crate::{Error, Result};

/// Process configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// TOML file describing which strategies to run.
    pub strategy_config_path: String,
    /// JSON-lines file of market bars to replay, oldest first.
    pub bars_path: String,
    /// Optional JSON object mapping symbol to signed position.
    pub positions_path: Option<String>,
    /// Optional JSON array of fundamental snapshots.
    pub fundamentals_path: Option<String>,
    /// Capacity of the bar and signal channels.
    pub channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads `.env` if present. Fails on a missing required variable.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let channel_capacity = match optional_env("CHANNEL_CAPACITY") {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                Error::Config(format!("CHANNEL_CAPACITY must be a positive integer, got '{raw}'"))
            })?,
            None => 1024,
        };
        if channel_capacity == 0 {
            return Err(Error::Config("CHANNEL_CAPACITY must be greater than zero".into()));
        }

        Ok(Config {
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            bars_path: required_env("BARS_PATH")?,
            positions_path: optional_env("POSITIONS_PATH"),
            fundamentals_path: optional_env("FUNDAMENTALS_PATH"),
            channel_capacity,
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
