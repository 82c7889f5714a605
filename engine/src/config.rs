//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineError;

/// Default backend address (the report service listens on port 10000).
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:10000";

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default delay between fan-out items.
pub const DEFAULT_FAN_OUT_DELAY: Duration = Duration::from_millis(1000);

/// Default timeout for short backend calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by the CLI and GUI front ends.
///
/// All fields have defaults suitable for a backend running on the same
/// machine. Binaries call `dotenvy::dotenv()` first, so a `.env` file works
/// as well as real environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the report backend, without a trailing slash.
    pub backend_url: String,
    /// How often a running job is polled for progress.
    pub poll_interval: Duration,
    /// Pause between two fan-out items.
    pub fan_out_delay: Duration,
    /// Timeout for every call except report generation itself.
    pub request_timeout: Duration,
    /// Where the CLI writes finished reports.
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            fan_out_delay: DEFAULT_FAN_OUT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                          | Default                  |
    /// |----------------------------------|--------------------------|
    /// | `STOCKPLAN_BACKEND_URL`          | `http://127.0.0.1:10000` |
    /// | `STOCKPLAN_POLL_INTERVAL_MS`     | `1000`                   |
    /// | `STOCKPLAN_FAN_OUT_DELAY_MS`     | `1000`                   |
    /// | `STOCKPLAN_REQUEST_TIMEOUT_SECS` | `30`                     |
    /// | `STOCKPLAN_OUTPUT_DIR`           | `.`                      |
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClientConfig::default();

        let backend_url = lookup("STOCKPLAN_BACKEND_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.backend_url);

        let poll_interval = parse_u64(&lookup, "STOCKPLAN_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let fan_out_delay = parse_u64(&lookup, "STOCKPLAN_FAN_OUT_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.fan_out_delay);

        let request_timeout = parse_u64(&lookup, "STOCKPLAN_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let output_dir = lookup("STOCKPLAN_OUTPUT_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        if poll_interval.is_zero() {
            return Err(EngineError::Config {
                key: "STOCKPLAN_POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        Ok(ClientConfig {
            backend_url,
            poll_interval,
            fan_out_delay,
            request_timeout,
            output_dir,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, EngineError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EngineError::Config { key, value: raw }),
    }
}
