//! Runtime configuration read from the environment

use chrono::Duration;
use std::path::PathBuf;
use tracing::warn;

/// Snapshot file used by the WASI binary when none is configured
pub const DEFAULT_STATE_FILE: &str = "signaling_state.json";

/// Seconds without a poll or emit after which a connection is closed
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 30;

const STATE_FILE_VAR: &str = "SIGNALING_STATE_FILE";
const IDLE_TIMEOUT_VAR: &str = "SIGNALING_IDLE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// JSON snapshot carrying state between requests; `None` keeps state in
    /// memory only
    pub state_file: Option<PathBuf>,
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: None,
            idle_timeout: Duration::seconds(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Configuration for the server binary
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let state_file = match lookup(STATE_FILE_VAR) {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_STATE_FILE)),
        };

        let idle_timeout = match lookup(IDLE_TIMEOUT_VAR) {
            Some(raw) => match raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .and_then(Duration::try_seconds)
            {
                Some(timeout) => timeout,
                None => {
                    warn!(value = %raw, "invalid {IDLE_TIMEOUT_VAR}, using default");
                    Duration::seconds(DEFAULT_IDLE_TIMEOUT_SECS)
                }
            },
            None => Duration::seconds(DEFAULT_IDLE_TIMEOUT_SECS),
        };

        Self {
            state_file,
            idle_timeout,
        }
    }
}
