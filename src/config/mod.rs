/// Configuration management for the Phaseway engine
///
/// Handles server binding, draft storage location, autosave cadence and how long
/// an abandoned session stays live.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Autosave configuration
    pub autosave: AutosaveConfig,
    /// Live session configuration
    pub sessions: SessionsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Draft database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding `drafts.db` (default: "data")
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Seconds between autosave ticks; 0 falls back to the default
    pub interval_secs: u64,
}

impl AutosaveConfig {
    pub fn interval(&self) -> Duration {
        match self.interval_secs {
            0 => Duration::from_secs(DEFAULT_AUTOSAVE_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

const DEFAULT_AUTOSAVE_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Seconds without client activity before a live session is closed; 0 keeps them forever
    pub idle_timeout_secs: u64,
}

impl SessionsConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("PHASEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("PHASEWAY_PORT", 3004),
            },
            database: DatabaseConfig {
                data_dir: std::env::var("PHASEWAY_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
            autosave: AutosaveConfig {
                interval_secs: env_or("PHASEWAY_AUTOSAVE_SECS", DEFAULT_AUTOSAVE_SECS),
            },
            sessions: SessionsConfig {
                idle_timeout_secs: env_or("PHASEWAY_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_unparsable_env_falls_back() {
        assert_eq!(env_or("PHASEWAY_TEST_SURELY_UNSET", 7u16), 7);
    }

    #[test]
    fn zero_autosave_interval_uses_default() {
        let autosave = AutosaveConfig { interval_secs: 0 };
        assert_eq!(autosave.interval(), Duration::from_secs(30));
        let autosave = AutosaveConfig { interval_secs: 5 };
        assert_eq!(autosave.interval(), Duration::from_secs(5));
    }

    #[test]
    fn zero_idle_timeout_disables_the_sweep() {
        assert_eq!(SessionsConfig { idle_timeout_secs: 0 }.idle_timeout(), None);
        assert_eq!(
            SessionsConfig { idle_timeout_secs: 90 }.idle_timeout(),
            Some(Duration::from_secs(90))
        );
    }
}
