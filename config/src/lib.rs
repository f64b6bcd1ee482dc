//! Configuration for tricks.
//!
//! Read from `~/.tricks/config.toml`. A missing file is not an error; every
//! field is optional and falls back to a built-in default.
//!
//! ```toml
//! [fetch]
//! timeout_ms = 3000
//! user_agent = "tricks/0.1"
//! on_timeout = "detach"   # or "abort"
//! use_system_proxy = true
//!
//! [log]
//! filter = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tricks_types::{DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT, LoserPolicy};

/// Environment variable overriding `[fetch] timeout_ms`.
pub const FETCH_TIMEOUT_ENV: &str = "TRICKS_FETCH_TIMEOUT_MS";

pub const DEFAULT_LOG_FILTER: &str = "info";

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct TricksConfig {
    pub fetch: Option<FetchConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// `[fetch]` section.
#[derive(Debug, Deserialize)]
pub struct FetchConfig {
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    /// What to do with a request that lost to the timer. Default: "detach".
    #[serde(default)]
    pub on_timeout: LoserPolicy,
    #[serde(default = "default_true")]
    pub use_system_proxy: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            user_agent: None,
            on_timeout: LoserPolicy::default(),
            use_system_proxy: true,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// Fetch settings with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub on_timeout: LoserPolicy,
    pub use_system_proxy: bool,
}

impl TricksConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Resolve fetch settings: `env_timeout` (raw value of
    /// [`FETCH_TIMEOUT_ENV`]) beats `[fetch] timeout_ms`, which beats the
    /// built-in default. An unparseable env value is ignored with a warning.
    #[must_use]
    pub fn fetch_settings(&self, env_timeout: Option<&str>) -> FetchSettings {
        let fetch = self.fetch.as_ref();

        let env_ms = env_timeout.and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(ms) => Some(ms),
            Err(err) => {
                tracing::warn!("Ignoring {FETCH_TIMEOUT_ENV}={raw:?}: {err}");
                None
            }
        });

        let timeout = env_ms
            .or_else(|| fetch.and_then(|f| f.timeout_ms))
            .map_or(DEFAULT_FETCH_TIMEOUT, Duration::from_millis);

        FetchSettings {
            timeout,
            user_agent: fetch
                .and_then(|f| f.user_agent.clone())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            on_timeout: fetch.map(|f| f.on_timeout).unwrap_or_default(),
            use_system_proxy: fetch.is_none_or(|f| f.use_system_proxy),
        }
    }

    /// Log filter from `[log] filter`, or [`DEFAULT_LOG_FILTER`].
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log
            .as_ref()
            .and_then(|log| log.filter.as_deref())
            .unwrap_or(DEFAULT_LOG_FILTER)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tricks").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> TricksConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn parse_empty_config() {
        let config = parse("");
        assert!(config.fetch.is_none());
        assert!(config.log.is_none());
    }

    #[test]
    fn parse_fetch_config() {
        let config = parse(
            r#"
[fetch]
timeout_ms = 1000
user_agent = "custom/2.0"
on_timeout = "abort"
use_system_proxy = false
"#,
        );
        let fetch = config.fetch.unwrap();
        assert_eq!(fetch.timeout_ms, Some(1000));
        assert_eq!(fetch.user_agent.as_deref(), Some("custom/2.0"));
        assert_eq!(fetch.on_timeout, LoserPolicy::Abort);
        assert!(!fetch.use_system_proxy);
    }

    #[test]
    fn parse_fetch_config_defaults() {
        let config = parse("[fetch]\n");
        let fetch = config.fetch.unwrap();
        assert_eq!(fetch.timeout_ms, None);
        assert_eq!(fetch.on_timeout, LoserPolicy::Detach);
        assert!(fetch.use_system_proxy);
    }

    #[test]
    fn parse_rejects_unknown_policy() {
        let result = toml::from_str::<TricksConfig>("[fetch]\non_timeout = \"cancel\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn parse_log_config() {
        let config = parse("[log]\nfilter = \"tricks_race=debug\"\n");
        assert_eq!(config.log_filter(), "tricks_race=debug");
        assert_eq!(TricksConfig::default().log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn fetch_settings_defaults() {
        let settings = TricksConfig::default().fetch_settings(None);
        assert_eq!(settings.timeout, DEFAULT_FETCH_TIMEOUT);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(settings.on_timeout, LoserPolicy::Detach);
        assert!(settings.use_system_proxy);
    }

    #[test]
    fn fetch_settings_use_config_timeout() {
        let config = parse("[fetch]\ntimeout_ms = 1500\n");
        let settings = config.fetch_settings(None);
        assert_eq!(settings.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn fetch_settings_env_beats_config() {
        let config = parse("[fetch]\ntimeout_ms = 1500\n");
        let settings = config.fetch_settings(Some("250"));
        assert_eq!(settings.timeout, Duration::from_millis(250));
    }

    #[test]
    fn fetch_settings_ignore_invalid_env() {
        let config = parse("[fetch]\ntimeout_ms = 1500\n");
        let settings = config.fetch_settings(Some("soon"));
        assert_eq!(settings.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fetch]\ntimeout_ms = 42\n").unwrap();

        let config = TricksConfig::load_from(&path).unwrap();
        assert_eq!(config.fetch.unwrap().timeout_ms, Some(42));
    }

    #[test]
    fn load_from_reports_parse_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fetch\n").unwrap();

        let err = TricksConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn load_from_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = TricksConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn config_path_is_under_home() {
        if let Some(path) = config_path() {
            assert!(path.ends_with(".tricks/config.toml"));
        }
    }
}
