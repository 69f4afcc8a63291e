//! Runtime settings: the endpoint chain, pacing and timeouts.
//!
//! Everything has a built-in default, so a config file only needs the keys
//! it wants to change.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::batch::DEFAULT_DELAY;
use crate::endpoint::{DEFAULT_PRIMARY_BASE, EndpointChain, Relay};
use crate::transport::DEFAULT_TIMEOUT;

/// Errors loading a config file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The file is not valid TOML for [`Config`].
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
}

/// The primary endpoint's settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// Base URL; the encoded handle is appended as the last path segment.
    #[serde(default = "default_primary_base")]
    pub base: String,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            base: default_primary_base(),
        }
    }
}

fn default_primary_base() -> String {
    DEFAULT_PRIMARY_BASE.to_string()
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// All tunable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Pause between handles, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// The directly queried identity API.
    #[serde(default)]
    pub primary: PrimaryConfig,

    /// Relays tried after the primary, in order.
    #[serde(default = "Relay::defaults")]
    pub relays: Vec<Relay>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            primary: PrimaryConfig::default(),
            relays: Relay::defaults(),
        }
    }
}

impl Config {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error when the text does not describe a `Config`.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), relays = config.relays.len(), "loaded config");
        Ok(config)
    }

    /// Pause between handles.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Per-request timeout. Zero is bumped to one second.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The endpoint chain these settings describe.
    #[must_use]
    pub fn chain(&self) -> EndpointChain {
        EndpointChain::new(self.primary.base.clone(), self.relays.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Endpoint, UrlShape};

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
        let config = Config::default();
        assert_eq!(config.delay(), Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.chain(), EndpointChain::default());
    }

    #[test]
    fn full_file() {
        let config = Config::from_toml(
            r#"
            delay_ms = 1000
            timeout_secs = 3

            [primary]
            base = "http://localhost:8080/profiles"

            [[relays]]
            name = "mine"
            shape = "query"
            base = "http://relay.local/get"
            param = "target"

            [[relays]]
            name = "prefix"
            shape = "prefix"
            base = "http://prefix.local/"
            "#,
        )
        .unwrap();

        assert_eq!(config.delay(), Duration::from_secs(1));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.relays, vec![
            Relay::new("mine", UrlShape::Query {
                base: "http://relay.local/get".into(),
                param: "target".into(),
            }),
            Relay::new("prefix", UrlShape::Prefix {
                base: "http://prefix.local/".into(),
            }),
        ]);
        let chain = config.chain();
        assert_eq!(chain.len(), 3);
        assert_eq!(
            chain.url_for(&chain.endpoints()[1], "Foo"),
            "http://relay.local/get?target=http%3A%2F%2Flocalhost%3A8080%2Fprofiles%2FFoo"
        );
    }

    #[test]
    fn explicit_empty_relays_is_direct_only() {
        let config = Config::from_toml("relays = []").unwrap();
        let chain = config.chain();
        assert_eq!(chain.endpoints(), [Endpoint::Primary]);
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let err = Config::from_toml(
            r#"
            [[relays]]
            name = "x"
            shape = "carrier-pigeon"
            base = "http://x"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"), "{err}");
    }

    #[test]
    fn zero_timeout_is_bumped() {
        let config = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/nick-avail.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/nick-avail.toml"));
    }
}
