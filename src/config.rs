//! Monitor configuration.
//!
//! Mirrors the layered scheme used across the rest of the stack:
//! CLI / env overrides > TOML file > built-in defaults. All fields are
//! optional in the TOML file; absent fields keep their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Hard cap on the number of configured probe URLs; extra entries are dropped.
pub const MAX_PROBE_URLS: usize = 5000;

const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;

/// Built-in probe targets: small, globally distributed endpoints that answer
/// plain 200s and are designed to absorb exactly this kind of traffic
/// (captive-portal detection URLs).
fn default_probe_urls() -> Vec<String> {
    [
        "http://detectportal.firefox.com/success.txt",
        "http://captive.apple.com/hotspot-detect.html",
        "http://www.msftconnecttest.com/connecttest.txt",
        "https://www.cloudflare.com/cdn-cgi/trace",
        "https://example.com/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Errors surfaced by configuration handling.
///
/// All of these are non-fatal to the hosting process.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `configure()` was called while the monitor is running.
    #[error("configuration cannot change while the monitor is running; stop() it first")]
    MonitorRunning,
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Connectivity monitor configuration (`netwatch.toml` or the `--config` file).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Probe targets, rotated round-robin. Capped at [`MAX_PROBE_URLS`].
    pub probe_urls: Vec<String>,
    /// Milliseconds between scheduled probes (default: 60000).
    pub poll_interval_ms: u64,
    /// Per-probe request timeout in milliseconds (default: 1000).
    pub request_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_urls: default_probe_urls(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load from a TOML file. Absent fields fall back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.normalize();
        Ok(config)
    }

    /// Overlay the supplied fields onto this config. Invalid values (empty
    /// URL list, zero interval or timeout) are ignored rather than applied —
    /// the previous value wins.
    pub fn apply(&mut self, patch: ConfigPatch) {
        match patch.urls {
            Some(urls) if !urls.is_empty() => {
                self.probe_urls = urls;
            }
            Some(_) => {
                debug!("ignoring empty probe URL list; keeping current targets");
            }
            None => {}
        }
        if let Some(interval_ms) = patch.interval_ms {
            if interval_ms > 0 {
                self.poll_interval_ms = interval_ms;
            } else {
                debug!("ignoring zero poll interval");
            }
        }
        if let Some(timeout_ms) = patch.timeout_ms {
            if timeout_ms > 0 {
                self.request_timeout_ms = timeout_ms;
            } else {
                debug!("ignoring zero request timeout");
            }
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        if self.probe_urls.is_empty() {
            self.probe_urls = default_probe_urls();
        }
        if self.probe_urls.len() > MAX_PROBE_URLS {
            self.probe_urls.truncate(MAX_PROBE_URLS);
        }
        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = DEFAULT_POLL_INTERVAL_MS;
        }
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = DEFAULT_REQUEST_TIMEOUT_MS;
        }
    }
}

/// Partial configuration update passed to `InternetMonitor::configure`.
///
/// Only the supplied fields are overwritten; the rest keep their prior values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub urls: Option<Vec<String>>,
    pub interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}
