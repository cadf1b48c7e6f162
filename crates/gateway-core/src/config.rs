//! Console settings.
//!
//! Settings are read from a JSON file with camelCase keys. Every field is
//! optional in the file; missing fields take their defaults. The backend base
//! URL can be overridden after loading (environment variable or CLI flag).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur while loading or validating settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the settings file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid JSON for [`ConsoleSettings`].
    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend base URL is not an absolute http(s) URL.
    #[error("Invalid base URL: {0:?}")]
    InvalidBaseUrl(String),

    /// A duration setting is zero.
    #[error("{0} must be greater than zero")]
    InvalidDuration(&'static str),

    /// The browse root node id is empty.
    #[error("Browse root must not be empty")]
    EmptyBrowseRoot,
}

/// Settings for a console session against one gateway backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleSettings {
    /// Backend API root; relative endpoint paths are joined onto it.
    pub base_url: String,

    /// Per-request transport timeout.
    pub request_timeout_ms: u64,

    /// Editor debounce window.
    pub debounce_ms: u64,

    /// Tail poll period.
    pub tail_poll_ms: u64,

    /// Tail auto-stop ceiling.
    pub tail_ceiling_secs: u64,

    /// Default browse root (the Objects folder).
    pub browse_root: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api/".to_string(),
            request_timeout_ms: 10_000,
            debounce_ms: 800,
            tail_poll_ms: 2_000,
            tail_ceiling_secs: 300,
            browse_root: "ns=0;i=85".to_string(),
        }
    }
}

impl ConsoleSettings {
    /// Parse settings from JSON text and validate them.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = serde_json::from_str(text)?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Replace the base URL (e.g. from `GATEWAY_URL` or `--url`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        self.base_url = base_url.into();
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    /// Check that every duration is non-zero and the base URL is absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        let rest = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .ok_or_else(|| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidDuration("requestTimeoutMs"));
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::InvalidDuration("debounceMs"));
        }
        if self.tail_poll_ms == 0 {
            return Err(ConfigError::InvalidDuration("tailPollMs"));
        }
        if self.tail_ceiling_secs == 0 {
            return Err(ConfigError::InvalidDuration("tailCeilingSecs"));
        }
        if self.browse_root.trim().is_empty() {
            return Err(ConfigError::EmptyBrowseRoot);
        }
        Ok(())
    }

    /// Ensure the base URL ends with `/` so relative paths join under it.
    fn normalize(&mut self) {
        self.base_url = self.base_url.trim().to_string();
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tail_poll_period(&self) -> Duration {
        Duration::from_millis(self.tail_poll_ms)
    }

    pub fn tail_ceiling(&self) -> Duration {
        Duration::from_secs(self.tail_ceiling_secs)
    }
}
