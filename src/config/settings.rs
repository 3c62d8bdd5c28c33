//! Settings structures for the hostel search client

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Base URL used when nothing is configured
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Client-side deadline for a search request, in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Main settings structure matching `settings.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub client: ClientSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| SearchError::Config(e.to_string()))
    }

    /// Merge with environment variables (HOSTEL_SEARCH_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn merge_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("HOSTEL_SEARCH_API_URL") {
            if !val.trim().is_empty() {
                self.client.api_url = val;
            }
        }
        if let Some(val) = lookup("HOSTEL_SEARCH_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.client.request_timeout_ms = ms;
            }
        }
    }

    /// Check that the settings can be used to build a client
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.client.api_url)
            .map_err(|e| SearchError::Config(format!("invalid api_url '{}': {e}", self.client.api_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SearchError::Config(format!(
                "api_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.client.request_timeout_ms == 0 {
            return Err(SearchError::Config(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for talking to the search service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of the search service
    pub api_url: String,
    /// Deadline for a single search, measured from submission
    pub request_timeout_ms: u64,
    /// User agent sent with every request
    pub user_agent: String,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// Proxy for all outgoing requests
    pub proxy: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: format!("hostel-search/{}", crate::VERSION),
            verify_ssl: true,
            proxy: None,
        }
    }
}

impl ClientSettings {
    /// Deadline as a [`std::time::Duration`]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}
