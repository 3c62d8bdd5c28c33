//! HTTP client for talking to the hostel search service

use crate::config::ClientSettings;
use crate::error::{Result, SearchError};
use crate::search::{SearchBackend, SEARCH_PATH};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Raw response from the search service
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub text: String,
}

impl ApiResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.text).map_err(|e| SearchError::Parse(e.to_string()))
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`SearchError::Status`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SearchError::Status {
                status: self.status,
                body: self.text,
            })
        }
    }
}

/// Body of the service's health endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

/// HTTP client wrapper bound to one search service
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&ClientSettings::default())
    }

    /// Create a new HTTP client with custom settings
    ///
    /// No overall request timeout is set here: the controller owns the
    /// deadline and drops the request future when it expires.
    pub fn with_settings(settings: &ClientSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxy {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())
                .map_err(|e| SearchError::Config(format!("invalid proxy '{proxy_url}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL every path is resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        let url = self.endpoint(path);
        debug!(%url, "POST");
        // `.json()` sets `Content-Type: application/json`
        let response = self.client.post(&url).json(body).send().await?;
        Self::parse_response(response).await
    }

    /// Simple GET request
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        let url = self.endpoint(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        Self::parse_response(response).await
    }

    /// Probe the service root
    ///
    /// Any 2xx counts as healthy. A body that is not the expected JSON still
    /// yields a status, with empty fields.
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let response = self.get("/").await?.error_for_status()?;
        Ok(response.json().unwrap_or_default())
    }

    async fn parse_response(response: Response) -> Result<ApiResponse> {
        let status = response.status();
        // An error status stands on its own even if its body cannot be read.
        let text = if status.is_success() {
            response.text().await?
        } else {
            response.text().await.unwrap_or_default()
        };
        Ok(ApiResponse {
            status: status.as_u16(),
            text,
        })
    }
}

#[async_trait]
impl SearchBackend for HttpClient {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn search(&self, query: &str) -> Result<Value> {
        let response = self
            .post_json(SEARCH_PATH, &json!({ "query": query }))
            .await?
            .error_for_status()?;
        response.json()
    }
}
