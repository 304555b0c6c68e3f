//! HTTP transport for ARM REST API calls

use super::error::BoxError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_API_VERSION: &str = "2023-05-17-preview";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Per-request timeout for the reqwest client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Control-plane endpoint and API version, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmConfig {
    pub endpoint: Url,
    pub api_version: String,
}

impl ArmConfig {
    pub fn new(endpoint: &str, api_version: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).with_context(|| format!("Invalid ARM endpoint: {endpoint}"))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("ARM endpoint cannot be used as a base URL: {endpoint}");
        }
        Ok(Self {
            endpoint,
            api_version: api_version.to_string(),
        })
    }
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

/// A request relative to the transport's base endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path and query, e.g. `/subscriptions/...?api-version=...`
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PATCH,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// A response as received, before any status interpretation
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Sends requests against a control-plane base endpoint.
///
/// Implementations must be safe for concurrent use; the client shares one
/// transport across all calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, BoxError>;
}

/// reqwest-backed transport with a shared connection pool
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl ReqwestTransport {
    /// Create a new transport against the configured endpoint
    pub fn new(config: &ArmConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ciamctl/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        // keep any path prefix of the endpoint when joining request paths
        let mut base = config.endpoint.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self { client, base, token })
    }

    fn request_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, BoxError> {
        let url = self.request_url(&request.path)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
        }

        Ok(ApiResponse { status, headers, body })
    }
}
