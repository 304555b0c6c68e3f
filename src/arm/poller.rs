//! Long-running operation polling
//!
//! A create returns `201 Created` with an `Azure-AsyncOperation` URL and a
//! `Retry-After` hint. [`Poller::poll`] waits, queries that URL, and repeats
//! until the operation is terminal, the deadline or attempt budget runs out,
//! or the caller cancels.

use super::error::{ArmError, Result};
use super::http::{ApiRequest, ApiResponse, Transport};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Bounds for a single polling loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Maximum total time spent polling one operation
    pub timeout: Duration,
    /// Maximum number of status requests, unbounded when `None`
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            max_attempts: None,
        }
    }
}

/// Parse a `Retry-After` value as a non-negative number of seconds
pub fn parse_retry_after(value: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("'{value}' is not a number: {e}"))?;

    if seconds.is_nan() {
        return Err(format!("'{value}' is not a number"));
    }
    if seconds < 0.0 {
        return Err(format!("'{value}' is negative"));
    }
    // covers "-0"
    if seconds == 0.0 {
        return Ok(Duration::ZERO);
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("'{value}' is out of range: {e}"))
}

/// Status URL and first wait of a pending operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    endpoint: Url,
    initial_wait: Duration,
}

impl OperationHandle {
    pub fn new(endpoint: Url, initial_wait: Duration) -> Self {
        Self {
            endpoint,
            initial_wait,
        }
    }

    /// Extract the handle from a create response.
    ///
    /// Both headers are required. A missing or unparseable status URL or
    /// `Retry-After` is fatal.
    pub fn from_response(response: &ApiResponse, request_endpoint: &str) -> Result<Self> {
        let malformed = |what: &'static str, detail: String| ArmError::Deserialization {
            endpoint: request_endpoint.to_string(),
            what,
            detail,
            body: response.body.clone(),
        };

        let raw = response
            .header(ASYNC_OPERATION_HEADER)
            .ok_or_else(|| malformed("Azure-AsyncOperation header", "header is missing".to_string()))?;
        let endpoint = Url::parse(raw).map_err(|e| malformed("Azure-AsyncOperation header", format!("'{raw}': {e}")))?;

        let value = response
            .header(RETRY_AFTER_HEADER)
            .ok_or_else(|| malformed("Retry-After header", "header is missing".to_string()))?;
        let initial_wait = parse_retry_after(value).map_err(|e| malformed("Retry-After header", e))?;

        Ok(Self::new(endpoint, initial_wait))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn initial_wait(&self) -> Duration {
        self.initial_wait
    }

    /// Path and query of the status URL, to be resolved against the transport base
    pub fn path_and_query(&self) -> String {
        match self.endpoint.query() {
            Some(query) => format!("{}?{}", self.endpoint.path(), query),
            None => self.endpoint.path().to_string(),
        }
    }
}

/// Terminal or transient state of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Succeeded,
    /// Any other value, or no readable status at all
    Failed(Option<String>),
}

impl OperationStatus {
    pub fn parse(body: &str) -> Self {
        #[derive(Deserialize)]
        struct StatusBody {
            status: Option<String>,
        }

        match serde_json::from_str::<StatusBody>(body).map(|b| b.status) {
            Ok(Some(status)) => match status.as_str() {
                "Pending" => OperationStatus::Pending,
                "Succeeded" => OperationStatus::Succeeded,
                _ => OperationStatus::Failed(Some(status)),
            },
            _ => OperationStatus::Failed(None),
        }
    }
}

/// Drives one operation handle to completion
pub struct Poller<'a, T: Transport + ?Sized> {
    transport: &'a T,
    config: &'a PollConfig,
}

impl<'a, T: Transport + ?Sized> Poller<'a, T> {
    pub fn new(transport: &'a T, config: &'a PollConfig) -> Self {
        Self { transport, config }
    }

    /// Poll until the operation succeeds.
    ///
    /// Returns `OperationFailed` for any terminal status other than
    /// `Succeeded`, `OperationTimedOut` when the deadline or attempt budget is
    /// exhausted, and `OperationCanceled` as soon as `cancel` fires. No request
    /// is issued after cancellation.
    pub async fn poll(&self, handle: OperationHandle, cancel: &CancellationToken) -> Result<()> {
        let endpoint = handle.endpoint().to_string();
        let path = handle.path_and_query();
        let start = Instant::now();
        // far-future fallback for timeouts that overflow the clock
        let deadline = start
            .checked_add(self.config.timeout)
            .unwrap_or_else(|| start + Duration::from_secs(365 * 24 * 60 * 60));
        let mut wait = handle.initial_wait();
        let mut attempts = 0u32;

        let timed_out = |attempts: u32| ArmError::OperationTimedOut {
            endpoint: endpoint.clone(),
            attempts,
            elapsed: start.elapsed(),
        };
        let canceled = || ArmError::OperationCanceled {
            endpoint: endpoint.clone(),
        };

        loop {
            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(timed_out(attempts));
            }

            let wake = (Instant::now() + wait).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(canceled()),
                _ = tokio::time::sleep_until(wake) => {}
            }
            if Instant::now() >= deadline {
                return Err(timed_out(attempts));
            }

            attempts += 1;
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(canceled()),
                _ = tokio::time::sleep_until(deadline) => return Err(timed_out(attempts)),
                result = self.transport.send(ApiRequest::get(path.clone())) => {
                    result.map_err(|source| ArmError::Transport {
                        method: Method::GET,
                        endpoint: endpoint.clone(),
                        source,
                    })?
                }
            };

            if response.status != StatusCode::OK {
                return Err(ArmError::UnexpectedStatus {
                    method: Method::GET,
                    endpoint: endpoint.clone(),
                    status: response.status,
                    expected: StatusCode::OK,
                    body: response.body,
                });
            }

            match OperationStatus::parse(&response.body) {
                OperationStatus::Pending => {
                    if let Some(value) = response.header(RETRY_AFTER_HEADER) {
                        match parse_retry_after(value) {
                            Ok(next) => wait = next,
                            Err(e) => warn!(operation = %endpoint, "Ignoring malformed Retry-After: {}", e),
                        }
                    }
                    debug!(
                        operation = %endpoint,
                        attempt = attempts,
                        wait_ms = wait.as_millis() as u64,
                        "Operation pending"
                    );
                }
                OperationStatus::Succeeded => {
                    info!(operation = %endpoint, attempts, "Operation succeeded");
                    return Ok(());
                }
                OperationStatus::Failed(status) => {
                    return Err(ArmError::OperationFailed {
                        endpoint: endpoint.clone(),
                        status,
                        body: response.body,
                    });
                }
            }
        }
    }
}
