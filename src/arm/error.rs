//! ARM error taxonomy
//!
//! Every failure the control-plane core can produce, as one inspectable enum.
//! Variants carry the request method and endpoint, and where a response was
//! received, its status code and raw body, so a caller can diagnose a failure
//! without re-issuing the request.

use super::location::InvalidLocation;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a [`Transport`](super::http::Transport) implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the `arm` module.
pub type Result<T, E = ArmError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ArmError {
    /// The request never produced a response (connection refused, TLS, timeout)
    #[error("transport error on {method} {endpoint}: {source}")]
    Transport {
        method: Method,
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// A response arrived with a status code outside the expected set
    #[error("unexpected status {status} on {method} {endpoint} (expected {expected})")]
    UnexpectedStatus {
        method: Method,
        endpoint: String,
        status: StatusCode,
        expected: StatusCode,
        body: String,
    },

    /// The resource does not exist
    #[error("resource not found: {endpoint}")]
    NotFound { endpoint: String, body: String },

    /// A body or header did not have the expected shape
    #[error("failed to decode {what} from {endpoint}: {detail}")]
    Deserialization {
        endpoint: String,
        what: &'static str,
        detail: String,
        body: String,
    },

    /// A request body could not be encoded
    #[error("failed to encode request body for {endpoint}: {source}")]
    Serialization {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The long-running operation reached a terminal state other than Succeeded
    #[error("operation {endpoint} failed with status {}", .status.as_deref().unwrap_or("<missing>"))]
    OperationFailed {
        endpoint: String,
        status: Option<String>,
        body: String,
    },

    /// The polling deadline or attempt budget ran out while still Pending
    #[error("operation {endpoint} still pending after {attempts} polls ({elapsed:?})")]
    OperationTimedOut {
        endpoint: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// The caller canceled the call.
    ///
    /// For a canceled create the remote operation may still complete; its
    /// outcome is unknown to the caller and must be re-checked with a read.
    #[error("operation on {endpoint} canceled")]
    OperationCanceled { endpoint: String },

    #[error(transparent)]
    InvalidLocation(#[from] InvalidLocation),

    #[error("invalid {field}: {reason}")]
    InvalidIdentity { field: &'static str, reason: String },

    /// A requested change touches fields that can only be set at creation
    #[error("create-only fields cannot be updated in place: {}", .fields.join(", "))]
    ImmutableFieldChanged { fields: Vec<&'static str> },
}

impl ArmError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArmError::NotFound { .. })
    }

    /// Check if the caller canceled the call
    pub fn is_canceled(&self) -> bool {
        matches!(self, ArmError::OperationCanceled { .. })
    }

    /// Raw response body attached to the error, if a response was received
    pub fn body(&self) -> Option<&str> {
        match self {
            ArmError::UnexpectedStatus { body, .. }
            | ArmError::NotFound { body, .. }
            | ArmError::Deserialization { body, .. }
            | ArmError::OperationFailed { body, .. } => Some(body),
            _ => None,
        }
    }

    /// HTTP status of the offending response, if one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ArmError::UnexpectedStatus { status, .. } => Some(*status),
            ArmError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ArmError::UnexpectedStatus { status, .. } => suggestion_for_status(*status),
            ArmError::NotFound { .. } => Some("Check the subscription, resource group and domain name."),
            ArmError::OperationTimedOut { .. } => {
                Some("The operation may still complete. Run `show` later or raise --poll-timeout.")
            }
            ArmError::OperationCanceled { .. } => {
                Some("The remote operation may still complete. Run `show` to check its state.")
            }
            ArmError::ImmutableFieldChanged { .. } => {
                Some("Create-only fields require deleting and recreating the directory.")
            }
            _ => None,
        }
    }
}

fn suggestion_for_status(status: StatusCode) -> Option<&'static str> {
    match status.as_u16() {
        400 => Some("Invalid request. Only tags can be changed after creation."),
        401 => Some("Authentication failed. Supply a fresh token with --token or ARM_ACCESS_TOKEN."),
        403 => Some("Permission denied. Check the role assignment on the resource group."),
        409 => Some("Resource conflict. The domain name may already be taken."),
        429 => Some("Rate limit exceeded. Please try again later."),
        500 | 502 | 503 => Some("Control plane temporarily unavailable. Please try again."),
        _ => None,
    }
}
