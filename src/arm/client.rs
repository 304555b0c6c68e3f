//! CIAM directory client
//!
//! Create, read, update and delete for `Microsoft.AzureActiveDirectory/ciamDirectories`,
//! combining the transport with the operation poller.

use super::error::{ArmError, Result};
use super::http::{ApiRequest, ApiResponse, ArmConfig, ReqwestTransport, Transport};
use super::poller::{OperationHandle, PollConfig, Poller};
use super::types::{NewTenant, ResourceIdentity, Tags, TagsPatch, Tenant};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Client for CIAM directories
pub struct TenantClient<T: Transport + ?Sized = ReqwestTransport> {
    transport: Arc<T>,
    config: ArmConfig,
    poll: PollConfig,
}

impl<T: Transport + ?Sized> Clone for TenantClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            poll: self.poll.clone(),
        }
    }
}

impl TenantClient<ReqwestTransport> {
    /// Create a client over a reqwest transport for the configured endpoint
    pub fn connect(config: ArmConfig, poll: PollConfig, token: Option<String>) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(&config, token)?;
        Ok(Self::new(Arc::new(transport), config, poll))
    }
}

impl<T: Transport + ?Sized> TenantClient<T> {
    pub fn new(transport: Arc<T>, config: ArmConfig, poll: PollConfig) -> Self {
        Self {
            transport,
            config,
            poll,
        }
    }

    /// Resource path with the api-version query
    pub fn resource_url(&self, identity: &ResourceIdentity) -> String {
        format!(
            "{}?api-version={}",
            identity.resource_path(),
            urlencoding::encode(&self.config.api_version)
        )
    }

    /// Create a directory and wait for provisioning to finish.
    ///
    /// Returns the state read back after the operation succeeds, not the body
    /// of the PUT response. If `cancel` fires while polling, the call returns
    /// `OperationCanceled` and the remote operation's outcome is unknown; it
    /// may still complete, so callers should `read` before retrying.
    pub async fn create(
        &self,
        identity: &ResourceIdentity,
        desired: &NewTenant,
        cancel: &CancellationToken,
    ) -> Result<Tenant> {
        let body = desired.to_request()?;
        let url = self.resource_url(identity);
        info!(domain = identity.domain_name(), location = %desired.location, "Creating directory");

        let response = self
            .send(ApiRequest::put(&url, to_body(&body, &url)?), cancel)
            .await?;
        expect_status(&response, Method::PUT, &url, StatusCode::CREATED)?;

        let handle = OperationHandle::from_response(&response, &url)?;
        info!(
            domain = identity.domain_name(),
            operation = %handle.endpoint(),
            wait_ms = handle.initial_wait().as_millis() as u64,
            "Waiting for provisioning"
        );

        Poller::new(self.transport.as_ref(), &self.poll)
            .poll(handle, cancel)
            .await?;

        self.read(identity, cancel).await
    }

    /// Fetch the current state of a directory
    pub async fn read(&self, identity: &ResourceIdentity, cancel: &CancellationToken) -> Result<Tenant> {
        let url = self.resource_url(identity);
        let response = self.send(ApiRequest::get(&url), cancel).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(ArmError::NotFound {
                endpoint: url,
                body: response.body,
            });
        }
        expect_status(&response, Method::GET, &url, StatusCode::OK)?;

        decode(&response, &url)
    }

    /// Replace the tags of a directory.
    ///
    /// The PATCH body carries only the tag map; the control plane rejects any
    /// create-only field on update. The response body is the updated state.
    pub async fn update(
        &self,
        identity: &ResourceIdentity,
        tags: &Tags,
        cancel: &CancellationToken,
    ) -> Result<Tenant> {
        let url = self.resource_url(identity);
        info!(domain = identity.domain_name(), tags = tags.len(), "Updating directory tags");

        let response = self
            .send(ApiRequest::patch(&url, to_body(&TagsPatch { tags }, &url)?), cancel)
            .await?;
        expect_status(&response, Method::PATCH, &url, StatusCode::OK)?;

        decode(&response, &url)
    }

    /// Move a directory from `previous` to `desired`.
    ///
    /// Fails with `ImmutableFieldChanged` before any request when a create-only
    /// field differs, instead of sending only the tags and dropping the rest.
    pub async fn apply_changes(
        &self,
        identity: &ResourceIdentity,
        previous: &Tenant,
        desired: &Tenant,
        cancel: &CancellationToken,
    ) -> Result<Tenant> {
        let fields = previous.create_only_changes(desired);
        if !fields.is_empty() {
            return Err(ArmError::ImmutableFieldChanged { fields });
        }

        self.update(identity, TagsPatch::from(desired).tags, cancel).await
    }

    /// Delete a directory
    pub async fn delete(&self, identity: &ResourceIdentity, cancel: &CancellationToken) -> Result<()> {
        let url = self.resource_url(identity);
        info!(domain = identity.domain_name(), "Deleting directory");

        let response = self.send(ApiRequest::delete(&url), cancel).await?;
        expect_status(&response, Method::DELETE, &url, StatusCode::NO_CONTENT)
    }

    async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<ApiResponse> {
        let method = request.method.clone();
        let endpoint = request.path.clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ArmError::OperationCanceled { endpoint }),
            result = self.transport.send(request) => {
                result.map_err(|source| ArmError::Transport { method, endpoint, source })
            }
        }
    }
}

fn to_body<S: Serialize>(value: &S, endpoint: &str) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|source| ArmError::Serialization {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn expect_status(response: &ApiResponse, method: Method, endpoint: &str, expected: StatusCode) -> Result<()> {
    if response.status == expected {
        return Ok(());
    }
    Err(ArmError::UnexpectedStatus {
        method,
        endpoint: endpoint.to_string(),
        status: response.status,
        expected,
        body: response.body.clone(),
    })
}

fn decode<D: DeserializeOwned>(response: &ApiResponse, endpoint: &str) -> Result<D> {
    serde_json::from_str(&response.body).map_err(|e| ArmError::Deserialization {
        endpoint: endpoint.to_string(),
        what: "resource body",
        detail: e.to_string(),
        body: response.body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::error::BoxError;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::sync::Mutex;

    /// Records requests and answers each with the same canned response
    struct FixedTransport {
        status: StatusCode,
        body: String,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl FixedTransport {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status: StatusCode::from_u16(status).unwrap(),
                body: body.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, BoxError> {
            self.requests.lock().unwrap().push(request);
            Ok(ApiResponse {
                status: self.status,
                headers: HeaderMap::new(),
                body: self.body.clone(),
            })
        }
    }

    fn identity() -> ResourceIdentity {
        ResourceIdentity::new("00000000-0000-0000-0000-000000000001", "rg", "contoso").unwrap()
    }

    fn client<T: Transport>(transport: Arc<T>) -> TenantClient<T> {
        TenantClient::new(transport, ArmConfig::default(), PollConfig::default())
    }

    #[test]
    fn resource_url_carries_api_version() {
        let client = client(FixedTransport::new(200, "{}"));
        assert_eq!(
            client.resource_url(&identity()),
            "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/rg\
             /providers/Microsoft.AzureActiveDirectory/ciamDirectories/contoso\
             ?api-version=2023-05-17-preview"
        );
    }

    #[test]
    fn unencodable_body_is_an_error() {
        let body = std::collections::BTreeMap::from([((1u8, 2u8), "value")]);
        let err = to_body(&body, "/put").unwrap_err();
        assert!(matches!(err, ArmError::Serialization { ref endpoint, .. } if endpoint == "/put"));

        let tags = Tags::from([("env".to_string(), "prod".to_string())]);
        let value = to_body(&TagsPatch { tags: &tags }, "/patch").unwrap();
        assert_eq!(value, serde_json::json!({"tags": {"env": "prod"}}));
    }

    #[tokio::test]
    async fn apply_changes_rejects_create_only_edits() {
        let transport = FixedTransport::new(200, "{}");
        let client = client(transport.clone());

        let previous = NewTenant::new("Europe", "Base", "Contoso").to_request().unwrap();
        let mut desired = previous.clone();
        desired.location = Some("Australia".to_string());

        let err = client
            .apply_changes(&identity(), &previous, &desired, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ArmError::ImmutableFieldChanged { ref fields } if fields == &vec!["location"]));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_changes_patches_tags_only() {
        let transport = FixedTransport::new(200, r#"{"tags":{"env":"dev"}}"#);
        let client = client(transport.clone());

        let previous = NewTenant::new("Europe", "Base", "Contoso").to_request().unwrap();
        let mut desired = previous.clone();
        desired.tags = Some(Tags::from([("env".to_string(), "dev".to_string())]));

        let updated = client
            .apply_changes(&identity(), &previous, &desired, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(updated.tags, desired.tags);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::PATCH);
        assert_eq!(requests[0].body, Some(serde_json::json!({"tags": {"env": "dev"}})));
    }

    #[tokio::test]
    async fn canceled_token_short_circuits_requests() {
        let transport = FixedTransport::new(200, "{}");
        let client = client(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.read(&identity(), &cancel).await.unwrap_err();
        assert!(err.is_canceled());
        let err = client.delete(&identity(), &cancel).await.unwrap_err();
        assert!(err.is_canceled());
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_rejects_malformed_body() {
        let client = client(FixedTransport::new(200, "not json"));
        let err = client.read(&identity(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ArmError::Deserialization { what: "resource body", .. }));
        assert_eq!(err.body(), Some("not json"));
    }

    #[tokio::test]
    async fn create_rejects_unknown_location_before_sending() {
        let transport = FixedTransport::new(201, "{}");
        let client = client(transport.clone());

        let err = client
            .create(&identity(), &NewTenant::new("Atlantis", "Base", "Contoso"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ArmError::InvalidLocation(_)));
        assert!(transport.requests.lock().unwrap().is_empty());
    }
}
