//! ARM control-plane interaction module
//!
//! This module provides the core functionality for provisioning CIAM
//! directories through Azure Resource Manager: the HTTP transport, the
//! long-running operation poller, and the resource client built on both.
//!
//! # Module Structure
//!
//! - [`client`] - CRUD client for `ciamDirectories`
//! - [`error`] - Error taxonomy shared by every operation
//! - [`http`] - Transport trait and reqwest implementation
//! - [`location`] - Region name to country code mapping
//! - [`poller`] - `Azure-AsyncOperation` polling
//! - [`types`] - Resource identity and representation
//!
//! # Example
//!
//! ```ignore
//! use ciamctl::arm::{ArmConfig, NewTenant, PollConfig, ResourceIdentity, TenantClient};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example(token: String) -> anyhow::Result<()> {
//!     let client = TenantClient::connect(ArmConfig::default(), PollConfig::default(), Some(token))?;
//!     let identity = ResourceIdentity::new("00000000-0000-0000-0000-000000000001", "rg", "contoso")?;
//!     let desired = NewTenant::new("Europe", "Base", "Contoso");
//!     let tenant = client.create(&identity, &desired, &CancellationToken::new()).await?;
//!     println!("{:?}", tenant.tenant_id());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod location;
pub mod poller;
pub mod types;

pub use client::TenantClient;
pub use error::{ArmError, Result};
pub use http::{ApiRequest, ApiResponse, ArmConfig, ReqwestTransport, Transport};
pub use location::{resolve, CountryCode, InvalidLocation};
pub use poller::{OperationHandle, OperationStatus, PollConfig, Poller};
pub use types::{NewTenant, ResourceIdentity, Tags, Tenant};
