//! Clients for the remote resource API.
//!
//! The reconciler only sees the [`ResourceClient`] capability. Concrete
//! transports live behind it:
//! - memory: in-process account, used by tests and the local simulator

pub mod memory;

pub use memory::MemoryResourceClient;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::types::{CreateRequest, RemoteResource};

/// Capability over named remote resources inside a scope (resource group).
///
/// Every call is a single blocking unit of work from the caller's view; any
/// polling of long-running operations happens inside the implementation.
/// Implementations must stop and return [`ClientError::Cancelled`] once
/// `cancel` fires.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List every resource in `scope`, tagged or not.
    async fn list(
        &self,
        cancel: &CancellationToken,
        scope: &str,
    ) -> Result<Vec<RemoteResource>, ClientError>;

    /// Fetch a resource by name. Absence is [`ClientError::NotFound`].
    async fn get(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        name: &str,
    ) -> Result<RemoteResource, ClientError>;

    /// Create a resource and wait until it is provisioned.
    async fn create(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        request: &CreateRequest,
    ) -> Result<RemoteResource, ClientError>;

    /// Delete a resource. Deleting an absent resource succeeds.
    async fn delete(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        name: &str,
    ) -> Result<(), ClientError>;
}
