//! In-process resource account.
//!
//! Behaves like the remote API as far as the reconciler can tell: tagged and
//! untagged resources per scope, `NotFound` on missing gets, idempotent
//! deletes. Failures can be injected per operation, and every call is
//! journaled so tests can assert which side effects happened.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::ResourceClient;
use crate::error::ClientError;
use crate::types::{CreateRequest, RemoteResource};

/// Scope name -> resource name -> resource.
type Account = BTreeMap<String, BTreeMap<String, RemoteResource>>;

/// Operation kinds, used for fault injection and journal queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Delete,
}

/// One journaled call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Operation,
    pub scope: String,
    /// Resource name; `None` for list calls.
    pub name: Option<String>,
}

struct Fault {
    op: Operation,
    name: Option<String>,
    error: ClientError,
}

#[derive(Default)]
struct State {
    account: Account,
    faults: Vec<Fault>,
    journal: Vec<Call>,
}

impl State {
    /// Record the call and pop the first matching injected fault.
    fn enter(&mut self, op: Operation, scope: &str, name: Option<&str>) -> Result<(), ClientError> {
        self.journal.push(Call {
            op,
            scope: scope.to_string(),
            name: name.map(str::to_string),
        });
        let hit = self.faults.iter().position(|f| {
            f.op == op && (f.name.is_none() || f.name.as_deref() == name)
        });
        match hit {
            Some(idx) => Err(self.faults.remove(idx).error),
            None => Ok(()),
        }
    }
}

/// Resource client backed by process memory.
#[derive(Default)]
pub struct MemoryResourceClient {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl MemoryResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, honoring cancellation while waiting.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Load an account snapshot written by [`save`](Self::save). A missing
    /// file yields an empty account.
    pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let account: Account = match tokio::fs::read(path.as_ref()).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Account::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            state: Mutex::new(State {
                account,
                ..State::default()
            }),
            latency: None,
        })
    }

    /// Write the account to `path` as JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let state = self.state.lock().await;
        let raw = serde_json::to_vec_pretty(&state.account)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(path, raw).await
    }

    /// Place a resource directly into the account, bypassing the journal.
    pub async fn insert(&self, scope: &str, resource: RemoteResource) {
        let mut state = self.state.lock().await;
        state
            .account
            .entry(scope.to_string())
            .or_default()
            .insert(resource.name.clone(), resource);
    }

    /// Remove a resource behind the reconciler's back.
    pub async fn vanish(&self, scope: &str, name: &str) -> Option<RemoteResource> {
        let mut state = self.state.lock().await;
        state.account.get_mut(scope)?.remove(name)
    }

    /// All resources currently in `scope`, ordered by name.
    pub async fn resources(&self, scope: &str) -> Vec<RemoteResource> {
        let state = self.state.lock().await;
        state
            .account
            .get(scope)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn contains_id(&self, scope: &str, id: &str) -> bool {
        self.resources(scope).await.iter().any(|r| r.id == id)
    }

    /// Fail the next `op` call (for `name`, or any name when `None`).
    pub async fn fail_on(&self, op: Operation, name: Option<&str>, error: ClientError) {
        let mut state = self.state.lock().await;
        state.faults.push(Fault {
            op,
            name: name.map(str::to_string),
            error,
        });
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.journal.clone()
    }

    pub async fn count(&self, op: Operation) -> usize {
        self.state
            .lock()
            .await
            .journal
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    async fn pace(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceClient for MemoryResourceClient {
    async fn list(
        &self,
        cancel: &CancellationToken,
        scope: &str,
    ) -> Result<Vec<RemoteResource>, ClientError> {
        self.pace(cancel).await?;
        let mut state = self.state.lock().await;
        state.enter(Operation::List, scope, None)?;
        debug!("Listing resources in {}", scope);
        Ok(state
            .account
            .get(scope)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        name: &str,
    ) -> Result<RemoteResource, ClientError> {
        self.pace(cancel).await?;
        let mut state = self.state.lock().await;
        state.enter(Operation::Get, scope, Some(name))?;
        state
            .account
            .get(scope)
            .and_then(|r| r.get(name))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                scope: scope.to_string(),
                name: name.to_string(),
            })
    }

    async fn create(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        request: &CreateRequest,
    ) -> Result<RemoteResource, ClientError> {
        self.pace(cancel).await?;
        let mut state = self.state.lock().await;
        state.enter(Operation::Create, scope, Some(&request.name))?;

        let resources = state.account.entry(scope.to_string()).or_default();
        // Create-or-update: an existing resource keeps its id.
        let id = match resources.get(&request.name) {
            Some(existing) => existing.id.clone(),
            None => format!(
                "/resourceGroups/{}/virtualMachineScaleSets/{}/{}",
                scope,
                request.name,
                Uuid::new_v4()
            ),
        };
        let resource = RemoteResource {
            id,
            name: request.name.clone(),
            region: request.region.clone(),
            fault_domain_count: request.fault_domain_count,
            tags: request.tags.clone(),
        };
        debug!("Created resource {} in {}", resource.name, scope);
        resources.insert(resource.name.clone(), resource.clone());
        Ok(resource)
    }

    async fn delete(
        &self,
        cancel: &CancellationToken,
        scope: &str,
        name: &str,
    ) -> Result<(), ClientError> {
        self.pace(cancel).await?;
        let mut state = self.state.lock().await;
        state.enter(Operation::Delete, scope, Some(name))?;
        if let Some(resources) = state.account.get_mut(scope) {
            if resources.remove(name).is_some() {
                debug!("Deleted resource {} in {}", name, scope);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> CreateRequest {
        CreateRequest {
            name: name.to_string(),
            region: "westeurope".to_string(),
            fault_domain_count: 2,
            tags: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let client = MemoryResourceClient::new();
        let err = client
            .get(&CancellationToken::new(), "rg", "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let client = MemoryResourceClient::new();
        let cancel = CancellationToken::new();

        let created = client
            .create(&cancel, "rg", &request("vmo-a"))
            .await
            .unwrap();
        let fetched = client.get(&cancel, "rg", "vmo-a").await.unwrap();
        assert_eq!(created, fetched);

        client.delete(&cancel, "rg", "vmo-a").await.unwrap();
        // Second delete of an absent resource still succeeds.
        client.delete(&cancel, "rg", "vmo-a").await.unwrap();
        assert!(client.resources("rg").await.is_empty());
        assert_eq!(client.count(Operation::Delete).await, 2);
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let client = MemoryResourceClient::new();
        let cancel = CancellationToken::new();
        client
            .fail_on(
                Operation::List,
                None,
                ClientError::Remote("throttled".to_string()),
            )
            .await;

        assert!(client.list(&cancel, "rg").await.is_err());
        assert!(client.list(&cancel, "rg").await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_call_has_no_effect() {
        let client = MemoryResourceClient::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .create(&cancel, "rg", &request("vmo-a"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Cancelled);
        assert!(client.resources("rg").await.is_empty());
        assert!(client.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.json");

        let client = MemoryResourceClient::new();
        let created = client
            .create(&CancellationToken::new(), "rg", &request("vmo-a"))
            .await
            .unwrap();
        client.save(&path).await.unwrap();

        let restored = MemoryResourceClient::load(&path).await.unwrap();
        assert_eq!(restored.resources("rg").await, vec![created]);

        let empty = MemoryResourceClient::load(dir.path().join("missing.json"))
            .await
            .unwrap();
        assert!(empty.resources("rg").await.is_empty());
    }
}
