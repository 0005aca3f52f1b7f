//! Status persisters - durable storage for the dependency list of an owner.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PersistError;
use crate::types::DependencyList;

/// Stores the authoritative dependency list of an owner.
#[async_trait]
pub trait StatusPersister: Send + Sync {
    async fn persist(
        &self,
        owner_id: &str,
        dependencies: &DependencyList,
    ) -> Result<(), PersistError>;
}

/// One JSON file per owner in a directory.
pub struct JsonStatusStore {
    dir: PathBuf,
}

impl JsonStatusStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// File holding `owner_id`'s status. The id must be a single path
    /// component so writes stay inside the directory.
    fn path_for(&self, owner_id: &str) -> Result<PathBuf, PersistError> {
        if owner_id.is_empty() || owner_id.contains(['/', '\\']) || owner_id.contains("..") {
            return Err(PersistError::InvalidOwner(owner_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", owner_id)))
    }

    /// Previously persisted list, or `None` if the owner has no status yet.
    pub async fn load(&self, owner_id: &str) -> Result<Option<DependencyList>, PersistError> {
        match tokio::fs::read(self.path_for(owner_id)?).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StatusPersister for JsonStatusStore {
    async fn persist(
        &self,
        owner_id: &str,
        dependencies: &DependencyList,
    ) -> Result<(), PersistError> {
        let path = self.path_for(owner_id)?;
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(dependencies)?;

        // Readers never see a partially written file.
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(
            "Persisted {} dependencies for {} to {}",
            dependencies.len(),
            owner_id,
            path.display()
        );
        Ok(())
    }
}

/// In-memory persister that remembers every write.
#[derive(Default)]
pub struct MemoryStatusStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    latest: HashMap<String, DependencyList>,
    writes: usize,
    reject: Option<String>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent write with `reason`.
    pub async fn reject_writes(&self, reason: impl Into<String>) {
        self.inner.lock().await.reject = Some(reason.into());
    }

    pub async fn latest(&self, owner_id: &str) -> Option<DependencyList> {
        self.inner.lock().await.latest.get(owner_id).cloned()
    }

    /// Number of persist calls, failed ones included.
    pub async fn writes(&self) -> usize {
        self.inner.lock().await.writes
    }
}

#[async_trait]
impl StatusPersister for MemoryStatusStore {
    async fn persist(
        &self,
        owner_id: &str,
        dependencies: &DependencyList,
    ) -> Result<(), PersistError> {
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        if let Some(reason) = &inner.reject {
            return Err(PersistError::Rejected(reason.clone()));
        }
        inner
            .latest
            .insert(owner_id.to_string(), dependencies.snapshot());
        Ok(())
    }
}
