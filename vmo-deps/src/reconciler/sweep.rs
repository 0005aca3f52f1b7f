//! Orphan sweeper - deletes tagged resources that no record tracks.
//!
//! Orphans appear when a resource was created but the updated dependency
//! list never got persisted, and when a drifted resource was replaced.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::guarded;
use crate::clients::ResourceClient;
use crate::config::ProvenanceTag;
use crate::error::Result;
use crate::types::{DependencyList, RemoteResource};

pub struct OrphanSweeper {
    client: Arc<dyn ResourceClient>,
    tag: ProvenanceTag,
}

impl OrphanSweeper {
    pub fn new(client: Arc<dyn ResourceClient>, tag: ProvenanceTag) -> Self {
        Self { client, tag }
    }

    /// Tagged resources in `resource_group` whose id is not in `tracked`.
    pub async fn find_orphans(
        &self,
        cancel: &CancellationToken,
        resource_group: &str,
        tracked: &DependencyList,
    ) -> Result<Vec<RemoteResource>> {
        let all = guarded(cancel, self.client.list(cancel, resource_group)).await?;
        debug!("Listed {} resources in {}", all.len(), resource_group);

        Ok(all
            .into_iter()
            .filter(|r| r.has_tag(&self.tag))
            .filter(|r| !tracked.contains_id(&r.id))
            .collect())
    }

    /// Delete every orphan. Stops at the first failed delete. Returns the
    /// names of the deleted resources.
    pub async fn sweep(
        &self,
        cancel: &CancellationToken,
        resource_group: &str,
        tracked: &DependencyList,
    ) -> Result<Vec<String>> {
        let orphans = self.find_orphans(cancel, resource_group, tracked).await?;
        if orphans.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "Sweeping {} orphaned resources in {}",
            orphans.len(),
            resource_group
        );
        let mut deleted = Vec::with_capacity(orphans.len());
        for orphan in orphans {
            warn!("Deleting orphaned resource {} ({})", orphan.name, orphan.id);
            let delete = self.client.delete(cancel, resource_group, &orphan.name);
            guarded(cancel, delete).await?;
            deleted.push(orphan.name);
        }
        Ok(deleted)
    }
}
