//! Dependency reconciler.
//!
//! Compares the desired worker pools with the tracked dependency records and
//! the actual remote resources, and creates, recreates or deletes resources
//! to converge. Pools are processed one at a time in input order; the first
//! failure aborts the run and hands back the list accumulated so far.

pub mod sweep;

pub use sweep::OrphanSweeper;

use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::ResourceClient;
use crate::config::ProvenanceTag;
use crate::error::{Aborted, ClientError, Result};
use crate::types::{CreateRequest, DependencyList, DependencyRecord, Placement, WorkerPool};

/// Result of a reconcile or cleanup run.
pub type Outcome = std::result::Result<DependencyList, Aborted>;

const NAME_PREFIX: &str = "vmo";
const SUFFIX_LEN: usize = 8;
const SUFFIX_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Run a remote call unless `cancel` fires first.
pub(crate) async fn guarded<T, F>(
    cancel: &CancellationToken,
    call: F,
) -> std::result::Result<T, ClientError>
where
    F: Future<Output = std::result::Result<T, ClientError>>,
{
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = call => result,
    }
}

/// Fresh resource name for a pool: `vmo-<pool>-<8 random chars>`. The suffix
/// keeps new names clear of soft-deleted or still-pending resources.
pub fn generate_name(pool_name: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| rng.gen_range(0..SUFFIX_CHARSET.len()))
        .map(|i| SUFFIX_CHARSET[i] as char)
        .collect();
    format!("{}-{}-{}", NAME_PREFIX, pool_name, suffix)
}

/// Reconciler for the scale-set dependencies of a worker's pools.
pub struct DependencyReconciler {
    client: Arc<dyn ResourceClient>,
    tag: ProvenanceTag,
    sweeper: OrphanSweeper,
}

impl DependencyReconciler {
    pub fn new(client: Arc<dyn ResourceClient>, tag: ProvenanceTag) -> Self {
        let sweeper = OrphanSweeper::new(Arc::clone(&client), tag.clone());
        Self {
            client,
            tag,
            sweeper,
        }
    }

    pub fn tag(&self) -> &ProvenanceTag {
        &self.tag
    }

    /// Ensure every desired pool has a remote resource matching `placement`.
    ///
    /// Resources with a drifted fault domain count are replaced by new ones;
    /// the old resource is left for the orphan sweeper.
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        pools: &[WorkerPool],
        current: &DependencyList,
        resource_group: &str,
        placement: &Placement,
    ) -> Outcome {
        let mut dependencies = current.snapshot();

        for pool in pools {
            match self
                .reconcile_pool(cancel, &dependencies, resource_group, &pool.name, placement)
                .await
            {
                Ok(record) => dependencies = dependencies.upsert_by_pool(record),
                Err(e) => return Err(Aborted::new(dependencies, e)),
            }
        }

        Ok(dependencies)
    }

    async fn reconcile_pool(
        &self,
        cancel: &CancellationToken,
        dependencies: &DependencyList,
        group: &str,
        pool_name: &str,
        placement: &Placement,
    ) -> Result<DependencyRecord> {
        info!("Reconciling dependency for pool {}", pool_name);

        let remote = match dependencies.find_by_pool(pool_name) {
            Some(existing) => {
                debug!(
                    "Pool {} tracks {} ({})",
                    pool_name, existing.name, existing.id
                );
                let fetch = self.client.get(cancel, group, &existing.name);
                match guarded(cancel, fetch).await {
                    Ok(resource) => Some(resource),
                    Err(e) if e.is_not_found() => {
                        warn!(
                            "Tracked resource {} for pool {} is gone, recreating",
                            existing.name, pool_name
                        );
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => None,
        };

        match remote {
            None => self.create(cancel, group, pool_name, placement).await,
            Some(resource) if resource.fault_domain_count != placement.fault_domain_count => {
                info!(
                    "Resource {} for pool {} has {} fault domains, want {}; replacing",
                    resource.name,
                    pool_name,
                    resource.fault_domain_count,
                    placement.fault_domain_count
                );
                self.create(cancel, group, pool_name, placement).await
            }
            Some(resource) => Ok(DependencyRecord::for_resource(&resource, pool_name)),
        }
    }

    async fn create(
        &self,
        cancel: &CancellationToken,
        group: &str,
        pool_name: &str,
        placement: &Placement,
    ) -> Result<DependencyRecord> {
        let request = CreateRequest {
            name: generate_name(pool_name),
            region: placement.region.clone(),
            fault_domain_count: placement.fault_domain_count,
            tags: self.tag.as_tags(),
        };
        info!(
            "Creating resource {} for pool {} in {}",
            request.name, pool_name, group
        );
        let create = self.client.create(cancel, group, &request);
        let resource = guarded(cancel, create).await?;
        Ok(DependencyRecord::for_resource(&resource, pool_name))
    }

    /// Sweep orphans, then delete the dependencies that are no longer wanted:
    /// all of them when `teardown` is set, otherwise those whose pool is not
    /// in `pools`.
    pub async fn cleanup(
        &self,
        cancel: &CancellationToken,
        pools: &[WorkerPool],
        current: &DependencyList,
        resource_group: &str,
        teardown: bool,
    ) -> Outcome {
        let mut dependencies = current.snapshot();

        if let Err(e) = self.sweeper.sweep(cancel, resource_group, current).await {
            return Err(Aborted::new(dependencies, e));
        }

        let doomed: Vec<DependencyRecord> = current
            .iter()
            .filter(|d| teardown || !pools.iter().any(|p| p.name == d.pool_name))
            .cloned()
            .collect();

        for record in doomed {
            info!(
                "Deleting resource {} of pool {}",
                record.name, record.pool_name
            );
            let delete = self.client.delete(cancel, resource_group, &record.name);
            if let Err(e) = guarded(cancel, delete).await {
                return Err(Aborted::new(dependencies, e));
            }
            dependencies = dependencies.remove_exact(&record);
        }

        Ok(dependencies)
    }
}
