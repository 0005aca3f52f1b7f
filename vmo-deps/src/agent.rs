//! Dependency agent - public entry points for deploying and cleaning up the
//! scale-set dependencies of a worker.
//!
//! Each entry point runs the reconciler once and persists the resulting
//! dependency list exactly once, whether the run completed or aborted.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::clients::ResourceClient;
use crate::config::{is_vmo_required, FaultDomainTable, ProvenanceTag};
use crate::error::{Aborted, DepError, Result};
use crate::persist::StatusPersister;
use crate::reconciler::{DependencyReconciler, Outcome};
use crate::types::{DependencyList, Placement, Worker};

pub struct DependencyAgent {
    reconciler: DependencyReconciler,
    persister: Arc<dyn StatusPersister>,
    fault_domains: FaultDomainTable,
}

impl DependencyAgent {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        persister: Arc<dyn StatusPersister>,
        fault_domains: FaultDomainTable,
        tag: ProvenanceTag,
    ) -> Self {
        Self {
            reconciler: DependencyReconciler::new(client, tag),
            persister,
            fault_domains,
        }
    }

    /// Create or replace the dependencies of every pool of `worker`.
    /// Returns the list that was persisted.
    pub async fn deploy(
        &self,
        cancel: &CancellationToken,
        worker: &Worker,
    ) -> Result<DependencyList> {
        let current = &worker.status.vmo_dependencies;
        if !is_vmo_required(&worker.infrastructure) {
            info!(
                "Worker {} does not use scale-set dependencies, skipping deploy",
                worker.name
            );
            return Ok(current.snapshot());
        }

        info!(
            "Deploying dependencies for worker {} ({} pools, {} tracked)",
            worker.name,
            worker.pools.len(),
            current.len()
        );

        let outcome = match self.fault_domains.count_for_region(&worker.region) {
            Ok(fault_domain_count) => {
                let placement = Placement {
                    region: worker.region.clone(),
                    fault_domain_count,
                };
                self.reconciler
                    .reconcile(
                        cancel,
                        &worker.pools,
                        current,
                        &worker.infrastructure.resource_group,
                        &placement,
                    )
                    .await
            }
            Err(e) => Err(Aborted::new(current.snapshot(), e)),
        };

        self.finish(&worker.name, "deploy", outcome).await
    }

    /// Sweep orphans and delete dependencies of removed pools, or all of them
    /// when the worker is being deleted. Returns the list that was persisted.
    pub async fn cleanup(
        &self,
        cancel: &CancellationToken,
        worker: &Worker,
    ) -> Result<DependencyList> {
        let current = &worker.status.vmo_dependencies;
        if !is_vmo_required(&worker.infrastructure) {
            info!(
                "Worker {} does not use scale-set dependencies, skipping cleanup",
                worker.name
            );
            return Ok(current.snapshot());
        }

        info!(
            "Cleaning up dependencies for worker {} (teardown={}, {} tracked)",
            worker.name,
            worker.deletion_requested,
            current.len()
        );

        let outcome = self
            .reconciler
            .cleanup(
                cancel,
                &worker.pools,
                current,
                &worker.infrastructure.resource_group,
                worker.deletion_requested,
            )
            .await;

        self.finish(&worker.name, "cleanup", outcome).await
    }

    async fn finish(
        &self,
        owner_id: &str,
        action: &str,
        outcome: Outcome,
    ) -> Result<DependencyList> {
        let (dependencies, failure) = match outcome {
            Ok(dependencies) => (dependencies, None),
            Err(aborted) => {
                let (dependencies, e) = aborted.into_parts();
                error!("Dependency {} failed for {}: {}", action, owner_id, e);
                (dependencies, Some(e))
            }
        };

        match self.persister.persist(owner_id, &dependencies).await {
            Ok(()) => match failure {
                Some(e) => Err(e),
                None => {
                    info!(
                        "Dependency {} finished for {} ({} tracked)",
                        action,
                        owner_id,
                        dependencies.len()
                    );
                    Ok(dependencies)
                }
            },
            Err(persist) => Err(DepError::with_persistence(failure, persist)),
        }
    }
}
