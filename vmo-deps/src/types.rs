//! Data model shared by the reconciler, clients and persisters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ProvenanceTag;

/// Desired worker pool. Only `name` matters to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
}

impl WorkerPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            machine_type: None,
        }
    }
}

/// Tracked link between a worker pool and the remote resource created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRecord {
    pub id: String,
    pub name: String,
    pub pool_name: String,
}

impl DependencyRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pool_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pool_name: pool_name.into(),
        }
    }

    /// Record for `pool_name` pointing at `resource`.
    pub fn for_resource(resource: &RemoteResource, pool_name: &str) -> Self {
        Self::new(resource.id.clone(), resource.name.clone(), pool_name)
    }
}

/// Ordered list of dependency records. Operations live in [`crate::store`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyList(pub(crate) Vec<DependencyRecord>);

/// Remote scale-set-like resource as reported by the resource client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResource {
    pub id: String,
    pub name: String,
    pub region: String,
    pub fault_domain_count: u32,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl RemoteResource {
    /// Whether the resource carries the provenance tag key.
    pub fn has_tag(&self, tag: &ProvenanceTag) -> bool {
        self.tags.contains_key(&tag.key)
    }
}

/// Parameters for creating a remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub name: String,
    pub region: String,
    pub fault_domain_count: u32,
    pub tags: BTreeMap<String, String>,
}

/// Where new resources are placed and how they are sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub region: String,
    pub fault_domain_count: u32,
}

/// Availability set created by the infrastructure for the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySet {
    pub id: String,
    pub name: String,
    pub purpose: String,
}

/// Infrastructure facts the dependencies depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    pub resource_group: String,
    #[serde(default)]
    pub zoned: bool,
    #[serde(default)]
    pub availability_sets: Vec<AvailabilitySet>,
}

/// Persisted provider status of a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    #[serde(default)]
    pub vmo_dependencies: DependencyList,
}

/// The owning object: a set of worker pools in one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    /// Owner identity used when persisting status.
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub pools: Vec<WorkerPool>,
    /// Set once the whole worker is being torn down.
    #[serde(default)]
    pub deletion_requested: bool,
    pub infrastructure: InfrastructureStatus,
    #[serde(default)]
    pub status: WorkerStatus,
}
