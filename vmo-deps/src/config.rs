//! Reconciliation configuration: provenance tag and fault domain table.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DepError, Result};
use crate::types::InfrastructureStatus;

pub const DEFAULT_TAG_KEY: &str = "machineset.vmo-deps.io/managed";
pub const DEFAULT_TAG_VALUE: &str = "1";

/// Key/value pair stamped on every resource this system creates. The same
/// value must be handed to the create path and the orphan sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceTag {
    pub key: String,
    pub value: String,
}

impl ProvenanceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn as_tags(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.key.clone(), self.value.clone())])
    }
}

impl Default for ProvenanceTag {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_KEY, DEFAULT_TAG_VALUE)
    }
}

/// Fault domain count supported in one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCount {
    pub region: String,
    pub count: u32,
}

/// Cloud profile section listing fault domain counts per region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultDomainTable {
    #[serde(default)]
    pub count_fault_domains: Vec<DomainCount>,
}

impl FaultDomainTable {
    pub fn new(counts: Vec<DomainCount>) -> Self {
        Self {
            count_fault_domains: counts,
        }
    }

    /// Load the table from a JSON cloud profile file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            DepError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            DepError::Configuration(format!("invalid cloud profile {}: {}", path.display(), e))
        })
    }

    /// Target fault domain count for `region`.
    pub fn count_for_region(&self, region: &str) -> Result<u32> {
        let entry = self
            .count_fault_domains
            .iter()
            .find(|d| d.region == region)
            .ok_or_else(|| {
                DepError::Configuration(format!(
                    "could not find fault domain count for region {}",
                    region
                ))
            })?;
        if entry.count == 0 {
            return Err(DepError::Configuration(format!(
                "fault domain count for region {} must be positive",
                region
            )));
        }
        Ok(entry.count)
    }
}

/// Scale-set dependencies are only used by non-zoned clusters that have no
/// primary availability set.
pub fn is_vmo_required(infrastructure: &InfrastructureStatus) -> bool {
    !infrastructure.zoned && infrastructure.availability_sets.is_empty()
}
