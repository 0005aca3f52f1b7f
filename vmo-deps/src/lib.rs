//! vmo-deps: reconciliation of scale-set orchestration dependencies.
//!
//! Every worker pool of a non-zoned cluster needs one remote scale-set
//! resource. This crate keeps the tracked dependency list in line with the
//! desired pools and with what actually exists in the resource group:
//! - [`reconciler::DependencyReconciler`] creates, replaces and deletes resources
//! - [`reconciler::OrphanSweeper`] removes tagged resources nothing tracks
//! - [`agent::DependencyAgent`] wraps both and persists the resulting status

pub mod agent;
pub mod clients;
pub mod config;
pub mod error;
pub mod persist;
pub mod reconciler;
pub mod store;
pub mod types;

pub use agent::DependencyAgent;
pub use clients::{MemoryResourceClient, ResourceClient};
pub use config::{FaultDomainTable, ProvenanceTag};
pub use error::{Aborted, ClientError, DepError, PersistError};
pub use persist::{JsonStatusStore, MemoryStatusStore, StatusPersister};
pub use reconciler::{DependencyReconciler, OrphanSweeper, Outcome};
pub use types::{DependencyList, DependencyRecord, RemoteResource, Worker, WorkerPool};
