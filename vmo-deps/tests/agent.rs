//! Deploy and cleanup entry points, including status persistence.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use vmo_deps::clients::memory::Operation;
use vmo_deps::config::DomainCount;
use vmo_deps::types::{AvailabilitySet, InfrastructureStatus, WorkerStatus};
use vmo_deps::{
    ClientError, DepError, DependencyAgent, DependencyList, DependencyRecord, FaultDomainTable,
    JsonStatusStore, MemoryResourceClient, MemoryStatusStore, PersistError, ProvenanceTag,
    RemoteResource, Worker, WorkerPool,
};

const RG: &str = "shoot--foobar--azure";

fn fault_domains() -> FaultDomainTable {
    FaultDomainTable::new(vec![DomainCount {
        region: "westeurope".to_string(),
        count: 2,
    }])
}

fn worker(pools: &[&str]) -> Worker {
    Worker {
        name: "shoot--foobar--azure-worker".to_string(),
        region: "westeurope".to_string(),
        pools: pools.iter().map(|n| WorkerPool::new(*n)).collect(),
        deletion_requested: false,
        infrastructure: InfrastructureStatus {
            resource_group: RG.to_string(),
            zoned: false,
            availability_sets: vec![],
        },
        status: WorkerStatus::default(),
    }
}

struct Harness {
    client: Arc<MemoryResourceClient>,
    store: Arc<MemoryStatusStore>,
    agent: DependencyAgent,
}

fn harness() -> Harness {
    let client = Arc::new(MemoryResourceClient::new());
    let store = Arc::new(MemoryStatusStore::new());
    let agent = DependencyAgent::new(
        client.clone(),
        store.clone(),
        fault_domains(),
        ProvenanceTag::default(),
    );
    Harness {
        client,
        store,
        agent,
    }
}

#[tokio::test]
async fn test_deploy_persists_created_dependencies() {
    let h = harness();
    let w = worker(&["pool-a"]);

    let deps = h.agent.deploy(&CancellationToken::new(), &w).await.unwrap();

    assert_eq!(deps.len(), 1);
    assert_eq!(h.store.writes().await, 1);
    assert_eq!(h.store.latest(&w.name).await, Some(deps));
    assert_eq!(h.client.resources(RG).await[0].fault_domain_count, 2);
}

#[tokio::test]
async fn test_deploy_skipped_for_zoned_cluster() {
    let h = harness();
    let mut w = worker(&["pool-a"]);
    w.infrastructure.zoned = true;

    let deps = h.agent.deploy(&CancellationToken::new(), &w).await.unwrap();

    assert!(deps.is_empty());
    assert_eq!(h.store.writes().await, 0);
    assert!(h.client.calls().await.is_empty());
}

#[tokio::test]
async fn test_cleanup_skipped_with_availability_set() {
    let h = harness();
    let mut w = worker(&[]);
    w.infrastructure.availability_sets.push(AvailabilitySet {
        id: "/my/azure/availabilityset/id".to_string(),
        name: "my-availabilityset".to_string(),
        purpose: "nodes".to_string(),
    });

    let cancel = CancellationToken::new();
    h.agent.cleanup(&cancel, &w).await.unwrap();

    assert_eq!(h.store.writes().await, 0);
    assert!(h.client.calls().await.is_empty());
}

#[tokio::test]
async fn test_unknown_region_is_configuration_error_without_side_effects() {
    let h = harness();
    let mut w = worker(&["pool-a"]);
    w.region = "northpole".to_string();

    let cancel = CancellationToken::new();
    let err = h.agent.deploy(&cancel, &w).await.unwrap_err();

    assert!(matches!(err, DepError::Configuration(_)));
    assert!(h.client.calls().await.is_empty());
    // The unchanged list is still persisted once.
    assert_eq!(h.store.writes().await, 1);
    assert_eq!(h.store.latest(&w.name).await, Some(DependencyList::new()));
}

#[tokio::test]
async fn test_failed_deploy_persists_partial_progress() {
    let h = harness();
    let mut w = worker(&["pool-a", "pool-b"]);
    h.client
        .insert(
            RG,
            RemoteResource {
                id: "rb".to_string(),
                name: "vmo-pool-b-00000000".to_string(),
                region: "westeurope".to_string(),
                fault_domain_count: 2,
                tags: ProvenanceTag::default().as_tags(),
            },
        )
        .await;
    let tracked = DependencyRecord::new("rb", "vmo-pool-b-00000000", "pool-b");
    w.status.vmo_dependencies = DependencyList::from(vec![tracked]);
    h.client
        .fail_on(
            Operation::Get,
            Some("vmo-pool-b-00000000"),
            ClientError::Remote("throttled".to_string()),
        )
        .await;

    let cancel = CancellationToken::new();
    let err = h.agent.deploy(&cancel, &w).await.unwrap_err();
    assert!(matches!(err, DepError::Client(ClientError::Remote(_))));

    // pool-a's new resource is tracked even though the run failed.
    let persisted = h.store.latest(&w.name).await.unwrap();
    assert_eq!(persisted.len(), 2);
    assert!(persisted.find_by_pool("pool-a").is_some());

    // Retrying from the persisted status creates nothing new.
    let mut retry = w.clone();
    retry.status.vmo_dependencies = persisted.clone();
    let deps = h.agent.deploy(&cancel, &retry).await.unwrap();
    assert_eq!(deps, persisted);
    assert_eq!(h.client.count(Operation::Create).await, 1);
    assert_eq!(h.store.writes().await, 2);
}

#[tokio::test]
async fn test_persistence_failure_is_combined_with_run_error() {
    let h = harness();
    let w = worker(&["pool-a"]);
    h.client
        .fail_on(
            Operation::Create,
            None,
            ClientError::Remote("throttled".to_string()),
        )
        .await;
    h.store.reject_writes("status update conflict").await;

    let cancel = CancellationToken::new();
    let err = h.agent.deploy(&cancel, &w).await.unwrap_err();

    match &err {
        DepError::PersistenceAfter { algorithm, persist } => {
            assert!(matches!(
                **algorithm,
                DepError::Client(ClientError::Remote(_))
            ));
            assert!(matches!(persist, PersistError::Rejected(_)));
        }
        other => panic!("unexpected error {:?}", other),
    }
    let msg = err.to_string();
    assert!(msg.starts_with("remote call failed: throttled"), "{}", msg);
    assert!(msg.contains("status update conflict"), "{}", msg);
}

#[tokio::test]
async fn test_persistence_failure_after_success() {
    let h = harness();
    let w = worker(&["pool-a"]);
    h.store.reject_writes("etcd unavailable").await;

    let cancel = CancellationToken::new();
    let err = h.agent.deploy(&cancel, &w).await.unwrap_err();

    assert!(matches!(err, DepError::Persistence(_)));
    // The resource exists but is untracked; the next cleanup sweeps it.
    assert_eq!(h.client.resources(RG).await.len(), 1);
    let mut later = w.clone();
    later.status = WorkerStatus::default();
    let store = Arc::new(MemoryStatusStore::new());
    let agent = DependencyAgent::new(
        h.client.clone(),
        store,
        fault_domains(),
        ProvenanceTag::default(),
    );
    agent.cleanup(&cancel, &later).await.unwrap();
    assert!(h.client.resources(RG).await.is_empty());
}

#[tokio::test]
async fn test_deploy_then_teardown() {
    let h = harness();
    let mut w = worker(&["pool-a", "pool-b"]);
    let cancel = CancellationToken::new();

    w.status.vmo_dependencies = h.agent.deploy(&cancel, &w).await.unwrap();
    assert_eq!(h.client.resources(RG).await.len(), 2);

    w.deletion_requested = true;
    let deps = h.agent.cleanup(&cancel, &w).await.unwrap();

    assert!(deps.is_empty());
    assert!(h.client.resources(RG).await.is_empty());
    assert_eq!(h.store.latest(&w.name).await, Some(DependencyList::new()));
    assert_eq!(h.store.writes().await, 2);
}

#[tokio::test]
async fn test_cancelled_run_still_persists() {
    let h = harness();
    let w = worker(&["pool-a"]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.agent.deploy(&cancel, &w).await.unwrap_err();

    assert!(matches!(err, DepError::Cancelled));
    assert_eq!(h.store.writes().await, 1);
    assert!(h.client.calls().await.is_empty());
}

#[tokio::test]
async fn test_json_status_store_with_agent() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MemoryResourceClient::new());
    let store = Arc::new(JsonStatusStore::new(dir.path()).await.unwrap());
    let agent = DependencyAgent::new(
        client.clone(),
        store.clone(),
        fault_domains(),
        ProvenanceTag::default(),
    );
    let w = worker(&["pool-a"]);

    let deps = agent.deploy(&CancellationToken::new(), &w).await.unwrap();

    assert_eq!(store.load(&w.name).await.unwrap(), Some(deps));
}
