use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

use mergebay::allocation::{
    AllocationEngine, AllocationState, AllocationStore, SqliteAllocationStore, allocation_router,
};
use mergebay::dag::{DagService, DagStore, SqliteDagStore, StorageState, storage_router};
use mergebay::gateway::{
    AllocationClient, GatewayService, GatewayState, StorageClient, gateway_router,
};

/// All three services served in-process on ephemeral ports, backed by
/// SQLite files in a temp directory.
pub struct TestCluster {
    _temp_dir: TempDir,
    pub gateway_url: String,
    pub storage_url: String,
    pub allocation_url: String,
}

async fn spawn_router(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

impl TestCluster {
    pub async fn start(reviewer_target: usize) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");

        let dag_store = SqliteDagStore::new(temp_dir.path().join("storage.db")).expect("dag store");
        dag_store.initialize().expect("dag schema");
        let storage_state = Arc::new(StorageState {
            service: DagService::new(Arc::new(dag_store)),
        });
        let storage_url = spawn_router(storage_router(storage_state)).await;

        let alloc_store =
            SqliteAllocationStore::new(temp_dir.path().join("allocation.db")).expect("alloc store");
        alloc_store.initialize().expect("alloc schema");
        let allocation_state = Arc::new(AllocationState {
            engine: AllocationEngine::with_rng(
                Arc::new(alloc_store),
                reviewer_target,
                StdRng::seed_from_u64(1234),
            ),
        });
        let allocation_url = spawn_router(allocation_router(allocation_state)).await;

        let allocation_client =
            AllocationClient::new(allocation_url.clone(), Duration::from_secs(30))
                .expect("allocation client");
        let storage_client = StorageClient::new(
            storage_url.clone(),
            Duration::from_secs(30),
            Duration::from_secs(60),
        )
        .expect("storage client");
        let gateway_state = Arc::new(GatewayState {
            service: GatewayService::new(allocation_client, storage_client),
        });
        let gateway_url = spawn_router(gateway_router(gateway_state)).await;

        Self {
            _temp_dir: temp_dir,
            gateway_url,
            storage_url,
            allocation_url,
        }
    }
}
