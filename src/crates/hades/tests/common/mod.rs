//! Common test utilities and setup
#![allow(dead_code)]

use async_trait::async_trait;
use hades::config::RollbackConfig;
use hades::db::Database;
use hades::hints::HintRules;
use hades::trackers::{
    ContainerRuntime, ContainerState, ContainerTracker, FileTracker, RowTracker, TrackerRegistry,
};
use hades::{HadesError, OperationRepository, RollbackEngine};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

static TEST_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// In-memory container runtime
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, bool>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn set(&self, name: &str, running: bool) {
        self.containers.lock().unwrap().insert(name.to_string(), running);
    }

    pub fn is_running(&self, name: &str) -> Option<bool> {
        self.containers.lock().unwrap().get(name).copied()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, name: &str) -> hades::Result<Option<ContainerState>> {
        Ok(self.is_running(name).map(|running| ContainerState {
            id: format!("{}-0001", name),
            running,
            status: if running { "running" } else { "exited" }.to_string(),
            image: "nginx:1.25".to_string(),
        }))
    }

    async fn start(&self, name: &str) -> hades::Result<()> {
        self.calls.lock().unwrap().push(format!("start {}", name));
        match self.is_running(name) {
            Some(_) => {
                self.set(name, true);
                Ok(())
            }
            None => Err(HadesError::Runtime(format!("Error: No such container: {}", name))),
        }
    }

    async fn stop(&self, name: &str) -> hades::Result<()> {
        self.calls.lock().unwrap().push(format!("stop {}", name));
        match self.is_running(name) {
            Some(_) => {
                self.set(name, false);
                Ok(())
            }
            None => Err(HadesError::Runtime(format!("Error: No such container: {}", name))),
        }
    }
}

/// Engine wired to temp-dir stores and a fake container runtime
pub struct TestHarness {
    pub temp_dir: TempDir,
    pub engine: Arc<RollbackEngine>,
    pub row_store: Arc<Database>,
    pub runtime: Arc<FakeRuntime>,
}

impl TestHarness {
    /// Directory for files the tests create and mutate
    pub fn work_dir(&self) -> PathBuf {
        self.temp_dir.path().join("work")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.temp_dir.path().join("snapshots")
    }

    /// Run SQL directly against the row store, as the actor would
    pub async fn exec(&self, sql: &str) {
        sqlx::query(sql)
            .execute(self.row_store.pool())
            .await
            .expect("Failed to execute statement");
    }
}

/// Create a harness with unique database files
pub async fn setup_harness() -> TestHarness {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);

    let log = Database::open_file(temp_dir.path().join(format!("log_{}.db", counter)))
        .await
        .expect("Failed to create operation log");
    log.run_migrations().await.expect("Failed to run migrations");

    let row_store = Arc::new(
        Database::open_file(temp_dir.path().join(format!("rows_{}.db", counter)))
            .await
            .expect("Failed to create row store"),
    );

    std::fs::create_dir_all(temp_dir.path().join("work")).expect("Failed to create work dir");

    let runtime = Arc::new(FakeRuntime::default());
    let registry = TrackerRegistry::new()
        .register(Arc::new(FileTracker::new(temp_dir.path().join("snapshots"))))
        .register(Arc::new(ContainerTracker::new(runtime.clone())))
        .register(Arc::new(RowTracker::new(row_store.clone())));

    let engine = RollbackEngine::new(
        OperationRepository::new(Arc::new(log)),
        registry,
        HintRules::from_config(&RollbackConfig::default()),
    )
    .expect("Failed to build engine");

    TestHarness {
        temp_dir,
        engine: Arc::new(engine),
        row_store,
        runtime,
    }
}
