// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: API Server Harness
// Description: Spawns an in-process ontocore-api server against a real,
//              temp-file-backed SQLite ledger.
// Purpose: Give every scenario test a ready HTTP client without each test
//          repeating the AppState wiring.
// Dependencies: ontocore-api, ontocore-config, ontocore-core,
//               ontocore-store-sqlite, ontocore-sync, reqwest, tokio
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test harness failures should surface immediately as a failed test, not be propagated."
)]

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use ontocore_config::OntocoreConfig;
use ontocore_core::interfaces::SystemClock;
use ontocore_store_sqlite::InProcessLockManager;
use ontocore_store_sqlite::SqliteLedgerStore;
use ontocore_sync::HttpGraphProjector;
use ontocore_sync::SqliteSyncStateStore;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Returns a free loopback address. The listener is dropped immediately, so
/// there is a brief window in which another process could steal the port;
/// acceptable for a single-threaded-per-test local harness.
#[must_use]
pub fn allocate_bind_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("read listener address");
    drop(listener);
    addr.to_string()
}

/// A running `ontocore-api` server over a private ledger, plus the client
/// a test drives it with.
pub struct Harness {
    /// Base URL of the spawned server, e.g. `http://127.0.0.1:51234`.
    pub base_url: String,
    /// HTTP client reused across every request a test makes.
    pub client: reqwest::Client,
    /// The resolved configuration the server was started with.
    pub config: OntocoreConfig,
    join: JoinHandle<std::io::Result<()>>,
    _tempdir: TempDir,
}

impl Harness {
    /// Spawns a fresh server over a new temp-file-backed ledger. `configure`
    /// may adjust the default config (e.g. point `graph_store.endpoint` at
    /// an unreachable address to simulate an outage) before the server
    /// binds.
    pub async fn spawn(configure: impl FnOnce(&mut OntocoreConfig)) -> Self {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let bind_addr = allocate_bind_addr();

        let mut config = OntocoreConfig::default();
        config.ledger.path = tempdir.path().join("ledger.sqlite3");
        config.server.bind_addr = bind_addr.clone();
        configure(&mut config);

        let store = SqliteLedgerStore::open(&config.ledger).expect("open ledger store");
        let projector = HttpGraphProjector::new(&config.graph_store).expect("build graph projector");
        let sync_state = SqliteSyncStateStore::open(&tempdir.path().join("sync-state.sqlite3")).expect("open sync state store");

        let state = ontocore_api::AppState::new(
            Arc::new(store),
            Arc::new(InProcessLockManager::default()),
            Arc::new(SystemClock),
            Arc::new(config.clone()),
            Arc::new(projector),
            Arc::new(sync_state),
        );

        let join = tokio::spawn(async move { ontocore_api::serve(state, &bind_addr).await });

        let base_url = format!("http://{}", config.server.bind_addr);
        let client = reqwest::Client::new();
        wait_for_ready(&client, &base_url).await;

        Self { base_url, client, config, join, _tempdir: tempdir }
    }

    /// Convenience: `GET {base_url}/readiness?project={project}`.
    pub async fn get_readiness(&self, project: u64) -> reqwest::Response {
        self.client
            .get(format!("{}/readiness?project={project}", self.base_url))
            .send()
            .await
            .expect("send readiness request")
    }

    /// Shuts down the server task. Best-effort: a test process exit would
    /// reclaim the task anyway, but scenario tests that spawn several
    /// harnesses in sequence call this to free the listening port promptly.
    pub async fn shutdown(self) {
        self.join.abort();
        let _ = self.join.await;
    }

    /// Restarts the server over the same ledger and sync-state files on a
    /// fresh port, applying `configure` to a config cloned from the one
    /// this harness ran with. Used to simulate "the graph store comes
    /// back" without losing ledger state accumulated during an outage.
    pub async fn restart(self, configure: impl FnOnce(&mut OntocoreConfig)) -> Self {
        self.join.abort();
        let _ = self.join.await;

        let mut config = self.config;
        config.server.bind_addr = allocate_bind_addr();
        configure(&mut config);

        let store = SqliteLedgerStore::open(&config.ledger).expect("reopen ledger store");
        let projector = HttpGraphProjector::new(&config.graph_store).expect("build graph projector");
        let sync_state_path = self._tempdir.path().join("sync-state.sqlite3");
        let sync_state = SqliteSyncStateStore::open(&sync_state_path).expect("reopen sync state store");

        let bind_addr = config.server.bind_addr.clone();
        let state = ontocore_api::AppState::new(
            Arc::new(store),
            Arc::new(InProcessLockManager::default()),
            Arc::new(SystemClock),
            Arc::new(config.clone()),
            Arc::new(projector),
            Arc::new(sync_state),
        );
        let join = tokio::spawn(async move { ontocore_api::serve(state, &bind_addr).await });

        let base_url = format!("http://{}", config.server.bind_addr);
        let client = reqwest::Client::new();
        wait_for_ready(&client, &base_url).await;

        Self { base_url, client, config, join, _tempdir: self._tempdir }
    }
}

/// Polls `GET /readiness?project=1` until the server accepts connections or
/// five seconds elapse, so tests never race the listener's bind.
async fn wait_for_ready(client: &reqwest::Client, base_url: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if client.get(format!("{base_url}/readiness?project=1")).send().await.is_ok() {
            return;
        }
        assert!(Instant::now() <= deadline, "server did not become ready in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
