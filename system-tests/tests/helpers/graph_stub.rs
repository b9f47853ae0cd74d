// system-tests/tests/helpers/graph_stub.rs
// ============================================================================
// Module: Graph Store Stub
// Description: Minimal HTTP stand-in for the external graph store C6
//              projects toward.
// Purpose: Let sync scenario/property tests assert on what got projected
//          without standing up a real graph database.
// Dependencies: axum, tokio
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test harness failures should surface immediately as a failed test, not be propagated."
)]

use std::sync::Arc;
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::harness::allocate_bind_addr;

#[derive(Clone, Default)]
struct StubState {
    fragments: Arc<Mutex<Vec<Value>>>,
    codes: Arc<Mutex<Vec<Value>>>,
    axial: Arc<Mutex<Vec<Value>>>,
}

/// A running graph-store stub, accepting `POST /fragments`, `/codes`, and
/// `/axial` the same way [`ontocore_sync::HttpGraphProjector`] calls them,
/// and recording every body it receives.
pub struct GraphStub {
    /// Base URL a [`ontocore_config::GraphStoreConfig::endpoint`] can point at.
    pub base_url: String,
    state: StubState,
    join: JoinHandle<()>,
}

impl GraphStub {
    /// Spawns the stub on an ephemeral loopback port and returns once it is
    /// accepting connections.
    pub async fn spawn() -> Self {
        let state = StubState::default();
        let bind_addr = allocate_bind_addr();

        let router = Router::new()
            .route("/fragments", post(accept_fragments))
            .route("/codes", post(accept_codes))
            .route("/axial", post(accept_axial))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(&bind_addr).await.expect("bind graph stub");
        let base_url = format!("http://{bind_addr}");
        let join = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { base_url, state, join }
    }

    /// Number of fragment payloads received so far.
    #[must_use]
    pub fn fragments_received(&self) -> usize {
        self.state.fragments.lock().expect("graph stub fragments lock poisoned").len()
    }

    /// Number of code payloads received so far.
    #[must_use]
    pub fn codes_received(&self) -> usize {
        self.state.codes.lock().expect("graph stub codes lock poisoned").len()
    }

    /// Number of axial payloads received so far.
    #[must_use]
    pub fn axial_received(&self) -> usize {
        self.state.axial.lock().expect("graph stub axial lock poisoned").len()
    }

    /// Stops the stub's accept loop.
    pub async fn shutdown(self) {
        self.join.abort();
        let _ = self.join.await;
    }
}

async fn accept_fragments(State(state): State<StubState>, Json(body): Json<Value>) -> axum::http::StatusCode {
    state.fragments.lock().expect("graph stub fragments lock poisoned").push(body);
    axum::http::StatusCode::OK
}

async fn accept_codes(State(state): State<StubState>, Json(body): Json<Value>) -> axum::http::StatusCode {
    state.codes.lock().expect("graph stub codes lock poisoned").push(body);
    axum::http::StatusCode::OK
}

async fn accept_axial(State(state): State<StubState>, Json(body): Json<Value>) -> axum::http::StatusCode {
    state.axial.lock().expect("graph stub axial lock poisoned").push(body);
    axum::http::StatusCode::OK
}
