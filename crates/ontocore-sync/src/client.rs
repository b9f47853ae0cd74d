// crates/ontocore-sync/src/client.rs
// ============================================================================
// Module: HTTP Graph Projector
// Description: GraphProjector implementation backed by an HTTP graph-store
//              endpoint, MERGE-by-identity over JSON.
// Purpose: Give the sync runner a concrete projection target without
//          coupling it to a specific graph database driver.
// Dependencies: ontocore-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Mirrors the request-building and timeout discipline of
//! `decision-gate-broker`'s HTTP content source: a single `reqwest::Client`
//! configured once with a fixed timeout, reused across calls. Every upsert
//! is a `POST` to a fixed sub-path under the configured endpoint, carrying
//! a JSON array body; the graph store is expected to MERGE-by-identity on
//! its side (`code_id` for codes, `(id, project_id)` for fragments).

use async_trait::async_trait;
use ontocore_config::GraphStoreConfig;
use ontocore_core::error::ErrorKind;
use ontocore_core::error::OntoError;
use ontocore_core::interfaces::AxialEdge;
use ontocore_core::interfaces::CodeNode;
use ontocore_core::interfaces::FragmentNode;
use ontocore_core::interfaces::GraphProjector;
use serde_json::Value;
use serde_json::json;

/// [`GraphProjector`] backed by a graph store's HTTP MERGE endpoints.
pub struct HttpGraphProjector {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGraphProjector {
    /// Builds a projector client from graph-store configuration.
    ///
    /// # Errors
    /// Returns [`OntoError`] with kind `internal` if the HTTP client cannot
    /// be constructed.
    pub fn new(config: &GraphStoreConfig) -> Result<Self, OntoError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| OntoError::new(ErrorKind::Internal, err.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn post_merge(&self, path: &str, body: Value) -> Result<(), OntoError> {
        let url = format!("{}{path}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| OntoError::new(ErrorKind::Dependency, err.to_string()))?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(OntoError::new(
                ErrorKind::Internal,
                format!("graph store rejected projection ({status}): {text}"),
            ));
        }
        Err(OntoError::new(
            ErrorKind::Dependency,
            format!("graph store returned {status}"),
        ))
    }
}

fn fragment_to_json(fragment: &FragmentNode) -> Value {
    json!({
        "id": fragment.id.as_str(),
        "project_id": fragment.project_id.get(),
        "text": fragment.text,
        "par_idx": fragment.par_idx,
        "char_len": fragment.char_len,
        "speaker": fragment.speaker,
    })
}

fn code_to_json(code: &CodeNode) -> Value {
    json!({
        "code_id": code.code_id.get(),
        "codigo": code.codigo,
        "project_id": code.project_id.get(),
    })
}

fn axial_edge_to_json(edge: &AxialEdge) -> Value {
    json!({
        "project_id": edge.project_id.get(),
        "categoria": edge.categoria,
        "code_id": edge.code_id.get(),
        "relation": edge.relation,
        "memo": edge.memo,
        "evidence": edge.evidence.iter().map(ontocore_core::identifiers::FragmentId::as_str).collect::<Vec<_>>(),
        "updated_at_ms": edge.updated_at_ms,
    })
}

#[async_trait]
impl GraphProjector for HttpGraphProjector {
    async fn upsert_fragments(&self, fragments: &[FragmentNode]) -> Result<(), OntoError> {
        if fragments.is_empty() {
            return Ok(());
        }
        let body = json!(fragments.iter().map(fragment_to_json).collect::<Vec<_>>());
        self.post_merge("/fragments", body).await
    }

    async fn upsert_codes(&self, codes: &[CodeNode]) -> Result<(), OntoError> {
        if codes.is_empty() {
            return Ok(());
        }
        let body = json!(codes.iter().map(code_to_json).collect::<Vec<_>>());
        self.post_merge("/codes", body).await
    }

    async fn upsert_axial_edges(&self, edges: &[AxialEdge]) -> Result<(), OntoError> {
        if edges.is_empty() {
            return Ok(());
        }
        let body = json!(edges.iter().map(axial_edge_to_json).collect::<Vec<_>>());
        self.post_merge("/axial", body).await
    }
}
