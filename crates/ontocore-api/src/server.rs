// crates/ontocore-api/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: Binds the admin router to a TCP listener (§6).
// Purpose: One call ontocore-cli's `serve` subcommand can invoke without
//          knowing anything about Axum.
// Dependencies: axum, tokio, tracing
// ============================================================================

use axum::Router;
use tokio::net::TcpListener;

use crate::routes::build_router;
use crate::state::AppState;

/// Binds `state`'s router to `bind_addr` and serves until the process is
/// terminated.
///
/// # Errors
/// Returns [`std::io::Error`] if `bind_addr` cannot be bound.
pub async fn serve(state: AppState, bind_addr: &str) -> std::io::Result<()> {
    let router: Router = build_router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(event = "server.listening", bind_addr);
    axum::serve(listener, router).await
}
