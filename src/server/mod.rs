//! WebSocket hosting for browser-based editors.
pub mod lsp;
pub mod state;

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/lsp", get(lsp::lsp_handler))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions(),
    }))
}

/// Serves the language server over WebSocket at `/lsp`.
pub async fn start_server(addr: SocketAddr, state: AppState) -> crate::Result<()> {
    let app = router(state);

    tracing::info!("Starting language server bridge on ws://{}/lsp", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| crate::PipelineError::ServerError(format!("cannot bind {addr}: {e}")))?;
    axum::serve(listener, app).await?;

    Ok(())
}
