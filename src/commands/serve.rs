use std::net::SocketAddr;
use tower_lsp::{LspService, Server};

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::lsp::PipelineLanguageServer;
use crate::server::{self, AppState};
use crate::Result;

/// Serves over stdio, or over WebSocket when `port` is given.
pub async fn execute_serve(config: &ServerConfig, port: Option<u16>) -> Result<()> {
    let engine = Engine::new(config.providers());
    let debounce = config.debounce;

    match port {
        Some(port) => {
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            server::start_server(addr, AppState::new(engine, debounce)).await
        }
        None => {
            tracing::info!("serving over stdio");
            let (service, socket) =
                LspService::new(move |client| PipelineLanguageServer::new(client, engine, debounce));
            Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
                .serve(service)
                .await;
            Ok(())
        }
    }
}
