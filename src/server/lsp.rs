use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tower_lsp::{LspService, Server};

use crate::lsp::PipelineLanguageServer;
use crate::server::state::AppState;

/// Handler for the LSP WebSocket route
pub async fn lsp_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Wraps one JSON-RPC payload in LSP base-protocol framing.
pub fn frame(payload: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload)
}

/// Reads the next framed message. `None` at end of stream.
pub async fn read_message<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut content_length = 0;
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let header = line.trim();
        if header.is_empty() {
            if content_length > 0 {
                break;
            }
            continue;
        }
        if let Some(len) = header.strip_prefix("Content-Length:") {
            content_length = len.trim().parse().unwrap_or(0);
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;
    Ok(Some(String::from_utf8_lossy(&body).into_owned()))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let open = state.session_opened();
    tracing::info!(sessions = open, "LSP WebSocket connection opened");
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // client side: pumped by the tasks below; server side: the LSP service
    let (client_read, client_write) = tokio::io::duplex(1024 * 1024);
    let (server_read, mut server_write) = tokio::io::duplex(1024 * 1024);

    // WebSocket -> server input, adding headers
    tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    tracing::trace!(%text, "LSP in");
                    if let Err(e) = server_write.write_all(frame(&text).as_bytes()).await {
                        tracing::warn!(error = %e, "failed to write to language server");
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Binary(_)) => tracing::debug!("ignoring binary WebSocket frame"),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive failed");
                    break;
                }
            }
        }
    });

    // server output -> WebSocket, stripping headers
    tokio::spawn(async move {
        let mut reader = BufReader::new(client_read);
        loop {
            match read_message(&mut reader).await {
                Ok(Some(text)) => {
                    tracing::trace!(%text, "LSP out");
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!(error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read from language server");
                    break;
                }
            }
        }
    });

    let engine = state.engine.clone();
    let debounce = state.debounce;
    let (service, socket) =
        LspService::new(move |client| PipelineLanguageServer::new(client, engine, debounce));

    Server::new(server_read, client_write, socket).serve(service).await;

    let open = state.session_closed();
    tracing::info!(sessions = open, "LSP WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_framing_round_trip() {
        let payload = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
        let stream = format!("{}{}", frame(payload), frame("{}"));
        let mut reader = BufReader::new(stream.as_bytes());
        assert_eq!(read_message(&mut reader).await.unwrap().as_deref(), Some(payload));
        assert_eq!(read_message(&mut reader).await.unwrap().as_deref(), Some("{}"));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }
}
