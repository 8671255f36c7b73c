use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_lsp::jsonrpc::{Error as RpcError, Result as RpcResult};
use tower_lsp::lsp_types::{
    CodeActionParams, CodeActionProviderCapability, CodeActionResponse, CompletionOptions,
    CompletionParams, CompletionResponse, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse,
    GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability,
    InitializeParams, InitializeResult, InitializedParams, MessageType, OneOf, ServerCapabilities,
    ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, Url, WorkDoneProgressOptions,
};
use tower_lsp::{Client, LanguageServer};

use crate::engine::Engine;
use crate::languages::LanguageId;
use crate::lsp::diagnostic::problem_to_diagnostic;
use crate::lsp::document::{Document, DocumentManager, ValidationRequest};
use crate::lsp::{code_action, completion, definition, hover, symbols};

/// Pipeline Language Server
pub struct PipelineLanguageServer {
    client: Client,
    document_manager: Arc<DocumentManager>,
    engine: Arc<Engine>,
}

impl PipelineLanguageServer {
    pub fn new(client: Client, engine: Engine, debounce: Duration) -> Self {
        let (validation_tx, validation_rx) = mpsc::channel::<ValidationRequest>(100);

        let document_manager = Arc::new(DocumentManager::new(validation_tx, debounce));
        let engine = Arc::new(engine);

        let client_clone = client.clone();
        let doc_manager_clone = Arc::clone(&document_manager);
        let engine_clone = Arc::clone(&engine);

        tokio::spawn(async move {
            validation_worker(validation_rx, client_clone, doc_manager_clone, engine_clone).await;
        });

        Self {
            client,
            document_manager,
            engine,
        }
    }

    /// Runs a request against the current snapshot of `uri` off the async
    /// runtime, so it never waits behind a reconcile.
    async fn with_document<T, F>(&self, uri: &Url, f: F) -> RpcResult<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Engine, &Document) -> Option<T> + Send + 'static,
    {
        let Some(doc) = self.document_manager.get(uri) else {
            return Ok(None);
        };
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine, &doc))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "request task failed");
                RpcError::internal_error()
            })
    }
}

fn detect_language(language_id: &str, uri: &Url) -> LanguageId {
    match LanguageId::from_lsp(language_id) {
        LanguageId::Task => LanguageId::Task,
        LanguageId::Pipeline => LanguageId::from_path(Path::new(uri.path())),
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for PipelineLanguageServer {
    async fn initialize(&self, _params: InitializeParams) -> RpcResult<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![":".to_string(), " ".to_string(), "-".to_string()]),
                    work_done_progress_options: WorkDoneProgressOptions {
                        work_done_progress: None,
                    },
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        tracing::info!("language server initialized");
        self.client
            .log_message(MessageType::INFO, "pipeline-lsp initialized")
            .await;
    }

    async fn shutdown(&self) -> RpcResult<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        let language = detect_language(&item.language_id, &item.uri);
        tracing::debug!(uri = %item.uri, %language, "did_open");
        self.document_manager
            .open(item.uri, language, item.version, item.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Full sync: the last change carries the whole text.
        if let Some(change) = params.content_changes.into_iter().last() {
            self.document_manager.update(uri, version, change.text);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.document_manager.remove(&uri);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        self.with_document(&uri, move |engine, doc| hover::provide_hover(engine, doc, position))
            .await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> RpcResult<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        self.with_document(&uri, move |engine, doc| {
            definition::provide_definition(engine, doc, position)
        })
        .await
    }

    async fn completion(&self, params: CompletionParams) -> RpcResult<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        self.with_document(&uri, move |engine, doc| {
            completion::provide_completion(engine, doc, position)
        })
        .await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> RpcResult<Option<DocumentSymbolResponse>> {
        self.with_document(&params.text_document.uri, symbols::provide_symbols)
            .await
    }

    async fn code_action(&self, params: CodeActionParams) -> RpcResult<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let problems = self.document_manager.problems(&uri);
        self.with_document(&uri, move |_, doc| {
            code_action::provide_code_actions(doc, &problems, params.range)
        })
        .await
    }
}

/// Background worker that reconciles documents
async fn validation_worker(
    mut rx: mpsc::Receiver<ValidationRequest>,
    client: Client,
    doc_manager: Arc<DocumentManager>,
    engine: Arc<Engine>,
) {
    while let Some(req) = rx.recv().await {
        // A newer edit has its own request queued.
        let Some((doc, token)) = doc_manager.begin(&req.uri, req.generation) else {
            continue;
        };

        let pass = {
            let doc = Arc::clone(&doc);
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || {
                engine.reconcile_cancellable(doc.language, &doc.content, &token)
            })
        };
        let problems = match pass.await {
            Ok(Some(problems)) => problems,
            Ok(None) => {
                tracing::debug!(uri = %req.uri, generation = req.generation, "reconcile cancelled");
                continue;
            }
            Err(e) => {
                tracing::error!(uri = %req.uri, error = %e, "reconcile task failed");
                continue;
            }
        };

        let diagnostics = problems
            .iter()
            .map(|problem| problem_to_diagnostic(problem, &doc.lines))
            .collect();
        if !doc_manager.finish(&req.uri, req.generation, problems) {
            continue;
        }
        tracing::debug!(uri = %req.uri, generation = req.generation, "publishing diagnostics");
        client
            .publish_diagnostics(req.uri, diagnostics, Some(doc.version))
            .await;
    }
}
