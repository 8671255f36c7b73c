use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Url;

use crate::languages::LanguageId;
use crate::reconcile::Problem;
use crate::yaml::LineIndex;

/// Request to reconcile one generation of a document
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub uri: Url,
    pub generation: u64,
}

/// A tracked document
#[derive(Debug, Clone)]
pub struct Document {
    pub uri: Url,
    pub version: i32,
    pub language: LanguageId,
    pub content: String,
    pub lines: LineIndex,
    pub generation: u64,
}

/// Remembers the newest generation published per document and refuses
/// anything older.
#[derive(Debug, Default)]
pub struct PublishGate {
    published: DashMap<Url, u64>,
}

impl PublishGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `generation` and returns true unless a newer one went out.
    pub fn admit(&self, uri: &Url, generation: u64) -> bool {
        let mut last = self.published.entry(uri.clone()).or_insert(0);
        if generation < *last {
            return false;
        }
        *last = generation;
        true
    }

    pub fn forget(&self, uri: &Url) {
        self.published.remove(uri);
    }
}

/// Manages open documents, their in-flight passes and last results
pub struct DocumentManager {
    documents: DashMap<Url, Document>,
    inflight: DashMap<Url, CancellationToken>,
    problems: DashMap<Url, Arc<Vec<Problem>>>,
    gate: PublishGate,
    generation: AtomicU64,
    validation_tx: mpsc::Sender<ValidationRequest>,
    debounce: Duration,
}

impl DocumentManager {
    pub fn new(validation_tx: mpsc::Sender<ValidationRequest>, debounce: Duration) -> Self {
        Self {
            documents: DashMap::new(),
            inflight: DashMap::new(),
            problems: DashMap::new(),
            gate: PublishGate::new(),
            generation: AtomicU64::new(0),
            validation_tx,
            debounce,
        }
    }

    pub fn open(&self, uri: Url, language: LanguageId, version: i32, content: String) -> u64 {
        self.store(uri, language, version, content)
    }

    /// Replaces the text, keeping the language chosen on open.
    pub fn update(&self, uri: Url, version: i32, content: String) -> u64 {
        let language = self
            .documents
            .get(&uri)
            .map(|doc| doc.language)
            .unwrap_or_else(|| LanguageId::from_path(Path::new(uri.path())));
        self.store(uri, language, version, content)
    }

    fn store(&self, uri: Url, language: LanguageId, version: i32, content: String) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((_, token)) = self.inflight.remove(&uri) {
            token.cancel();
        }
        let document = Document {
            uri: uri.clone(),
            version,
            language,
            lines: LineIndex::new(&content),
            content,
            generation,
        };
        self.documents.insert(uri.clone(), document);
        tracing::debug!(%uri, version, generation, "document stored");

        self.schedule_validation(uri, generation);
        generation
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<Document>> {
        self.documents.get(uri).map(|doc| Arc::new(doc.clone()))
    }

    pub fn remove(&self, uri: &Url) {
        self.documents.remove(uri);
        self.problems.remove(uri);
        self.gate.forget(uri);
        if let Some((_, token)) = self.inflight.remove(uri) {
            token.cancel();
        }
    }

    pub fn is_current(&self, uri: &Url, generation: u64) -> bool {
        self.documents
            .get(uri)
            .is_some_and(|doc| doc.generation == generation)
    }

    /// Snapshot and cancellation token for a pass over `generation`, or
    /// `None` when the document moved on.
    pub fn begin(&self, uri: &Url, generation: u64) -> Option<(Arc<Document>, CancellationToken)> {
        let document = self.get(uri)?;
        if document.generation != generation {
            return None;
        }
        let token = CancellationToken::new();
        if let Some(previous) = self.inflight.insert(uri.clone(), token.clone()) {
            previous.cancel();
        }
        Some((document, token))
    }

    /// Stores the result of a finished pass. False when it is stale and
    /// must not be published.
    pub fn finish(&self, uri: &Url, generation: u64, problems: Vec<Problem>) -> bool {
        self.inflight.remove_if(uri, |_, token| !token.is_cancelled());
        if !self.is_current(uri, generation) || !self.gate.admit(uri, generation) {
            tracing::debug!(%uri, generation, "dropping stale problems");
            return false;
        }
        self.problems.insert(uri.clone(), Arc::new(problems));
        true
    }

    /// Problems of the last published pass.
    pub fn problems(&self, uri: &Url) -> Arc<Vec<Problem>> {
        self.problems
            .get(uri)
            .map(|p| Arc::clone(&p))
            .unwrap_or_default()
    }

    /// Schedule validation with debouncing
    fn schedule_validation(&self, uri: Url, generation: u64) {
        let tx = self.validation_tx.clone();
        let delay = self.debounce;
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(ValidationRequest { uri, generation }).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///ci/pipeline.yml").unwrap()
    }

    #[test]
    fn test_gate_rejects_older_generation() {
        let gate = PublishGate::new();
        assert!(gate.admit(&uri(), 2));
        assert!(!gate.admit(&uri(), 1));
        assert!(gate.admit(&uri(), 2));
        assert!(gate.admit(&uri(), 5));
    }

    #[tokio::test]
    async fn test_update_supersedes_inflight_pass() {
        let (tx, mut rx) = mpsc::channel(8);
        let manager = DocumentManager::new(tx, Duration::from_millis(1));
        let first = manager.open(uri(), LanguageId::Pipeline, 1, "jobs: []\n".into());
        let (_, token) = manager.begin(&uri(), first).unwrap();

        let second = manager.update(uri(), 2, "jobs:\n".into());
        assert!(second > first);
        assert!(token.is_cancelled());
        assert!(!manager.finish(&uri(), first, Vec::new()));
        assert!(manager.begin(&uri(), first).is_none());

        let (_, token) = manager.begin(&uri(), second).unwrap();
        assert!(!token.is_cancelled());
        assert!(manager.finish(&uri(), second, Vec::new()));

        let mut generations = vec![rx.recv().await.unwrap().generation];
        generations.push(rx.recv().await.unwrap().generation);
        generations.sort();
        assert_eq!(generations, vec![first, second]);
    }

    #[tokio::test]
    async fn test_update_keeps_language() {
        let (tx, _rx) = mpsc::channel(8);
        let manager = DocumentManager::new(tx, Duration::from_millis(1));
        manager.open(uri(), LanguageId::Task, 1, "platform: linux\n".into());
        manager.update(uri(), 2, "platform: darwin\n".into());
        assert_eq!(manager.get(&uri()).unwrap().language, LanguageId::Task);
    }
}
