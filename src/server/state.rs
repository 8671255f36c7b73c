use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::engine::Engine;

/// Shared by every WebSocket session. Each session gets its own language
/// server over a clone of the engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub debounce: Duration,
    sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(engine: Engine, debounce: Duration) -> Self {
        Self {
            engine,
            debounce,
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counts a new session and returns how many are open.
    pub fn session_opened(&self) -> usize {
        self.sessions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn session_closed(&self) -> usize {
        self.sessions.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}
