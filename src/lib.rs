pub mod api;
pub mod settlement;

use std::sync::Arc;
use std::time::Duration;

use settlement::query::Queries;
use settlement::service::Settlement;
use settlement::store::Store;

// --- Configuration ---

/// Runtime settings. Defaults are overridable via environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Socket address the API binds to.
    pub bind_addr: String,
    /// Per-key lock acquisition bound; exceeding it fails the submission
    /// as a retryable atomicity error.
    pub lock_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            lock_timeout_ms: 2_000,
        }
    }
}

impl Settings {
    /// Load overrides from environment variables (if set).
    pub fn from_env() -> Self {
        let mut s = Self::default();
        if let Ok(v) = std::env::var("HIVEMIND_BIND") {
            if !v.trim().is_empty() {
                s.bind_addr = v;
            }
        }
        if let Ok(v) = std::env::var("HIVEMIND_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                s.lock_timeout_ms = ms;
            }
        }
        s
    }
}

// --- Shared App State ---

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub settlement: Arc<Settlement>,
    pub queries: Arc<Queries>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let store = Arc::new(Store::new(Duration::from_millis(settings.lock_timeout_ms)));
        Self {
            settlement: Arc::new(Settlement::new(Arc::clone(&store))),
            queries: Arc::new(Queries::new(Arc::clone(&store))),
            store,
        }
    }
}
