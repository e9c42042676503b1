use std::sync::Arc;

use crate::ledger::LedgerClient;
use crate::llm_client::GeminiClient;
use crate::session::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: GeminiClient,
    pub ledger: LedgerClient,
    /// Company-facts blob, read once at startup, immutable afterwards.
    pub knowledge: Arc<str>,
    /// Live known-client sessions keyed by client code.
    pub sessions: SessionRegistry,
}
