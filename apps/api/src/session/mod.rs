//! Session core — mode resolution, per-session chat state, and the registry
//! of live sessions.
//!
//! Flow: resolve_mode → build_system_instruction → ChatSession::new →
//!       send per user turn.
//!
//! A session's system instruction and generation settings are fixed at
//! creation. A ledger record that changes mid-session stays invisible until
//! the session is torn down and recreated (staleness by design).

pub mod prompts;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::ledger::LedgerClient;
use crate::llm_client::{ConversationTurn, GeminiClient, GenerationParams, LlmError};
use crate::session::prompts::{build_system_instruction, params_for};

/// Client identifier meaning "anonymous visitor". Guests never trigger a
/// ledger fetch.
pub const GUEST_SENTINEL: &str = "GUEST";

// ────────────────────────────────────────────────────────────────────────────
// Mode resolution
// ────────────────────────────────────────────────────────────────────────────

/// The persona branch governing a session.
#[derive(Debug, Clone)]
pub enum Mode {
    Guest,
    KnownClient {
        code: String,
        record: crate::ledger::LedgerRecord,
    },
}

/// Resolves the session mode for a client identifier.
///
/// Absent, empty, or sentinel identifiers are guests — no network call is
/// made. Any other identifier requires a ledger record: a missing record is
/// `DataUnavailable` and the session must not be created (never a
/// known-client persona without its ground truth).
pub async fn resolve_mode(
    client_code: Option<&str>,
    ledger: &LedgerClient,
) -> Result<Mode, AppError> {
    let code = match client_code {
        None => return Ok(Mode::Guest),
        Some(c) if c.is_empty() || c == GUEST_SENTINEL => return Ok(Mode::Guest),
        Some(c) => c,
    };

    match ledger.fetch_record(code).await {
        Ok(Some(record)) => Ok(Mode::KnownClient {
            code: code.to_string(),
            record,
        }),
        Ok(None) => Err(AppError::DataUnavailable(format!(
            "no ledger record for client '{code}'"
        ))),
        Err(e) => {
            warn!("Ledger fetch failed for client '{code}': {e}");
            Err(AppError::DataUnavailable(format!(
                "ledger fetch failed for client '{code}'"
            )))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Chat session
// ────────────────────────────────────────────────────────────────────────────

/// One conversation with one visitor.
///
/// History is append-only and never truncated or summarized; a very long
/// session will eventually exceed the model context window. Capping is
/// intentionally left out of this core.
#[derive(Debug)]
pub struct ChatSession {
    instruction: String,
    params: GenerationParams,
    history: Vec<ConversationTurn>,
}

impl ChatSession {
    /// Binds the system instruction and generation settings for the life of
    /// the session, with an empty history.
    pub fn new(instruction: String, params: GenerationParams) -> Self {
        Self {
            instruction,
            params,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Sends one user turn and returns the assistant's reply.
    ///
    /// The user turn is appended before the remote call and is NOT rolled
    /// back on failure, so a retry after an error sees the prior context.
    pub async fn send(&mut self, llm: &GeminiClient, text: &str) -> Result<String, LlmError> {
        self.history.push(ConversationTurn::user(text));

        let answer = llm
            .generate(&self.instruction, &self.history, self.params)
            .await?;

        self.history.push(ConversationTurn::assistant(&answer));
        Ok(answer)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session registry
// ────────────────────────────────────────────────────────────────────────────

/// Live known-client sessions, keyed by client code.
///
/// Creation runs under the registry lock so concurrent first requests for
/// the same client resolve the mode and build the instruction exactly once.
/// Turns within one session serialize on the session's own lock.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<ChatSession>>>>>,
}

impl SessionRegistry {
    /// Returns the live session for `code`, creating it (ledger fetch +
    /// prompt build) on first use.
    pub async fn get_or_create(
        &self,
        code: &str,
        ledger: &LedgerClient,
        knowledge: &str,
    ) -> Result<Arc<Mutex<ChatSession>>, AppError> {
        let mut sessions = self.inner.lock().await;
        if let Some(session) = sessions.get(code) {
            return Ok(session.clone());
        }

        let mode = resolve_mode(Some(code), ledger).await?;
        let instruction = build_system_instruction(&mode, knowledge)?;
        let session = Arc::new(Mutex::new(ChatSession::new(instruction, params_for(&mode))));
        sessions.insert(code.to_string(), session.clone());
        info!("Session created for client '{code}'");
        Ok(session)
    }

    /// Ends the session for `code`. The next request re-resolves the mode
    /// with a fresh ledger fetch.
    pub async fn remove(&self, code: &str) -> bool {
        self.inner.lock().await.remove(code).is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{any, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::llm_client::{Role, MODEL};
    use crate::session::prompts::GUEST_TEMPERATURE;

    fn gemini_path() -> String {
        format!("/v1beta/models/{MODEL}:generateContent")
    }

    fn guest_params() -> GenerationParams {
        GenerationParams {
            model: MODEL,
            temperature: GUEST_TEMPERATURE,
        }
    }

    async fn mount_gemini_reply(server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path(gemini_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": text}]}}]
            })))
            .mount(server)
            .await;
    }

    // ── resolve_mode ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_resolve_guest_sentinel_makes_no_network_call() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let ledger = LedgerClient::new(format!("{}/exec", server.uri()));

        for code in [None, Some(""), Some(GUEST_SENTINEL)] {
            let mode = resolve_mode(code, &ledger).await.unwrap();
            assert!(matches!(mode, Mode::Guest));
        }
    }

    #[tokio::test]
    async fn test_resolve_known_client_carries_record() {
        let server = MockServer::start().await;
        let record = json!({"schedule": [], "reports": [], "parts": []});
        Mock::given(method("GET"))
            .and(path("/exec"))
            .and(query_param("action", "get_pm_data"))
            .and(query_param("client_code", "JD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(record.clone()))
            .expect(1)
            .mount(&server)
            .await;
        let ledger = LedgerClient::new(format!("{}/exec", server.uri()));

        let mode = resolve_mode(Some("JD"), &ledger).await.unwrap();
        match mode {
            Mode::KnownClient {
                code,
                record: fetched,
            } => {
                assert_eq!(code, "JD");
                assert_eq!(fetched, record);
            }
            Mode::Guest => panic!("expected KnownClient"),
        }
    }

    #[tokio::test]
    async fn test_resolve_missing_record_is_data_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let ledger = LedgerClient::new(format!("{}/exec", server.uri()));

        let err = resolve_mode(Some("JD"), &ledger).await.unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    // ── ChatSession ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_send_appends_user_and_assistant_turns() {
        let server = MockServer::start().await;
        mount_gemini_reply(&server, "We cover tooling and mass production.").await;
        let llm = GeminiClient::with_base_url("test-key".to_string(), server.uri());

        let mut session = ChatSession::new("persona".to_string(), guest_params());
        let answer = session.send(&llm, "What do you offer?").await.unwrap();

        assert_eq!(answer, "We cover tooling and mass production.");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].role, Role::User);
        assert_eq!(session.history()[1].role, Role::Assistant);
        assert_eq!(session.history()[1].text, answer);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_the_user_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(gemini_path()))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let llm = GeminiClient::with_base_url("test-key".to_string(), server.uri());

        let mut session = ChatSession::new("persona".to_string(), guest_params());
        let result = session.send(&llm, "hello?").await;

        assert!(result.is_err());
        // At-least-once-visible-history: the turn stays so a retry sees it.
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].text, "hello?");
    }

    #[tokio::test]
    async fn test_retry_after_failure_sends_prior_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(gemini_path()))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        let llm = GeminiClient::with_base_url("test-key".to_string(), server.uri());

        let mut session = ChatSession::new("persona".to_string(), guest_params());
        assert!(session.send(&llm, "first").await.is_err());

        server.reset().await;
        mount_gemini_reply(&server, "caught up").await;
        session.send(&llm, "second").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let contents = body["contents"].as_array().unwrap();
        // Both the failed turn and the retry turn went out.
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["parts"][0]["text"], "first");
        assert_eq!(contents[1]["parts"][0]["text"], "second");
    }

    // ── SessionRegistry ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_registry_creates_once_and_reuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exec"))
            .and(query_param("action", "get_pm_data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "schedule": [], "reports": [], "parts": []
            })))
            .expect(1)
            .mount(&server)
            .await;
        let ledger = LedgerClient::new(format!("{}/exec", server.uri()));

        let registry = SessionRegistry::default();
        let first = registry.get_or_create("JD", &ledger, "facts").await.unwrap();
        let second = registry.get_or_create("JD", &ledger, "facts").await.unwrap();

        // Same live session, one ledger fetch total (mock expects 1).
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_registry_remove_forces_fresh_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "schedule": [], "reports": [], "parts": []
            })))
            .expect(2)
            .mount(&server)
            .await;
        let ledger = LedgerClient::new(format!("{}/exec", server.uri()));

        let registry = SessionRegistry::default();
        let first = registry.get_or_create("JD", &ledger, "facts").await.unwrap();
        assert!(registry.remove("JD").await);
        let second = registry.get_or_create("JD", &ledger, "facts").await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!registry.remove("unknown").await);
    }

    #[tokio::test]
    async fn test_registry_rejects_client_without_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let ledger = LedgerClient::new(format!("{}/exec", server.uri()));

        let registry = SessionRegistry::default();
        let err = registry
            .get_or_create("JD", &ledger, "facts")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DataUnavailable(_)));
        // Fail closed: no half-built session was stored.
        assert!(!registry.remove("JD").await);
    }
}
