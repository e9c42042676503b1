//! Axum route handlers for the relay surface: plain chat, the KakaoTalk
//! webhook, and session teardown.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::AppError;
use crate::session::prompts::{build_system_instruction, params_for};
use crate::session::{ChatSession, Mode, GUEST_SENTINEL};
use crate::state::AppState;

/// Shown to messenger users when anything on the answer path fails. The
/// webhook must still answer 200 — platforms drop non-2xx replies.
const KAKAO_FALLBACK_TEXT: &str = "Something went wrong. Please try again in a moment.";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    pub client_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

/// The slice of the KakaoTalk webhook payload we care about. The rest of the
/// nested envelope is ignored.
#[derive(Debug, Deserialize)]
pub struct KakaoRequest {
    #[serde(rename = "userRequest")]
    pub user_request: KakaoUserRequest,
}

#[derive(Debug, Deserialize)]
pub struct KakaoUserRequest {
    pub utterance: String,
}

#[derive(Debug, Serialize)]
pub struct KakaoResponse {
    version: &'static str,
    template: KakaoTemplate,
}

#[derive(Debug, Serialize)]
struct KakaoTemplate {
    outputs: Vec<KakaoOutput>,
}

#[derive(Debug, Serialize)]
struct KakaoOutput {
    #[serde(rename = "simpleText")]
    simple_text: KakaoSimpleText,
}

#[derive(Debug, Serialize)]
struct KakaoSimpleText {
    text: String,
}

impl KakaoResponse {
    fn simple_text(text: String) -> Self {
        Self {
            version: "2.0",
            template: KakaoTemplate {
                outputs: vec![KakaoOutput {
                    simple_text: KakaoSimpleText { text },
                }],
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /chat
///
/// Answers one user question. The client identifier comes from the
/// `client_code` query parameter when present, else the body `user_id`;
/// guests get a one-shot session, known clients a registry session bound to
/// the ledger snapshot taken at session creation. The inquiry log fires
/// before the generation call and is never awaited.
pub async fn handle_chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }

    let client_code = query
        .client_code
        .as_deref()
        .or(request.user_id.as_deref())
        .unwrap_or(GUEST_SENTINEL);

    let _ = state.ledger.spawn_log_inquiry(client_code, &request.question);

    let answer = if client_code.is_empty() || client_code == GUEST_SENTINEL {
        answer_as_guest(&state, &request.question).await?
    } else {
        let session = state
            .sessions
            .get_or_create(client_code, &state.ledger, &state.knowledge)
            .await?;
        let mut session = session.lock().await;
        session
            .send(&state.llm, &request.question)
            .await
            .map_err(|e| AppError::Generation(e.to_string()))?
    };

    Ok(Json(ChatResponse { answer }))
}

/// POST /kakao
///
/// KakaoTalk webhook. Extracts `userRequest.utterance`, answers in guest
/// mode, and wraps the reply in the platform envelope. Always 200: on any
/// failure the envelope carries a fixed apology text instead.
pub async fn handle_kakao(
    State(state): State<AppState>,
    Json(request): Json<KakaoRequest>,
) -> Json<KakaoResponse> {
    let question = request.user_request.utterance;

    let _ = state.ledger.spawn_log_inquiry(GUEST_SENTINEL, &question);

    let text = match answer_as_guest(&state, &question).await {
        Ok(answer) => answer,
        Err(e) => {
            error!("Kakao webhook answer failed: {e}");
            KAKAO_FALLBACK_TEXT.to_string()
        }
    };

    Json(KakaoResponse::simple_text(text))
}

/// DELETE /sessions/:client_code
///
/// Ends a known-client session. The next question for that client triggers
/// a fresh ledger fetch and a new system instruction.
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(client_code): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(&client_code).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "No live session for client '{client_code}'"
        )))
    }
}

/// One-shot guest turn. The relay cannot tell anonymous visitors apart, so
/// guest history never spans requests.
async fn answer_as_guest(state: &AppState, question: &str) -> Result<String, AppError> {
    let instruction = build_system_instruction(&Mode::Guest, &state.knowledge)?;
    let mut session = ChatSession::new(instruction, params_for(&Mode::Guest));
    session
        .send(&state.llm, question)
        .await
        .map_err(|e| AppError::Generation(e.to_string()))
}
