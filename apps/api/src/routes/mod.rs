pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::chat::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/chat", post(handlers::handle_chat))
        .route("/kakao", post(handlers::handle_kakao))
        .route("/sessions/:client_code", delete(handlers::handle_end_session))
        .with_state(state)
}
