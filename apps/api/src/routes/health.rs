use axum::Json;
use serde_json::{json, Value};

/// GET /
/// Readiness text for webhook registration checks.
pub async fn root_handler() -> &'static str {
    "MakerMon AI relay ready"
}

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "makermon-api"
    }))
}
