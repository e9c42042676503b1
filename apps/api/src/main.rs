mod chat;
mod config;
mod errors;
mod knowledge;
mod ledger;
mod llm_client;
mod routes;
mod session;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::ledger::LedgerClient;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::session::SessionRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fatal on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MakerMon API v{}", env!("CARGO_PKG_VERSION"));

    // Load the company knowledge blob (falls back to a stub on failure)
    let knowledge: Arc<str> = knowledge::load(&config.knowledge_path).into();

    // Initialize external clients
    let llm = GeminiClient::new(config.gemini_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let ledger = LedgerClient::new(config.ledger_url.clone());
    info!("Ledger client initialized");

    // Build app state
    let state = AppState {
        llm,
        ledger,
        knowledge,
        sessions: SessionRegistry::default(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
