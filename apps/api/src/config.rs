use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Missing required variables are a fatal startup error.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    /// Base URL of the external project-ledger service.
    pub ledger_url: String,
    pub knowledge_path: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GOOGLE_API_KEY")?,
            ledger_url: require_env("LEDGER_URL")?,
            knowledge_path: std::env::var("KNOWLEDGE_FILE")
                .unwrap_or_else(|_| "data/company_facts.txt".to_string())
                .into(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
