//! Client for the external project-ledger service.
//!
//! The ledger holds one record per client code (schedule, reports, parts).
//! Records are fetched fresh at session creation, never cached, and never
//! mutated by this service. The same endpoint also accepts best-effort
//! inquiry logging, which runs detached from the answer path.

use reqwest::Client;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

/// A per-client ledger record. Opaque beyond its minimum shape: arrays under
/// `schedule`, `reports` (each with `report_title`/`report_summary`), and
/// `parts`. Owned by the external service.
pub type LedgerRecord = serde_json::Value;

/// Deadline for the fire-and-forget inquiry log. The chat path never waits
/// on it, but the detached task itself must not linger.
const INQUIRY_LOG_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// The ledger backend (a Google Apps Script deployment) rejects requests
// without a browser user agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for ledger reads and inquiry logging. Single attempt per call,
/// no retries.
#[derive(Clone)]
pub struct LedgerClient {
    client: Client,
    endpoint: String,
}

impl LedgerClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(FETCH_TIMEOUT)
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint,
        }
    }

    /// Fetches the ledger record for `client_code`.
    ///
    /// `Ok(None)` means the service answered but had no usable record
    /// (non-2xx status or a JSON `null` body); transport and decode failures
    /// are `Err`. The caller decides what a missing record means.
    pub async fn fetch_record(&self, client_code: &str) -> Result<Option<LedgerRecord>, LedgerError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "get_pm_data"), ("client_code", client_code)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!("Ledger fetch for {client_code} returned {status}");
            return Ok(None);
        }

        let record: LedgerRecord = response.json().await?;
        if record.is_null() {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Logs a user inquiry on a detached task. Fire-and-forget: the returned
    /// handle exists for tests only and is never awaited on the answer path.
    /// Every failure (timeout, non-2xx, transport) is swallowed.
    pub fn spawn_log_inquiry(&self, client_code: &str, query: &str) -> JoinHandle<()> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "log_inquiry"),
                ("client_code", client_code),
                ("query", query),
            ])
            .timeout(INQUIRY_LOG_TIMEOUT);

        tokio::spawn(async move {
            match request.send().await {
                Ok(response) => debug!("Inquiry logged ({})", response.status()),
                Err(e) => debug!("Inquiry log dropped: {e}"),
            }
        })
    }
}
