//! Remote sync client.
//!
//! Translates the four roster operations into HTTP calls against the
//! configured spreadsheet backend. Every operation returns a value: transport
//! and parse failures are turned into `SyncError` (or an unavailable fetch)
//! at this boundary and never escape as panics.

mod apps_script;
mod sheety;
pub mod wire;

pub use apps_script::AppsScriptBackend;
pub use sheety::SheetyBackend;

use std::future::Future;

use reqwest::Response;
use serde_json::Value;

use crate::config::{BackendKind, Config};
use crate::errors::SyncError;
use crate::models::{EmployeeDraft, EmployeeId, EmployeeRecord};

/// Result of a full fetch.
///
/// A failed request and a sheet with zero rows are different things: only the
/// former should leave a populated roster alone.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The backend answered with a recognizable row list (possibly empty)
    Loaded(Vec<EmployeeRecord>),
    /// The request failed or the payload was not understood
    Unavailable(SyncError),
}

impl FetchOutcome {
    fn from_result(result: Result<Vec<EmployeeRecord>, SyncError>, backend: &str) -> Self {
        match result {
            Ok(records) => {
                tracing::debug!("Fetched {} employees from {}", records.len(), backend);
                FetchOutcome::Loaded(records)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch employees from {}: {}", backend, e);
                FetchOutcome::Unavailable(e)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, FetchOutcome::Loaded(_))
    }

    /// The fetched rows, or an empty list when the fetch failed.
    pub fn into_records(self) -> Vec<EmployeeRecord> {
        match self {
            FetchOutcome::Loaded(records) => records,
            FetchOutcome::Unavailable(_) => Vec::new(),
        }
    }
}

/// What the backend told us after a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateReceipt {
    /// The authoritative id, when the backend echoes one
    pub id: Option<EmployeeId>,
}

/// One spreadsheet dialect.
pub trait SheetBackend {
    /// Read every row. Never fails the caller; see [`FetchOutcome`].
    fn fetch_all(&self) -> impl Future<Output = FetchOutcome> + Send;

    /// Append a row built from `draft`.
    fn create(
        &self,
        draft: &EmployeeDraft,
    ) -> impl Future<Output = Result<CreateReceipt, SyncError>> + Send;

    /// Overwrite the row addressed by `record.id` with the full record.
    fn update(&self, record: &EmployeeRecord)
        -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Delete the row addressed by `id`.
    fn remove(&self, id: EmployeeId) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// The backend picked by configuration.
#[derive(Debug, Clone)]
pub enum RemoteSyncClient {
    AppsScript(AppsScriptBackend),
    Sheety(SheetyBackend),
}

impl RemoteSyncClient {
    /// Build the client for the configured dialect.
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        tracing::info!(
            "Using {} backend at {}",
            config.backend.as_str(),
            config.endpoint
        );

        Ok(match config.backend {
            BackendKind::AppsScript => {
                RemoteSyncClient::AppsScript(AppsScriptBackend::new(client, &config.endpoint))
            }
            BackendKind::Sheety => RemoteSyncClient::Sheety(SheetyBackend::new(
                client,
                &config.endpoint,
                &config.sheet_name,
                &config.record_key,
            )),
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            RemoteSyncClient::AppsScript(_) => BackendKind::AppsScript,
            RemoteSyncClient::Sheety(_) => BackendKind::Sheety,
        }
    }
}

impl SheetBackend for RemoteSyncClient {
    async fn fetch_all(&self) -> FetchOutcome {
        match self {
            RemoteSyncClient::AppsScript(b) => b.fetch_all().await,
            RemoteSyncClient::Sheety(b) => b.fetch_all().await,
        }
    }

    async fn create(&self, draft: &EmployeeDraft) -> Result<CreateReceipt, SyncError> {
        match self {
            RemoteSyncClient::AppsScript(b) => b.create(draft).await,
            RemoteSyncClient::Sheety(b) => b.create(draft).await,
        }
    }

    async fn update(&self, record: &EmployeeRecord) -> Result<(), SyncError> {
        match self {
            RemoteSyncClient::AppsScript(b) => b.update(record).await,
            RemoteSyncClient::Sheety(b) => b.update(record).await,
        }
    }

    async fn remove(&self, id: EmployeeId) -> Result<(), SyncError> {
        match self {
            RemoteSyncClient::AppsScript(b) => b.remove(id).await,
            RemoteSyncClient::Sheety(b) => b.remove(id).await,
        }
    }
}

/// Fail on non-2xx, keeping a short excerpt of the body for the message.
async fn check_status(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = match text.trim() {
        "" => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        body => body.chars().take(200).collect(),
    };
    Err(SyncError::rejected(status, message))
}

/// Check the status, then read the body as JSON.
async fn read_json(response: Response) -> Result<Value, SyncError> {
    let response = check_status(response).await?;
    response
        .json::<Value>()
        .await
        .map_err(|e| SyncError::MalformedResponse(format!("body is not JSON: {}", e)))
}
