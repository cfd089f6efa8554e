//! Google Apps Script webhook dialect.
//!
//! A deployed web app only routes GET and POST, so every write is a POST and
//! the operation travels in the `action` query parameter. Writes report their
//! outcome in a `success` flag in the JSON body.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::wire::{decode_rows, take_array, WebhookRow};
use super::{check_status, read_json, CreateReceipt, FetchOutcome, SheetBackend};
use crate::errors::SyncError;
use crate::models::{EmployeeDraft, EmployeeId, EmployeeRecord};

/// Field the webhook wraps the row list in.
const DATA_FIELD: &str = "data";

/// Acknowledgement body returned by webhook writes.
#[derive(Debug, Deserialize)]
struct WebhookAck {
    success: bool,
    #[serde(default)]
    id: Option<EmployeeId>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppsScriptBackend {
    client: Client,
    endpoint: String,
}

impl AppsScriptBackend {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn try_fetch(&self) -> Result<Vec<EmployeeRecord>, SyncError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "fetch")])
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let body = read_json(response).await?;
        if body.get("success") == Some(&Value::Bool(false)) {
            return Err(SyncError::RemoteRejected {
                status: None,
                message: error_text(&body),
            });
        }

        let rows = take_array(body, DATA_FIELD)?;
        Ok(decode_rows(rows, WebhookRow::into_record))
    }

    /// POST a JSON body, optionally with an `action`, and require `success: true`.
    async fn post(&self, action: Option<&str>, body: &Value) -> Result<WebhookAck, SyncError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(action) = action {
            request = request.query(&[("action", action)]);
        }

        let response = check_status(request.send().await?).await?;
        let status = response.status();
        let ack: WebhookAck = response.json().await.map_err(|e| {
            SyncError::MalformedResponse(format!("expected a success flag: {}", e))
        })?;

        if ack.success {
            Ok(ack)
        } else {
            Err(SyncError::rejected(
                status,
                ack.error
                    .unwrap_or_else(|| "webhook reported failure".to_string()),
            ))
        }
    }
}

impl SheetBackend for AppsScriptBackend {
    async fn fetch_all(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.try_fetch().await, "apps-script webhook")
    }

    async fn create(&self, draft: &EmployeeDraft) -> Result<CreateReceipt, SyncError> {
        let body = serde_json::to_value(WebhookRow::from_draft(None, draft))?;
        let ack = self.post(None, &body).await?;
        tracing::debug!("Webhook accepted new employee (id: {:?})", ack.id);
        Ok(CreateReceipt { id: ack.id })
    }

    async fn update(&self, record: &EmployeeRecord) -> Result<(), SyncError> {
        let body = serde_json::to_value(WebhookRow::from_draft(Some(record.id), &record.fields))?;
        self.post(Some("update"), &body).await?;
        tracing::debug!("Webhook updated employee {}", record.id);
        Ok(())
    }

    async fn remove(&self, id: EmployeeId) -> Result<(), SyncError> {
        self.post(Some("delete"), &json!({ "id": id })).await?;
        tracing::debug!("Webhook deleted employee {}", id);
        Ok(())
    }
}

fn error_text(body: &Value) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .unwrap_or("webhook reported failure")
        .to_string()
}
