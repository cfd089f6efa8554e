//! Sheety REST dialect.
//!
//! The endpoint is the sheet's collection URL. Rows are listed under the
//! sheet name, single rows are wrapped under the record key, and rows are
//! addressed by `<endpoint>/<id>`. Success is the HTTP status.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{Map, Value};

use super::wire::{decode_rows, take_array, SheetyRow};
use super::{check_status, read_json, CreateReceipt, FetchOutcome, SheetBackend};
use crate::errors::SyncError;
use crate::models::{EmployeeDraft, EmployeeId, EmployeeRecord};

#[derive(Debug, Clone)]
pub struct SheetyBackend {
    client: Client,
    endpoint: String,
    sheet_name: String,
    record_key: String,
}

impl SheetyBackend {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        sheet_name: impl Into<String>,
        record_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            sheet_name: sheet_name.into(),
            record_key: record_key.into(),
        }
    }

    fn row_url(&self, id: EmployeeId) -> String {
        format!("{}/{}", self.endpoint, id)
    }

    /// `{ "<record_key>": row }`
    fn wrap(&self, row: SheetyRow) -> Result<Value, SyncError> {
        let mut body = Map::new();
        body.insert(self.record_key.clone(), serde_json::to_value(row)?);
        Ok(Value::Object(body))
    }

    async fn try_fetch(&self) -> Result<Vec<EmployeeRecord>, SyncError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let body = read_json(response).await?;
        let rows = take_array(body, &self.sheet_name)?;
        Ok(decode_rows(rows, SheetyRow::into_record))
    }
}

impl SheetBackend for SheetyBackend {
    async fn fetch_all(&self) -> FetchOutcome {
        FetchOutcome::from_result(self.try_fetch().await, "sheety")
    }

    async fn create(&self, draft: &EmployeeDraft) -> Result<CreateReceipt, SyncError> {
        let body = self.wrap(SheetyRow::from_draft(None, draft))?;
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let response = check_status(response).await?;

        // The 2xx status is the success signal. Sheety echoes the stored row,
        // id included; a missing or unreadable body is left for the caller's
        // identifier policy.
        let id = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|mut body| body.get_mut(&self.record_key).map(Value::take))
            .and_then(|row| row.get("id").cloned())
            .and_then(|id| serde_json::from_value::<EmployeeId>(id).ok());

        tracing::debug!("Sheety accepted new employee (id: {:?})", id);
        Ok(CreateReceipt { id })
    }

    async fn update(&self, record: &EmployeeRecord) -> Result<(), SyncError> {
        let body = self.wrap(SheetyRow::from_draft(Some(record.id), &record.fields))?;
        let response = self
            .client
            .put(self.row_url(record.id))
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!("Sheety updated employee {}", record.id);
        Ok(())
    }

    async fn remove(&self, id: EmployeeId) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(self.row_url(id))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!("Sheety deleted employee {}", id);
        Ok(())
    }
}
