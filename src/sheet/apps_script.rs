//! Apps Script webhook endpoints.
//!
//! Like a deployed web app, these always answer 200 and report the outcome in
//! the `success` flag.

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::SheetState;
use crate::errors::AppError;
use crate::models::{EmployeeDraft, EmployeeId};
use crate::sync::wire::WebhookRow;

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    id: EmployeeId,
}

/// GET /macros/exec?action=fetch
pub async fn webhook_get(
    State(state): State<SheetState>,
    Query(query): Query<ActionQuery>,
) -> Json<Value> {
    match query.action.as_deref().unwrap_or("fetch") {
        "fetch" => reply(fetch(&state).await),
        other => reply(Err(AppError::BadRequest(format!(
            "Unknown action: {}",
            other
        )))),
    }
}

/// POST /macros/exec[?action=update|delete]
///
/// Browsers post as `text/plain` to skip the CORS preflight, so the body is
/// parsed here and a bad body still gets a 200 failure reply.
pub async fn webhook_post(
    State(state): State<SheetState>,
    Query(query): Query<ActionQuery>,
    body: Bytes,
) -> Json<Value> {
    let result = match serde_json::from_slice::<Value>(&body) {
        Ok(body) => dispatch(&state, query.action.as_deref(), body).await,
        Err(e) => Err(AppError::BadRequest(format!("Body is not JSON: {}", e))),
    };
    reply(result)
}

async fn dispatch(
    state: &SheetState,
    action: Option<&str>,
    body: Value,
) -> Result<Value, AppError> {
    match action.unwrap_or("create") {
        "create" => create(state, body).await,
        "update" => update(state, body).await,
        "delete" => delete(state, body).await,
        other => Err(AppError::BadRequest(format!("Unknown action: {}", other))),
    }
}

async fn fetch(state: &SheetState) -> Result<Value, AppError> {
    let rows: Vec<WebhookRow> = state
        .store
        .list()
        .await?
        .iter()
        .map(|r| WebhookRow::from_draft(Some(r.id), &r.fields))
        .collect();
    Ok(json!({ "data": rows }))
}

async fn create(state: &SheetState, body: Value) -> Result<Value, AppError> {
    let row: WebhookRow = serde_json::from_value(body)?;
    let draft = checked_draft(row)?;
    let record = state.store.insert(&draft).await?;

    if state.config.echo_ids {
        Ok(json!({ "id": record.id }))
    } else {
        Ok(json!({}))
    }
}

async fn update(state: &SheetState, body: Value) -> Result<Value, AppError> {
    let row: WebhookRow = serde_json::from_value(body)?;
    let id = row
        .id
        .ok_or_else(|| AppError::Validation("Update requires an id".to_string()))?;
    let draft = checked_draft(row)?;
    state.store.replace(id, &draft).await?;
    Ok(json!({}))
}

async fn delete(state: &SheetState, body: Value) -> Result<Value, AppError> {
    let DeleteBody { id } = serde_json::from_value(body)?;
    state.store.delete(id).await?;
    Ok(json!({}))
}

fn checked_draft(row: WebhookRow) -> Result<EmployeeDraft, AppError> {
    let draft = row.into_draft().map_err(AppError::Validation)?;
    draft
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(draft)
}

/// Merge `success` into the payload, or turn the error into a failure body.
fn reply(result: Result<Value, AppError>) -> Json<Value> {
    match result {
        Ok(mut payload) => {
            if let Value::Object(map) = &mut payload {
                map.insert("success".to_string(), Value::Bool(true));
            }
            Json(payload)
        }
        Err(e) => {
            tracing::warn!("Webhook request failed: {}", e);
            Json(json!({
                "success": false,
                "error": e.message(),
                "code": e.error_code(),
            }))
        }
    }
}
