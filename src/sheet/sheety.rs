//! Sheety REST endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};

use super::SheetState;
use crate::errors::AppError;
use crate::models::{EmployeeDraft, EmployeeId, EmployeeRecord};
use crate::sync::wire::SheetyRow;

/// GET /sheets/{sheet} - List all rows.
pub async fn list_rows(
    State(state): State<SheetState>,
    Path(sheet): Path<String>,
) -> Result<Json<Value>, AppError> {
    check_sheet(&state, &sheet)?;

    let rows: Vec<Value> = state
        .store
        .list()
        .await?
        .iter()
        .map(to_row)
        .collect::<Result<_, _>>()?;

    Ok(Json(wrap(&sheet, Value::Array(rows))))
}

/// POST /sheets/{sheet} - Append a row.
pub async fn add_row(
    State(state): State<SheetState>,
    Path(sheet): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    check_sheet(&state, &sheet)?;

    let draft = unwrap_row(&state, body)?;
    let record = state.store.insert(&draft).await?;

    Ok(Json(wrap(&state.config.record_key, to_row(&record)?)))
}

/// PUT /sheets/{sheet}/{id} - Overwrite a row.
pub async fn edit_row(
    State(state): State<SheetState>,
    Path((sheet, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    check_sheet(&state, &sheet)?;

    let draft = unwrap_row(&state, body)?;
    let record = state.store.replace(EmployeeId(id), &draft).await?;

    Ok(Json(wrap(&state.config.record_key, to_row(&record)?)))
}

/// DELETE /sheets/{sheet}/{id} - Delete a row.
pub async fn delete_row(
    State(state): State<SheetState>,
    Path((sheet, id)): Path<(String, i64)>,
) -> Result<StatusCode, AppError> {
    check_sheet(&state, &sheet)?;

    state.store.delete(EmployeeId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn check_sheet(state: &SheetState, sheet: &str) -> Result<(), AppError> {
    if sheet == state.config.sheet_name {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Sheet {} not found", sheet)))
    }
}

/// Take the row out of `{ "<record_key>": {...} }` and validate it.
fn unwrap_row(state: &SheetState, body: Value) -> Result<EmployeeDraft, AppError> {
    let key = &state.config.record_key;
    let row = match body {
        Value::Object(mut map) => map.remove(key),
        _ => None,
    }
    .ok_or_else(|| AppError::BadRequest(format!("Body must wrap the row under {:?}", key)))?;

    let row: SheetyRow = serde_json::from_value(row)?;
    let draft = row.into_draft().map_err(AppError::Validation)?;
    draft
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(draft)
}

fn to_row(record: &EmployeeRecord) -> Result<Value, AppError> {
    Ok(serde_json::to_value(SheetyRow::from_draft(
        Some(record.id),
        &record.fields,
    ))?)
}

fn wrap(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}
