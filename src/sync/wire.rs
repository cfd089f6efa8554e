//! Wire rows for the two sheet dialects.
//!
//! Both dialects store one employee per sheet row with string-ish cells; they
//! only differ in how the name and job title columns are laid out. The stub
//! sheet server speaks the same rows, so both sides share these types.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::SyncError;
use crate::models::{
    non_blank, Address, Department, EmergencyContact, EmployeeDraft, EmployeeId, EmployeeRecord,
    EmploymentStatus, EmploymentType,
};

/// Columns shared by both dialects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonCells {
    #[serde(default, deserialize_with = "cell")]
    pub email: String,
    #[serde(default, deserialize_with = "cell")]
    pub department: String,
    #[serde(default, deserialize_with = "cell")]
    pub status: String,
    #[serde(default, deserialize_with = "cell")]
    pub employment_type: String,
    #[serde(default, deserialize_with = "cell")]
    pub phone: String,
    #[serde(default, deserialize_with = "cell")]
    pub start_date: String,
    #[serde(default, deserialize_with = "cell")]
    pub salary: String,
    #[serde(default, deserialize_with = "cell")]
    pub address: String,
    #[serde(default, deserialize_with = "cell")]
    pub city: String,
    #[serde(default, deserialize_with = "cell")]
    pub state: String,
    #[serde(default, deserialize_with = "cell")]
    pub zip_code: String,
    #[serde(default, deserialize_with = "cell")]
    pub emergency_contact: String,
    #[serde(default, deserialize_with = "cell")]
    pub emergency_phone: String,
    #[serde(default, deserialize_with = "cell")]
    pub qualifications: String,
    #[serde(default, deserialize_with = "cell")]
    pub passport_photo: String,
}

impl CommonCells {
    pub fn from_draft(draft: &EmployeeDraft) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            email: draft.email.trim().to_string(),
            department: draft
                .department
                .map(|d| d.as_str().to_string())
                .unwrap_or_default(),
            status: draft.status.as_str().to_string(),
            employment_type: draft.employment_type.as_str().to_string(),
            phone: text(&draft.phone),
            start_date: draft
                .start_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            salary: text(&draft.salary),
            address: text(&draft.address.street),
            city: text(&draft.address.city),
            state: text(&draft.address.state),
            zip_code: text(&draft.address.zip_code),
            emergency_contact: text(&draft.emergency_contact.name),
            emergency_phone: text(&draft.emergency_contact.phone),
            qualifications: text(&draft.qualifications),
            passport_photo: text(&draft.photo_url),
        }
    }

    /// Fill the non-name fields of `draft`. Fails on values outside the
    /// sheet's fixed option lists.
    pub fn apply_to(self, draft: &mut EmployeeDraft) -> Result<(), String> {
        draft.email = self.email.trim().to_string();

        draft.department = match self.department.trim() {
            "" => None,
            other => Some(
                Department::parse(other).ok_or_else(|| format!("unknown department {:?}", other))?,
            ),
        };

        draft.status = match self.status.trim() {
            "" => EmploymentStatus::default(),
            other => EmploymentStatus::parse(other)
                .ok_or_else(|| format!("unknown status {:?}", other))?,
        };

        draft.employment_type = match self.employment_type.trim() {
            "" => EmploymentType::default(),
            other => EmploymentType::parse(other)
                .ok_or_else(|| format!("unknown employment type {:?}", other))?,
        };

        draft.start_date = parse_sheet_date(&self.start_date)?;
        draft.phone = non_blank(Some(self.phone));
        draft.salary = non_blank(Some(self.salary));
        draft.address = Address {
            street: non_blank(Some(self.address)),
            city: non_blank(Some(self.city)),
            state: non_blank(Some(self.state)),
            zip_code: non_blank(Some(self.zip_code)),
        };
        draft.emergency_contact = EmergencyContact {
            name: non_blank(Some(self.emergency_contact)),
            phone: non_blank(Some(self.emergency_phone)),
        };
        draft.qualifications = non_blank(Some(self.qualifications));
        draft.photo_url = non_blank(Some(self.passport_photo));
        Ok(())
    }
}

/// Apps Script webhook row: split name, `jobRole`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EmployeeId>,
    #[serde(default, deserialize_with = "cell")]
    pub first_name: String,
    #[serde(default, deserialize_with = "cell")]
    pub last_name: String,
    #[serde(default, deserialize_with = "cell")]
    pub job_role: String,
    #[serde(flatten)]
    pub cells: CommonCells,
}

impl WebhookRow {
    pub fn from_draft(id: Option<EmployeeId>, draft: &EmployeeDraft) -> Self {
        Self {
            id,
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            job_role: draft.job_title.trim().to_string(),
            cells: CommonCells::from_draft(draft),
        }
    }

    pub fn into_draft(self) -> Result<EmployeeDraft, String> {
        let mut draft = EmployeeDraft {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            job_title: self.job_role.trim().to_string(),
            ..Default::default()
        };
        self.cells.apply_to(&mut draft)?;
        Ok(draft)
    }

    pub fn into_record(self) -> Result<EmployeeRecord, String> {
        let id = self.id.ok_or_else(|| "row has no id".to_string())?;
        Ok(EmployeeRecord::from_draft(id, self.into_draft()?))
    }
}

/// Sheety row: one `name` column, `position`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetyRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EmployeeId>,
    #[serde(default, deserialize_with = "cell")]
    pub name: String,
    #[serde(default, deserialize_with = "cell")]
    pub position: String,
    #[serde(flatten)]
    pub cells: CommonCells,
}

impl SheetyRow {
    pub fn from_draft(id: Option<EmployeeId>, draft: &EmployeeDraft) -> Self {
        Self {
            id,
            name: draft.full_name(),
            position: draft.job_title.trim().to_string(),
            cells: CommonCells::from_draft(draft),
        }
    }

    /// The single `name` column is split at its first space, so a multi-word
    /// first name comes back with the extra words in the last name. The full
    /// name itself survives.
    pub fn into_draft(self) -> Result<EmployeeDraft, String> {
        let mut draft = EmployeeDraft {
            job_title: self.position.trim().to_string(),
            ..Default::default()
        };
        draft.set_full_name(&self.name);
        self.cells.apply_to(&mut draft)?;
        Ok(draft)
    }

    pub fn into_record(self) -> Result<EmployeeRecord, String> {
        let id = self.id.ok_or_else(|| "row has no id".to_string())?;
        Ok(EmployeeRecord::from_draft(id, self.into_draft()?))
    }
}

/// Decode every row that parses; skip and log the rest.
pub(crate) fn decode_rows<R, F>(rows: Vec<Value>, into_record: F) -> Vec<EmployeeRecord>
where
    R: DeserializeOwned,
    F: Fn(R) -> Result<EmployeeRecord, String>,
{
    let mut records: Vec<EmployeeRecord> = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let decoded = serde_json::from_value::<R>(row)
            .map_err(|e| e.to_string())
            .and_then(&into_record);
        match decoded {
            Ok(record) if records.iter().any(|r| r.id == record.id) => {
                tracing::warn!("Skipping sheet row {}: duplicate id {}", index, record.id);
            }
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping sheet row {}: {}", index, e),
        }
    }
    records
}

/// Pull the row array out of a response envelope.
pub(crate) fn take_array(body: Value, key: &str) -> Result<Vec<Value>, SyncError> {
    match body {
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(rows)) => Ok(rows),
            Some(other) => Err(SyncError::MalformedResponse(format!(
                "field {:?} is {}, expected an array",
                key,
                json_kind(&other)
            ))),
            None => Err(SyncError::MalformedResponse(format!(
                "response has no {:?} field",
                key
            ))),
        },
        other => Err(SyncError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Sheet cells come back as strings, numbers or nulls depending on the
/// column format; read all of them as text.
fn cell<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// Date cells are plain `YYYY-MM-DD`, or a full RFC 3339 timestamp when the
/// sheet formats the column as a date.
///
/// A timestamp is the sheet's local midnight written in UTC, so in a zone
/// ahead of UTC it falls on the previous day. Rounding to the nearest UTC
/// midnight recovers the calendar date for any offset under twelve hours.
fn parse_sheet_date(s: &str) -> Result<Option<NaiveDate>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let invalid = || format!("invalid start date {:?}", s);

    if s.len() > 10 {
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
            let nearest_midnight = timestamp.with_timezone(&Utc) + TimeDelta::hours(12);
            return Ok(Some(nearest_midnight.date_naive()));
        }
    }

    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> EmployeeDraft {
        EmployeeDraft {
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            email: "jane@example.com".to_string(),
            job_title: "Therapist Assistant".to_string(),
            department: Some(Department::Therapy),
            status: EmploymentStatus::OnLeave,
            start_date: NaiveDate::from_ymd_opt(2023, 4, 17),
            address: Address {
                city: Some("Austin".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_webhook_row_layout() {
        let value = serde_json::to_value(WebhookRow::from_draft(Some(EmployeeId(2)), &draft()))
            .unwrap();
        assert_eq!(value["id"], 2);
        assert_eq!(value["firstName"], "Jane");
        assert_eq!(value["lastName"], "Smith");
        assert_eq!(value["jobRole"], "Therapist Assistant");
        assert_eq!(value["status"], "On Leave");
        assert_eq!(value["startDate"], "2023-04-17");
        assert_eq!(value["city"], "Austin");
        assert_eq!(value["employmentType"], "Full-time");
    }

    #[test]
    fn test_sheety_row_layout() {
        let value = serde_json::to_value(SheetyRow::from_draft(None, &draft())).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["name"], "Jane Smith");
        assert_eq!(value["position"], "Therapist Assistant");
        assert_eq!(value["department"], "Therapy");
    }

    #[test]
    fn test_numeric_cells_and_timestamp_dates() {
        let row: WebhookRow = serde_json::from_value(json!({
            "id": "4",
            "firstName": "Mike",
            "lastName": "Johnson",
            "email": "mike@example.com",
            "jobRole": "Administrative Staff",
            "department": "Admin",
            "status": "On Leave",
            "salary": 52000,
            "zipCode": 78701,
            "startDate": "2021-09-01T07:00:00.000Z",
            "phone": null
        }))
        .unwrap();

        let record = row.into_record().unwrap();
        assert_eq!(record.id, EmployeeId(4));
        assert_eq!(record.fields.salary.as_deref(), Some("52000"));
        assert_eq!(record.fields.address.zip_code.as_deref(), Some("78701"));
        assert_eq!(record.fields.start_date, NaiveDate::from_ymd_opt(2021, 9, 1));
        assert_eq!(record.fields.phone, None);
        assert_eq!(record.fields.status, EmploymentStatus::OnLeave);
    }

    #[test]
    fn test_sheety_row_splits_name() {
        let row: SheetyRow = serde_json::from_value(json!({
            "id": 2,
            "name": "Jane Smith",
            "email": "jane@example.com",
            "position": "Therapist Assistant",
            "department": "Therapy",
            "status": "Active"
        }))
        .unwrap();
        let record = row.into_record().unwrap();
        assert_eq!(record.fields.first_name, "Jane");
        assert_eq!(record.fields.last_name, "Smith");
        assert_eq!(record.fields.job_title, "Therapist Assistant");
    }

    #[test]
    fn test_unknown_option_values_are_rejected() {
        let row = WebhookRow {
            id: Some(EmployeeId(1)),
            first_name: "A".to_string(),
            cells: CommonCells {
                department: "Kitchen".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = row.into_record().unwrap_err();
        assert!(err.contains("Kitchen"));
    }

    #[test]
    fn test_timestamp_dates_use_sheet_local_midnight() {
        let april_17 = NaiveDate::from_ymd_opt(2023, 4, 17);

        // UTC+2 and UTC+10 sheets: local midnight is still the previous day in UTC
        assert_eq!(parse_sheet_date("2023-04-16T22:00:00.000Z"), Ok(april_17));
        assert_eq!(parse_sheet_date("2023-04-16T14:00:00.000Z"), Ok(april_17));
        // UTC-5 sheet
        assert_eq!(parse_sheet_date("2023-04-17T05:00:00.000Z"), Ok(april_17));
        assert_eq!(parse_sheet_date("2023-04-17T00:00:00+02:00"), Ok(april_17));
        assert_eq!(parse_sheet_date("2023-04-17"), Ok(april_17));
        assert_eq!(parse_sheet_date(" "), Ok(None));
        assert!(parse_sheet_date("17/04/2023").is_err());
    }

    #[test]
    fn test_sheety_name_split_is_lossy() {
        let mut entered = draft();
        entered.first_name = "Mary Ann".to_string();
        entered.last_name = "Lee".to_string();

        let value = serde_json::to_value(SheetyRow::from_draft(Some(EmployeeId(3)), &entered))
            .unwrap();
        assert_eq!(value["name"], "Mary Ann Lee");

        let row: SheetyRow = serde_json::from_value(value).unwrap();
        let record = row.into_record().unwrap();
        assert_eq!(record.fields.first_name, "Mary");
        assert_eq!(record.fields.last_name, "Ann Lee");
        assert_eq!(record.full_name(), entered.full_name());
    }

    #[test]
    fn test_decode_rows_skips_bad_and_duplicate_rows() {
        let rows = vec![
            json!({ "id": 1, "firstName": "John", "lastName": "Doe", "department": "Therapy" }),
            json!({ "firstName": "No", "lastName": "Id" }),
            json!({ "id": 3, "firstName": "Bad", "department": "Kitchen" }),
            json!("not a row"),
            json!({ "id": 1, "firstName": "Duplicate" }),
            json!({ "id": 2, "firstName": "Jane", "lastName": "Smith" }),
        ];
        let records = decode_rows(rows, WebhookRow::into_record);
        let ids: Vec<i64> = records.iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(records[0].full_name(), "John Doe");
    }

    #[test]
    fn test_take_array() {
        let rows = take_array(json!({ "data": [{ "id": 1 }] }), "data").unwrap();
        assert_eq!(rows.len(), 1);

        assert!(matches!(
            take_array(json!({}), "data"),
            Err(SyncError::MalformedResponse(_))
        ));
        assert!(matches!(
            take_array(json!({ "employees": {} }), "employees"),
            Err(SyncError::MalformedResponse(_))
        ));
        assert!(matches!(
            take_array(json!([1, 2]), "data"),
            Err(SyncError::MalformedResponse(_))
        ));
    }
}
