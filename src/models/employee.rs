//! Employee model shared by the sync client, the roster state and the stub sheet.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::DraftError;

/// Identifier assigned by the remote store.
///
/// Spreadsheet rows do not always keep numbers numeric, so both `7` and `"7"`
/// are accepted when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EmployeeId(pub i64);

impl EmployeeId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for EmployeeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(n) if n > 0 => Ok(EmployeeId(n)),
            RawId::Number(n) => Err(serde::de::Error::custom(format!(
                "employee id must be positive, got {}",
                n
            ))),
            RawId::Text(s) => match s.trim().parse::<i64>() {
                Ok(n) if n > 0 => Ok(EmployeeId(n)),
                _ => Err(serde::de::Error::custom(format!(
                    "invalid employee id {:?}",
                    s
                ))),
            },
        }
    }
}

/// Clinic department. The set is fixed by the sheet's validation rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Department {
    Therapy,
    Admin,
    Billing,
    Support,
    Management,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::Therapy,
        Department::Admin,
        Department::Billing,
        Department::Support,
        Department::Management,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Therapy => "Therapy",
            Department::Admin => "Admin",
            Department::Billing => "Billing",
            Department::Support => "Support",
            Department::Management => "Management",
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Employment status as shown on the roster badge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EmploymentStatus {
    #[default]
    Active,
    #[serde(rename = "On Leave")]
    OnLeave,
    Inactive,
}

impl EmploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentStatus::Active => "Active",
            EmploymentStatus::OnLeave => "On Leave",
            EmploymentStatus::Inactive => "Inactive",
        }
    }

    /// Accepts the sheet spelling plus `on-leave` / `on_leave` from the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_token(s).as_str() {
            "active" => Some(EmploymentStatus::Active),
            "onleave" => Some(EmploymentStatus::OnLeave),
            "inactive" => Some(EmploymentStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EmploymentType {
    #[default]
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Temporary,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "Full-time",
            EmploymentType::PartTime => "Part-time",
            EmploymentType::Contract => "Contract",
            EmploymentType::Temporary => "Temporary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match normalize_token(s).as_str() {
            "fulltime" => Some(EmploymentType::FullTime),
            "parttime" => Some(EmploymentType::PartTime),
            "contract" => Some(EmploymentType::Contract),
            "temporary" => Some(EmploymentType::Temporary),
            _ => None,
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_token(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Postal address, every part optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The editable fields of an employee, without an identifier.
///
/// This is what the create/edit form holds. It only becomes part of the
/// roster once the remote store has accepted it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDraft {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub status: EmploymentStatus,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub emergency_contact: EmergencyContact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl EmployeeDraft {
    /// First and last name joined by a single space.
    pub fn full_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {}", first, last),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => String::new(),
        }
    }

    /// Split a single full name on the first run of whitespace.
    pub fn set_full_name(&mut self, full_name: &str) {
        let mut parts = full_name.trim().splitn(2, char::is_whitespace);
        self.first_name = parts.next().unwrap_or_default().to_string();
        self.last_name = parts.next().unwrap_or_default().trim().to_string();
    }

    /// Check the fields the form marks as required.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.full_name().is_empty() {
            return Err(DraftError::MissingName);
        }

        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(DraftError::InvalidEmail(email.to_string())),
        }

        if self.job_title.trim().is_empty() {
            return Err(DraftError::MissingJobTitle);
        }

        if self.department.is_none() {
            return Err(DraftError::MissingDepartment);
        }

        Ok(())
    }
}

/// An employee the remote store has confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    #[serde(flatten)]
    pub fields: EmployeeDraft,
}

impl EmployeeRecord {
    pub fn from_draft(id: EmployeeId, draft: EmployeeDraft) -> Self {
        Self { id, fields: draft }
    }

    /// Copy of the editable fields, used to seed the edit form.
    pub fn draft(&self) -> EmployeeDraft {
        self.fields.clone()
    }

    pub fn full_name(&self) -> String {
        self.fields.full_name()
    }
}

/// Treat empty or whitespace-only sheet cells as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
