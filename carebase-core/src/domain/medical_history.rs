use super::{overwrite, overwrite_text};
use crate::validation::{FieldRule, FieldValue, Rule, Validate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MEDICAL_HISTORY_STATUSES: &[&str] = &["Active", "Inactive", "Resolved"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistoryEntry {
    pub patient_medical_history_id: i64,
    pub patient_id: i64,
    pub condition: String,
    pub diagnosis_date: Option<NaiveDate>,
    pub status: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMedicalHistoryEntry {
    pub patient_id: i64,
    pub condition: String,
    pub diagnosis_date: Option<NaiveDate>,
    pub status: String,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateMedicalHistoryRequest {
    pub condition: String,
    pub diagnosis_date: Option<NaiveDate>,
    pub status: String,
    pub details: String,
}

impl CreateMedicalHistoryRequest {
    pub fn into_new(self, patient_id: i64) -> NewMedicalHistoryEntry {
        NewMedicalHistoryEntry {
            patient_id,
            condition: self.condition,
            diagnosis_date: self.diagnosis_date,
            status: self.status,
            details: self.details,
        }
    }
}

impl Validate for CreateMedicalHistoryRequest {
    const ERROR_CODE: &'static str = "INVALID_MEDICAL_HISTORY_DATA";
    const RULES: &'static [FieldRule<Self>] = &[
        FieldRule {
            field: "condition",
            value: |r| FieldValue::Text(r.condition.clone()),
            rule: Rule::Required,
        },
        FieldRule {
            field: "diagnosis_date",
            value: |r| FieldValue::Date(r.diagnosis_date),
            rule: Rule::PastDate,
        },
        FieldRule {
            field: "status",
            value: |r| FieldValue::Text(r.status.clone()),
            rule: Rule::Required,
        },
        FieldRule {
            field: "status",
            value: |r| FieldValue::Text(r.status.clone()),
            rule: Rule::OneOf(MEDICAL_HISTORY_STATUSES),
        },
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateMedicalHistoryRequest {
    pub condition: String,
    pub diagnosis_date: Option<NaiveDate>,
    pub status: String,
    pub details: String,
}

impl UpdateMedicalHistoryRequest {
    pub fn merge_into(&self, entry: &mut MedicalHistoryEntry) {
        overwrite_text(&mut entry.condition, &self.condition);
        overwrite(&mut entry.diagnosis_date, self.diagnosis_date);
        overwrite_text(&mut entry.status, &self.status);
        overwrite_text(&mut entry.details, &self.details);
    }
}

impl Validate for UpdateMedicalHistoryRequest {
    const ERROR_CODE: &'static str = "INVALID_MEDICAL_HISTORY_DATA";
    const RULES: &'static [FieldRule<Self>] = &[
        FieldRule {
            field: "diagnosis_date",
            value: |r| FieldValue::Date(r.diagnosis_date),
            rule: Rule::PastDate,
        },
        FieldRule {
            field: "status",
            value: |r| FieldValue::Text(r.status.clone()),
            rule: Rule::OneOf(MEDICAL_HISTORY_STATUSES),
        },
    ];
}
