use super::overwrite_text;
use crate::error::ValidationError;
use crate::validation::rules::age_on;
use crate::validation::{FieldRule, FieldValue, Rule, Validate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const SEXES: &[&str] = &["Male", "Female", "Other"];
pub const COMMUNICATION_PREFERENCES: &[&str] = &["Phone", "Email", "Text"];
pub const SOCIOECONOMIC_STATUSES: &[&str] = &["Low", "Middle", "High", "Decline to Answer"];

/// Minimum age accepted at intake.
const MIN_AGE: i64 = 18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub age: i32,
    pub date_of_birth: NaiveDate,
    pub sex: String,
    pub phone_number: String,
    pub email_address: String,
    pub preferred_communication: String,
    pub socioeconomic_status: String,
    pub geographic_location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A patient that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub user_id: i64,
    pub full_name: String,
    pub age: i32,
    pub date_of_birth: NaiveDate,
    pub sex: String,
    pub phone_number: String,
    pub email_address: String,
    pub preferred_communication: String,
    pub socioeconomic_status: String,
    pub geographic_location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatePatientRequest {
    pub user_id: i64,
    pub full_name: String,
    pub age: i32,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: String,
    pub phone_number: String,
    pub email_address: String,
    pub preferred_communication: String,
    pub socioeconomic_status: String,
    pub geographic_location: String,
}

impl CreatePatientRequest {
    /// Returns `None` when the required date of birth is missing; callers
    /// validate first, so that only happens on unvalidated input.
    pub fn into_new(self) -> Option<NewPatient> {
        Some(NewPatient {
            user_id: self.user_id,
            full_name: self.full_name,
            age: self.age,
            date_of_birth: self.date_of_birth?,
            sex: self.sex,
            phone_number: self.phone_number,
            email_address: self.email_address,
            preferred_communication: self.preferred_communication,
            socioeconomic_status: self.socioeconomic_status,
            geographic_location: self.geographic_location,
        })
    }
}

impl Validate for CreatePatientRequest {
    const ERROR_CODE: &'static str = "INVALID_PATIENT_DATA";
    const RULES: &'static [FieldRule<Self>] = &[
        FieldRule {
            field: "user_id",
            value: |r| FieldValue::Int(r.user_id),
            rule: Rule::Required,
        },
        FieldRule {
            field: "full_name",
            value: |r| FieldValue::Text(r.full_name.clone()),
            rule: Rule::Required,
        },
        FieldRule {
            field: "age",
            value: |r| FieldValue::Int(i64::from(r.age)),
            rule: Rule::MinValue(MIN_AGE),
        },
        FieldRule {
            field: "date_of_birth",
            value: |r| FieldValue::Date(r.date_of_birth),
            rule: Rule::Required,
        },
        FieldRule {
            field: "date_of_birth",
            value: |r| FieldValue::Date(r.date_of_birth),
            rule: Rule::PastDate,
        },
        FieldRule {
            field: "sex",
            value: |r| FieldValue::Text(r.sex.clone()),
            rule: Rule::Required,
        },
        FieldRule {
            field: "sex",
            value: |r| FieldValue::Text(r.sex.clone()),
            rule: Rule::OneOf(SEXES),
        },
        FieldRule {
            field: "phone_number",
            value: |r| FieldValue::Text(r.phone_number.clone()),
            rule: Rule::Phone,
        },
        FieldRule {
            field: "email_address",
            value: |r| FieldValue::Text(r.email_address.clone()),
            rule: Rule::Required,
        },
        FieldRule {
            field: "email_address",
            value: |r| FieldValue::Text(r.email_address.clone()),
            rule: Rule::Email,
        },
        FieldRule {
            field: "preferred_communication",
            value: |r| FieldValue::Text(r.preferred_communication.clone()),
            rule: Rule::OneOf(COMMUNICATION_PREFERENCES),
        },
        FieldRule {
            field: "socioeconomic_status",
            value: |r| FieldValue::Text(r.socioeconomic_status.clone()),
            rule: Rule::OneOf(SOCIOECONOMIC_STATUSES),
        },
    ];

    fn cross_field(&self, today: NaiveDate) -> Result<(), ValidationError> {
        check_age_consistency(self.age, self.date_of_birth, today)
    }
}

/// Partial update. Zero-valued fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePatientRequest {
    pub full_name: String,
    pub age: i32,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: String,
    pub phone_number: String,
    pub email_address: String,
    pub preferred_communication: String,
    pub socioeconomic_status: String,
    pub geographic_location: String,
}

impl UpdatePatientRequest {
    pub fn merge_into(&self, patient: &mut Patient) {
        overwrite_text(&mut patient.full_name, &self.full_name);
        if self.age != 0 {
            patient.age = self.age;
        }
        if let Some(dob) = self.date_of_birth {
            patient.date_of_birth = dob;
        }
        overwrite_text(&mut patient.sex, &self.sex);
        overwrite_text(&mut patient.phone_number, &self.phone_number);
        overwrite_text(&mut patient.email_address, &self.email_address);
        overwrite_text(&mut patient.preferred_communication, &self.preferred_communication);
        overwrite_text(&mut patient.socioeconomic_status, &self.socioeconomic_status);
        overwrite_text(&mut patient.geographic_location, &self.geographic_location);
    }
}

impl Validate for UpdatePatientRequest {
    const ERROR_CODE: &'static str = "INVALID_PATIENT_DATA";
    const RULES: &'static [FieldRule<Self>] = &[
        FieldRule {
            field: "age",
            value: |r| FieldValue::Int(i64::from(r.age)),
            rule: Rule::MinValue(MIN_AGE),
        },
        FieldRule {
            field: "date_of_birth",
            value: |r| FieldValue::Date(r.date_of_birth),
            rule: Rule::PastDate,
        },
        FieldRule {
            field: "sex",
            value: |r| FieldValue::Text(r.sex.clone()),
            rule: Rule::OneOf(SEXES),
        },
        FieldRule {
            field: "phone_number",
            value: |r| FieldValue::Text(r.phone_number.clone()),
            rule: Rule::Phone,
        },
        FieldRule {
            field: "email_address",
            value: |r| FieldValue::Text(r.email_address.clone()),
            rule: Rule::Email,
        },
        FieldRule {
            field: "preferred_communication",
            value: |r| FieldValue::Text(r.preferred_communication.clone()),
            rule: Rule::OneOf(COMMUNICATION_PREFERENCES),
        },
        FieldRule {
            field: "socioeconomic_status",
            value: |r| FieldValue::Text(r.socioeconomic_status.clone()),
            rule: Rule::OneOf(SOCIOECONOMIC_STATUSES),
        },
    ];

    fn cross_field(&self, today: NaiveDate) -> Result<(), ValidationError> {
        check_age_consistency(self.age, self.date_of_birth, today)
    }
}

fn check_age_consistency(
    age: i32,
    date_of_birth: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    let Some(dob) = date_of_birth else {
        return Ok(());
    };
    if age != 0 && age_on(dob, today) != age {
        return Err(ValidationError::new(
            "INCONSISTENT_DATA",
            "Age and DateOfBirth are inconsistent",
        ));
    }
    Ok(())
}
