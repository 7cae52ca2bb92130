use super::{overwrite, overwrite_text};
use crate::validation::{FieldRule, FieldValue, Rule, Validate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifestyleEntry {
    pub patient_lifestyle_id: i64,
    pub patient_id: i64,
    pub lifestyle_factor: String,
    pub value: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLifestyleEntry {
    pub patient_id: i64,
    pub lifestyle_factor: String,
    pub value: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateLifestyleRequest {
    pub lifestyle_factor: String,
    pub value: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl CreateLifestyleRequest {
    pub fn into_new(self, patient_id: i64) -> NewLifestyleEntry {
        NewLifestyleEntry {
            patient_id,
            lifestyle_factor: self.lifestyle_factor,
            value: self.value,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

impl Validate for CreateLifestyleRequest {
    const ERROR_CODE: &'static str = "INVALID_LIFESTYLE_DATA";
    const RULES: &'static [FieldRule<Self>] = &[FieldRule {
        field: "lifestyle_factor",
        value: |r| FieldValue::Text(r.lifestyle_factor.clone()),
        rule: Rule::Required,
    }];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateLifestyleRequest {
    pub lifestyle_factor: String,
    pub value: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl UpdateLifestyleRequest {
    pub fn merge_into(&self, entry: &mut LifestyleEntry) {
        overwrite_text(&mut entry.lifestyle_factor, &self.lifestyle_factor);
        overwrite_text(&mut entry.value, &self.value);
        overwrite(&mut entry.start_date, self.start_date);
        overwrite(&mut entry.end_date, self.end_date);
    }
}

impl Validate for UpdateLifestyleRequest {
    const ERROR_CODE: &'static str = "INVALID_LIFESTYLE_DATA";
    const RULES: &'static [FieldRule<Self>] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validator;

    #[test]
    fn test_factor_required() {
        let err = Validator::new()
            .validate(&CreateLifestyleRequest::default())
            .unwrap_err();
        assert_eq!(err.code, "INVALID_LIFESTYLE_DATA");
        assert_eq!(err.details[0].message, "lifestyle_factor is required");
    }

    #[test]
    fn test_into_new_carries_owner() {
        let req = CreateLifestyleRequest {
            lifestyle_factor: "Smoking".to_string(),
            value: "none".to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            end_date: None,
        };
        let new = req.into_new(9);
        assert_eq!(new.patient_id, 9);
        assert_eq!(new.lifestyle_factor, "Smoking");
        assert_eq!(new.end_date, None);
    }
}
