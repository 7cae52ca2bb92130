//! Patient record entities and their request payloads.
//!
//! Optional fields use zero values (empty string, 0, `None`) for "not
//! provided", both in requests and in stored entities.

pub mod lifestyle;
pub mod medical_history;
pub mod patient;

pub use lifestyle::{
    CreateLifestyleRequest, LifestyleEntry, NewLifestyleEntry, UpdateLifestyleRequest,
};
pub use medical_history::{
    CreateMedicalHistoryRequest, MEDICAL_HISTORY_STATUSES, MedicalHistoryEntry,
    NewMedicalHistoryEntry, UpdateMedicalHistoryRequest,
};
pub use patient::{
    COMMUNICATION_PREFERENCES, CreatePatientRequest, NewPatient, Patient, SEXES,
    SOCIOECONOMIC_STATUSES, UpdatePatientRequest,
};

/// Overwrite `target` only when `value` is non-empty.
pub(crate) fn overwrite_text(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

pub(crate) fn overwrite<T: Copy>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}
