//! Resource services: validate, resolve the owner, authorize, then persist.
//!
//! Validation and authorization always complete before any mutating
//! repository call.

mod lifestyle;
mod medical_history;
mod patient;

pub use lifestyle::LifestyleService;
pub use medical_history::MedicalHistoryService;
pub use patient::PatientService;

use crate::authz::{Authorizer, Caller};
use crate::error::{Result, ServiceError};
use crate::ports::RepositoryError;
use tracing::error;

/// Translate a repository failure. `not_found` is what a missing row means
/// for this particular call.
fn translate(err: RepositoryError, not_found: ServiceError, patient_id: i64) -> ServiceError {
    match err {
        RepositoryError::NotFound => not_found,
        RepositoryError::Conflict(detail) => ServiceError::Conflict(detail),
        RepositoryError::MissingOwner => ServiceError::OwnerNotFound { patient_id },
        RepositoryError::Backend(detail) => {
            error!(error = %detail, "Repository call failed");
            ServiceError::Internal(detail)
        }
    }
}

async fn authorize(
    authorizer: &dyn Authorizer,
    caller: &Caller,
    owner_patient_id: i64,
) -> Result<()> {
    match authorizer.allow(caller, owner_patient_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ServiceError::Forbidden),
        Err(e) => {
            error!(error = %e, user_id = %caller.user_id, "Authorization check failed");
            Err(ServiceError::AuthorizationFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory repositories and authorizers for service tests.

    use crate::authz::{Authorizer, AuthzError, Caller};
    use crate::domain::{
        LifestyleEntry, MedicalHistoryEntry, NewLifestyleEntry, NewMedicalHistoryEntry,
        NewPatient, Patient,
    };
    use crate::ports::{
        LifestyleRepository, MedicalHistoryRepository, PatientRepository, RepoResult,
        RepositoryError,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tables {
        patients: BTreeMap<i64, Patient>,
        history: BTreeMap<i64, MedicalHistoryEntry>,
        lifestyle: BTreeMap<i64, LifestyleEntry>,
        next_id: i64,
        mutations: Vec<String>,
    }

    /// Implements all three repositories over shared maps and records every
    /// mutating call by name.
    #[derive(Default)]
    pub struct MemoryStore {
        tables: Mutex<Tables>,
        fail_with_backend_error: bool,
    }

    impl MemoryStore {
        /// Every call fails with a backend error.
        pub fn failing() -> Self {
            Self {
                fail_with_backend_error: true,
                ..Self::default()
            }
        }

        pub fn mutations(&self) -> Vec<String> {
            self.tables.lock().unwrap().mutations.clone()
        }

        pub fn seed_patient(&self, patient_id: i64, email: &str) -> Patient {
            let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let patient = Patient {
                patient_id,
                user_id: patient_id * 10,
                full_name: format!("Patient {}", patient_id),
                age: 30,
                date_of_birth: chrono::NaiveDate::from_ymd_opt(1994, 1, 1).unwrap(),
                sex: "Other".to_string(),
                phone_number: String::new(),
                email_address: email.to_string(),
                preferred_communication: String::new(),
                socioeconomic_status: String::new(),
                geographic_location: String::new(),
                created_at: at,
                updated_at: at,
            };
            let mut t = self.tables.lock().unwrap();
            t.patients.insert(patient_id, patient.clone());
            t.next_id = t.next_id.max(patient_id);
            patient
        }

        pub fn seed_lifestyle(&self, id: i64, patient_id: i64, factor: &str) {
            let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut t = self.tables.lock().unwrap();
            t.lifestyle.insert(
                id,
                LifestyleEntry {
                    patient_lifestyle_id: id,
                    patient_id,
                    lifestyle_factor: factor.to_string(),
                    value: String::new(),
                    start_date: None,
                    end_date: None,
                    created_at: at,
                    updated_at: at,
                },
            );
            t.next_id = t.next_id.max(id);
        }

        pub fn seed_history(&self, id: i64, patient_id: i64, condition: &str) {
            let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let mut t = self.tables.lock().unwrap();
            t.history.insert(
                id,
                MedicalHistoryEntry {
                    patient_medical_history_id: id,
                    patient_id,
                    condition: condition.to_string(),
                    diagnosis_date: None,
                    status: "Active".to_string(),
                    details: String::new(),
                    created_at: at,
                    updated_at: at,
                },
            );
            t.next_id = t.next_id.max(id);
        }

        fn check(&self) -> RepoResult<()> {
            if self.fail_with_backend_error {
                return Err(RepositoryError::Backend("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PatientRepository for MemoryStore {
        async fn create(&self, p: NewPatient) -> RepoResult<Patient> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("patient.create".to_string());
            if t.patients.values().any(|e| e.email_address == p.email_address) {
                return Err(RepositoryError::Conflict("email_address".to_string()));
            }
            t.next_id += 1;
            let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            let patient = Patient {
                patient_id: t.next_id,
                user_id: p.user_id,
                full_name: p.full_name,
                age: p.age,
                date_of_birth: p.date_of_birth,
                sex: p.sex,
                phone_number: p.phone_number,
                email_address: p.email_address,
                preferred_communication: p.preferred_communication,
                socioeconomic_status: p.socioeconomic_status,
                geographic_location: p.geographic_location,
                created_at: at,
                updated_at: at,
            };
            t.patients.insert(patient.patient_id, patient.clone());
            Ok(patient)
        }

        async fn get(&self, patient_id: i64) -> RepoResult<Patient> {
            self.check()?;
            let t = self.tables.lock().unwrap();
            t.patients.get(&patient_id).cloned().ok_or(RepositoryError::NotFound)
        }

        async fn update(&self, patient: &Patient) -> RepoResult<()> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("patient.update".to_string());
            if t.patients.values().any(|e| {
                e.patient_id != patient.patient_id && e.email_address == patient.email_address
            }) {
                return Err(RepositoryError::Conflict("email_address".to_string()));
            }
            match t.patients.get_mut(&patient.patient_id) {
                Some(slot) => {
                    *slot = patient.clone();
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }
    }

    #[async_trait]
    impl MedicalHistoryRepository for MemoryStore {
        async fn create(&self, e: NewMedicalHistoryEntry) -> RepoResult<MedicalHistoryEntry> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("history.create".to_string());
            if !t.patients.contains_key(&e.patient_id) {
                return Err(RepositoryError::MissingOwner);
            }
            t.next_id += 1;
            let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            let entry = MedicalHistoryEntry {
                patient_medical_history_id: t.next_id,
                patient_id: e.patient_id,
                condition: e.condition,
                diagnosis_date: e.diagnosis_date,
                status: e.status,
                details: e.details,
                created_at: at,
                updated_at: at,
            };
            t.history.insert(entry.patient_medical_history_id, entry.clone());
            Ok(entry)
        }

        async fn get(&self, id: i64) -> RepoResult<MedicalHistoryEntry> {
            self.check()?;
            let t = self.tables.lock().unwrap();
            t.history.get(&id).cloned().ok_or(RepositoryError::NotFound)
        }

        async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<MedicalHistoryEntry>> {
            self.check()?;
            let t = self.tables.lock().unwrap();
            Ok(t.history.values().filter(|e| e.patient_id == patient_id).cloned().collect())
        }

        async fn update(&self, entry: &MedicalHistoryEntry) -> RepoResult<()> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("history.update".to_string());
            match t.history.get_mut(&entry.patient_medical_history_id) {
                Some(slot) => {
                    *slot = entry.clone();
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }

        async fn delete(&self, id: i64) -> RepoResult<()> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("history.delete".to_string());
            t.history.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound)
        }
    }

    #[async_trait]
    impl LifestyleRepository for MemoryStore {
        async fn create(&self, e: NewLifestyleEntry) -> RepoResult<LifestyleEntry> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("lifestyle.create".to_string());
            if !t.patients.contains_key(&e.patient_id) {
                return Err(RepositoryError::MissingOwner);
            }
            t.next_id += 1;
            let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
            let entry = LifestyleEntry {
                patient_lifestyle_id: t.next_id,
                patient_id: e.patient_id,
                lifestyle_factor: e.lifestyle_factor,
                value: e.value,
                start_date: e.start_date,
                end_date: e.end_date,
                created_at: at,
                updated_at: at,
            };
            t.lifestyle.insert(entry.patient_lifestyle_id, entry.clone());
            Ok(entry)
        }

        async fn get(&self, id: i64) -> RepoResult<LifestyleEntry> {
            self.check()?;
            let t = self.tables.lock().unwrap();
            t.lifestyle.get(&id).cloned().ok_or(RepositoryError::NotFound)
        }

        async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<LifestyleEntry>> {
            self.check()?;
            let t = self.tables.lock().unwrap();
            Ok(t.lifestyle.values().filter(|e| e.patient_id == patient_id).cloned().collect())
        }

        async fn update(&self, entry: &LifestyleEntry) -> RepoResult<()> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("lifestyle.update".to_string());
            match t.lifestyle.get_mut(&entry.patient_lifestyle_id) {
                Some(slot) => {
                    *slot = entry.clone();
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }

        async fn delete(&self, id: i64) -> RepoResult<()> {
            self.check()?;
            let mut t = self.tables.lock().unwrap();
            t.mutations.push("lifestyle.delete".to_string());
            t.lifestyle.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound)
        }
    }

    /// Allows only self-access; everyone else is denied.
    pub struct SelfOnly;

    #[async_trait]
    impl Authorizer for SelfOnly {
        async fn allow(&self, caller: &Caller, owner_patient_id: i64) -> Result<bool, AuthzError> {
            Ok(caller.user_id == owner_patient_id.to_string())
        }
    }

    /// Profile directory is down.
    pub struct Unreachable;

    #[async_trait]
    impl Authorizer for Unreachable {
        async fn allow(&self, caller: &Caller, _owner_patient_id: i64) -> Result<bool, AuthzError> {
            Err(AuthzError::ProfileLookup {
                user_id: caller.user_id.clone(),
                reason: "identity provider timed out".to_string(),
            })
        }
    }
}
