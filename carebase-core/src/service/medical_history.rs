use super::{authorize, translate};
use crate::authz::{Authorizer, Caller};
use crate::domain::{CreateMedicalHistoryRequest, MedicalHistoryEntry, UpdateMedicalHistoryRequest};
use crate::error::{EntryKind, Result, ServiceError};
use crate::ports::{MedicalHistoryRepository, PatientRepository};
use crate::validation::Validator;
use std::sync::Arc;
use tracing::info;

pub struct MedicalHistoryService {
    entries: Arc<dyn MedicalHistoryRepository>,
    patients: Arc<dyn PatientRepository>,
    validator: Validator,
    authorizer: Arc<dyn Authorizer>,
}

fn not_found(id: i64) -> ServiceError {
    ServiceError::EntryNotFound {
        kind: EntryKind::MedicalHistory,
        id,
    }
}

impl MedicalHistoryService {
    pub fn new(
        entries: Arc<dyn MedicalHistoryRepository>,
        patients: Arc<dyn PatientRepository>,
        validator: Validator,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            entries,
            patients,
            validator,
            authorizer,
        }
    }

    async fn require_patient(&self, patient_id: i64) -> Result<()> {
        self.patients
            .get(patient_id)
            .await
            .map(|_| ())
            .map_err(|e| translate(e, ServiceError::OwnerNotFound { patient_id }, patient_id))
    }

    pub async fn create(
        &self,
        patient_id: i64,
        request: CreateMedicalHistoryRequest,
    ) -> Result<MedicalHistoryEntry> {
        info!(patient_id, "Creating medical history entry");
        self.validator.validate(&request)?;
        self.require_patient(patient_id).await?;

        let entry = self
            .entries
            .create(request.into_new(patient_id))
            .await
            .map_err(|e| translate(e, ServiceError::OwnerNotFound { patient_id }, patient_id))?;

        info!(patient_id, id = entry.patient_medical_history_id, "Medical history entry created");
        Ok(entry)
    }

    /// Entries for an existing patient. No entries is an empty list.
    pub async fn list(&self, patient_id: i64) -> Result<Vec<MedicalHistoryEntry>> {
        self.require_patient(patient_id).await?;
        let entries = self
            .entries
            .list_by_patient(patient_id)
            .await
            .map_err(|e| translate(e, ServiceError::OwnerNotFound { patient_id }, patient_id))?;
        info!(patient_id, count = entries.len(), "Listed medical history entries");
        Ok(entries)
    }

    pub async fn get(&self, id: i64) -> Result<MedicalHistoryEntry> {
        self.entries
            .get(id)
            .await
            .map_err(|e| translate(e, not_found(id), 0))
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        request: UpdateMedicalHistoryRequest,
    ) -> Result<MedicalHistoryEntry> {
        info!(id, user_id = %caller.user_id, "Updating medical history entry");
        self.validator.validate(&request)?;

        let mut entry = self.get(id).await?;
        authorize(self.authorizer.as_ref(), caller, entry.patient_id).await?;

        request.merge_into(&mut entry);
        entry.updated_at = self.validator.clock().now();

        self.entries
            .update(&entry)
            .await
            .map_err(|e| translate(e, not_found(id), entry.patient_id))?;

        info!(id, "Medical history entry updated");
        Ok(entry)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<()> {
        info!(id, user_id = %caller.user_id, "Deleting medical history entry");
        let entry = self.get(id).await?;
        authorize(self.authorizer.as_ref(), caller, entry.patient_id).await?;

        self.entries
            .delete(id)
            .await
            .map_err(|e| translate(e, not_found(id), entry.patient_id))?;

        info!(id, "Medical history entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::service::testing::{MemoryStore, SelfOnly, Unreachable};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn service(store: &Arc<MemoryStore>, authorizer: Arc<dyn Authorizer>) -> MedicalHistoryService {
        let clock = Clock::Fixed(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        MedicalHistoryService::new(
            store.clone(),
            store.clone(),
            Validator::with_clock(clock),
            authorizer,
        )
    }

    fn asthma() -> CreateMedicalHistoryRequest {
        CreateMedicalHistoryRequest {
            condition: "Asthma".to_string(),
            diagnosis_date: NaiveDate::from_ymd_opt(2015, 4, 2),
            status: "Active".to_string(),
            details: "Seasonal".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = Arc::new(MemoryStore::default());
        store.seed_patient(1, "p1@example.org");
        let svc = service(&store, Arc::new(SelfOnly));

        let created = svc.create(1, asthma()).await.unwrap();
        assert_eq!(created.patient_id, 1);
        assert_eq!(created.condition, "Asthma");

        let listed = svc.list(1).await.unwrap();
        assert_eq!(listed, vec![created.clone()]);
        assert_eq!(svc.get(created.patient_medical_history_id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_list_empty_for_existing_patient() {
        let store = Arc::new(MemoryStore::default());
        store.seed_patient(1, "p1@example.org");
        let svc = service(&store, Arc::new(SelfOnly));
        assert!(svc.list(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_for_missing_patient() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store, Arc::new(SelfOnly));
        let err = svc.list(8).await.unwrap_err();
        assert!(matches!(err, ServiceError::OwnerNotFound { patient_id: 8 }));
    }

    #[tokio::test]
    async fn test_create_for_missing_patient_never_writes() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store, Arc::new(SelfOnly));
        let err = svc.create(8, asthma()).await.unwrap_err();
        assert!(matches!(err, ServiceError::OwnerNotFound { patient_id: 8 }));
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected_before_lookup() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store, Arc::new(SelfOnly));
        let req = CreateMedicalHistoryRequest {
            status: "Unknown".to_string(),
            ..asthma()
        };
        match svc.create(1, req).await.unwrap_err() {
            ServiceError::InvalidInput(v) => {
                assert_eq!(v.code, "INVALID_MEDICAL_HISTORY_DATA");
                assert!(v.details[0].message.contains("Active, Inactive, Resolved"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_update_by_owner() {
        let store = Arc::new(MemoryStore::default());
        store.seed_patient(2, "p2@example.org");
        store.seed_history(10, 2, "Asthma");
        let svc = service(&store, Arc::new(SelfOnly));

        let req = UpdateMedicalHistoryRequest {
            status: "Resolved".to_string(),
            ..Default::default()
        };
        let updated = svc.update(&Caller::new("2"), 10, req).await.unwrap();
        assert_eq!(updated.status, "Resolved");
        assert_eq!(updated.condition, "Asthma");
        assert_eq!(store.mutations(), vec!["history.update"]);
    }

    #[tokio::test]
    async fn test_invalid_update_never_writes() {
        let store = Arc::new(MemoryStore::default());
        store.seed_patient(2, "p2@example.org");
        store.seed_history(10, 2, "Asthma");
        let svc = service(&store, Arc::new(SelfOnly));

        let req = UpdateMedicalHistoryRequest {
            status: "Unknown".to_string(),
            diagnosis_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            ..Default::default()
        };
        match svc.update(&Caller::new("2"), 10, req).await.unwrap_err() {
            ServiceError::InvalidInput(v) => {
                assert_eq!(v.code, "INVALID_MEDICAL_HISTORY_DATA");
                assert_eq!(v.details.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.mutations().is_empty());
        assert_eq!(svc.get(10).await.unwrap().condition, "Asthma");
    }

    #[tokio::test]
    async fn test_update_unknown_entry() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store, Arc::new(SelfOnly));
        let err = svc
            .update(&Caller::new("2"), 77, UpdateMedicalHistoryRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::EntryNotFound {
                kind: EntryKind::MedicalHistory,
                id: 77
            }
        ));
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_stranger_is_forbidden() {
        let store = Arc::new(MemoryStore::default());
        store.seed_patient(2, "p2@example.org");
        store.seed_history(10, 2, "Asthma");
        let svc = service(&store, Arc::new(SelfOnly));

        let err = svc.delete(&Caller::new("3"), 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));
        assert!(store.mutations().is_empty());
        assert!(svc.get(10).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_by_owner_then_gone() {
        let store = Arc::new(MemoryStore::default());
        store.seed_patient(2, "p2@example.org");
        store.seed_history(10, 2, "Asthma");
        let svc = service(&store, Arc::new(SelfOnly));

        svc.delete(&Caller::new("2"), 10).await.unwrap();
        let err = svc.get(10).await.unwrap_err();
        assert!(matches!(err, ServiceError::EntryNotFound { id: 10, .. }));
    }

    #[tokio::test]
    async fn test_delete_when_profile_lookup_fails() {
        let store = Arc::new(MemoryStore::default());
        store.seed_patient(2, "p2@example.org");
        store.seed_history(10, 2, "Asthma");
        let svc = service(&store, Arc::new(Unreachable));

        let err = svc.delete(&Caller::new("3"), 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::AuthorizationFailed(_)));
        assert!(store.mutations().is_empty());
    }
}
