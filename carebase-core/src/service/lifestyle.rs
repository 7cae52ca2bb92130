use super::{authorize, translate};
use crate::authz::{Authorizer, Caller};
use crate::domain::{CreateLifestyleRequest, LifestyleEntry, UpdateLifestyleRequest};
use crate::error::{EntryKind, Result, ServiceError};
use crate::ports::{LifestyleRepository, PatientRepository};
use crate::validation::Validator;
use std::sync::Arc;
use tracing::info;

pub struct LifestyleService {
    entries: Arc<dyn LifestyleRepository>,
    patients: Arc<dyn PatientRepository>,
    validator: Validator,
    authorizer: Arc<dyn Authorizer>,
}

fn not_found(id: i64) -> ServiceError {
    ServiceError::EntryNotFound {
        kind: EntryKind::Lifestyle,
        id,
    }
}

impl LifestyleService {
    pub fn new(
        entries: Arc<dyn LifestyleRepository>,
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
        request: CreateLifestyleRequest,
    ) -> Result<LifestyleEntry> {
        info!(patient_id, "Creating lifestyle entry");
        self.validator.validate(&request)?;
        self.require_patient(patient_id).await?;

        let entry = self
            .entries
            .create(request.into_new(patient_id))
            .await
            .map_err(|e| translate(e, ServiceError::OwnerNotFound { patient_id }, patient_id))?;

        info!(patient_id, id = entry.patient_lifestyle_id, "Lifestyle entry created");
        Ok(entry)
    }

    pub async fn list(&self, patient_id: i64) -> Result<Vec<LifestyleEntry>> {
        self.require_patient(patient_id).await?;
        let entries = self
            .entries
            .list_by_patient(patient_id)
            .await
            .map_err(|e| translate(e, ServiceError::OwnerNotFound { patient_id }, patient_id))?;
        info!(patient_id, count = entries.len(), "Listed lifestyle entries");
        Ok(entries)
    }

    pub async fn get(&self, id: i64) -> Result<LifestyleEntry> {
        self.entries
            .get(id)
            .await
            .map_err(|e| translate(e, not_found(id), 0))
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        request: UpdateLifestyleRequest,
    ) -> Result<LifestyleEntry> {
        info!(id, user_id = %caller.user_id, "Updating lifestyle entry");
        self.validator.validate(&request)?;

        let mut entry = self.get(id).await?;
        authorize(self.authorizer.as_ref(), caller, entry.patient_id).await?;

        request.merge_into(&mut entry);
        entry.updated_at = self.validator.clock().now();

        self.entries
            .update(&entry)
            .await
            .map_err(|e| translate(e, not_found(id), entry.patient_id))?;

        info!(id, "Lifestyle entry updated");
        Ok(entry)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<()> {
        info!(id, user_id = %caller.user_id, "Deleting lifestyle entry");
        let entry = self.get(id).await?;
        authorize(self.authorizer.as_ref(), caller, entry.patient_id).await?;

        self.entries
            .delete(id)
            .await
            .map_err(|e| translate(e, not_found(id), entry.patient_id))?;

        info!(id, "Lifestyle entry deleted");
        Ok(())
    }
}
