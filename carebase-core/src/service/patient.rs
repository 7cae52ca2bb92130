use super::{authorize, translate};
use crate::authz::{Authorizer, Caller};
use crate::domain::{CreatePatientRequest, Patient, UpdatePatientRequest};
use crate::error::{Result, ServiceError, ValidationError};
use crate::ports::PatientRepository;
use crate::validation::Validator;
use std::sync::Arc;
use tracing::info;

pub struct PatientService {
    patients: Arc<dyn PatientRepository>,
    validator: Validator,
    authorizer: Arc<dyn Authorizer>,
}

impl PatientService {
    pub fn new(
        patients: Arc<dyn PatientRepository>,
        validator: Validator,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            patients,
            validator,
            authorizer,
        }
    }

    pub async fn create(&self, request: CreatePatientRequest) -> Result<Patient> {
        info!(user_id = request.user_id, "Creating patient");
        self.validator.validate(&request)?;

        let new_patient = request.into_new().ok_or_else(|| {
            ValidationError::new("INVALID_PATIENT_DATA", "date_of_birth is required")
        })?;
        let patient = self
            .patients
            .create(new_patient)
            .await
            .map_err(|e| translate(e, ServiceError::Internal("patient insert lost".into()), 0))?;

        info!(patient_id = patient.patient_id, "Patient created");
        Ok(patient)
    }

    pub async fn get(&self, patient_id: i64) -> Result<Patient> {
        self.patients
            .get(patient_id)
            .await
            .map_err(|e| translate(e, ServiceError::OwnerNotFound { patient_id }, patient_id))
    }

    /// Partial update. A patient record is owned by itself, so the caller
    /// must be that patient or hold an elevated profile.
    pub async fn update(
        &self,
        caller: &Caller,
        patient_id: i64,
        request: UpdatePatientRequest,
    ) -> Result<Patient> {
        info!(patient_id, user_id = %caller.user_id, "Updating patient");
        self.validator.validate(&request)?;

        let mut patient = self.get(patient_id).await?;
        authorize(self.authorizer.as_ref(), caller, patient.patient_id).await?;

        request.merge_into(&mut patient);
        patient.updated_at = self.validator.clock().now();

        self.patients
            .update(&patient)
            .await
            .map_err(|e| translate(e, ServiceError::OwnerNotFound { patient_id }, patient_id))?;

        info!(patient_id, "Patient updated");
        Ok(patient)
    }
}
