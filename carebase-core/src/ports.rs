//! Storage ports implemented by `carebase-store`.

use crate::domain::{
    LifestyleEntry, MedicalHistoryEntry, NewLifestyleEntry, NewMedicalHistoryEntry, NewPatient,
    Patient,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("row not found")]
    NotFound,

    /// A unique constraint was violated on the named column.
    #[error("duplicate value: {0}")]
    Conflict(String),

    /// The referenced patient row does not exist.
    #[error("owning patient does not exist")]
    MissingOwner,

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn create(&self, patient: NewPatient) -> RepoResult<Patient>;

    async fn get(&self, patient_id: i64) -> RepoResult<Patient>;

    /// Persist every field of `patient` except `created_at`.
    async fn update(&self, patient: &Patient) -> RepoResult<()>;
}

#[async_trait]
pub trait MedicalHistoryRepository: Send + Sync {
    async fn create(&self, entry: NewMedicalHistoryEntry) -> RepoResult<MedicalHistoryEntry>;

    async fn get(&self, id: i64) -> RepoResult<MedicalHistoryEntry>;

    /// Entries for one patient, ordered by id.
    async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<MedicalHistoryEntry>>;

    async fn update(&self, entry: &MedicalHistoryEntry) -> RepoResult<()>;

    async fn delete(&self, id: i64) -> RepoResult<()>;
}

#[async_trait]
pub trait LifestyleRepository: Send + Sync {
    async fn create(&self, entry: NewLifestyleEntry) -> RepoResult<LifestyleEntry>;

    async fn get(&self, id: i64) -> RepoResult<LifestyleEntry>;

    async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<LifestyleEntry>>;

    async fn update(&self, entry: &LifestyleEntry) -> RepoResult<()>;

    async fn delete(&self, id: i64) -> RepoResult<()>;
}
