//! carebase-core - patient record domain, validation and services
//!
//! Everything here is transport- and storage-agnostic: repositories and the
//! authorization gate are traits implemented by the store and server crates.

pub mod authz;
pub mod clock;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod validation;

pub use authz::{
    Authorizer, AuthzError, Caller, CallerProfile, ProfileDirectory, RoleAuthorizer, Unrestricted,
};
pub use clock::Clock;
pub use domain::{
    CreateLifestyleRequest, CreateMedicalHistoryRequest, CreatePatientRequest, LifestyleEntry,
    MedicalHistoryEntry, NewLifestyleEntry, NewMedicalHistoryEntry, NewPatient, Patient,
    UpdateLifestyleRequest, UpdateMedicalHistoryRequest, UpdatePatientRequest,
};
pub use error::{EntryKind, FieldViolation, Result, ServiceError, ValidationError};
pub use ports::{
    LifestyleRepository, MedicalHistoryRepository, PatientRepository, RepoResult, RepositoryError,
};
pub use service::{LifestyleService, MedicalHistoryService, PatientService};
pub use validation::Validator;
