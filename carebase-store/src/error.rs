use carebase_core::RepositoryError;
use rusqlite::ffi;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Row not found")]
    NotFound,

    #[error("Connection lock poisoned")]
    Poisoned,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => RepositoryError::NotFound,
            StoreError::Sqlite(e) => from_sqlite(e),
            StoreError::Postgres(e) => from_postgres(e),
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

fn from_sqlite(err: rusqlite::Error) -> RepositoryError {
    match &err {
        rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound,
        rusqlite::Error::SqliteFailure(code, message) => match code.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                RepositoryError::Conflict(sqlite_conflict_columns(message.as_deref()))
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => RepositoryError::MissingOwner,
            _ => RepositoryError::Backend(err.to_string()),
        },
        _ => RepositoryError::Backend(err.to_string()),
    }
}

fn from_postgres(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(postgres_conflict_column(db.constraint()))
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::MissingOwner,
        _ => RepositoryError::Backend(err.to_string()),
    }
}

const TABLES: [&str; 3] = ["patient_medical_history", "patient_lifestyle", "patients"];

/// Column list from "UNIQUE constraint failed: patients.email_address".
fn sqlite_conflict_columns(message: Option<&str>) -> String {
    let Some((_, columns)) = message.and_then(|m| m.split_once(": ")) else {
        return "record".to_string();
    };
    columns
        .split(", ")
        .map(|c| c.rsplit('.').next().unwrap_or(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column from a default Postgres constraint name such as "patients_email_address_key".
fn postgres_conflict_column(constraint: Option<&str>) -> String {
    let Some(name) = constraint else {
        return "record".to_string();
    };
    let name = name
        .strip_suffix("_pkey")
        .or_else(|| name.strip_suffix("_key"))
        .unwrap_or(name);
    TABLES
        .iter()
        .find_map(|t| name.strip_prefix(t).and_then(|rest| rest.strip_prefix('_')))
        .unwrap_or(name)
        .to_string()
}
