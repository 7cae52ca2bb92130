//! Postgres-backed repositories over a `sqlx` connection pool.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use carebase_core::{
    LifestyleEntry, LifestyleRepository, MedicalHistoryEntry, MedicalHistoryRepository,
    NewLifestyleEntry, NewMedicalHistoryEntry, NewPatient, Patient, PatientRepository, RepoResult,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS patients (
        patient_id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        full_name TEXT NOT NULL,
        age INTEGER,
        date_of_birth DATE NOT NULL,
        sex TEXT NOT NULL,
        phone_number TEXT,
        email_address TEXT UNIQUE,
        preferred_communication TEXT,
        socioeconomic_status TEXT,
        geographic_location TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS patient_medical_history (
        patient_medical_history_id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(patient_id),
        condition TEXT NOT NULL,
        diagnosis_date DATE,
        status TEXT NOT NULL,
        details TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS patient_lifestyle (
        patient_lifestyle_id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(patient_id),
        lifestyle_factor TEXT NOT NULL,
        value TEXT,
        start_date DATE,
        end_date DATE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_history_patient ON patient_medical_history(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_lifestyle_patient ON patient_lifestyle(patient_id)",
];

const PATIENT_COLUMNS: &str = "patient_id, user_id, full_name, age, date_of_birth, sex, \
     phone_number, email_address, preferred_communication, socioeconomic_status, \
     geographic_location, created_at, updated_at";

const HISTORY_COLUMNS: &str = "patient_medical_history_id, patient_id, condition, \
     diagnosis_date, status, details, created_at, updated_at";

const LIFESTYLE_COLUMNS: &str = "patient_lifestyle_id, patient_id, lifestyle_factor, value, \
     start_date, end_date, created_at, updated_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, then create missing tables.
    pub async fn connect(options: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        info!(max_connections, "Connected to Postgres");
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn insert_patient(&self, p: &NewPatient) -> Result<Patient> {
        let row = sqlx::query_as::<_, PatientRow>(&format!(
            "INSERT INTO patients (user_id, full_name, age, date_of_birth, sex, phone_number,
                email_address, preferred_communication, socioeconomic_status, geographic_location)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(p.user_id)
        .bind(&p.full_name)
        .bind(nonzero(p.age))
        .bind(p.date_of_birth)
        .bind(&p.sex)
        .bind(nullable(&p.phone_number))
        .bind(nullable(&p.email_address))
        .bind(nullable(&p.preferred_communication))
        .bind(nullable(&p.socioeconomic_status))
        .bind(nullable(&p.geographic_location))
        .fetch_one(&self.pool)
        .await?;
        debug!(patient_id = row.patient_id, "Inserted patient row");
        Ok(row.into())
    }

    async fn find_patient(&self, patient_id: i64) -> Result<Patient> {
        sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = $1"
        ))
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Patient::from)
        .ok_or(StoreError::NotFound)
    }

    async fn save_patient(&self, p: &Patient) -> Result<()> {
        let result = sqlx::query(
            "UPDATE patients SET user_id = $2, full_name = $3, age = $4, date_of_birth = $5,
                sex = $6, phone_number = $7, email_address = $8, preferred_communication = $9,
                socioeconomic_status = $10, geographic_location = $11, updated_at = $12
             WHERE patient_id = $1",
        )
        .bind(p.patient_id)
        .bind(p.user_id)
        .bind(&p.full_name)
        .bind(nonzero(p.age))
        .bind(p.date_of_birth)
        .bind(&p.sex)
        .bind(nullable(&p.phone_number))
        .bind(nullable(&p.email_address))
        .bind(nullable(&p.preferred_communication))
        .bind(nullable(&p.socioeconomic_status))
        .bind(nullable(&p.geographic_location))
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        affected(result.rows_affected())
    }

    async fn insert_history(&self, e: &NewMedicalHistoryEntry) -> Result<MedicalHistoryEntry> {
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "INSERT INTO patient_medical_history
                (patient_id, condition, diagnosis_date, status, details)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {HISTORY_COLUMNS}"
        ))
        .bind(e.patient_id)
        .bind(&e.condition)
        .bind(e.diagnosis_date)
        .bind(&e.status)
        .bind(nullable(&e.details))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_history(&self, id: i64) -> Result<MedicalHistoryEntry> {
        sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM patient_medical_history
             WHERE patient_medical_history_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(MedicalHistoryEntry::from)
        .ok_or(StoreError::NotFound)
    }

    async fn history_for_patient(&self, patient_id: i64) -> Result<Vec<MedicalHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM patient_medical_history
             WHERE patient_id = $1 ORDER BY patient_medical_history_id"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MedicalHistoryEntry::from).collect())
    }

    async fn save_history(&self, e: &MedicalHistoryEntry) -> Result<()> {
        let result = sqlx::query(
            "UPDATE patient_medical_history SET condition = $2, diagnosis_date = $3,
                status = $4, details = $5, updated_at = $6
             WHERE patient_medical_history_id = $1",
        )
        .bind(e.patient_medical_history_id)
        .bind(&e.condition)
        .bind(e.diagnosis_date)
        .bind(&e.status)
        .bind(nullable(&e.details))
        .bind(e.updated_at)
        .execute(&self.pool)
        .await?;
        affected(result.rows_affected())
    }

    async fn remove_history(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM patient_medical_history WHERE patient_medical_history_id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        affected(result.rows_affected())
    }

    async fn insert_lifestyle(&self, e: &NewLifestyleEntry) -> Result<LifestyleEntry> {
        let row = sqlx::query_as::<_, LifestyleRow>(&format!(
            "INSERT INTO patient_lifestyle
                (patient_id, lifestyle_factor, value, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {LIFESTYLE_COLUMNS}"
        ))
        .bind(e.patient_id)
        .bind(&e.lifestyle_factor)
        .bind(nullable(&e.value))
        .bind(e.start_date)
        .bind(e.end_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_lifestyle(&self, id: i64) -> Result<LifestyleEntry> {
        sqlx::query_as::<_, LifestyleRow>(&format!(
            "SELECT {LIFESTYLE_COLUMNS} FROM patient_lifestyle WHERE patient_lifestyle_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(LifestyleEntry::from)
        .ok_or(StoreError::NotFound)
    }

    async fn lifestyle_for_patient(&self, patient_id: i64) -> Result<Vec<LifestyleEntry>> {
        let rows = sqlx::query_as::<_, LifestyleRow>(&format!(
            "SELECT {LIFESTYLE_COLUMNS} FROM patient_lifestyle
             WHERE patient_id = $1 ORDER BY patient_lifestyle_id"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LifestyleEntry::from).collect())
    }

    async fn save_lifestyle(&self, e: &LifestyleEntry) -> Result<()> {
        let result = sqlx::query(
            "UPDATE patient_lifestyle SET lifestyle_factor = $2, value = $3, start_date = $4,
                end_date = $5, updated_at = $6
             WHERE patient_lifestyle_id = $1",
        )
        .bind(e.patient_lifestyle_id)
        .bind(&e.lifestyle_factor)
        .bind(nullable(&e.value))
        .bind(e.start_date)
        .bind(e.end_date)
        .bind(e.updated_at)
        .execute(&self.pool)
        .await?;
        affected(result.rows_affected())
    }

    async fn remove_lifestyle(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM patient_lifestyle WHERE patient_lifestyle_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        affected(result.rows_affected())
    }
}

fn nullable(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn nonzero(n: i32) -> Option<i32> {
    (n != 0).then_some(n)
}

fn affected(rows: u64) -> Result<()> {
    if rows == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

#[derive(FromRow)]
struct PatientRow {
    patient_id: i64,
    user_id: i64,
    full_name: String,
    age: Option<i32>,
    date_of_birth: NaiveDate,
    sex: String,
    phone_number: Option<String>,
    email_address: Option<String>,
    preferred_communication: Option<String>,
    socioeconomic_status: Option<String>,
    geographic_location: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(r: PatientRow) -> Self {
        Patient {
            patient_id: r.patient_id,
            user_id: r.user_id,
            full_name: r.full_name,
            age: r.age.unwrap_or_default(),
            date_of_birth: r.date_of_birth,
            sex: r.sex,
            phone_number: r.phone_number.unwrap_or_default(),
            email_address: r.email_address.unwrap_or_default(),
            preferred_communication: r.preferred_communication.unwrap_or_default(),
            socioeconomic_status: r.socioeconomic_status.unwrap_or_default(),
            geographic_location: r.geographic_location.unwrap_or_default(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct HistoryRow {
    patient_medical_history_id: i64,
    patient_id: i64,
    condition: String,
    diagnosis_date: Option<NaiveDate>,
    status: String,
    details: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<HistoryRow> for MedicalHistoryEntry {
    fn from(r: HistoryRow) -> Self {
        MedicalHistoryEntry {
            patient_medical_history_id: r.patient_medical_history_id,
            patient_id: r.patient_id,
            condition: r.condition,
            diagnosis_date: r.diagnosis_date,
            status: r.status,
            details: r.details.unwrap_or_default(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct LifestyleRow {
    patient_lifestyle_id: i64,
    patient_id: i64,
    lifestyle_factor: String,
    value: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LifestyleRow> for LifestyleEntry {
    fn from(r: LifestyleRow) -> Self {
        LifestyleEntry {
            patient_lifestyle_id: r.patient_lifestyle_id,
            patient_id: r.patient_id,
            lifestyle_factor: r.lifestyle_factor,
            value: r.value.unwrap_or_default(),
            start_date: r.start_date,
            end_date: r.end_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl PatientRepository for PgStore {
    async fn create(&self, patient: NewPatient) -> RepoResult<Patient> {
        Ok(self.insert_patient(&patient).await?)
    }

    async fn get(&self, patient_id: i64) -> RepoResult<Patient> {
        Ok(self.find_patient(patient_id).await?)
    }

    async fn update(&self, patient: &Patient) -> RepoResult<()> {
        Ok(self.save_patient(patient).await?)
    }
}

#[async_trait]
impl MedicalHistoryRepository for PgStore {
    async fn create(&self, entry: NewMedicalHistoryEntry) -> RepoResult<MedicalHistoryEntry> {
        Ok(self.insert_history(&entry).await?)
    }

    async fn get(&self, id: i64) -> RepoResult<MedicalHistoryEntry> {
        Ok(self.find_history(id).await?)
    }

    async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<MedicalHistoryEntry>> {
        Ok(self.history_for_patient(patient_id).await?)
    }

    async fn update(&self, entry: &MedicalHistoryEntry) -> RepoResult<()> {
        Ok(self.save_history(entry).await?)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        Ok(self.remove_history(id).await?)
    }
}

#[async_trait]
impl LifestyleRepository for PgStore {
    async fn create(&self, entry: NewLifestyleEntry) -> RepoResult<LifestyleEntry> {
        Ok(self.insert_lifestyle(&entry).await?)
    }

    async fn get(&self, id: i64) -> RepoResult<LifestyleEntry> {
        Ok(self.find_lifestyle(id).await?)
    }

    async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<LifestyleEntry>> {
        Ok(self.lifestyle_for_patient(patient_id).await?)
    }

    async fn update(&self, entry: &LifestyleEntry) -> RepoResult<()> {
        Ok(self.save_lifestyle(entry).await?)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        Ok(self.remove_lifestyle(id).await?)
    }
}
