//! SQLite-backed repositories
//!
//! Schema:
//!   - patients: one row per patient, `email_address` unique
//!   - patient_medical_history: entries owned by a patient (FK)
//!   - patient_lifestyle: entries owned by a patient (FK)
//!
//! Empty strings and zero ages are stored as NULL.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use carebase_core::{
    LifestyleEntry, LifestyleRepository, MedicalHistoryEntry, MedicalHistoryRepository,
    NewLifestyleEntry, NewMedicalHistoryEntry, NewPatient, Patient, PatientRepository, RepoResult,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const PATIENT_COLUMNS: &str = "patient_id, user_id, full_name, age, date_of_birth, sex, \
     phone_number, email_address, preferred_communication, socioeconomic_status, \
     geographic_location, created_at, updated_at";

const HISTORY_COLUMNS: &str = "patient_medical_history_id, patient_id, condition, \
     diagnosis_date, status, details, created_at, updated_at";

const LIFESTYLE_COLUMNS: &str = "patient_lifestyle_id, patient_id, lifestyle_factor, value, \
     start_date, end_date, created_at, updated_at";

/// SQLite store implementing every repository port.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

#[allow(clippy::result_large_err)]
impl SqliteStore {
    /// Open the store (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL for read-write concurrency; FK enforcement is per connection.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS patients (
                patient_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                full_name TEXT NOT NULL,
                age INTEGER,
                date_of_birth TEXT NOT NULL,
                sex TEXT NOT NULL,
                phone_number TEXT,
                email_address TEXT UNIQUE,
                preferred_communication TEXT,
                socioeconomic_status TEXT,
                geographic_location TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS patient_medical_history (
                patient_medical_history_id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL REFERENCES patients(patient_id),
                condition TEXT NOT NULL,
                diagnosis_date TEXT,
                status TEXT NOT NULL,
                details TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS patient_lifestyle (
                patient_lifestyle_id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL REFERENCES patients(patient_id),
                lifestyle_factor TEXT NOT NULL,
                value TEXT,
                start_date TEXT,
                end_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_patient ON patient_medical_history(patient_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_lifestyle_patient ON patient_lifestyle(patient_id)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn insert_patient(&self, p: &NewPatient) -> Result<Patient> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO patients (user_id, full_name, age, date_of_birth, sex, phone_number,
                email_address, preferred_communication, socioeconomic_status,
                geographic_location, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                p.user_id,
                p.full_name,
                nonzero(p.age),
                p.date_of_birth,
                p.sex,
                nullable(&p.phone_number),
                nullable(&p.email_address),
                nullable(&p.preferred_communication),
                nullable(&p.socioeconomic_status),
                nullable(&p.geographic_location),
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(patient_id = id, "Inserted patient row");
        select_patient(&conn, id)
    }

    pub fn find_patient(&self, patient_id: i64) -> Result<Patient> {
        let conn = self.conn()?;
        select_patient(&conn, patient_id)
    }

    pub fn save_patient(&self, p: &Patient) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE patients SET user_id = ?2, full_name = ?3, age = ?4, date_of_birth = ?5,
                sex = ?6, phone_number = ?7, email_address = ?8, preferred_communication = ?9,
                socioeconomic_status = ?10, geographic_location = ?11, updated_at = ?12
             WHERE patient_id = ?1",
            params![
                p.patient_id,
                p.user_id,
                p.full_name,
                nonzero(p.age),
                p.date_of_birth,
                p.sex,
                nullable(&p.phone_number),
                nullable(&p.email_address),
                nullable(&p.preferred_communication),
                nullable(&p.socioeconomic_status),
                nullable(&p.geographic_location),
                p.updated_at,
            ],
        )?;
        affected(rows)
    }

    pub fn insert_history(&self, e: &NewMedicalHistoryEntry) -> Result<MedicalHistoryEntry> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO patient_medical_history
                (patient_id, condition, diagnosis_date, status, details, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                e.patient_id,
                e.condition,
                e.diagnosis_date,
                e.status,
                nullable(&e.details),
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, patient_id = e.patient_id, "Inserted medical history row");
        select_history(&conn, id)
    }

    pub fn find_history(&self, id: i64) -> Result<MedicalHistoryEntry> {
        let conn = self.conn()?;
        select_history(&conn, id)
    }

    pub fn history_for_patient(&self, patient_id: i64) -> Result<Vec<MedicalHistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM patient_medical_history
             WHERE patient_id = ? ORDER BY patient_medical_history_id"
        ))?;
        let rows = stmt.query_map(params![patient_id], history_from_row)?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    pub fn save_history(&self, e: &MedicalHistoryEntry) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE patient_medical_history SET condition = ?2, diagnosis_date = ?3,
                status = ?4, details = ?5, updated_at = ?6
             WHERE patient_medical_history_id = ?1",
            params![
                e.patient_medical_history_id,
                e.condition,
                e.diagnosis_date,
                e.status,
                nullable(&e.details),
                e.updated_at,
            ],
        )?;
        affected(rows)
    }

    pub fn remove_history(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM patient_medical_history WHERE patient_medical_history_id = ?",
            params![id],
        )?;
        affected(rows)
    }

    pub fn insert_lifestyle(&self, e: &NewLifestyleEntry) -> Result<LifestyleEntry> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO patient_lifestyle
                (patient_id, lifestyle_factor, value, start_date, end_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                e.patient_id,
                e.lifestyle_factor,
                nullable(&e.value),
                e.start_date,
                e.end_date,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, patient_id = e.patient_id, "Inserted lifestyle row");
        select_lifestyle(&conn, id)
    }

    pub fn find_lifestyle(&self, id: i64) -> Result<LifestyleEntry> {
        let conn = self.conn()?;
        select_lifestyle(&conn, id)
    }

    pub fn lifestyle_for_patient(&self, patient_id: i64) -> Result<Vec<LifestyleEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {LIFESTYLE_COLUMNS} FROM patient_lifestyle
             WHERE patient_id = ? ORDER BY patient_lifestyle_id"
        ))?;
        let rows = stmt.query_map(params![patient_id], lifestyle_from_row)?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    pub fn save_lifestyle(&self, e: &LifestyleEntry) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE patient_lifestyle SET lifestyle_factor = ?2, value = ?3, start_date = ?4,
                end_date = ?5, updated_at = ?6
             WHERE patient_lifestyle_id = ?1",
            params![
                e.patient_lifestyle_id,
                e.lifestyle_factor,
                nullable(&e.value),
                e.start_date,
                e.end_date,
                e.updated_at,
            ],
        )?;
        affected(rows)
    }

    pub fn remove_lifestyle(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM patient_lifestyle WHERE patient_lifestyle_id = ?",
            params![id],
        )?;
        affected(rows)
    }
}

fn nullable(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn nonzero(n: i32) -> Option<i32> {
    (n != 0).then_some(n)
}

fn affected(rows: usize) -> Result<()> {
    if rows == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn select_patient(conn: &Connection, patient_id: i64) -> Result<Patient> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?"),
        params![patient_id],
        patient_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound)
}

fn select_history(conn: &Connection, id: i64) -> Result<MedicalHistoryEntry> {
    conn.query_row(
        &format!(
            "SELECT {HISTORY_COLUMNS} FROM patient_medical_history \
             WHERE patient_medical_history_id = ?"
        ),
        params![id],
        history_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound)
}

fn select_lifestyle(conn: &Connection, id: i64) -> Result<LifestyleEntry> {
    conn.query_row(
        &format!(
            "SELECT {LIFESTYLE_COLUMNS} FROM patient_lifestyle WHERE patient_lifestyle_id = ?"
        ),
        params![id],
        lifestyle_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound)
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        patient_id: row.get(0)?,
        user_id: row.get(1)?,
        full_name: row.get(2)?,
        age: row.get::<_, Option<i32>>(3)?.unwrap_or_default(),
        date_of_birth: row.get(4)?,
        sex: row.get(5)?,
        phone_number: text(row, 6)?,
        email_address: text(row, 7)?,
        preferred_communication: text(row, 8)?,
        socioeconomic_status: text(row, 9)?,
        geographic_location: text(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalHistoryEntry> {
    Ok(MedicalHistoryEntry {
        patient_medical_history_id: row.get(0)?,
        patient_id: row.get(1)?,
        condition: row.get(2)?,
        diagnosis_date: row.get(3)?,
        status: row.get(4)?,
        details: text(row, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn lifestyle_from_row(row: &Row<'_>) -> rusqlite::Result<LifestyleEntry> {
    Ok(LifestyleEntry {
        patient_lifestyle_id: row.get(0)?,
        patient_id: row.get(1)?,
        lifestyle_factor: row.get(2)?,
        value: text(row, 3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[async_trait]
impl PatientRepository for SqliteStore {
    async fn create(&self, patient: NewPatient) -> RepoResult<Patient> {
        Ok(self.insert_patient(&patient)?)
    }

    async fn get(&self, patient_id: i64) -> RepoResult<Patient> {
        Ok(self.find_patient(patient_id)?)
    }

    async fn update(&self, patient: &Patient) -> RepoResult<()> {
        Ok(self.save_patient(patient)?)
    }
}

#[async_trait]
impl MedicalHistoryRepository for SqliteStore {
    async fn create(&self, entry: NewMedicalHistoryEntry) -> RepoResult<MedicalHistoryEntry> {
        Ok(self.insert_history(&entry)?)
    }

    async fn get(&self, id: i64) -> RepoResult<MedicalHistoryEntry> {
        Ok(self.find_history(id)?)
    }

    async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<MedicalHistoryEntry>> {
        Ok(self.history_for_patient(patient_id)?)
    }

    async fn update(&self, entry: &MedicalHistoryEntry) -> RepoResult<()> {
        Ok(self.save_history(entry)?)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        Ok(self.remove_history(id)?)
    }
}

#[async_trait]
impl LifestyleRepository for SqliteStore {
    async fn create(&self, entry: NewLifestyleEntry) -> RepoResult<LifestyleEntry> {
        Ok(self.insert_lifestyle(&entry)?)
    }

    async fn get(&self, id: i64) -> RepoResult<LifestyleEntry> {
        Ok(self.find_lifestyle(id)?)
    }

    async fn list_by_patient(&self, patient_id: i64) -> RepoResult<Vec<LifestyleEntry>> {
        Ok(self.lifestyle_for_patient(patient_id)?)
    }

    async fn update(&self, entry: &LifestyleEntry) -> RepoResult<()> {
        Ok(self.save_lifestyle(entry)?)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        Ok(self.remove_lifestyle(id)?)
    }
}
