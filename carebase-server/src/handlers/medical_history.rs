use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use carebase_core::{CreateMedicalHistoryRequest, UpdateMedicalHistoryRequest};
use std::sync::Arc;

use super::{caller, extract_body, parse_id};
use crate::{AppState, error::ApiError};

/// POST /v1/patients/{patient_id}/medical_history
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let (_caller, body): (_, CreateMedicalHistoryRequest) = extract_body(request).await?;
    let entry = state.medical_history.create(patient_id, body).await?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

/// GET /v1/patients/{patient_id}/medical_history
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> Result<Response, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let entries = state.medical_history.list(patient_id).await?;
    Ok(Json(entries).into_response())
}

/// GET /v1/patients/{patient_id}/medical_history/{medical_history_id}
pub async fn read(
    State(state): State<Arc<AppState>>,
    Path((patient_id, entry_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    parse_id(&patient_id, "patient")?;
    let entry_id = parse_id(&entry_id, "medical history")?;
    let entry = state.medical_history.get(entry_id).await?;
    Ok(Json(entry).into_response())
}

/// PUT /v1/patients/{patient_id}/medical_history/{medical_history_id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((patient_id, entry_id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    parse_id(&patient_id, "patient")?;
    let entry_id = parse_id(&entry_id, "medical history")?;
    let (caller, body): (_, UpdateMedicalHistoryRequest) = extract_body(request).await?;
    let entry = state.medical_history.update(&caller, entry_id, body).await?;
    Ok(Json(entry).into_response())
}

/// DELETE /v1/patients/{patient_id}/medical_history/{medical_history_id}
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((patient_id, entry_id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    parse_id(&patient_id, "patient")?;
    let entry_id = parse_id(&entry_id, "medical history")?;
    let caller = caller(&request)?;
    state.medical_history.delete(&caller, entry_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
