use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use carebase_core::{CreatePatientRequest, UpdatePatientRequest};
use std::sync::Arc;

use super::{extract_body, parse_id};
use crate::{AppState, error::ApiError};

/// Create patient (POST /v1/patients)
pub async fn create(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    let (_caller, body): (_, CreatePatientRequest) = extract_body(request).await?;
    let patient = state.patients.create(body).await?;
    Ok((StatusCode::CREATED, Json(patient)).into_response())
}

/// Read patient (GET /v1/patients/{patient_id})
pub async fn read(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> Result<Response, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let patient = state.patients.get(patient_id).await?;
    Ok(Json(patient).into_response())
}

/// Partial update (PUT /v1/patients/{patient_id})
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let (caller, body): (_, UpdatePatientRequest) = extract_body(request).await?;
    let patient = state.patients.update(&caller, patient_id, body).await?;
    Ok(Json(patient).into_response())
}
