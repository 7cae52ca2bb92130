use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use carebase_core::{CreateLifestyleRequest, UpdateLifestyleRequest};
use std::sync::Arc;

use super::{caller, extract_body, parse_id};
use crate::{AppState, error::ApiError};

/// POST /v1/patients/{patient_id}/lifestyle
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let (_caller, body): (_, CreateLifestyleRequest) = extract_body(request).await?;
    let entry = state.lifestyle.create(patient_id, body).await?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

/// GET /v1/patients/{patient_id}/lifestyle
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> Result<Response, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let entries = state.lifestyle.list(patient_id).await?;
    Ok(Json(entries).into_response())
}

/// GET /v1/patients/{patient_id}/lifestyle/{lifestyle_id}
pub async fn read(
    State(state): State<Arc<AppState>>,
    Path((patient_id, entry_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    parse_id(&patient_id, "patient")?;
    let entry_id = parse_id(&entry_id, "lifestyle")?;
    let entry = state.lifestyle.get(entry_id).await?;
    Ok(Json(entry).into_response())
}

/// PUT /v1/patients/{patient_id}/lifestyle/{lifestyle_id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((patient_id, entry_id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    parse_id(&patient_id, "patient")?;
    let entry_id = parse_id(&entry_id, "lifestyle")?;
    let (caller, body): (_, UpdateLifestyleRequest) = extract_body(request).await?;
    let entry = state.lifestyle.update(&caller, entry_id, body).await?;
    Ok(Json(entry).into_response())
}

/// DELETE /v1/patients/{patient_id}/lifestyle/{lifestyle_id}
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((patient_id, entry_id)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    parse_id(&patient_id, "patient")?;
    let entry_id = parse_id(&entry_id, "lifestyle")?;
    let caller = caller(&request)?;
    state.lifestyle.delete(&caller, entry_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
