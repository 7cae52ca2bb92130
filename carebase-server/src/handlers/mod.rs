pub mod lifestyle;
pub mod medical_history;
pub mod metadata;
pub mod patient;

use axum::extract::Request;
use carebase_core::Caller;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Split a request into its caller identity and JSON body.
async fn extract_body<T: DeserializeOwned>(request: Request) -> Result<(Caller, T), ApiError> {
    let caller = caller(&request)?;
    let bytes = request
        .into_body()
        .collect()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    let value = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;

    Ok((caller, value))
}

/// Caller attached by the auth middleware.
fn caller(request: &Request) -> Result<Caller, ApiError> {
    request
        .extensions()
        .get::<Caller>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("Missing caller identity".to_string()))
}

fn parse_id(raw: &str, label: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} ID", label)))
}
