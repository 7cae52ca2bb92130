//! carebase - patient records REST backend
//!
//! Patients, their medical history and their lifestyle entries over HTTP.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod profiles;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use carebase_core::{
    Authorizer, LifestyleRepository, LifestyleService, MedicalHistoryRepository,
    MedicalHistoryService, PatientRepository, PatientService, RoleAuthorizer, Unrestricted,
    Validator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AuthSettings, ServerConfig};
use crate::profiles::Directory;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state
pub struct AppState {
    pub patients: PatientService,
    pub medical_history: MedicalHistoryService,
    pub lifestyle: LifestyleService,
    pub config: ServerConfig,
    pub jwk_cache: RwLock<auth::JwkCache>,
}

impl AppState {
    /// Wire the three services over a single store.
    pub fn new<S>(
        config: ServerConfig,
        store: Arc<S>,
        validator: Validator,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self
    where
        S: PatientRepository + MedicalHistoryRepository + LifestyleRepository + 'static,
    {
        let patients: Arc<dyn PatientRepository> = store.clone();
        let histories: Arc<dyn MedicalHistoryRepository> = store.clone();
        let lifestyles: Arc<dyn LifestyleRepository> = store;

        Self {
            patients: PatientService::new(patients.clone(), validator, authorizer.clone()),
            medical_history: MedicalHistoryService::new(
                histories,
                patients.clone(),
                validator,
                authorizer.clone(),
            ),
            lifestyle: LifestyleService::new(lifestyles, patients, validator, authorizer),
            config,
            jwk_cache: RwLock::new(auth::JwkCache::new()),
        }
    }
}

/// Pick the authorizer for the configured auth mode.
///
/// With auth disabled every caller is anonymous and allowed.
pub fn build_authorizer(auth: &AuthSettings) -> Result<Arc<dyn Authorizer>, String> {
    if !auth.enabled {
        return Ok(Arc::new(Unrestricted));
    }
    let directory = Directory::from_settings(&auth.profiles)?;
    Ok(Arc::new(RoleAuthorizer::new(directory)))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .route("/health", get(handlers::metadata::health_check))
        .route("/v1/patients", post(handlers::patient::create))
        .route(
            "/v1/patients/{patient_id}",
            get(handlers::patient::read).put(handlers::patient::update),
        )
        .route(
            "/v1/patients/{patient_id}/medical_history",
            post(handlers::medical_history::create).get(handlers::medical_history::list),
        )
        .route(
            "/v1/patients/{patient_id}/medical_history/{medical_history_id}",
            get(handlers::medical_history::read)
                .put(handlers::medical_history::update)
                .delete(handlers::medical_history::delete),
        )
        .route(
            "/v1/patients/{patient_id}/lifestyle",
            post(handlers::lifestyle::create).get(handlers::lifestyle::list),
        )
        .route(
            "/v1/patients/{patient_id}/lifestyle/{lifestyle_id}",
            get(handlers::lifestyle::read)
                .put(handlers::lifestyle::update)
                .delete(handlers::lifestyle::delete),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(TimeoutLayer::new(timeout))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
