use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, header},
    middleware::Next,
    response::Response,
};
use carebase_core::Caller;
use jsonwebtoken::{
    Algorithm, DecodingKey, TokenData, Validation,
    jwk::{Jwk, JwkSet},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{AppState, config::JwtSettings, error::ApiError};

/// Identity used for every request when authentication is disabled.
pub const ANONYMOUS: &str = "anonymous";

/// Cached JWK key set fetched from an external IdP.
#[derive(Default)]
pub struct JwkCache {
    jwks: Option<JwkSet>,
    fetched_at: Option<std::time::Instant>,
}

/// Cache TTL: 15 minutes
const JWK_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(15 * 60);

impl JwkCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_expired(&self) -> bool {
        match self.fetched_at {
            Some(t) => t.elapsed() > JWK_CACHE_TTL,
            None => true,
        }
    }
}

/// Fetch or return cached JWK set from the configured URL.
async fn get_jwks(jwk_url: &str, cache: &RwLock<JwkCache>) -> Result<JwkSet, String> {
    {
        let c = cache.read().await;
        if !c.is_expired()
            && let Some(ref jwks) = c.jwks
        {
            return Ok(jwks.clone());
        }
    }

    let mut c = cache.write().await;
    // Another request may have refreshed while we waited for the write lock.
    if !c.is_expired()
        && let Some(ref jwks) = c.jwks
    {
        return Ok(jwks.clone());
    }

    let response = reqwest::get(jwk_url)
        .await
        .map_err(|e| format!("Failed to fetch JWK from {}: {}", jwk_url, e))?;

    let jwks: JwkSet = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse JWK response: {}", e))?;

    c.jwks = Some(jwks.clone());
    c.fetched_at = Some(std::time::Instant::now());

    Ok(jwks)
}

/// Verified token contents attached to the request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    /// `permissions` claim entries plus space-separated `scope` entries.
    pub permissions: Vec<String>,
}

impl AuthUser {
    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id.clone())
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    iss: Option<String>,
    aud: Option<serde_json::Value>,
    exp: Option<u64>,
    iat: Option<u64>,
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config.auth.enabled {
        request.extensions_mut().insert(Caller::new(ANONYMOUS));
        return Ok(next.run(request).await);
    }

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(auth_header) = auth_header else {
        warn!(path = %request.uri().path(), "Missing Authorization header");
        return Err(ApiError::Unauthorized("Missing Authorization header".to_string()));
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err(ApiError::Unauthorized(
            "Invalid Authorization header format. Use 'Bearer <token>'".to_string(),
        ));
    };

    let Some(ref jwt_settings) = state.config.auth.jwt else {
        return Err(ApiError::Internal(
            "auth is enabled but no jwt settings are configured".to_string(),
        ));
    };

    let auth_user = authenticate_jwt(jwt_settings, token.trim(), &state.jwk_cache).await?;

    if state.config.auth.require_permissions
        && let Some((resource, action)) =
            extract_resource_action(request.method(), request.uri().path())
        && !check_permission(&auth_user.permissions, resource, action)
    {
        warn!(user_id = %auth_user.user_id, resource, action, "Missing permission");
        return Err(ApiError::MissingPermission(format!(
            "Missing permission {}:{}",
            resource, action
        )));
    }

    debug!(user_id = %auth_user.user_id, "Authenticated");
    request.extensions_mut().insert(auth_user.caller());
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Pick the key named by the token's `kid`.
///
/// A token without `kid` is only accepted against a single-key set.
fn select_jwk<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, ApiError> {
    let found = match kid {
        Some(kid) => jwks.find(kid),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    };
    found.ok_or_else(|| ApiError::Unauthorized("No matching JWK found".to_string()))
}

/// Verify a JWT and extract the caller identity.
pub async fn authenticate_jwt(
    jwt_settings: &JwtSettings,
    token: &str,
    jwk_cache: &RwLock<JwkCache>,
) -> Result<AuthUser, ApiError> {
    let (decoding_key, algorithm) = if let Some(ref jwk_url) = jwt_settings.jwk_url {
        let jwks = get_jwks(jwk_url, jwk_cache).await.map_err(ApiError::Internal)?;

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| ApiError::Unauthorized(format!("Invalid JWT header: {}", e)))?;

        let jwk = select_jwk(&jwks, header.kid.as_deref())?;

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| ApiError::Unauthorized(format!("Invalid JWK: {}", e)))?;

        let alg = jwk
            .common
            .key_algorithm
            .and_then(|a| match a {
                jsonwebtoken::jwk::KeyAlgorithm::RS256 => Some(Algorithm::RS256),
                jsonwebtoken::jwk::KeyAlgorithm::RS384 => Some(Algorithm::RS384),
                jsonwebtoken::jwk::KeyAlgorithm::RS512 => Some(Algorithm::RS512),
                jsonwebtoken::jwk::KeyAlgorithm::ES256 => Some(Algorithm::ES256),
                jsonwebtoken::jwk::KeyAlgorithm::ES384 => Some(Algorithm::ES384),
                _ => None,
            })
            .unwrap_or(Algorithm::RS256);

        (key, alg)
    } else if let Some(ref secret) = jwt_settings.secret {
        (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
    } else if let Some(ref key_file) = jwt_settings.public_key_file {
        let pem = std::fs::read(key_file)
            .map_err(|e| ApiError::Internal(format!("Failed to read public key file: {}", e)))?;
        let key = DecodingKey::from_rsa_pem(&pem)
            .map_err(|e| ApiError::Internal(format!("Invalid public key: {}", e)))?;
        (key, Algorithm::RS256)
    } else {
        return Err(ApiError::Internal(
            "JWT is configured but no secret, public_key_file, or jwk_url is set".to_string(),
        ));
    };

    let mut validation = Validation::new(algorithm);

    if let Some(ref issuer) = jwt_settings.issuer {
        validation.set_issuer(&[issuer]);
    }

    if let Some(ref audience) = jwt_settings.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    let token_data: TokenData<JwtClaims> = jsonwebtoken::decode(token, &decoding_key, &validation)
        .map_err(|e| {
            warn!(error = %e, "Token rejected");
            ApiError::Unauthorized(format!("Invalid JWT: {}", e))
        })?;

    let claims = token_data.claims;
    let user_id = claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Token has no subject".to_string()))?;

    let mut permissions = claims.permissions;
    if let Some(scope) = claims.scope {
        permissions.extend(scope.split_whitespace().map(String::from));
    }

    Ok(AuthUser {
        user_id,
        permissions,
    })
}

/// Derive `(resource, action)` from HTTP method + path under `/v1`.
fn extract_resource_action(method: &Method, path: &str) -> Option<(&'static str, &'static str)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() != Some(&"v1") || segments.get(1) != Some(&"patients") {
        return None;
    }

    let resource = match segments.get(3) {
        None => "patient",
        Some(&"medical_history") => "medical_history",
        Some(&"lifestyle") => "lifestyle",
        Some(_) => return None,
    };

    let action = match *method {
        Method::GET | Method::HEAD => "read",
        Method::POST => "create",
        Method::PUT | Method::PATCH => "update",
        Method::DELETE => "delete",
        _ => return None,
    };

    Some((resource, action))
}

/// Check `<resource>:<action>` against granted permissions.
///
/// Either half of a granted permission may be `*`, e.g. `patient:*`,
/// `*:read`, `*:*`.
pub fn check_permission(permissions: &[String], resource: &str, action: &str) -> bool {
    permissions.iter().any(|p| {
        p.split_once(':').is_some_and(|(r, a)| {
            (r == "*" || r == resource) && (a == "*" || a == action)
        })
    })
}
