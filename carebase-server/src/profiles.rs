//! Profile directories backing the role authorizer.

use async_trait::async_trait;
use carebase_core::{AuthzError, CallerProfile, ProfileDirectory};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::{ProfileProvider, ProfileSettings};

/// Looks users up in the identity provider's user API:
/// `GET {api_url}/users/{user_id}` with the secret key as bearer token.
pub struct HttpProfileDirectory {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl HttpProfileDirectory {
    pub fn new(
        api_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }
}

#[async_trait]
impl ProfileDirectory for HttpProfileDirectory {
    async fn profile(&self, user_id: &str) -> Result<CallerProfile, AuthzError> {
        let failed = |reason: String| AuthzError::ProfileLookup {
            user_id: user_id.to_string(),
            reason,
        };

        let mut url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| failed(format!("invalid user API url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| failed("user API url cannot take a path".to_string()))?
            .pop_if_empty()
            .push("users")
            .push(user_id);
        debug!(%url, "Fetching caller profile");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("identity provider returned {}", status)));
        }

        response
            .json::<CallerProfile>()
            .await
            .map_err(|e| failed(format!("invalid profile response: {}", e)))
    }
}

/// Profiles fixed in configuration. Unknown users have empty metadata.
#[derive(Debug, Default)]
pub struct StaticProfileDirectory {
    profiles: HashMap<String, Value>,
}

impl StaticProfileDirectory {
    pub fn new(profiles: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            profiles: profiles.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ProfileDirectory for StaticProfileDirectory {
    async fn profile(&self, user_id: &str) -> Result<CallerProfile, AuthzError> {
        Ok(CallerProfile {
            public_metadata: self.profiles.get(user_id).cloned().unwrap_or(Value::Null),
        })
    }
}

/// Either directory, chosen from configuration.
pub enum Directory {
    Http(HttpProfileDirectory),
    Static(StaticProfileDirectory),
}

impl Directory {
    pub fn from_settings(settings: &ProfileSettings) -> Result<Self, String> {
        match settings.provider {
            ProfileProvider::Static => Ok(Directory::Static(StaticProfileDirectory::new(
                settings
                    .users
                    .iter()
                    .map(|u| (u.user_id.clone(), u.public_metadata.clone())),
            ))),
            ProfileProvider::Http => {
                let api_url = settings
                    .api_url
                    .as_deref()
                    .ok_or("auth.profiles.api_url is required for the http provider")?;
                let secret_key = settings.secret_key.clone().unwrap_or_default();
                HttpProfileDirectory::new(
                    api_url,
                    secret_key,
                    Duration::from_secs(settings.timeout_secs),
                )
                .map(Directory::Http)
                .map_err(|e| format!("Failed to build profile client: {}", e))
            }
        }
    }
}

#[async_trait]
impl ProfileDirectory for Directory {
    async fn profile(&self, user_id: &str) -> Result<CallerProfile, AuthzError> {
        match self {
            Directory::Http(d) => d.profile(user_id).await,
            Directory::Static(d) => d.profile(user_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticProfile;
    use axum::{Json, Router, extract::Path, http::HeaderMap, http::StatusCode, routing::get};
    use serde_json::json;

    async fn fake_idp() -> String {
        async fn user(
            Path(id): Path<String>,
            headers: HeaderMap,
        ) -> Result<Json<Value>, StatusCode> {
            let auth = headers
                .get("authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("");
            if auth != "Bearer sk_test" {
                return Err(StatusCode::UNAUTHORIZED);
            }
            match id.as_str() {
                "doc" => Ok(Json(json!({"id": "doc", "public_metadata": {"role": "physician"}}))),
                "a/b?c" => Ok(Json(json!({"id": id, "public_metadata": {"role": "clerk"}}))),
                _ => Err(StatusCode::NOT_FOUND),
            }
        }

        let app = Router::new().route("/users/{id}", get(user));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_directory_reads_public_metadata() {
        let base = fake_idp().await;
        let dir = HttpProfileDirectory::new(base, "sk_test", Duration::from_secs(2)).unwrap();
        let profile = dir.profile("doc").await.unwrap();
        assert_eq!(profile.public_metadata["role"], "physician");
    }

    #[tokio::test]
    async fn test_http_directory_error_status() {
        let base = fake_idp().await;
        let dir = HttpProfileDirectory::new(base, "sk_test", Duration::from_secs(2)).unwrap();
        let err = dir.profile("ghost").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_user_id_is_a_single_path_segment() {
        let base = fake_idp().await;
        let dir = HttpProfileDirectory::new(base, "sk_test", Duration::from_secs(2)).unwrap();
        let profile = dir.profile("a/b?c").await.unwrap();
        assert_eq!(profile.public_metadata["role"], "clerk");

        assert!(dir.profile("../doc").await.is_err());
    }

    #[tokio::test]
    async fn test_http_directory_unreachable() {
        let dir =
            HttpProfileDirectory::new("http://127.0.0.1:1", "sk", Duration::from_millis(500))
                .unwrap();
        assert!(dir.profile("doc").await.is_err());
    }

    #[tokio::test]
    async fn test_static_directory_from_settings() {
        let settings = ProfileSettings {
            users: vec![StaticProfile {
                user_id: "clerk-1".to_string(),
                public_metadata: json!(["clerk"]),
            }],
            ..Default::default()
        };
        let dir = Directory::from_settings(&settings).unwrap();
        assert_eq!(dir.profile("clerk-1").await.unwrap().public_metadata, json!(["clerk"]));
        assert_eq!(dir.profile("nobody").await.unwrap().public_metadata, Value::Null);
    }

    #[test]
    fn test_http_provider_requires_url() {
        let settings = ProfileSettings {
            provider: ProfileProvider::Http,
            ..Default::default()
        };
        assert!(Directory::from_settings(&settings).is_err());
    }
}
