//! Ownership-based access control for patient records.
//!
//! A caller may touch a record when it *is* the owning patient, or when its
//! profile grants a clinical role or the `patient:read_all` permission.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Roles that may access every patient record.
const ELEVATED_ROLES: &[&str] = &["physician", "clerk"];

const READ_ALL_PERMISSION: &str = "patient:read_all";

/// Authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Profile data held by the identity provider for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerProfile {
    #[serde(default)]
    pub public_metadata: Value,
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("profile lookup failed for {user_id}: {reason}")]
    ProfileLookup { user_id: String, reason: String },
}

/// Source of caller profiles.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<CallerProfile, AuthzError>;
}

/// Decides whether a caller may act on a patient's records.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn allow(&self, caller: &Caller, owner_patient_id: i64) -> Result<bool, AuthzError>;
}

/// Self-access or elevated profile.
pub struct RoleAuthorizer<D> {
    directory: D,
}

impl<D: ProfileDirectory> RoleAuthorizer<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<D: ProfileDirectory> Authorizer for RoleAuthorizer<D> {
    async fn allow(&self, caller: &Caller, owner_patient_id: i64) -> Result<bool, AuthzError> {
        if caller.user_id == owner_patient_id.to_string() {
            debug!(user_id = %caller.user_id, owner_patient_id, "Self access granted");
            return Ok(true);
        }

        let profile = self.directory.profile(&caller.user_id).await?;

        if has_elevated_role(&profile.public_metadata) {
            debug!(user_id = %caller.user_id, owner_patient_id, "Role access granted");
            return Ok(true);
        }

        if mentions(&profile.public_metadata, READ_ALL_PERMISSION) {
            debug!(user_id = %caller.user_id, owner_patient_id, "Permission access granted");
            return Ok(true);
        }

        warn!(user_id = %caller.user_id, owner_patient_id, "Authorization denied");
        Ok(false)
    }
}

/// Allows everything. Used when authentication is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

#[async_trait]
impl Authorizer for Unrestricted {
    async fn allow(&self, _caller: &Caller, _owner_patient_id: i64) -> Result<bool, AuthzError> {
        Ok(true)
    }
}

/// Top-level metadata values only: a role string, or a role inside an array.
fn has_elevated_role(metadata: &Value) -> bool {
    let Value::Object(map) = metadata else {
        return false;
    };
    map.values().any(|v| match v {
        Value::String(s) => ELEVATED_ROLES.contains(&s.as_str()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| ELEVATED_ROLES.contains(&s)),
        _ => false,
    })
}

/// Substring search over every key and string value, at any depth.
fn mentions(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.contains(needle),
        Value::Array(items) => items.iter().any(|v| mentions(v, needle)),
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| k.contains(needle) || mentions(v, needle)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDirectory {
        profiles: HashMap<String, Value>,
        fail: bool,
        lookups: Mutex<Vec<String>>,
    }

    impl FakeDirectory {
        fn with(user_id: &str, metadata: Value) -> Self {
            let mut profiles = HashMap::new();
            profiles.insert(user_id.to_string(), metadata);
            Self {
                profiles,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ProfileDirectory for FakeDirectory {
        async fn profile(&self, user_id: &str) -> Result<CallerProfile, AuthzError> {
            self.lookups.lock().unwrap().push(user_id.to_string());
            if self.fail {
                return Err(AuthzError::ProfileLookup {
                    user_id: user_id.to_string(),
                    reason: "unreachable".to_string(),
                });
            }
            Ok(CallerProfile {
                public_metadata: self.profiles.get(user_id).cloned().unwrap_or(Value::Null),
            })
        }
    }

    #[tokio::test]
    async fn test_self_access_skips_lookup() {
        let authz = RoleAuthorizer::new(FakeDirectory {
            fail: true,
            ..Default::default()
        });
        assert!(authz.allow(&Caller::new("2"), 2).await.unwrap());
        assert!(authz.directory.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_string_and_array() {
        let authz = RoleAuthorizer::new(FakeDirectory::with("u1", json!({"role": "physician"})));
        assert!(authz.allow(&Caller::new("u1"), 5).await.unwrap());

        let authz =
            RoleAuthorizer::new(FakeDirectory::with("u1", json!({"roles": ["nurse", "clerk"]})));
        assert!(authz.allow(&Caller::new("u1"), 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_role_is_not_enough() {
        let authz = RoleAuthorizer::new(FakeDirectory::with(
            "u1",
            json!({"org": {"role": "physician"}}),
        ));
        assert!(!authz.allow(&Caller::new("u1"), 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_all_permission_anywhere() {
        let authz = RoleAuthorizer::new(FakeDirectory::with(
            "u1",
            json!({"grants": {"scopes": ["patient:read_all"]}}),
        ));
        assert!(authz.allow(&Caller::new("u1"), 5).await.unwrap());

        let authz =
            RoleAuthorizer::new(FakeDirectory::with("u1", json!({"patient:read_all": true})));
        assert!(authz.allow(&Caller::new("u1"), 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_plain_user_denied() {
        let authz = RoleAuthorizer::new(FakeDirectory::with("3", json!({"role": "patient"})));
        assert!(!authz.allow(&Caller::new("3"), 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_an_error() {
        let authz = RoleAuthorizer::new(FakeDirectory {
            fail: true,
            ..Default::default()
        });
        let err = authz.allow(&Caller::new("3"), 2).await.unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_unrestricted() {
        assert!(Unrestricted.allow(&Caller::new("anyone"), 1).await.unwrap());
    }
}
