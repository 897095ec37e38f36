// rbac.rs — Role bindings and endpoint guards.
//
// Bindings live in the KV store at `rbac:<tenant>:<subject>` as a sorted,
// deduplicated JSON list. Endpoint guards check the roles carried in the
// verified token claims: admin endpoints need `admin`; viewer endpoints
// accept admin, approver, or viewer.

use std::sync::Arc;

use tg_kv::KvStore;

use crate::claims::Claims;
use crate::error::AuthError;

const VIEWER_ROLES: &[&str] = &["admin", "approver", "viewer"];

fn binding_key(tenant: &str, subject: &str) -> String {
    format!("rbac:{tenant}:{subject}")
}

/// Require the `admin` role.
pub fn require_admin(claims: &Claims) -> Result<(), AuthError> {
    if claims.has_role("admin") {
        Ok(())
    } else {
        Err(AuthError::Forbidden("admin role required".into()))
    }
}

/// Require any of admin / approver / viewer.
pub fn require_viewer(claims: &Claims) -> Result<(), AuthError> {
    if VIEWER_ROLES.iter().any(|r| claims.has_role(r)) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(
            "requires viewer, approver, or admin role".into(),
        ))
    }
}

/// `(tenant, subject) → roles` persistence.
#[derive(Clone)]
pub struct RoleStore {
    kv: Arc<dyn KvStore>,
}

impl RoleStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Replace a user's role list (sorted, deduplicated).
    pub async fn set_roles(
        &self,
        tenant: &str,
        subject: &str,
        roles: &[String],
    ) -> Result<Vec<String>, AuthError> {
        let mut normalized: Vec<String> = roles.to_vec();
        normalized.sort();
        normalized.dedup();
        let json = serde_json::to_string(&normalized)
            .expect("string list serializes");
        self.kv.set(&binding_key(tenant, subject), &json).await?;
        Ok(normalized)
    }

    pub async fn get_roles(&self, tenant: &str, subject: &str) -> Result<Vec<String>, AuthError> {
        match self.kv.get(&binding_key(tenant, subject)).await? {
            Some(json) => Ok(serde_json::from_str(&json).unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_kv::MemoryKv;

    fn claims(roles: &[&str]) -> Claims {
        Claims {
            sub: "alice".into(),
            tenant: "acme".into(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn admin_guard() {
        assert!(require_admin(&claims(&["admin"])).is_ok());
        assert!(require_admin(&claims(&["viewer"])).is_err());
        assert!(require_admin(&claims(&[])).is_err());
    }

    #[test]
    fn viewer_guard_accepts_any_read_role() {
        assert!(require_viewer(&claims(&["viewer"])).is_ok());
        assert!(require_viewer(&claims(&["approver"])).is_ok());
        assert!(require_viewer(&claims(&["admin"])).is_ok());
        assert!(require_viewer(&claims(&["billing"])).is_err());
    }

    #[tokio::test]
    async fn roles_round_trip_sorted_and_deduped() {
        let store = RoleStore::new(Arc::new(MemoryKv::new()));
        let saved = store
            .set_roles(
                "acme",
                "alice",
                &["viewer".into(), "admin".into(), "viewer".into()],
            )
            .await
            .unwrap();
        assert_eq!(saved, vec!["admin".to_string(), "viewer".to_string()]);
        assert_eq!(store.get_roles("acme", "alice").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn unknown_binding_is_empty() {
        let store = RoleStore::new(Arc::new(MemoryKv::new()));
        assert!(store.get_roles("acme", "ghost").await.unwrap().is_empty());
    }
}
