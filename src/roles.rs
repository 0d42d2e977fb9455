use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RepositoryError;

/// The role value that unlocks the admin-only part of the console.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// RoleStore
///
/// Where role memberships live. Implemented by `PostgresRepository` over `user_roles`.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Whether `user_id` holds `role`. `Ok(false)` when no membership row exists.
    async fn has_role(&self, user_id: Uuid, role: &str) -> Result<bool, RepositoryError>;
}

pub type RoleState = Arc<dyn RoleStore>;

/// RoleChecker
///
/// Answers "is this operator a super admin" with a live lookup on every call.
/// Lookup failures answer `false`: a broken role store must never grant access.
#[derive(Clone)]
pub struct RoleChecker {
    store: RoleState,
}

impl RoleChecker {
    pub fn new(store: RoleState) -> Self {
        Self { store }
    }

    pub async fn is_super_admin(&self, user_id: Uuid) -> bool {
        match self.store.has_role(user_id, SUPER_ADMIN_ROLE).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "role lookup failed, denying admin access");
                false
            }
        }
    }
}
