use async_trait::async_trait;

use crate::auth::context::{AuthorizationContext, Identity, RoleSet, SystemRole};
use crate::errors::AppError;
use crate::models::proposal::LeadRole;

/// Read-only view of who holds which role.
///
/// Role administration lives outside this crate; the workflow only reads.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// All system and club roles held by `email`.
    async fn roles_for(&self, email: &str) -> Result<RoleSet, AppError>;

    /// Staffed lead positions of a club, as (role, holder email).
    async fn club_leads(&self, club_id: i64) -> Result<Vec<(LeadRole, String)>, AppError>;

    /// Everyone holding a system role, used for notification fan-out.
    async fn emails_with_system_role(&self, role: SystemRole) -> Result<Vec<String>, AppError>;
}

/// Resolve the session identity into an authorization context.
///
/// Missing identity is `Unauthenticated`; an unverified one is `Unverified`.
/// Both are rejected before any role lookup happens.
pub async fn authorize<D: RoleDirectory + ?Sized>(
    directory: &D,
    identity: Option<Identity>,
) -> Result<AuthorizationContext, AppError> {
    let identity = identity.ok_or(AppError::Unauthenticated)?;
    if !identity.verified {
        return Err(AppError::Unverified);
    }
    let roles = directory.roles_for(&identity.email).await?;
    Ok(AuthorizationContext::new(identity.email, roles))
}
