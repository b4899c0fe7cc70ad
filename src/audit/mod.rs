use chrono::Utc;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::audit::NewAuditEntry;
use crate::workflow::store::StoreTx;

/// Append an audit entry inside the caller's transaction, so the entry
/// commits or rolls back together with the change it describes.
pub async fn log(
    tx: &mut dyn StoreTx,
    actor_email: &str,
    action: &str,
    proposal_id: i64,
    details: Value,
) -> Result<(), AppError> {
    tx.append_audit(&NewAuditEntry {
        actor_email: actor_email.to_string(),
        action: action.to_string(),
        proposal_id,
        details,
        created_at: Utc::now(),
    })
    .await
}
