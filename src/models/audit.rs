use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;

/// Stored audit trail entry. `proposal_id` is not a foreign key so the trail
/// outlives hard-deleted proposals.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_email: String,
    pub action: String,
    pub proposal_id: i64,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor_email: String,
    pub action: String,
    pub proposal_id: i64,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(conn: &mut PgConnection, entry: &NewAuditEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_log (actor_email, action, proposal_id, details, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&entry.actor_email)
    .bind(&entry.action)
    .bind(entry.proposal_id)
    .bind(&entry.details)
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Audit trail of one proposal, oldest first.
pub async fn find_for_proposal(conn: &mut PgConnection, proposal_id: i64) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as::<_, AuditEntry>(
        "SELECT id, actor_email, action, proposal_id, details, created_at \
         FROM audit_log WHERE proposal_id = $1 ORDER BY id",
    )
    .bind(proposal_id)
    .fetch_all(conn)
    .await
}
