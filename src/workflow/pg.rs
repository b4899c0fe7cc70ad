use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::auth::context::{RoleSet, SystemRole};
use crate::auth::directory::RoleDirectory;
use crate::errors::AppError;
use crate::models::audit::{self, AuditEntry, NewAuditEntry};
use crate::models::proposal::{
    queries, LeadApproval, LeadRole, Proposal, ProposalPayload, ProposalStatus, Review,
};
use crate::models::role;
use super::store::{ProposalFilter, ProposalStore, StoreTx};

/// PostgreSQL-backed store. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleDirectory for PgStore {
    async fn roles_for(&self, email: &str) -> Result<RoleSet, AppError> {
        Ok(role::find_roles_for_email(&self.pool, email).await?)
    }

    async fn club_leads(&self, club_id: i64) -> Result<Vec<(LeadRole, String)>, AppError> {
        Ok(role::find_club_leads(&self.pool, club_id).await?)
    }

    async fn emails_with_system_role(&self, role: SystemRole) -> Result<Vec<String>, AppError> {
        Ok(role::find_emails_with_system_role(&self.pool, role).await?)
    }
}

#[async_trait]
impl ProposalStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// Open transaction. Dropping it without `commit` rolls back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_proposal(&mut self, id: i64) -> Result<Option<Proposal>, AppError> {
        Ok(queries::find_for_update(self.conn(), id).await?)
    }

    async fn list_proposals(&mut self, filter: &ProposalFilter) -> Result<Vec<Proposal>, AppError> {
        Ok(queries::find_filtered(
            self.conn(),
            filter.club_ids.as_deref(),
            filter.statuses.as_deref(),
            filter.archived,
        )
        .await?)
    }

    async fn load_payload(&mut self, proposal_id: i64) -> Result<ProposalPayload, AppError> {
        queries::find_payload(self.conn(), proposal_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn lead_approvals(&mut self, proposal_id: i64) -> Result<Vec<LeadApproval>, AppError> {
        Ok(queries::find_lead_approvals(self.conn(), proposal_id).await?)
    }

    async fn reviews(&mut self, proposal_id: i64) -> Result<Vec<Review>, AppError> {
        Ok(queries::find_reviews(self.conn(), proposal_id).await?)
    }

    async fn insert_proposal(
        &mut self,
        club_id: i64,
        submitter_email: &str,
        status: ProposalStatus,
        now: DateTime<Utc>,
    ) -> Result<Proposal, AppError> {
        Ok(queries::insert(self.conn(), club_id, submitter_email, status, now).await?)
    }

    async fn save_proposal(&mut self, proposal: &Proposal) -> Result<(), AppError> {
        match queries::update(self.conn(), proposal).await? {
            0 => Err(AppError::NotFound),
            _ => Ok(()),
        }
    }

    async fn replace_payload(&mut self, proposal_id: i64, payload: &ProposalPayload) -> Result<(), AppError> {
        Ok(queries::replace_payload(self.conn(), proposal_id, payload).await?)
    }

    async fn upsert_lead_approval(&mut self, approval: &LeadApproval) -> Result<(), AppError> {
        Ok(queries::upsert_lead_approval(self.conn(), approval).await?)
    }

    async fn reset_lead_approvals(&mut self, proposal_id: i64) -> Result<(), AppError> {
        Ok(queries::reset_lead_approvals(self.conn(), proposal_id).await?)
    }

    async fn upsert_review(&mut self, review: &Review) -> Result<(), AppError> {
        Ok(queries::upsert_review(self.conn(), review).await?)
    }

    async fn delete_proposal(&mut self, proposal_id: i64) -> Result<(), AppError> {
        Ok(queries::delete(self.conn(), proposal_id).await?)
    }

    async fn purge_archived(
        &mut self,
        club_id: i64,
        archived_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<i64>, AppError> {
        Ok(queries::delete_archived(self.conn(), club_id, archived_before).await?)
    }

    async fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), AppError> {
        Ok(audit::insert(self.conn(), entry).await?)
    }

    async fn audit_entries(&mut self, proposal_id: i64) -> Result<Vec<AuditEntry>, AppError> {
        Ok(audit::find_for_proposal(self.conn(), proposal_id).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        Ok(self.tx.commit().await?)
    }
}
