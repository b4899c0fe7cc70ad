//! Persistence seam for the workflow engine.
//!
//! Every engine operation opens one `StoreTx`, does all of its reads and
//! writes through it, and calls `commit`. A transaction dropped without
//! `commit` must leave storage exactly as it was.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::directory::RoleDirectory;
use crate::errors::AppError;
use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::models::proposal::{LeadApproval, Proposal, ProposalPayload, ProposalStatus, Review};

/// Which proposals a listing should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalFilter {
    /// Restrict to these clubs. `None` means every club.
    pub club_ids: Option<Vec<i64>>,
    /// Restrict to these statuses. `None` means every status.
    pub statuses: Option<Vec<ProposalStatus>>,
    /// Archived proposals instead of active ones.
    pub archived: bool,
}

impl ProposalFilter {
    pub fn matches(&self, proposal: &Proposal) -> bool {
        if proposal.archived_at.is_some() != self.archived {
            return false;
        }
        if let Some(clubs) = &self.club_ids {
            if !clubs.contains(&proposal.club_id) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&proposal.status) {
                return false;
            }
        }
        true
    }
}

/// Proposal storage plus the role directory that lives beside it.
#[async_trait]
pub trait ProposalStore: RoleDirectory {
    /// Open a transaction with serializable isolation.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Load a proposal and lock it against concurrent writers until commit.
    async fn lock_proposal(&mut self, id: i64) -> Result<Option<Proposal>, AppError>;

    async fn list_proposals(&mut self, filter: &ProposalFilter) -> Result<Vec<Proposal>, AppError>;

    async fn load_payload(&mut self, proposal_id: i64) -> Result<ProposalPayload, AppError>;

    async fn lead_approvals(&mut self, proposal_id: i64) -> Result<Vec<LeadApproval>, AppError>;

    async fn reviews(&mut self, proposal_id: i64) -> Result<Vec<Review>, AppError>;

    async fn insert_proposal(
        &mut self,
        club_id: i64,
        submitter_email: &str,
        status: ProposalStatus,
        now: DateTime<Utc>,
    ) -> Result<Proposal, AppError>;

    /// Persist status, `archived_at`, `resubmission_count` and `updated_at`.
    async fn save_proposal(&mut self, proposal: &Proposal) -> Result<(), AppError>;

    /// Replace the whole descriptive payload.
    async fn replace_payload(&mut self, proposal_id: i64, payload: &ProposalPayload) -> Result<(), AppError>;

    /// Insert or update keyed by (proposal_id, lead_role).
    async fn upsert_lead_approval(&mut self, approval: &LeadApproval) -> Result<(), AppError>;

    /// Set every lead row of the proposal back to unapproved, no comment.
    async fn reset_lead_approvals(&mut self, proposal_id: i64) -> Result<(), AppError>;

    /// Insert or update keyed by (proposal_id, reviewer_role).
    /// `created_at` is kept from the first insert.
    async fn upsert_review(&mut self, review: &Review) -> Result<(), AppError>;

    /// Hard delete with all dependent rows.
    async fn delete_proposal(&mut self, proposal_id: i64) -> Result<(), AppError>;

    /// Hard delete archived proposals of a club archived strictly before
    /// `archived_before` (all archived ones when `None`). Returns purged ids.
    async fn purge_archived(
        &mut self,
        club_id: i64,
        archived_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<i64>, AppError>;

    async fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), AppError>;

    async fn audit_entries(&mut self, proposal_id: i64) -> Result<Vec<AuditEntry>, AppError>;

    /// Make the transaction's writes visible and release its locks.
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
