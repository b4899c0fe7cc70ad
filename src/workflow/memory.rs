//! In-process store with the same transactional contract as PostgreSQL.
//!
//! Transactions are serialized through one async mutex. Each transaction
//! works on a copy of the state which replaces the shared state on commit;
//! dropping the transaction throws the copy away.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::auth::context::{ClubRole, RoleSet, SystemRole};
use crate::auth::directory::RoleDirectory;
use crate::errors::AppError;
use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::models::proposal::{
    LeadApproval, LeadRole, Proposal, ProposalPayload, ProposalStatus, Review, ReviewerRole,
};
use super::store::{ProposalFilter, ProposalStore, StoreTx};

#[derive(Debug, Clone, Default)]
struct State {
    last_proposal_id: i64,
    last_audit_id: i64,
    proposals: BTreeMap<i64, Proposal>,
    payloads: BTreeMap<i64, ProposalPayload>,
    lead_approvals: BTreeMap<(i64, LeadRole), LeadApproval>,
    reviews: BTreeMap<(i64, ReviewerRole), Review>,
    audit: Vec<AuditEntry>,
}

#[derive(Debug, Default)]
struct Directory {
    system_roles: BTreeSet<(String, SystemRole)>,
    club_roles: BTreeSet<(String, i64, ClubRole)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    directory: Arc<RwLock<Directory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant_system_role(&self, email: &str, role: SystemRole) {
        self.directory.write().await.system_roles.insert((email.to_string(), role));
    }

    pub async fn grant_club_role(&self, email: &str, club_id: i64, role: ClubRole) {
        self.directory
            .write()
            .await
            .club_roles
            .insert((email.to_string(), club_id, role));
    }

    pub async fn revoke_club_role(&self, email: &str, club_id: i64, role: ClubRole) {
        self.directory
            .write()
            .await
            .club_roles
            .remove(&(email.to_string(), club_id, role));
    }

    /// Committed view of one proposal.
    pub async fn proposal(&self, id: i64) -> Option<Proposal> {
        self.state.lock().await.proposals.get(&id).cloned()
    }

    /// Committed lead rows of one proposal, VP first.
    pub async fn lead_approvals(&self, proposal_id: i64) -> Vec<LeadApproval> {
        lead_rows(&*self.state.lock().await, proposal_id)
    }

    /// Backdate or clear `archived_at` outside the workflow, as an operator
    /// fixing data by hand would.
    pub async fn set_archived_at(&self, proposal_id: i64, archived_at: Option<DateTime<Utc>>) {
        if let Some(p) = self.state.lock().await.proposals.get_mut(&proposal_id) {
            p.archived_at = archived_at;
        }
    }
}

fn lead_rows(state: &State, proposal_id: i64) -> Vec<LeadApproval> {
    state
        .lead_approvals
        .range((proposal_id, LeadRole::Vp)..=(proposal_id, LeadRole::Secretary))
        .map(|(_, a)| a.clone())
        .collect()
}

#[async_trait]
impl RoleDirectory for MemoryStore {
    async fn roles_for(&self, email: &str) -> Result<RoleSet, AppError> {
        let directory = self.directory.read().await;
        Ok(RoleSet {
            system_roles: directory
                .system_roles
                .iter()
                .filter(|(e, _)| e == email)
                .map(|(_, r)| *r)
                .collect(),
            club_roles: directory
                .club_roles
                .iter()
                .filter(|(e, _, _)| e == email)
                .map(|(_, club, r)| (*club, *r))
                .collect(),
        })
    }

    async fn club_leads(&self, club_id: i64) -> Result<Vec<(LeadRole, String)>, AppError> {
        let directory = self.directory.read().await;
        let mut leads: Vec<(LeadRole, String)> = directory
            .club_roles
            .iter()
            .filter(|(_, club, _)| *club == club_id)
            .filter_map(|(email, _, role)| role.as_lead().map(|lead| (lead, email.clone())))
            .collect();
        leads.sort();
        leads.dedup_by_key(|(role, _)| *role);
        Ok(leads)
    }

    async fn emails_with_system_role(&self, role: SystemRole) -> Result<Vec<String>, AppError> {
        let directory = self.directory.read().await;
        Ok(directory
            .system_roles
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(e, _)| e.clone())
            .collect())
    }
}

#[async_trait]
impl ProposalStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_proposal(&mut self, id: i64) -> Result<Option<Proposal>, AppError> {
        Ok(self.working.proposals.get(&id).cloned())
    }

    async fn list_proposals(&mut self, filter: &ProposalFilter) -> Result<Vec<Proposal>, AppError> {
        Ok(self
            .working
            .proposals
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn load_payload(&mut self, proposal_id: i64) -> Result<ProposalPayload, AppError> {
        self.working
            .payloads
            .get(&proposal_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn lead_approvals(&mut self, proposal_id: i64) -> Result<Vec<LeadApproval>, AppError> {
        Ok(lead_rows(&self.working, proposal_id))
    }

    async fn reviews(&mut self, proposal_id: i64) -> Result<Vec<Review>, AppError> {
        Ok(self
            .working
            .reviews
            .range((proposal_id, ReviewerRole::StudentUnion)..=(proposal_id, ReviewerRole::Director))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn insert_proposal(
        &mut self,
        club_id: i64,
        submitter_email: &str,
        status: ProposalStatus,
        now: DateTime<Utc>,
    ) -> Result<Proposal, AppError> {
        self.working.last_proposal_id += 1;
        let proposal = Proposal {
            id: self.working.last_proposal_id,
            club_id,
            submitter_email: submitter_email.to_string(),
            status,
            created_at: now,
            updated_at: now,
            archived_at: None,
            resubmission_count: 0,
        };
        self.working.proposals.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    async fn save_proposal(&mut self, proposal: &Proposal) -> Result<(), AppError> {
        let stored = self
            .working
            .proposals
            .get_mut(&proposal.id)
            .ok_or(AppError::NotFound)?;
        stored.status = proposal.status;
        stored.updated_at = proposal.updated_at;
        stored.archived_at = proposal.archived_at;
        stored.resubmission_count = proposal.resubmission_count;
        Ok(())
    }

    async fn replace_payload(&mut self, proposal_id: i64, payload: &ProposalPayload) -> Result<(), AppError> {
        if !self.working.proposals.contains_key(&proposal_id) {
            return Err(AppError::NotFound);
        }
        self.working.payloads.insert(proposal_id, payload.clone());
        Ok(())
    }

    async fn upsert_lead_approval(&mut self, approval: &LeadApproval) -> Result<(), AppError> {
        self.working
            .lead_approvals
            .insert((approval.proposal_id, approval.lead_role), approval.clone());
        Ok(())
    }

    async fn reset_lead_approvals(&mut self, proposal_id: i64) -> Result<(), AppError> {
        for ((pid, _), approval) in self.working.lead_approvals.iter_mut() {
            if *pid == proposal_id {
                approval.approved = false;
                approval.comments = None;
            }
        }
        Ok(())
    }

    async fn upsert_review(&mut self, review: &Review) -> Result<(), AppError> {
        let key = (review.proposal_id, review.reviewer_role);
        let mut row = review.clone();
        if let Some(existing) = self.working.reviews.get(&key) {
            row.created_at = existing.created_at;
        }
        self.working.reviews.insert(key, row);
        Ok(())
    }

    async fn delete_proposal(&mut self, proposal_id: i64) -> Result<(), AppError> {
        let state = &mut self.working;
        state.proposals.remove(&proposal_id);
        state.payloads.remove(&proposal_id);
        state.lead_approvals.retain(|(pid, _), _| *pid != proposal_id);
        state.reviews.retain(|(pid, _), _| *pid != proposal_id);
        Ok(())
    }

    async fn purge_archived(
        &mut self,
        club_id: i64,
        archived_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<i64>, AppError> {
        let doomed: Vec<i64> = self
            .working
            .proposals
            .values()
            .filter(|p| p.club_id == club_id)
            .filter(|p| match (p.archived_at, archived_before) {
                (Some(at), Some(cutoff)) => at < cutoff,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .map(|p| p.id)
            .collect();
        for id in &doomed {
            self.delete_proposal(*id).await?;
        }
        Ok(doomed)
    }

    async fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), AppError> {
        self.working.last_audit_id += 1;
        self.working.audit.push(AuditEntry {
            id: self.working.last_audit_id,
            actor_email: entry.actor_email.clone(),
            action: entry.action.clone(),
            proposal_id: entry.proposal_id,
            details: entry.details.clone(),
            created_at: entry.created_at,
        });
        Ok(())
    }

    async fn audit_entries(&mut self, proposal_id: i64) -> Result<Vec<AuditEntry>, AppError> {
        Ok(self
            .working
            .audit
            .iter()
            .filter(|e| e.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
