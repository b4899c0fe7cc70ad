//! Transactional workflow operations.
//!
//! Each operation follows the same shape: check what can be checked without
//! storage (roles that do not depend on the proposal, input validation),
//! open a transaction, lock the proposal, check club scope, write the
//! decision record, re-read the decision records, ask `rules` for the next
//! status, persist it with an audit entry, commit, then notify.

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::audit;
use crate::auth::context::{AuthorizationContext, ClubRole, Identity, SystemRole};
use crate::auth::directory;
use crate::errors::AppError;
use crate::models::audit::AuditEntry;
use crate::models::proposal::validate::validate_payload;
use crate::models::proposal::{
    DirectorDecisionForm, LeadApproval, LeadDecisionForm, NewProposal, Proposal, ProposalDetail,
    ProposalPayload, ProposalStatus, Review, ReviewerRole, StudentUnionDecisionForm,
};
use crate::notify::{self, Notification, NotificationKind, Notifier};
use super::rules::{self, Action};
use super::store::{ProposalFilter, ProposalStore, StoreTx};

/// Statuses the Student Union works with.
const STUDENT_UNION_VIEW: [ProposalStatus; 5] = [
    ProposalStatus::Pending,
    ProposalStatus::SuApproved,
    ProposalStatus::SuRejected,
    ProposalStatus::DirectorApproved,
    ProposalStatus::DirectorRejected,
];

/// Statuses the Director works with.
const DIRECTOR_VIEW: [ProposalStatus; 3] = [
    ProposalStatus::SuApproved,
    ProposalStatus::DirectorApproved,
    ProposalStatus::DirectorRejected,
];

/// Who a post-commit notification goes to, resolved after commit.
#[derive(Debug, Clone)]
enum Audience {
    Email(String),
    SystemRole(SystemRole),
    ClubLeads(i64),
}

#[derive(Debug, Clone)]
struct Notice {
    audience: Audience,
    kind: NotificationKind,
    proposal_id: i64,
    context: serde_json::Value,
}

impl Notice {
    fn new(audience: Audience, kind: NotificationKind, proposal: &Proposal) -> Self {
        Self {
            audience,
            kind,
            proposal_id: proposal.id,
            context: json!({ "status": proposal.status, "club_id": proposal.club_id }),
        }
    }
}

#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn ProposalStore>,
    notifier: Arc<dyn Notifier>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn ProposalStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Resolve the request identity into an authorization context.
    pub async fn authorize(&self, identity: Option<Identity>) -> Result<AuthorizationContext, AppError> {
        directory::authorize(self.store.as_ref(), identity).await
    }

    // -----------------------------------------------------------------------
    // Submission and reads
    // -----------------------------------------------------------------------

    /// Create a proposal at LEAD_REVIEW and seed one unapproved lead row per
    /// staffed lead position of the club.
    pub async fn create_proposal(
        &self,
        ctx: &AuthorizationContext,
        input: NewProposal,
    ) -> Result<Proposal, AppError> {
        let club_id = president_club(ctx, input.club_id)?;
        validate_payload(&input.payload)?;
        let leads = self.store.club_leads(club_id).await?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let proposal = tx
            .insert_proposal(club_id, &ctx.email, ProposalStatus::LeadReview, now)
            .await?;
        tx.replace_payload(proposal.id, &input.payload).await?;
        for (lead_role, lead_email) in &leads {
            tx.upsert_lead_approval(&LeadApproval {
                proposal_id: proposal.id,
                lead_role: *lead_role,
                lead_email: lead_email.clone(),
                approved: false,
                comments: None,
            })
            .await?;
        }
        let seeded: Vec<&str> = leads.iter().map(|(role, _)| role.as_str()).collect();
        audit::log(
            &mut *tx,
            &ctx.email,
            "proposal.created",
            proposal.id,
            json!({ "club_id": club_id, "lead_roles": seeded }),
        )
        .await?;
        tx.commit().await?;

        log::info!("proposal {}: created for club {} by {}", proposal.id, club_id, ctx.email);
        self.dispatch(vec![Notice::new(
            Audience::ClubLeads(club_id),
            NotificationKind::Submitted,
            &proposal,
        )])
        .await;
        Ok(proposal)
    }

    /// Proposal with payload, decision records and the edit affordance.
    pub async fn get_proposal(&self, ctx: &AuthorizationContext, id: i64) -> Result<ProposalDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let proposal = load(&mut *tx, id).await?;
        require_visible(ctx, &proposal)?;
        let payload = tx.load_payload(id).await?;
        let lead_approvals = tx.lead_approvals(id).await?;
        let reviews = tx.reviews(id).await?;
        tx.commit().await?;

        let editable = rules::is_editable(proposal.status)
            && proposal.archived_at.is_none()
            && ctx.has_club_role(proposal.club_id, ClubRole::President);
        Ok(ProposalDetail {
            proposal,
            payload,
            lead_approvals,
            reviews,
            editable,
        })
    }

    /// Active proposals the actor works with: their clubs' proposals plus
    /// the review stages of their system roles. Newest first.
    pub async fn list_proposals(&self, ctx: &AuthorizationContext) -> Result<Vec<Proposal>, AppError> {
        let mut filters = Vec::new();
        let clubs = ctx.clubs();
        if !clubs.is_empty() {
            filters.push(ProposalFilter {
                club_ids: Some(clubs),
                ..Default::default()
            });
        }
        if ctx.has_system_role(SystemRole::StudentUnion) {
            filters.push(ProposalFilter {
                statuses: Some(STUDENT_UNION_VIEW.to_vec()),
                ..Default::default()
            });
        }
        if ctx.has_system_role(SystemRole::Director) {
            filters.push(ProposalFilter {
                statuses: Some(DIRECTOR_VIEW.to_vec()),
                ..Default::default()
            });
        }

        let mut tx = self.store.begin().await?;
        let mut found: BTreeMap<i64, Proposal> = BTreeMap::new();
        for filter in &filters {
            for proposal in tx.list_proposals(filter).await? {
                found.insert(proposal.id, proposal);
            }
        }
        tx.commit().await?;

        let mut proposals: Vec<Proposal> = found.into_values().collect();
        proposals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(proposals)
    }

    pub async fn audit_trail(&self, ctx: &AuthorizationContext, id: i64) -> Result<Vec<AuditEntry>, AppError> {
        let mut tx = self.store.begin().await?;
        let proposal = load(&mut *tx, id).await?;
        require_visible(ctx, &proposal)?;
        let entries = tx.audit_entries(id).await?;
        tx.commit().await?;
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    /// Record a VP or Secretary decision and recompute the lead-stage status.
    pub async fn record_lead_decision(
        &self,
        ctx: &AuthorizationContext,
        id: i64,
        form: LeadDecisionForm,
    ) -> Result<Proposal, AppError> {
        let role = ClubRole::from(form.lead_role);
        if ctx.clubs_with_role(role).is_empty() {
            log::warn!("{} denied: holds no {} position", ctx.email, role);
            return Err(AppError::Forbidden(format!("requires the club {role} role")));
        }
        let comments = normalize(form.comments);
        rules::require_comments(form.approved, comments.as_deref())?;

        let mut tx = self.store.begin().await?;
        let mut proposal = load(&mut *tx, id).await?;
        ctx.require_club_role(proposal.club_id, role)?;
        require_active(&proposal)?;

        tx.upsert_lead_approval(&LeadApproval {
            proposal_id: id,
            lead_role: form.lead_role,
            lead_email: ctx.email.clone(),
            approved: form.approved,
            comments: comments.clone(),
        })
        .await?;
        let approvals = tx.lead_approvals(id).await?;
        let from = proposal.status;
        let to = rules::next_status(from, &approvals, Action::LeadDecision)?;

        proposal.status = to;
        proposal.updated_at = Utc::now();
        tx.save_proposal(&proposal).await?;
        audit::log(
            &mut *tx,
            &ctx.email,
            "proposal.lead_decision",
            id,
            json!({
                "lead_role": form.lead_role,
                "approved": form.approved,
                "comments": comments,
                "from": from,
                "to": to,
            }),
        )
        .await?;
        tx.commit().await?;

        log_transition(&proposal, from);
        let notices = match to {
            ProposalStatus::LeadRejected => vec![Notice::new(
                Audience::Email(proposal.submitter_email.clone()),
                NotificationKind::LeadRejected,
                &proposal,
            )],
            ProposalStatus::Pending => forwarded_notices(&proposal),
            _ => Vec::new(),
        };
        self.dispatch(notices).await;
        Ok(proposal)
    }

    /// Record the Student Union recommendation on a PENDING proposal.
    pub async fn record_student_union_decision(
        &self,
        ctx: &AuthorizationContext,
        id: i64,
        form: StudentUnionDecisionForm,
    ) -> Result<Proposal, AppError> {
        ctx.require_system_role(SystemRole::StudentUnion)?;
        let recommendation = form.recommendation.trim().to_string();
        if recommendation.is_empty() {
            return Err(AppError::Validation("recommendation is required".to_string()));
        }
        let approved = recommendation == rules::RECOMMENDED;
        let comments = normalize(form.comments);
        rules::require_comments(approved, comments.as_deref())?;

        let action = Action::StudentUnionDecision { recommendation: &recommendation };
        let proposal = self
            .apply_review(ctx, id, ReviewerRole::StudentUnion, &recommendation, approved, comments, action)
            .await?;

        let notices = if approved {
            vec![
                Notice::new(
                    Audience::Email(proposal.submitter_email.clone()),
                    NotificationKind::StudentUnionApproved,
                    &proposal,
                ),
                Notice::new(
                    Audience::SystemRole(SystemRole::Director),
                    NotificationKind::StudentUnionApproved,
                    &proposal,
                ),
            ]
        } else {
            vec![Notice::new(
                Audience::Email(proposal.submitter_email.clone()),
                NotificationKind::StudentUnionRejected,
                &proposal,
            )]
        };
        self.dispatch(notices).await;
        Ok(proposal)
    }

    /// Record the Director decision on an SU_APPROVED proposal.
    pub async fn record_director_decision(
        &self,
        ctx: &AuthorizationContext,
        id: i64,
        form: DirectorDecisionForm,
    ) -> Result<Proposal, AppError> {
        ctx.require_system_role(SystemRole::Director)?;
        let approval = form.approval.trim().to_string();
        if approval.is_empty() {
            return Err(AppError::Validation("approval decision is required".to_string()));
        }
        let approved = approval == rules::APPROVED;
        let comments = normalize(form.comments);
        rules::require_comments(approved, comments.as_deref())?;

        let action = Action::DirectorDecision { approval: &approval };
        let proposal = self
            .apply_review(ctx, id, ReviewerRole::Director, &approval, approved, comments, action)
            .await?;

        let kind = if approved {
            NotificationKind::DirectorApproved
        } else {
            NotificationKind::DirectorRejected
        };
        self.dispatch(vec![Notice::new(
            Audience::Email(proposal.submitter_email.clone()),
            kind,
            &proposal,
        )])
        .await;
        Ok(proposal)
    }

    /// Shared body of the two reviewer decisions: upsert the review row and
    /// move the status in one transaction.
    #[allow(clippy::too_many_arguments)]
    async fn apply_review(
        &self,
        ctx: &AuthorizationContext,
        id: i64,
        reviewer_role: ReviewerRole,
        recommendation: &str,
        approved: bool,
        comments: Option<String>,
        action: Action<'_>,
    ) -> Result<Proposal, AppError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut proposal = load(&mut *tx, id).await?;
        require_active(&proposal)?;
        let from = proposal.status;
        let lead_approvals = tx.lead_approvals(id).await?;
        let to = rules::next_status(from, &lead_approvals, action)?;

        tx.upsert_review(&Review {
            proposal_id: id,
            reviewer_role,
            reviewer_email: ctx.email.clone(),
            recommendation: recommendation.to_string(),
            comments: comments.clone(),
            approved,
            created_at: now,
            updated_at: now,
        })
        .await?;
        proposal.status = to;
        proposal.updated_at = now;
        tx.save_proposal(&proposal).await?;
        audit::log(
            &mut *tx,
            &ctx.email,
            "proposal.review",
            id,
            json!({
                "reviewer_role": reviewer_role,
                "recommendation": recommendation,
                "approved": approved,
                "comments": comments,
                "from": from,
                "to": to,
            }),
        )
        .await?;
        tx.commit().await?;

        log_transition(&proposal, from);
        Ok(proposal)
    }

    /// Send a rejected proposal back into review. A lead-stage rejection
    /// clears the lead rows and returns to LEAD_REVIEW; any later rejection
    /// returns straight to PENDING.
    pub async fn resubmit(&self, ctx: &AuthorizationContext, id: i64) -> Result<Proposal, AppError> {
        let mut tx = self.store.begin().await?;
        let mut proposal = load(&mut *tx, id).await?;
        ctx.require_club_role(proposal.club_id, ClubRole::President)?;
        require_active(&proposal)?;

        let from = proposal.status;
        let lead_approvals = tx.lead_approvals(id).await?;
        let to = rules::next_status(from, &lead_approvals, Action::Resubmit)?;
        let reset = rules::resubmission_resets_leads(from);
        if reset {
            tx.reset_lead_approvals(id).await?;
        }
        proposal.status = to;
        proposal.resubmission_count += 1;
        proposal.updated_at = Utc::now();
        tx.save_proposal(&proposal).await?;
        audit::log(
            &mut *tx,
            &ctx.email,
            "proposal.resubmitted",
            id,
            json!({
                "from": from,
                "to": to,
                "lead_approvals_reset": reset,
                "resubmission_count": proposal.resubmission_count,
            }),
        )
        .await?;
        tx.commit().await?;

        log_transition(&proposal, from);
        let audience = if to == ProposalStatus::LeadReview {
            Audience::ClubLeads(proposal.club_id)
        } else {
            Audience::SystemRole(SystemRole::StudentUnion)
        };
        self.dispatch(vec![Notice::new(audience, NotificationKind::Resubmitted, &proposal)])
            .await;
        Ok(proposal)
    }

    // -----------------------------------------------------------------------
    // President housekeeping
    // -----------------------------------------------------------------------

    /// Replace the descriptive payload. Status is untouched.
    pub async fn edit_proposal(
        &self,
        ctx: &AuthorizationContext,
        id: i64,
        payload: ProposalPayload,
    ) -> Result<Proposal, AppError> {
        validate_payload(&payload)?;

        let mut tx = self.store.begin().await?;
        let mut proposal = load(&mut *tx, id).await?;
        ctx.require_club_role(proposal.club_id, ClubRole::President)?;
        require_active(&proposal)?;
        rules::require_editable(proposal.status)?;

        tx.replace_payload(id, &payload).await?;
        proposal.updated_at = Utc::now();
        tx.save_proposal(&proposal).await?;
        audit::log(
            &mut *tx,
            &ctx.email,
            "proposal.edited",
            id,
            json!({ "status": proposal.status, "title": payload.event.title }),
        )
        .await?;
        tx.commit().await?;

        log::info!("proposal {}: payload edited by {}", id, ctx.email);
        Ok(proposal)
    }

    pub async fn archive(&self, ctx: &AuthorizationContext, id: i64) -> Result<Proposal, AppError> {
        let mut tx = self.store.begin().await?;
        let mut proposal = load(&mut *tx, id).await?;
        ctx.require_club_role(proposal.club_id, ClubRole::President)?;
        if sweep(&mut *tx, ctx, proposal.club_id).await?.contains(&id) {
            tx.commit().await?;
            return Err(AppError::NotFound);
        }
        if proposal.archived_at.is_some() {
            return Err(AppError::InvalidState("proposal is already archived".to_string()));
        }

        let now = Utc::now();
        proposal.archived_at = Some(now);
        proposal.updated_at = now;
        tx.save_proposal(&proposal).await?;
        audit::log(&mut *tx, &ctx.email, "proposal.archived", id, json!({ "status": proposal.status }))
            .await?;
        tx.commit().await?;

        log::info!("proposal {}: archived by {}", id, ctx.email);
        Ok(proposal)
    }

    pub async fn restore(&self, ctx: &AuthorizationContext, id: i64) -> Result<Proposal, AppError> {
        let mut tx = self.store.begin().await?;
        let mut proposal = load(&mut *tx, id).await?;
        ctx.require_club_role(proposal.club_id, ClubRole::President)?;
        if sweep(&mut *tx, ctx, proposal.club_id).await?.contains(&id) {
            tx.commit().await?;
            return Err(AppError::NotFound);
        }
        if proposal.archived_at.is_none() {
            return Err(AppError::InvalidState("proposal is not archived".to_string()));
        }

        proposal.archived_at = None;
        proposal.updated_at = Utc::now();
        tx.save_proposal(&proposal).await?;
        audit::log(&mut *tx, &ctx.email, "proposal.restored", id, json!({ "status": proposal.status }))
            .await?;
        tx.commit().await?;

        log::info!("proposal {}: restored by {}", id, ctx.email);
        Ok(proposal)
    }

    /// Archived proposals of the president's club, after the retention sweep.
    pub async fn list_archived(
        &self,
        ctx: &AuthorizationContext,
        club_id: Option<i64>,
    ) -> Result<Vec<Proposal>, AppError> {
        let club_id = president_club(ctx, club_id)?;
        let mut tx = self.store.begin().await?;
        sweep(&mut *tx, ctx, club_id).await?;
        let archived = tx
            .list_proposals(&ProposalFilter {
                club_ids: Some(vec![club_id]),
                statuses: None,
                archived: true,
            })
            .await?;
        tx.commit().await?;
        Ok(archived)
    }

    /// Hard delete every archived proposal of the club, ignoring retention.
    pub async fn empty_archive(
        &self,
        ctx: &AuthorizationContext,
        club_id: Option<i64>,
    ) -> Result<Vec<i64>, AppError> {
        let club_id = president_club(ctx, club_id)?;
        let mut tx = self.store.begin().await?;
        let purged = tx.purge_archived(club_id, None).await?;
        for id in &purged {
            audit::log(&mut *tx, &ctx.email, "proposal.deleted", *id, json!({ "reason": "empty_archive" }))
                .await?;
        }
        tx.commit().await?;

        log::info!("club {}: archive emptied by {} ({} proposals)", club_id, ctx.email, purged.len());
        Ok(purged)
    }

    /// Permanent delete. Presidents may delete their club's archived
    /// proposals; the Director may delete DIRECTOR_APPROVED ones.
    pub async fn delete_permanently(&self, ctx: &AuthorizationContext, id: i64) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let proposal = load(&mut *tx, id).await?;

        let president = ctx.has_club_role(proposal.club_id, ClubRole::President);
        let director = ctx.has_system_role(SystemRole::Director);
        if president && sweep(&mut *tx, ctx, proposal.club_id).await?.contains(&id) {
            tx.commit().await?;
            return Ok(());
        }

        let reason = if president && proposal.archived_at.is_some() {
            "archived"
        } else if director && proposal.status == ProposalStatus::DirectorApproved {
            "director_approved"
        } else if president {
            return Err(AppError::InvalidState(
                "only archived proposals can be permanently deleted".to_string(),
            ));
        } else if director {
            return Err(AppError::InvalidState(format!(
                "proposal is {}; the Director may only delete {}",
                proposal.status,
                ProposalStatus::DirectorApproved
            )));
        } else if ctx.is_member_of(proposal.club_id) {
            return Err(AppError::Forbidden("requires the club PRESIDENT role".to_string()));
        } else {
            return Err(AppError::NotFound);
        };

        tx.delete_proposal(id).await?;
        audit::log(&mut *tx, &ctx.email, "proposal.deleted", id, json!({ "reason": reason, "status": proposal.status }))
            .await?;
        tx.commit().await?;

        log::info!("proposal {}: permanently deleted by {} ({})", id, ctx.email, reason);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Post-commit hook
    // -----------------------------------------------------------------------

    /// Resolve audiences and hand notifications to the notifier. Runs only
    /// after commit; every failure is logged and swallowed.
    async fn dispatch(&self, notices: Vec<Notice>) {
        for notice in notices {
            let recipients = match &notice.audience {
                Audience::Email(email) => Ok(vec![email.clone()]),
                Audience::SystemRole(role) => self.store.emails_with_system_role(*role).await,
                Audience::ClubLeads(club_id) => self
                    .store
                    .club_leads(*club_id)
                    .await
                    .map(|leads| leads.into_iter().map(|(_, email)| email).collect()),
            };
            let recipients = match recipients {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("cannot resolve recipients for {} on proposal {}: {}", notice.kind, notice.proposal_id, e);
                    continue;
                }
            };
            for to in recipients {
                notify::deliver(
                    self.notifier.as_ref(),
                    &Notification {
                        to,
                        kind: notice.kind,
                        proposal_id: notice.proposal_id,
                        context: notice.context.clone(),
                    },
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load(tx: &mut dyn StoreTx, id: i64) -> Result<Proposal, AppError> {
    tx.lock_proposal(id).await?.ok_or(AppError::NotFound)
}

/// Purge the club's archived proposals that are past retention.
async fn sweep(tx: &mut dyn StoreTx, ctx: &AuthorizationContext, club_id: i64) -> Result<Vec<i64>, AppError> {
    let cutoff = rules::retention_cutoff(Utc::now());
    let purged = tx.purge_archived(club_id, Some(cutoff)).await?;
    for id in &purged {
        audit::log(tx, &ctx.email, "proposal.deleted", *id, json!({ "reason": "retention" })).await?;
    }
    if !purged.is_empty() {
        log::info!("club {}: retention sweep purged {} proposals", club_id, purged.len());
    }
    Ok(purged)
}

/// Club a president acts for. Without an explicit club the actor must
/// preside over exactly one.
fn president_club(ctx: &AuthorizationContext, requested: Option<i64>) -> Result<i64, AppError> {
    if let Some(club_id) = requested {
        ctx.require_club_role(club_id, ClubRole::President)?;
        return Ok(club_id);
    }
    match ctx.clubs_with_role(ClubRole::President).as_slice() {
        [] => {
            log::warn!("{} denied: not a club president", ctx.email);
            Err(AppError::Forbidden("requires the club PRESIDENT role".to_string()))
        }
        [club_id] => Ok(*club_id),
        _ => Err(AppError::Validation(
            "club_id is required when presiding over several clubs".to_string(),
        )),
    }
}

fn require_visible(ctx: &AuthorizationContext, proposal: &Proposal) -> Result<(), AppError> {
    if ctx.is_member_of(proposal.club_id)
        || ctx.has_system_role(SystemRole::StudentUnion)
        || ctx.has_system_role(SystemRole::Director)
    {
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}

fn require_active(proposal: &Proposal) -> Result<(), AppError> {
    if proposal.archived_at.is_some() {
        return Err(AppError::InvalidState("proposal is archived; restore it first".to_string()));
    }
    Ok(())
}

fn normalize(comments: Option<String>) -> Option<String> {
    comments
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn forwarded_notices(proposal: &Proposal) -> Vec<Notice> {
    vec![
        Notice::new(
            Audience::Email(proposal.submitter_email.clone()),
            NotificationKind::ForwardedToStudentUnion,
            proposal,
        ),
        Notice::new(
            Audience::SystemRole(SystemRole::StudentUnion),
            NotificationKind::ForwardedToStudentUnion,
            proposal,
        ),
    ]
}

fn log_transition(proposal: &Proposal, from: ProposalStatus) {
    if proposal.status == from {
        log::info!("proposal {}: {} (unchanged)", proposal.id, from);
    } else {
        log::info!("proposal {}: {} -> {}", proposal.id, from, proposal.status);
    }
}
