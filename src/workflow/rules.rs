//! Pure decision rules of the proposal state machine.
//!
//! Nothing in here touches storage. The engine loads decision records inside
//! a transaction, asks these functions for the next status, and writes the
//! answer back before committing.

use chrono::{DateTime, Duration, Utc};

use crate::errors::AppError;
use crate::models::proposal::{LeadApproval, ProposalStatus};

/// Minimum number of approved lead rows before a proposal leaves lead review.
pub const LEAD_QUORUM: usize = 2;

/// Student Union recommendation label that approves a proposal.
pub const RECOMMENDED: &str = "Recommended";

/// Director decision label that approves a proposal.
pub const APPROVED: &str = "Approved";

/// How long an archived proposal survives before the sweep purges it.
pub fn archive_retention() -> Duration {
    Duration::days(2)
}

/// Statuses in which the president may still change the event payload.
pub const EDITABLE_STATUSES: [ProposalStatus; 6] = [
    ProposalStatus::LeadReview,
    ProposalStatus::LeadApproved,
    ProposalStatus::LeadRejected,
    ProposalStatus::SuRejected,
    ProposalStatus::DirectorRejected,
    ProposalStatus::ResubmissionRequired,
];

/// Statuses a resubmission is accepted from.
pub const RESUBMITTABLE_STATUSES: [ProposalStatus; 4] = [
    ProposalStatus::LeadRejected,
    ProposalStatus::SuRejected,
    ProposalStatus::DirectorRejected,
    ProposalStatus::ResubmissionRequired,
];

/// Result of folding the lead approval rows together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadOutcome {
    Rejected,
    Approved,
    Waiting,
}

/// A transition request, evaluated after its decision record has been
/// written (lead decisions) or alongside it (reviewer decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    LeadDecision,
    StudentUnionDecision { recommendation: &'a str },
    DirectorDecision { approval: &'a str },
    Resubmit,
}

/// Fold lead rows into an outcome. A rejection wins over anything still
/// outstanding; approval needs every row approved and at least
/// `LEAD_QUORUM` rows.
pub fn aggregate_lead_approvals(approvals: &[LeadApproval]) -> LeadOutcome {
    if approvals.iter().any(LeadApproval::is_rejection) {
        return LeadOutcome::Rejected;
    }
    if approvals.len() >= LEAD_QUORUM && approvals.iter().all(|a| a.approved) {
        return LeadOutcome::Approved;
    }
    LeadOutcome::Waiting
}

/// Next status for `action` given the current status and the lead rows as
/// they stand after the action's own write.
pub fn next_status(
    current: ProposalStatus,
    lead_approvals: &[LeadApproval],
    action: Action<'_>,
) -> Result<ProposalStatus, AppError> {
    match action {
        Action::LeadDecision => {
            require_status(current, &[ProposalStatus::LeadReview])?;
            Ok(match aggregate_lead_approvals(lead_approvals) {
                LeadOutcome::Rejected => ProposalStatus::LeadRejected,
                LeadOutcome::Approved => ProposalStatus::Pending,
                LeadOutcome::Waiting => ProposalStatus::LeadReview,
            })
        }
        Action::StudentUnionDecision { recommendation } => {
            require_status(current, &[ProposalStatus::Pending])?;
            if recommendation == RECOMMENDED {
                Ok(ProposalStatus::SuApproved)
            } else {
                Ok(ProposalStatus::SuRejected)
            }
        }
        Action::DirectorDecision { approval } => {
            require_status(current, &[ProposalStatus::SuApproved])?;
            if approval == APPROVED {
                Ok(ProposalStatus::DirectorApproved)
            } else {
                Ok(ProposalStatus::DirectorRejected)
            }
        }
        Action::Resubmit => resubmission_target(current),
    }
}

/// Where a resubmitted proposal re-enters review.
pub fn resubmission_target(current: ProposalStatus) -> Result<ProposalStatus, AppError> {
    require_status(current, &RESUBMITTABLE_STATUSES)?;
    if current == ProposalStatus::LeadRejected {
        Ok(ProposalStatus::LeadReview)
    } else {
        Ok(ProposalStatus::Pending)
    }
}

/// Only a lead-stage rejection sends the proposal back through the leads.
pub fn resubmission_resets_leads(current: ProposalStatus) -> bool {
    current == ProposalStatus::LeadRejected
}

pub fn is_editable(status: ProposalStatus) -> bool {
    EDITABLE_STATUSES.contains(&status)
}

pub fn require_editable(status: ProposalStatus) -> Result<(), AppError> {
    require_status(status, &EDITABLE_STATUSES)
}

/// Archived proposals with `archived_at` strictly before this instant are
/// past retention and get purged.
pub fn retention_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - archive_retention()
}

/// Negative decisions must say why.
pub fn require_comments(approved: bool, comments: Option<&str>) -> Result<(), AppError> {
    if approved || comments.is_some_and(|c| !c.trim().is_empty()) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "comments are required when rejecting a proposal".to_string(),
        ))
    }
}

fn require_status(current: ProposalStatus, allowed: &[ProposalStatus]) -> Result<(), AppError> {
    if allowed.contains(&current) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(ProposalStatus::as_str).collect();
    Err(AppError::InvalidState(format!(
        "proposal is {current}; allowed only when {}",
        names.join(", ")
    )))
}
