use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::status::ProposalStatus;

/// Club officer role whose sign-off is needed before Student Union review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadRole {
    Vp,
    Secretary,
}

impl LeadRole {
    pub const ALL: [LeadRole; 2] = [LeadRole::Vp, LeadRole::Secretary];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadRole::Vp => "VP",
            LeadRole::Secretary => "SECRETARY",
        }
    }
}

impl fmt::Display for LeadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VP" => Ok(LeadRole::Vp),
            "SECRETARY" => Ok(LeadRole::Secretary),
            other => Err(format!("unknown lead role '{other}'")),
        }
    }
}

/// Institution-level reviewer that records a `Review` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewerRole {
    StudentUnion,
    Director,
}

impl ReviewerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewerRole::StudentUnion => "STUDENT_UNION",
            ReviewerRole::Director => "DIRECTOR",
        }
    }
}

impl fmt::Display for ReviewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STUDENT_UNION" => Ok(ReviewerRole::StudentUnion),
            "DIRECTOR" => Ok(ReviewerRole::Director),
            other => Err(format!("unknown reviewer role '{other}'")),
        }
    }
}

/// The workflow subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: i64,
    pub club_id: i64,
    pub submitter_email: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub resubmission_count: i32,
}

/// One row per (proposal, lead role). Seeded unapproved at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadApproval {
    pub proposal_id: i64,
    pub lead_role: LeadRole,
    pub lead_email: String,
    pub approved: bool,
    pub comments: Option<String>,
}

impl LeadApproval {
    /// An explicit rejection: unapproved with a non-blank comment.
    /// Seeded rows (unapproved, no comment) are still outstanding.
    pub fn is_rejection(&self) -> bool {
        !self.approved
            && self
                .comments
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty())
    }
}

/// Student Union or Director decision. One row per (proposal, reviewer role).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub proposal_id: i64,
    pub reviewer_role: ReviewerRole,
    pub reviewer_email: String,
    pub recommendation: String,
    pub comments: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub venue: String,
    pub expected_attendance: Option<i32>,
    pub estimated_budget_cents: Option<i64>,
}

/// A single date/time slot the event runs in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub club_name: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub name: String,
    pub affiliation: Option<String>,
}

/// Descriptive payload of a proposal. Not part of the state machine; only
/// editable while the editability gate allows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalPayload {
    pub event: EventDetails,
    pub occurrences: Vec<Occurrence>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    #[serde(default)]
    pub guests: Vec<Guest>,
}

/// Input for creating a proposal. `club_id` may be omitted when the
/// president leads exactly one club.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProposal {
    pub club_id: Option<i64>,
    #[serde(flatten)]
    pub payload: ProposalPayload,
}

/// Full proposal view returned by the detail endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalDetail {
    pub proposal: Proposal,
    pub payload: ProposalPayload,
    pub lead_approvals: Vec<LeadApproval>,
    pub reviews: Vec<Review>,
    pub editable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadDecisionForm {
    pub lead_role: LeadRole,
    pub approved: bool,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentUnionDecisionForm {
    pub recommendation: String,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectorDecisionForm {
    pub approval: String,
    pub comments: Option<String>,
}
