use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::status::ProposalStatus;
use super::types::*;

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

#[derive(sqlx::FromRow)]
struct ProposalRow {
    id: i64,
    club_id: i64,
    submitter_email: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    archived_at: Option<DateTime<Utc>>,
    resubmission_count: i32,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = sqlx::Error;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        Ok(Proposal {
            id: row.id,
            club_id: row.club_id,
            submitter_email: row.submitter_email,
            status: row.status.parse().map_err(decode_err)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            archived_at: row.archived_at,
            resubmission_count: row.resubmission_count,
        })
    }
}

const SELECT_PROPOSAL: &str = "SELECT id, club_id, submitter_email, status, created_at, updated_at, \
                                      archived_at, resubmission_count \
                               FROM proposals";

/// Load one proposal and hold a row lock on it until the transaction ends.
pub async fn find_for_update(conn: &mut PgConnection, id: i64) -> Result<Option<Proposal>, sqlx::Error> {
    let sql = format!("{SELECT_PROPOSAL} WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, ProposalRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    row.map(Proposal::try_from).transpose()
}

/// List proposals, newest first. `None` filters match everything.
pub async fn find_filtered(
    conn: &mut PgConnection,
    club_ids: Option<&[i64]>,
    statuses: Option<&[ProposalStatus]>,
    archived: bool,
) -> Result<Vec<Proposal>, sqlx::Error> {
    let status_codes: Option<Vec<String>> =
        statuses.map(|s| s.iter().map(|st| st.as_str().to_string()).collect());

    let sql = format!(
        "{SELECT_PROPOSAL} \
         WHERE ($1::BIGINT[] IS NULL OR club_id = ANY($1)) \
           AND ($2::TEXT[] IS NULL OR status = ANY($2)) \
           AND (archived_at IS NOT NULL) = $3 \
         ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, ProposalRow>(&sql)
        .bind(club_ids.map(|ids| ids.to_vec()))
        .bind(status_codes)
        .bind(archived)
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(Proposal::try_from).collect()
}

pub async fn insert(
    conn: &mut PgConnection,
    club_id: i64,
    submitter_email: &str,
    status: ProposalStatus,
    now: DateTime<Utc>,
) -> Result<Proposal, sqlx::Error> {
    let row = sqlx::query_as::<_, ProposalRow>(
        "INSERT INTO proposals (club_id, submitter_email, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $4) \
         RETURNING id, club_id, submitter_email, status, created_at, updated_at, \
                   archived_at, resubmission_count",
    )
    .bind(club_id)
    .bind(submitter_email)
    .bind(status.as_str())
    .bind(now)
    .fetch_one(conn)
    .await?;
    Proposal::try_from(row)
}

/// Write back the mutable columns of a proposal.
pub async fn update(conn: &mut PgConnection, proposal: &Proposal) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE proposals \
         SET status = $1, updated_at = $2, archived_at = $3, resubmission_count = $4 \
         WHERE id = $5",
    )
    .bind(proposal.status.as_str())
    .bind(proposal.updated_at)
    .bind(proposal.archived_at)
    .bind(proposal.resubmission_count)
    .bind(proposal.id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM proposals WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Delete archived proposals of a club. With a cutoff only those archived
/// strictly before it go. Child rows cascade.
pub async fn delete_archived(
    conn: &mut PgConnection,
    club_id: i64,
    archived_before: Option<DateTime<Utc>>,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "DELETE FROM proposals \
         WHERE club_id = $1 \
           AND archived_at IS NOT NULL \
           AND ($2::TIMESTAMPTZ IS NULL OR archived_at < $2) \
         RETURNING id",
    )
    .bind(club_id)
    .bind(archived_before)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct EventRow {
    title: String,
    description: String,
    venue: String,
    expected_attendance: Option<i32>,
    estimated_budget_cents: Option<i64>,
}

pub async fn find_payload(conn: &mut PgConnection, proposal_id: i64) -> Result<Option<ProposalPayload>, sqlx::Error> {
    let event = sqlx::query_as::<_, EventRow>(
        "SELECT title, description, venue, expected_attendance, estimated_budget_cents \
         FROM proposal_events WHERE proposal_id = $1",
    )
    .bind(proposal_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(event) = event else {
        return Ok(None);
    };

    let occurrences: Vec<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
        "SELECT starts_at, ends_at FROM event_occurrences WHERE proposal_id = $1 ORDER BY starts_at, id",
    )
    .bind(proposal_id)
    .fetch_all(&mut *conn)
    .await?;

    let contacts: Vec<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT name, email, phone FROM proposal_contacts WHERE proposal_id = $1 ORDER BY id",
    )
    .bind(proposal_id)
    .fetch_all(&mut *conn)
    .await?;

    let collaborators: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT club_name, details FROM proposal_collaborators WHERE proposal_id = $1 ORDER BY id",
    )
    .bind(proposal_id)
    .fetch_all(&mut *conn)
    .await?;

    let guests: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT name, affiliation FROM proposal_guests WHERE proposal_id = $1 ORDER BY id",
    )
    .bind(proposal_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(ProposalPayload {
        event: EventDetails {
            title: event.title,
            description: event.description,
            venue: event.venue,
            expected_attendance: event.expected_attendance,
            estimated_budget_cents: event.estimated_budget_cents,
        },
        occurrences: occurrences
            .into_iter()
            .map(|(starts_at, ends_at)| Occurrence { starts_at, ends_at })
            .collect(),
        contacts: contacts
            .into_iter()
            .map(|(name, email, phone)| Contact { name, email, phone })
            .collect(),
        collaborators: collaborators
            .into_iter()
            .map(|(club_name, details)| Collaborator { club_name, details })
            .collect(),
        guests: guests
            .into_iter()
            .map(|(name, affiliation)| Guest { name, affiliation })
            .collect(),
    }))
}

/// Replace the event row and every child list of a proposal.
pub async fn replace_payload(
    conn: &mut PgConnection,
    proposal_id: i64,
    payload: &ProposalPayload,
) -> Result<(), sqlx::Error> {
    let event = &payload.event;
    sqlx::query(
        "INSERT INTO proposal_events \
             (proposal_id, title, description, venue, expected_attendance, estimated_budget_cents) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (proposal_id) DO UPDATE SET \
             title = EXCLUDED.title, \
             description = EXCLUDED.description, \
             venue = EXCLUDED.venue, \
             expected_attendance = EXCLUDED.expected_attendance, \
             estimated_budget_cents = EXCLUDED.estimated_budget_cents",
    )
    .bind(proposal_id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.venue)
    .bind(event.expected_attendance)
    .bind(event.estimated_budget_cents)
    .execute(&mut *conn)
    .await?;

    for table in ["event_occurrences", "proposal_contacts", "proposal_collaborators", "proposal_guests"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE proposal_id = $1"))
            .bind(proposal_id)
            .execute(&mut *conn)
            .await?;
    }

    for o in &payload.occurrences {
        sqlx::query("INSERT INTO event_occurrences (proposal_id, starts_at, ends_at) VALUES ($1, $2, $3)")
            .bind(proposal_id)
            .bind(o.starts_at)
            .bind(o.ends_at)
            .execute(&mut *conn)
            .await?;
    }
    for c in &payload.contacts {
        sqlx::query("INSERT INTO proposal_contacts (proposal_id, name, email, phone) VALUES ($1, $2, $3, $4)")
            .bind(proposal_id)
            .bind(&c.name)
            .bind(&c.email)
            .bind(&c.phone)
            .execute(&mut *conn)
            .await?;
    }
    for c in &payload.collaborators {
        sqlx::query("INSERT INTO proposal_collaborators (proposal_id, club_name, details) VALUES ($1, $2, $3)")
            .bind(proposal_id)
            .bind(&c.club_name)
            .bind(&c.details)
            .execute(&mut *conn)
            .await?;
    }
    for g in &payload.guests {
        sqlx::query("INSERT INTO proposal_guests (proposal_id, name, affiliation) VALUES ($1, $2, $3)")
            .bind(proposal_id)
            .bind(&g.name)
            .bind(&g.affiliation)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Decision records
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct LeadApprovalRow {
    proposal_id: i64,
    lead_role: String,
    lead_email: String,
    approved: bool,
    comments: Option<String>,
}

/// Lead rows of a proposal, VP first.
pub async fn find_lead_approvals(conn: &mut PgConnection, proposal_id: i64) -> Result<Vec<LeadApproval>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LeadApprovalRow>(
        "SELECT proposal_id, lead_role, lead_email, approved, comments \
         FROM lead_approvals WHERE proposal_id = $1 \
         ORDER BY CASE lead_role WHEN 'VP' THEN 0 ELSE 1 END",
    )
    .bind(proposal_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(LeadApproval {
                proposal_id: r.proposal_id,
                lead_role: r.lead_role.parse().map_err(decode_err)?,
                lead_email: r.lead_email,
                approved: r.approved,
                comments: r.comments,
            })
        })
        .collect()
}

pub async fn upsert_lead_approval(conn: &mut PgConnection, approval: &LeadApproval) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO lead_approvals (proposal_id, lead_role, lead_email, approved, comments) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (proposal_id, lead_role) DO UPDATE SET \
             lead_email = EXCLUDED.lead_email, \
             approved = EXCLUDED.approved, \
             comments = EXCLUDED.comments",
    )
    .bind(approval.proposal_id)
    .bind(approval.lead_role.as_str())
    .bind(&approval.lead_email)
    .bind(approval.approved)
    .bind(&approval.comments)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn reset_lead_approvals(conn: &mut PgConnection, proposal_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE lead_approvals SET approved = FALSE, comments = NULL WHERE proposal_id = $1")
        .bind(proposal_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    proposal_id: i64,
    reviewer_role: String,
    reviewer_email: String,
    recommendation: String,
    comments: Option<String>,
    approved: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Review rows of a proposal, Student Union first.
pub async fn find_reviews(conn: &mut PgConnection, proposal_id: i64) -> Result<Vec<Review>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        "SELECT proposal_id, reviewer_role, reviewer_email, recommendation, comments, approved, \
                created_at, updated_at \
         FROM reviews WHERE proposal_id = $1 \
         ORDER BY CASE reviewer_role WHEN 'STUDENT_UNION' THEN 0 ELSE 1 END",
    )
    .bind(proposal_id)
    .fetch_all(conn)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(Review {
                proposal_id: r.proposal_id,
                reviewer_role: r.reviewer_role.parse().map_err(decode_err)?,
                reviewer_email: r.reviewer_email,
                recommendation: r.recommendation,
                comments: r.comments,
                approved: r.approved,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
        })
        .collect()
}

pub async fn upsert_review(conn: &mut PgConnection, review: &Review) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reviews \
             (proposal_id, reviewer_role, reviewer_email, recommendation, comments, approved, \
              created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (proposal_id, reviewer_role) DO UPDATE SET \
             reviewer_email = EXCLUDED.reviewer_email, \
             recommendation = EXCLUDED.recommendation, \
             comments = EXCLUDED.comments, \
             approved = EXCLUDED.approved, \
             updated_at = EXCLUDED.updated_at",
    )
    .bind(review.proposal_id)
    .bind(review.reviewer_role.as_str())
    .bind(&review.reviewer_email)
    .bind(&review.recommendation)
    .bind(&review.comments)
    .bind(review.approved)
    .bind(review.created_at)
    .bind(review.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
