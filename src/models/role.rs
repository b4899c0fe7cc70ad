use sqlx::PgPool;

use crate::auth::context::{ClubRole, RoleSet, SystemRole};
use crate::models::proposal::LeadRole;

/// Load every role assigned to an email. Unknown role codes are skipped
/// with a warning rather than failing the request.
pub async fn find_roles_for_email(pool: &PgPool, email: &str) -> Result<RoleSet, sqlx::Error> {
    let rows: Vec<(String, Option<i64>)> = sqlx::query_as(
        "SELECT role, club_id FROM role_assignments WHERE lower(email) = lower($1)",
    )
    .bind(email)
    .fetch_all(pool)
    .await?;

    let mut roles = RoleSet::default();
    for (code, club_id) in rows {
        match club_id {
            None => match code.parse::<SystemRole>() {
                Ok(role) => {
                    roles.system_roles.insert(role);
                }
                Err(e) => log::warn!("role_assignments for {email}: {e}"),
            },
            Some(club_id) => match code.parse::<ClubRole>() {
                Ok(role) => {
                    roles.club_roles.insert((club_id, role));
                }
                Err(e) => log::warn!("role_assignments for {email}: {e}"),
            },
        }
    }
    Ok(roles)
}

/// Staffed VP/SECRETARY positions of a club. If a position has several
/// holders, the earliest assignment wins.
pub async fn find_club_leads(pool: &PgPool, club_id: i64) -> Result<Vec<(LeadRole, String)>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT DISTINCT ON (role) role, email \
         FROM role_assignments \
         WHERE club_id = $1 AND role IN ('VP', 'SECRETARY') \
         ORDER BY role, created_at, id",
    )
    .bind(club_id)
    .fetch_all(pool)
    .await?;

    let mut leads: Vec<(LeadRole, String)> = rows
        .into_iter()
        .filter_map(|(code, email)| code.parse::<LeadRole>().ok().map(|role| (role, email)))
        .collect();
    leads.sort();
    Ok(leads)
}

pub async fn find_emails_with_system_role(pool: &PgPool, role: SystemRole) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT email FROM role_assignments WHERE club_id IS NULL AND role = $1 ORDER BY email",
    )
    .bind(role.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Grant a role. Club roles need a `club_id`, system roles must not have one.
pub async fn assign(pool: &PgPool, email: &str, role: &str, club_id: Option<i64>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO role_assignments (email, role, club_id) VALUES ($1, $2, $3) \
         ON CONFLICT DO NOTHING",
    )
    .bind(email)
    .bind(role)
    .bind(club_id)
    .execute(pool)
    .await?;
    Ok(())
}
