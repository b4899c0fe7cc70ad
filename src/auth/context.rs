//! Capability-scoped authorization context.
//!
//! Roles are resolved once per request from the role directory and carried
//! through every workflow operation as an `AuthorizationContext`. The engine
//! never consults the directory for the acting user again, so tests can build
//! contexts by hand.
//!
//! ## Scoping
//!
//! ```text
//! system roles : ADMIN | DIRECTOR | STUDENT_UNION          (institution-wide)
//! club roles   : (club_id, PRESIDENT | VP | SECRETARY)     (per club)
//! ```
//!
//! A club-scoped check against a club the actor holds no role in reports
//! `NotFound`, so a caller cannot probe which proposals exist in other clubs.
//! Holding some role in the club but not the required one reports `Forbidden`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::proposal::LeadRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemRole {
    Admin,
    Director,
    StudentUnion,
}

impl SystemRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Admin => "ADMIN",
            SystemRole::Director => "DIRECTOR",
            SystemRole::StudentUnion => "STUDENT_UNION",
        }
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(SystemRole::Admin),
            "DIRECTOR" => Ok(SystemRole::Director),
            "STUDENT_UNION" => Ok(SystemRole::StudentUnion),
            other => Err(format!("unknown system role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClubRole {
    President,
    Vp,
    Secretary,
}

impl ClubRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClubRole::President => "PRESIDENT",
            ClubRole::Vp => "VP",
            ClubRole::Secretary => "SECRETARY",
        }
    }

    /// The lead role this club role signs off as, if any.
    pub fn as_lead(&self) -> Option<LeadRole> {
        match self {
            ClubRole::President => None,
            ClubRole::Vp => Some(LeadRole::Vp),
            ClubRole::Secretary => Some(LeadRole::Secretary),
        }
    }
}

impl From<LeadRole> for ClubRole {
    fn from(role: LeadRole) -> Self {
        match role {
            LeadRole::Vp => ClubRole::Vp,
            LeadRole::Secretary => ClubRole::Secretary,
        }
    }
}

impl fmt::Display for ClubRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClubRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRESIDENT" => Ok(ClubRole::President),
            "VP" => Ok(ClubRole::Vp),
            "SECRETARY" => Ok(ClubRole::Secretary),
            other => Err(format!("unknown club role '{other}'")),
        }
    }
}

/// Verified identity supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub verified: bool,
}

/// Everything the role directory knows about one email address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    pub system_roles: BTreeSet<SystemRole>,
    pub club_roles: BTreeSet<(i64, ClubRole)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub email: String,
    roles: RoleSet,
}

impl AuthorizationContext {
    pub fn new(email: impl Into<String>, roles: RoleSet) -> Self {
        Self { email: email.into(), roles }
    }

    pub fn has_system_role(&self, role: SystemRole) -> bool {
        self.roles.system_roles.contains(&role)
    }

    pub fn has_club_role(&self, club_id: i64, role: ClubRole) -> bool {
        self.roles.club_roles.contains(&(club_id, role))
    }

    /// Any role at all in the given club.
    pub fn is_member_of(&self, club_id: i64) -> bool {
        self.roles.club_roles.iter().any(|(id, _)| *id == club_id)
    }

    /// Clubs in which the actor holds `role`.
    pub fn clubs_with_role(&self, role: ClubRole) -> Vec<i64> {
        self.roles
            .club_roles
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Clubs in which the actor holds any role.
    pub fn clubs(&self) -> Vec<i64> {
        let ids: BTreeSet<i64> = self.roles.club_roles.iter().map(|(id, _)| *id).collect();
        ids.into_iter().collect()
    }

    pub fn require_system_role(&self, role: SystemRole) -> Result<(), AppError> {
        if self.has_system_role(role) {
            Ok(())
        } else {
            log::warn!("{} denied: requires system role {}", self.email, role);
            Err(AppError::Forbidden(format!("requires the {role} role")))
        }
    }

    /// Club-scoped guard. Non-members get `NotFound`, members without the
    /// role get `Forbidden`.
    pub fn require_club_role(&self, club_id: i64, role: ClubRole) -> Result<(), AppError> {
        if self.has_club_role(club_id, role) {
            return Ok(());
        }
        if !self.is_member_of(club_id) {
            log::warn!("{} denied: not a member of club {}", self.email, club_id);
            return Err(AppError::NotFound);
        }
        log::warn!("{} denied: requires {} of club {}", self.email, role, club_id);
        Err(AppError::Forbidden(format!("requires the club {role} role")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(club_roles: &[(i64, ClubRole)], system_roles: &[SystemRole]) -> AuthorizationContext {
        AuthorizationContext::new(
            "someone@uni.test",
            RoleSet {
                system_roles: system_roles.iter().copied().collect(),
                club_roles: club_roles.iter().copied().collect(),
            },
        )
    }

    #[test]
    fn club_guard_hides_foreign_clubs() {
        let vp_of_a = ctx(&[(1, ClubRole::Vp)], &[]);
        assert!(vp_of_a.require_club_role(1, ClubRole::Vp).is_ok());
        assert!(matches!(vp_of_a.require_club_role(2, ClubRole::Vp), Err(AppError::NotFound)));
        assert!(matches!(
            vp_of_a.require_club_role(1, ClubRole::President),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn system_guard() {
        let director = ctx(&[], &[SystemRole::Director]);
        assert!(director.require_system_role(SystemRole::Director).is_ok());
        assert!(matches!(
            director.require_system_role(SystemRole::StudentUnion),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn clubs_with_role_lists_each_club_once() {
        let c = ctx(&[(3, ClubRole::President), (1, ClubRole::President), (1, ClubRole::Vp)], &[]);
        assert_eq!(c.clubs_with_role(ClubRole::President), vec![1, 3]);
        assert_eq!(c.clubs(), vec![1, 3]);
    }
}
