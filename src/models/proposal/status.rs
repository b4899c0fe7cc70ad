use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review stage a proposal is currently in.
///
/// The string form (`LEAD_REVIEW`, `PENDING`, ...) is what gets persisted in
/// `proposals.status` and what the JSON API emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    LeadReview,
    LeadApproved,
    LeadRejected,
    /// Awaiting Student Union.
    Pending,
    SuApproved,
    SuRejected,
    DirectorApproved,
    DirectorRejected,
    ResubmissionRequired,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 9] = [
        ProposalStatus::LeadReview,
        ProposalStatus::LeadApproved,
        ProposalStatus::LeadRejected,
        ProposalStatus::Pending,
        ProposalStatus::SuApproved,
        ProposalStatus::SuRejected,
        ProposalStatus::DirectorApproved,
        ProposalStatus::DirectorRejected,
        ProposalStatus::ResubmissionRequired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::LeadReview => "LEAD_REVIEW",
            ProposalStatus::LeadApproved => "LEAD_APPROVED",
            ProposalStatus::LeadRejected => "LEAD_REJECTED",
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::SuApproved => "SU_APPROVED",
            ProposalStatus::SuRejected => "SU_REJECTED",
            ProposalStatus::DirectorApproved => "DIRECTOR_APPROVED",
            ProposalStatus::DirectorRejected => "DIRECTOR_REJECTED",
            ProposalStatus::ResubmissionRequired => "RESUBMISSION_REQUIRED",
        }
    }


    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::DirectorApproved)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProposalStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown proposal status '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_parses_back() {
        for status in ProposalStatus::ALL {
            assert_eq!(status.as_str().parse::<ProposalStatus>(), Ok(status));
        }
        assert!("draft".parse::<ProposalStatus>().is_err());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ProposalStatus::SuApproved).unwrap();
        assert_eq!(json, "\"SU_APPROVED\"");
        let back: ProposalStatus = serde_json::from_str("\"RESUBMISSION_REQUIRED\"").unwrap();
        assert_eq!(back, ProposalStatus::ResubmissionRequired);
    }

    #[test]
    fn only_director_approval_is_terminal() {
        let terminal: Vec<_> = ProposalStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![ProposalStatus::DirectorApproved]);
    }
}
