use crate::errors::AppError;
use super::types::{Occurrence, ProposalPayload};

/// Validate an event title: required, max 200 chars.
pub fn validate_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Some("Event title is required".to_string());
    }
    if trimmed.chars().count() > 200 {
        return Some("Event title must be at most 200 characters".to_string());
    }
    None
}

/// Validate a contact email: must contain '@', max 254 chars.
pub fn validate_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Some("Contact email is required".to_string());
    }
    if trimmed.len() > 254 {
        return Some("Contact email must be at most 254 characters".to_string());
    }
    if !trimmed.contains('@') {
        return Some(format!("'{trimmed}' is not a valid email address"));
    }
    None
}

/// At least one slot, each ending after it starts, none overlapping.
/// Slots that merely touch (one ends exactly when the next starts) are fine.
pub fn validate_occurrences(occurrences: &[Occurrence]) -> Option<String> {
    if occurrences.is_empty() {
        return Some("At least one event occurrence is required".to_string());
    }
    if let Some(bad) = occurrences.iter().find(|o| o.starts_at >= o.ends_at) {
        return Some(format!(
            "Occurrence starting {} must end after it starts",
            bad.starts_at.to_rfc3339()
        ));
    }

    let mut sorted: Vec<&Occurrence> = occurrences.iter().collect();
    sorted.sort_by_key(|o| o.starts_at);
    for pair in sorted.windows(2) {
        if pair[1].starts_at < pair[0].ends_at {
            return Some(format!(
                "Occurrences starting {} and {} overlap",
                pair[0].starts_at.to_rfc3339(),
                pair[1].starts_at.to_rfc3339()
            ));
        }
    }
    None
}

/// Full payload check, run before any storage access.
pub fn validate_payload(payload: &ProposalPayload) -> Result<(), AppError> {
    let mut errors: Vec<String> = Vec::new();

    errors.extend(validate_title(&payload.event.title));
    errors.extend(validate_occurrences(&payload.occurrences));
    if payload.event.expected_attendance.is_some_and(|n| n < 0) {
        errors.push("Expected attendance cannot be negative".to_string());
    }
    if payload.event.estimated_budget_cents.is_some_and(|n| n < 0) {
        errors.push("Estimated budget cannot be negative".to_string());
    }
    for contact in &payload.contacts {
        if contact.name.trim().is_empty() {
            errors.push("Contact name is required".to_string());
        }
        errors.extend(validate_email(&contact.email));
    }
    if payload.collaborators.iter().any(|c| c.club_name.trim().is_empty()) {
        errors.push("Collaborator club name is required".to_string());
    }
    if payload.guests.iter().any(|g| g.name.trim().is_empty()) {
        errors.push("Guest name is required".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn slot(start_hour: u32, end_hour: u32) -> Occurrence {
        let day = Utc.with_ymd_and_hms(2026, 11, 2, 0, 0, 0).unwrap();
        Occurrence {
            starts_at: day + Duration::hours(start_hour as i64),
            ends_at: day + Duration::hours(end_hour as i64),
        }
    }

    #[test]
    fn occurrences_must_exist() {
        assert!(validate_occurrences(&[]).is_some());
    }

    #[test]
    fn occurrence_must_end_after_start() {
        assert!(validate_occurrences(&[slot(10, 10)]).is_some());
        assert!(validate_occurrences(&[slot(12, 10)]).is_some());
    }

    #[test]
    fn overlapping_occurrences_rejected_in_any_order() {
        assert!(validate_occurrences(&[slot(14, 16), slot(10, 15)]).is_some());
        assert!(validate_occurrences(&[slot(10, 12), slot(12, 14)]).is_none());
    }

    #[test]
    fn emails_and_titles() {
        assert!(validate_email("pres@club.test").is_none());
        assert!(validate_email("nobody").is_some());
        assert!(validate_title("  ").is_some());
        assert!(validate_title("Spring Gala").is_none());
    }
}
