//! Best-effort status-change notifications.
//!
//! Delivery happens after the transaction that caused it has committed.
//! A failed delivery is logged and dropped; it never reaches the caller of
//! the workflow operation.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Submitted,
    LeadRejected,
    ForwardedToStudentUnion,
    StudentUnionApproved,
    StudentUnionRejected,
    DirectorApproved,
    DirectorRejected,
    Resubmitted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Submitted => "submitted",
            NotificationKind::LeadRejected => "lead_rejected",
            NotificationKind::ForwardedToStudentUnion => "forwarded_to_student_union",
            NotificationKind::StudentUnionApproved => "student_union_approved",
            NotificationKind::StudentUnionRejected => "student_union_rejected",
            NotificationKind::DirectorApproved => "director_approved",
            NotificationKind::DirectorRejected => "director_rejected",
            NotificationKind::Resubmitted => "resubmitted",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub to: String,
    pub kind: NotificationKind,
    pub proposal_id: i64,
    pub context: serde_json::Value,
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Notification error: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Outbound channel (email in production).
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        log::info!("notify {} [{}] proposal {}: {}", n.to, n.kind, n.proposal_id, n.context);
        Ok(())
    }
}

/// Send one notification, swallowing and logging any failure.
/// Returns whether it was handed off successfully.
pub fn deliver(notifier: &dyn Notifier, notification: &Notification) -> bool {
    match notifier.send(notification) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(
                "dropping {} notification for proposal {} to {}: {}",
                notification.kind,
                notification.proposal_id,
                notification.to,
                e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Notifier for Broken {
        fn send(&self, _: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError("smtp unreachable".to_string()))
        }
    }

    fn sample() -> Notification {
        Notification {
            to: "pres@club.test".to_string(),
            kind: NotificationKind::LeadRejected,
            proposal_id: 7,
            context: serde_json::json!({ "status": "LEAD_REJECTED" }),
        }
    }

    #[test]
    fn deliver_reports_failure_without_panicking() {
        assert!(!deliver(&Broken, &sample()));
        assert!(deliver(&LogNotifier, &sample()));
    }
}
