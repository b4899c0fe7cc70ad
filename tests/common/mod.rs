//! Shared test infrastructure for workflow and API tests.
//!
//! # Fixture
//! - `setup()` - In-memory store with club 1 fully staffed (president, VP,
//!   secretary), club 2 with its own president and VP, one Student Union
//!   member and one Director, wired to a recording notifier.
//! - `setup_with_notifier()` - Same roles, caller-supplied notifier.

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use clubflow::auth::context::{AuthorizationContext, ClubRole, Identity, SystemRole};
use clubflow::models::proposal::{
    Contact, EventDetails, LeadDecisionForm, LeadRole, NewProposal, Occurrence, ProposalPayload,
};
use clubflow::notify::{Notification, NotificationKind, Notifier, NotifyError};
use clubflow::workflow::{MemoryStore, WorkflowEngine};

// ============================================================================
// TEST CONSTANTS
// ============================================================================

pub const CLUB: i64 = 1;
pub const OTHER_CLUB: i64 = 2;

pub const PRESIDENT: &str = "pres@club.test";
pub const VP: &str = "vp@club.test";
pub const SECRETARY: &str = "sec@club.test";
pub const OTHER_PRESIDENT: &str = "pres@other.test";
pub const OTHER_VP: &str = "vp@other.test";
pub const STUDENT_UNION: &str = "su@uni.test";
pub const DIRECTOR: &str = "director@uni.test";

// ============================================================================
// NOTIFIERS
// ============================================================================

/// Keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, to: &str) -> Vec<NotificationKind> {
        self.sent()
            .into_iter()
            .filter(|n| n.to == to)
            .map(|n| n.kind)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Fails every delivery.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError("mail relay down".to_string()))
    }
}

/// Records like `RecordingNotifier` but blocks the calling thread per send,
/// the way a synchronous mail relay would.
pub struct SlowNotifier {
    pub delay: std::time::Duration,
    pub inner: RecordingNotifier,
}

impl SlowNotifier {
    pub fn new(delay: std::time::Duration) -> Self {
        Self { delay, inner: RecordingNotifier::default() }
    }
}

impl Notifier for SlowNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        std::thread::sleep(self.delay);
        self.inner.send(notification)
    }
}

// ============================================================================
// SETUP
// ============================================================================

pub struct TestApp {
    pub store: MemoryStore,
    pub engine: WorkflowEngine,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    /// Authorization context for a verified user, roles from the store.
    pub async fn ctx(&self, email: &str) -> AuthorizationContext {
        self.engine
            .authorize(Some(Identity { email: email.to_string(), verified: true }))
            .await
            .expect("authorize")
    }

    /// Create a proposal for `CLUB` as its president.
    pub async fn submit(&self) -> i64 {
        let pres = self.ctx(PRESIDENT).await;
        self.engine
            .create_proposal(&pres, new_proposal(Some(CLUB)))
            .await
            .expect("create proposal")
            .id
    }

    /// Create a proposal and walk it through both leads to PENDING.
    pub async fn submit_to_pending(&self) -> i64 {
        let id = self.submit().await;
        let vp = self.ctx(VP).await;
        let sec = self.ctx(SECRETARY).await;
        self.engine
            .record_lead_decision(&vp, id, approve(LeadRole::Vp))
            .await
            .expect("vp approves");
        self.engine
            .record_lead_decision(&sec, id, approve(LeadRole::Secretary))
            .await
            .expect("secretary approves");
        id
    }
}

async fn seed_roles(store: &MemoryStore) {
    store.grant_club_role(PRESIDENT, CLUB, ClubRole::President).await;
    store.grant_club_role(VP, CLUB, ClubRole::Vp).await;
    store.grant_club_role(SECRETARY, CLUB, ClubRole::Secretary).await;
    store.grant_club_role(OTHER_PRESIDENT, OTHER_CLUB, ClubRole::President).await;
    store.grant_club_role(OTHER_VP, OTHER_CLUB, ClubRole::Vp).await;
    store.grant_system_role(STUDENT_UNION, SystemRole::StudentUnion).await;
    store.grant_system_role(DIRECTOR, SystemRole::Director).await;
}

pub async fn setup() -> TestApp {
    let store = MemoryStore::new();
    seed_roles(&store).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = WorkflowEngine::new(Arc::new(store.clone()), notifier.clone());
    TestApp { store, engine, notifier }
}

pub async fn setup_with_notifier(notifier: Arc<dyn Notifier>) -> (MemoryStore, WorkflowEngine) {
    let store = MemoryStore::new();
    seed_roles(&store).await;
    let engine = WorkflowEngine::new(Arc::new(store.clone()), notifier);
    (store, engine)
}

// ============================================================================
// PAYLOADS AND FORMS
// ============================================================================

pub fn slot(day: u32, from_hour: u32, to_hour: u32) -> Occurrence {
    Occurrence {
        starts_at: Utc.with_ymd_and_hms(2026, 11, day, from_hour, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2026, 11, day, to_hour, 0, 0).unwrap(),
    }
}

pub fn payload(title: &str) -> ProposalPayload {
    ProposalPayload {
        event: EventDetails {
            title: title.to_string(),
            description: "Evening of short talks".to_string(),
            venue: "Main hall".to_string(),
            expected_attendance: Some(80),
            estimated_budget_cents: Some(25_000),
        },
        occurrences: vec![slot(20, 18, 20), slot(21, 18, 20)],
        contacts: vec![Contact {
            name: "Pat President".to_string(),
            email: PRESIDENT.to_string(),
            phone: None,
        }],
        collaborators: Vec::new(),
        guests: Vec::new(),
    }
}

pub fn new_proposal(club_id: Option<i64>) -> NewProposal {
    NewProposal { club_id, payload: payload("Lightning talks") }
}

pub fn approve(role: LeadRole) -> LeadDecisionForm {
    LeadDecisionForm { lead_role: role, approved: true, comments: None }
}

pub fn reject(role: LeadRole, comments: &str) -> LeadDecisionForm {
    LeadDecisionForm {
        lead_role: role,
        approved: false,
        comments: Some(comments.to_string()),
    }
}

pub fn days_ago(days: i64) -> chrono::DateTime<Utc> {
    Utc::now() - Duration::days(days)
}
