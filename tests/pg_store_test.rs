//! PostgreSQL adapter tests. They run only when DATABASE_URL points at a
//! scratch database; otherwise each test returns immediately.

mod common;

use std::sync::Arc;

use clubflow::auth::context::Identity;
use clubflow::errors::AppError;
use clubflow::models::proposal::{LeadRole, NewProposal, ProposalStatus};
use clubflow::models::role;
use clubflow::notify::LogNotifier;
use clubflow::workflow::rules::{self, Action};
use clubflow::workflow::{PgStore, WorkflowEngine};
use clubflow::db;
use common::{approve, payload, reject};

struct PgFixture {
    engine: WorkflowEngine,
    club: i64,
    president: String,
    vp: String,
    secretary: String,
}

/// Unique club id and emails per test so runs never collide.
async fn setup(tag: &str) -> Option<PgFixture> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = db::init_pool(&url, 4).await.expect("connect");
    db::run_migrations(&pool).await.expect("migrate");

    let club = chrono::Utc::now().timestamp_micros() * 10 + (tag.len() as i64 % 10);
    let president = format!("pres-{tag}-{club}@pg.test");
    let vp = format!("vp-{tag}-{club}@pg.test");
    let secretary = format!("sec-{tag}-{club}@pg.test");
    role::assign(&pool, &president, "PRESIDENT", Some(club)).await.expect("assign");
    role::assign(&pool, &vp, "VP", Some(club)).await.expect("assign");
    role::assign(&pool, &secretary, "SECRETARY", Some(club)).await.expect("assign");

    let engine = WorkflowEngine::new(Arc::new(PgStore::new(pool)), Arc::new(LogNotifier));
    Some(PgFixture { engine, club, president, vp, secretary })
}

async fn ctx(engine: &WorkflowEngine, email: &str) -> clubflow::auth::context::AuthorizationContext {
    engine
        .authorize(Some(Identity { email: email.to_string(), verified: true }))
        .await
        .expect("authorize")
}

#[tokio::test]
async fn test_pg_lead_flow_and_reset() {
    let Some(fx) = setup("flow").await else {
        return;
    };
    let pres = ctx(&fx.engine, &fx.president).await;
    let vp = ctx(&fx.engine, &fx.vp).await;
    let sec = ctx(&fx.engine, &fx.secretary).await;

    let created = fx
        .engine
        .create_proposal(&pres, NewProposal { club_id: Some(fx.club), payload: payload("PG night") })
        .await
        .expect("create");
    let id = created.id;

    let p = fx.engine.record_lead_decision(&vp, id, approve(LeadRole::Vp)).await.expect("vp");
    assert_eq!(p.status, ProposalStatus::LeadReview);
    let p = fx
        .engine
        .record_lead_decision(&sec, id, reject(LeadRole::Secretary, "missing budget"))
        .await
        .expect("sec");
    assert_eq!(p.status, ProposalStatus::LeadRejected);

    let p = fx.engine.resubmit(&pres, id).await.expect("resubmit");
    assert_eq!(p.status, ProposalStatus::LeadReview);
    assert_eq!(p.resubmission_count, 1);

    let detail = fx.engine.get_proposal(&pres, id).await.expect("detail");
    assert_eq!(detail.payload.event.title, "PG night");
    assert_eq!(detail.payload.occurrences.len(), 2);
    assert_eq!(detail.lead_approvals.len(), 2);
    assert!(detail.lead_approvals.iter().all(|l| !l.approved && l.comments.is_none()));
    assert!(detail.editable);

    let trail = fx.engine.audit_trail(&pres, id).await.expect("audit");
    assert_eq!(trail.len(), 4);
}

#[tokio::test]
async fn test_pg_failed_edit_rolls_back() {
    let Some(fx) = setup("rollback").await else {
        return;
    };
    let pres = ctx(&fx.engine, &fx.president).await;
    let vp = ctx(&fx.engine, &fx.vp).await;
    let sec = ctx(&fx.engine, &fx.secretary).await;
    let id = fx
        .engine
        .create_proposal(&pres, NewProposal { club_id: None, payload: payload("Original") })
        .await
        .expect("create")
        .id;
    fx.engine.record_lead_decision(&vp, id, approve(LeadRole::Vp)).await.expect("vp");
    fx.engine.record_lead_decision(&sec, id, approve(LeadRole::Secretary)).await.expect("sec");

    let err = fx.engine.edit_proposal(&pres, id, payload("Changed")).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let detail = fx.engine.get_proposal(&pres, id).await.expect("detail");
    assert_eq!(detail.proposal.status, ProposalStatus::Pending);
    assert_eq!(detail.payload.event.title, "Original");
}

#[tokio::test]
async fn test_pg_archive_and_empty() {
    let Some(fx) = setup("archive").await else {
        return;
    };
    let pres = ctx(&fx.engine, &fx.president).await;
    let id = fx
        .engine
        .create_proposal(&pres, NewProposal { club_id: Some(fx.club), payload: payload("Old") })
        .await
        .expect("create")
        .id;
    fx.engine.archive(&pres, id).await.expect("archive");

    let archived = fx.engine.list_archived(&pres, Some(fx.club)).await.expect("list");
    assert_eq!(archived.iter().map(|p| p.id).collect::<Vec<_>>(), vec![id]);

    let deleted = fx.engine.empty_archive(&pres, Some(fx.club)).await.expect("empty");
    assert_eq!(deleted, vec![id]);
    let err = fx.engine.get_proposal(&pres, id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_concurrent_lead_decisions_stay_consistent() {
    let Some(fx) = setup("concurrent").await else {
        return;
    };
    let pres = ctx(&fx.engine, &fx.president).await;
    let vp = ctx(&fx.engine, &fx.vp).await;
    let sec = ctx(&fx.engine, &fx.secretary).await;
    let id = fx
        .engine
        .create_proposal(&pres, NewProposal { club_id: Some(fx.club), payload: payload("Race") })
        .await
        .expect("create")
        .id;

    let (vp_engine, sec_engine) = (fx.engine.clone(), fx.engine.clone());
    let (vp_ctx, sec_ctx) = (vp.clone(), sec.clone());
    let vp_task = tokio::spawn(async move {
        vp_engine.record_lead_decision(&vp_ctx, id, approve(LeadRole::Vp)).await
    });
    let sec_task = tokio::spawn(async move {
        sec_engine.record_lead_decision(&sec_ctx, id, approve(LeadRole::Secretary)).await
    });
    let (vp_result, sec_result) = tokio::join!(vp_task, sec_task);
    let vp_result = vp_result.expect("join");
    let sec_result = sec_result.expect("join");

    // A serialization failure comes back as a storage error, never a
    // partial write.
    assert!(vp_result.is_ok() || sec_result.is_ok());
    for result in [&vp_result, &sec_result] {
        if let Err(e) = result {
            assert!(matches!(e, AppError::Db(_)), "unexpected error {e:?}");
        }
    }
    let detail = fx.engine.get_proposal(&pres, id).await.expect("detail");
    let recomputed = rules::next_status(ProposalStatus::LeadReview, &detail.lead_approvals, Action::LeadDecision)
        .expect("recompute");
    assert_eq!(detail.proposal.status, recomputed);

    if vp_result.is_err() {
        fx.engine.record_lead_decision(&vp, id, approve(LeadRole::Vp)).await.expect("vp retry");
    }
    if sec_result.is_err() {
        fx.engine.record_lead_decision(&sec, id, approve(LeadRole::Secretary)).await.expect("sec retry");
    }
    let detail = fx.engine.get_proposal(&pres, id).await.expect("detail");
    assert_eq!(detail.proposal.status, ProposalStatus::Pending);
    assert!(detail.lead_approvals.iter().all(|l| l.approved));
}
