//! HTTP tests for /api/v1, run against the in-memory store.

mod common;

use actix_session::{Session, SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, test, web};
use serde_json::{Value, json};

use clubflow::auth::context::Identity;
use clubflow::auth::session::set_identity;
use clubflow::errors::AppError;
use clubflow::handlers;
use common::*;

/// Test-only sign-in: writes the identity the upstream login flow would.
async fn login(session: Session, body: web::Json<Value>) -> Result<HttpResponse, AppError> {
    let identity = Identity {
        email: body["email"].as_str().unwrap_or_default().to_string(),
        verified: body["verified"].as_bool().unwrap_or(true),
    };
    set_identity(&session, &identity)?;
    Ok(HttpResponse::Ok().finish())
}

macro_rules! app {
    ($engine:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[7u8; 64]))
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new($engine))
                .app_data(handlers::json_config())
                .route("/test/login", web::post().to(login))
                .service(web::scope("/api/v1").configure(handlers::api_v1::configure)),
        )
        .await
    };
}

macro_rules! sign_in {
    ($app:expr, $email:expr, $verified:expr) => {{
        let req = test::TestRequest::post()
            .uri("/test/login")
            .set_json(json!({ "email": $email, "verified": $verified }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie: Cookie<'static> = resp
            .response()
            .cookies()
            .next()
            .expect("session cookie")
            .into_owned();
        cookie
    }};
}

fn create_body() -> Value {
    json!({
        "club_id": CLUB,
        "event": {
            "title": "Board game night",
            "venue": "Room 4",
            "expected_attendance": 30,
            "estimated_budget_cents": 5000
        },
        "occurrences": [
            { "starts_at": "2026-11-20T18:00:00Z", "ends_at": "2026-11-20T22:00:00Z" }
        ],
        "contacts": [
            { "name": "Pat", "email": "pres@club.test", "phone": null }
        ]
    })
}

#[actix_rt::test]
async fn test_requires_session() {
    let app = setup().await;
    let svc = app!(app.engine.clone());

    let req = test::TestRequest::get().uri("/api/v1/proposals").to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "unauthenticated");
}

#[actix_rt::test]
async fn test_unverified_is_forbidden() {
    let app = setup().await;
    let svc = app!(app.engine.clone());
    let cookie = sign_in!(svc, PRESIDENT, false);

    let req = test::TestRequest::get()
        .uri("/api/v1/proposals")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "unverified");
}

#[actix_rt::test]
async fn test_mutation_requires_json_content_type() {
    let app = setup().await;
    let svc = app!(app.engine.clone());
    let cookie = sign_in!(svc, PRESIDENT, true);

    let req = test::TestRequest::post()
        .uri("/api/v1/proposals")
        .cookie(cookie)
        .insert_header(("content-type", "application/x-www-form-urlencoded"))
        .set_payload("title=x")
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_submit_and_lead_review_over_http() {
    let app = setup().await;
    let svc = app!(app.engine.clone());
    let pres = sign_in!(svc, PRESIDENT, true);

    let req = test::TestRequest::post()
        .uri("/api/v1/proposals")
        .cookie(pres.clone())
        .set_json(create_body())
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["status"], "LEAD_REVIEW");
    let id = created["id"].as_i64().expect("id");

    let vp = sign_in!(svc, VP, true);
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/proposals/{id}/lead-decision"))
        .cookie(vp)
        .set_json(json!({ "lead_role": "VP", "approved": true }))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let sec = sign_in!(svc, SECRETARY, true);
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/proposals/{id}/lead-decision"))
        .cookie(sec)
        .set_json(json!({ "lead_role": "SECRETARY", "approved": true }))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "PENDING");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/proposals/{id}"))
        .cookie(pres.clone())
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let detail: Value = test::read_body_json(resp).await;
    assert_eq!(detail["editable"], false);
    assert_eq!(detail["payload"]["event"]["title"], "Board game night");
    assert_eq!(detail["lead_approvals"].as_array().map(Vec::len), Some(2));

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/proposals/{id}"))
        .cookie(pres)
        .set_json(&create_body())
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "invalid_state");
}

#[actix_rt::test]
async fn test_foreign_proposal_is_not_found() {
    let app = setup().await;
    let id = app.submit().await;
    let svc = app!(app.engine.clone());
    let other = sign_in!(svc, OTHER_PRESIDENT, true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/proposals/{id}"))
        .cookie(other)
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_validation_errors_are_unprocessable() {
    let app = setup().await;
    let svc = app!(app.engine.clone());
    let pres = sign_in!(svc, PRESIDENT, true);

    let mut body = create_body();
    body["occurrences"] = json!([]);
    let req = test::TestRequest::post()
        .uri("/api/v1/proposals")
        .cookie(pres.clone())
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/api/v1/proposals")
        .cookie(pres)
        .set_json(json!({ "club_id": CLUB }))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_rt::test]
async fn test_archive_endpoints() {
    let app = setup().await;
    let id = app.submit().await;
    let svc = app!(app.engine.clone());
    let pres = sign_in!(svc, PRESIDENT, true);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/proposals/{id}/archive"))
        .cookie(pres.clone())
        .insert_header(("content-type", "application/json"))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/v1/archive")
        .cookie(pres.clone())
        .to_request();
    let archived: Value = test::call_and_read_body_json(&svc, req).await;
    assert_eq!(archived.as_array().map(Vec::len), Some(1));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/proposals/{id}"))
        .cookie(pres)
        .insert_header(("content-type", "application/json"))
        .to_request();
    let resp = test::call_service(&svc, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(app.store.proposal(id).await.is_none());
}
