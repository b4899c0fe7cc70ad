pub mod archive;
pub mod decisions;
pub mod proposals;

use actix_session::Session;
use actix_web::{
    web, Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
};

use crate::auth::context::AuthorizationContext;
use crate::auth::middleware::require_auth;
use crate::auth::session::get_identity;
use crate::errors::AppError;
use crate::workflow::WorkflowEngine;

/// CSRF protection for mutation endpoints.
///
/// Rejects POST/PUT/DELETE requests without Content-Type: application/json.
/// A cross-origin form post cannot carry that header with cookies, so the
/// check stands in for a token. GET requests are exempt.
async fn require_json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let method = req.method().clone();

    if method == actix_web::http::Method::POST
        || method == actix_web::http::Method::PUT
        || method == actix_web::http::Method::DELETE
    {
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !content_type.starts_with("application/json") {
            let body = serde_json::json!({
                "error": "Content-Type must be application/json for mutation requests",
                "kind": "bad_request",
            });
            let response = HttpResponse::BadRequest().json(body);
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// Session identity resolved to roles. Every handler starts here.
pub(crate) async fn current_actor(
    engine: &WorkflowEngine,
    session: &Session,
) -> Result<AuthorizationContext, AppError> {
    let identity = get_identity(session)?;
    engine.authorize(identity).await
}

/// Configure API v1 routes. Mounted under `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/proposals")
            .wrap(actix_web::middleware::from_fn(require_json_content_type))
            .wrap(actix_web::middleware::from_fn(require_auth))
            .route("", web::get().to(proposals::list))
            .route("", web::post().to(proposals::create))
            .route("/{id}", web::get().to(proposals::read))
            .route("/{id}", web::put().to(proposals::update))
            .route("/{id}", web::delete().to(archive::delete))
            .route("/{id}/audit", web::get().to(proposals::audit_trail))
            .route("/{id}/lead-decision", web::post().to(decisions::lead))
            .route("/{id}/student-union-decision", web::post().to(decisions::student_union))
            .route("/{id}/director-decision", web::post().to(decisions::director))
            .route("/{id}/resubmit", web::post().to(decisions::resubmit))
            .route("/{id}/archive", web::post().to(archive::archive))
            .route("/{id}/restore", web::post().to(archive::restore))
    );
    cfg.service(
        web::scope("/archive")
            .wrap(actix_web::middleware::from_fn(require_json_content_type))
            .wrap(actix_web::middleware::from_fn(require_auth))
            .route("", web::get().to(archive::list))
            .route("", web::delete().to(archive::empty))
    );
}
