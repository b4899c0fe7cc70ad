use actix_session::SessionExt;
use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
};

use crate::auth::session::EMAIL_KEY;
use crate::errors::AppError;

/// Rejects requests without a session identity with a 401 JSON body.
/// Verification and roles are checked later, per operation.
pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let session = req.get_session();
    let has_identity = session.get::<String>(EMAIL_KEY).unwrap_or(None).is_some();

    if !has_identity {
        let err = AppError::Unauthenticated;
        let response = HttpResponse::Unauthorized().json(serde_json::json!({
            "error": err.to_string(),
            "kind": err.kind(),
        }));
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}
