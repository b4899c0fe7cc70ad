pub mod api_v1;

use actix_web::{HttpResponse, error::InternalError, web};

/// Malformed JSON bodies become 422 with the same body shape as `AppError`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = serde_json::json!({ "error": err.to_string(), "kind": "validation" });
        InternalError::from_response(err, HttpResponse::UnprocessableEntity().json(body)).into()
    })
}
