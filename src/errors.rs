use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Db(sqlx::Error),
    Session(String),
    Unauthenticated,
    Unverified,
    Forbidden(String),
    NotFound,
    InvalidState(String),
    Validation(String),
}

impl AppError {
    /// Short machine-readable tag used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Db(_) | AppError::Session(_) => "internal",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Unverified => "unverified",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Validation(_) => "validation",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::Session(e) => write!(f, "Session error: {e}"),
            AppError::Unauthenticated => write!(f, "Not authenticated"),
            AppError::Unverified => write!(f, "Email address not verified"),
            AppError::Forbidden(e) => write!(f, "Forbidden: {e}"),
            AppError::NotFound => write!(f, "Not found"),
            AppError::InvalidState(e) => write!(f, "Invalid state: {e}"),
            AppError::Validation(e) => write!(f, "Validation error: {e}"),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Unverified | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Db(_) | AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Db(_) | AppError::Session(_) => {
                log::error!("{self}");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": message,
            "kind": self.kind(),
        }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound,
            other => AppError::Db(other),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Db(sqlx::Error::Migrate(Box::new(e)))
    }
}

impl From<actix_session::SessionGetError> for AppError {
    fn from(e: actix_session::SessionGetError) -> Self {
        AppError::Session(e.to_string())
    }
}

impl From<actix_session::SessionInsertError> for AppError {
    fn from(e: actix_session::SessionInsertError) -> Self {
        AppError::Session(e.to_string())
    }
}
