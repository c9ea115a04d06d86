use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::models::tenant::TenantStatus;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Tenant access blocked: {0:?}")]
    TenantBlocked(TenantStatus),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

impl AppError {
    /// Maps create-path database errors so callers can distinguish a unique
    /// violation (the signup-race fallback signal) from a real outage.
    pub fn from_db(e: sqlx::Error) -> Self {
        if is_unique_violation(&e) {
            return AppError::Conflict("Resource already exists (duplicate entry)".to_string());
        }
        AppError::Database(e)
    }
}

// 2067 / 1555 = SQLite unique constraint, 23505 = PostgreSQL unique violation
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    if let Some(db_err) = e.as_database_error() {
        let code = db_err.code().unwrap_or_default();
        return code == "2067" || code == "1555" || code == "23505";
    }
    false
}

fn blocked_redirect(status: TenantStatus) -> &'static str {
    match status {
        TenantStatus::PendingActivation => "/account/activate",
        TenantStatus::Canceled => "/account/closed",
        _ => "/account/suspended",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Database(e) => {
                if is_unique_violation(e) {
                    return (
                        StatusCode::CONFLICT,
                        Json(json!({ "error": "Resource already exists (duplicate entry)" }))
                    ).into_response();
                }

                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "Unauthorized", "redirect": "/sign-in" }))
                ).into_response();
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::TenantBlocked(tenant_status) => {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": "Tenant access blocked",
                        "tenant_status": tenant_status,
                        "redirect": blocked_redirect(*tenant_status),
                    }))
                ).into_response();
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
            AppError::InternalWithMsg(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
