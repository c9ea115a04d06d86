use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::json;
use tracing::info;

use crate::domain::models::identity::IdentityEvent;
use crate::domain::services::reconciliation::ReconcileOutcome;
use crate::error::AppError;
use crate::infra::webhooks::verify_identity_signature;
use crate::state::AppState;

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Forbidden(format!("Missing {} header", name)))
}

/// Identity-provider event ingestion. Signature is checked against the raw
/// body before any parsing; unrecognized event types are acknowledged so the
/// provider stops redelivering them.
pub async fn handle_identity_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let message_id = required_header(&headers, "webhook-id")?;
    let timestamp = required_header(&headers, "webhook-timestamp")?;
    let signature = required_header(&headers, "webhook-signature")?;

    verify_identity_signature(
        &state.config.identity_webhook_secret,
        message_id,
        timestamp,
        signature,
        &body,
    )?;

    let event: IdentityEvent = serde_json::from_str(&body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

    let outcome = match &event {
        IdentityEvent::UserCreated(account) => {
            state.reconciliation.handle_account_created(account).await?
        }
        IdentityEvent::UserUpdated(account) => {
            state.reconciliation.handle_account_updated(account).await?
        }
        IdentityEvent::Unknown {} => {
            info!(message_id = %message_id, "Unhandled identity event type acknowledged");
            ReconcileOutcome::Ignored
        }
    };

    Ok(Json(json!({ "outcome": outcome })))
}
