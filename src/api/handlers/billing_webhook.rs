use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::json;
use tracing::{info, warn};

use crate::domain::models::billing::BillingEvent;
use crate::domain::models::tenant::{Tenant, TenantStatus};
use crate::domain::services::lifecycle::map_subscription_status;
use crate::error::AppError;
use crate::infra::webhooks::verify_billing_signature;
use crate::state::AppState;

/// Billing event ingestion. Every decodable event gets a 200 so the
/// processor stops redelivering; the `outcome` field reports what the
/// lifecycle machine actually did, including rejections of stale or
/// out-of-order transitions.
pub async fn handle_billing_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get("billing-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Forbidden("Missing billing-signature header".into()))?;

    verify_billing_signature(&state.config.billing_webhook_secret, signature, &body)?;

    let event: BillingEvent = serde_json::from_str(&body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

    let object = &event.data.object;
    let target = match event.kind.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            let raw = object.status.as_deref().ok_or_else(|| {
                AppError::Validation("Subscription event carries no status".into())
            })?;
            map_subscription_status(raw)
        }
        "customer.subscription.deleted" => TenantStatus::Canceled,
        "invoice.paid" => TenantStatus::Active,
        "invoice.payment_failed" => TenantStatus::PastDue,
        other => {
            info!(event_id = %event.id, kind = %other, "Unhandled billing event type acknowledged");
            return Ok(Json(json!({ "received": true, "outcome": "ignored" })));
        }
    };

    let subscription_ref = event.subscription_ref();

    let Some(tenant) = locate_tenant(&state, object.tenant_id(), subscription_ref).await? else {
        warn!(
            event_id = %event.id,
            subscription_id = ?subscription_ref,
            "Billing event matched no tenant; acknowledging without processing"
        );
        return Ok(Json(json!({ "received": true, "outcome": "tenant-not-found" })));
    };

    let outcome = state
        .lifecycle
        .apply(&tenant, target, subscription_ref)
        .await?;

    Ok(Json(json!({ "received": true, "outcome": outcome.label() })))
}

/// Event metadata carries our tenant id when we created the subscription;
/// the subscription reference covers events raised outside that path.
async fn locate_tenant(
    state: &AppState,
    tenant_id: Option<&str>,
    subscription_id: Option<&str>,
) -> Result<Option<Tenant>, AppError> {
    if let Some(tenant_id) = tenant_id {
        if let Some(tenant) = state.tenant_repo.find_by_id(tenant_id).await? {
            return Ok(Some(tenant));
        }
        warn!(tenant_id = %tenant_id, "Billing metadata names an unknown tenant");
    }

    let Some(subscription_id) = subscription_id else {
        return Ok(None);
    };
    state.tenant_repo.find_by_subscription(subscription_id).await
}
