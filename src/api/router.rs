use axum::{
    body::Body,
    extract::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{billing_webhook, health, identity_webhook, session, tenant};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tower_cookies::CookieManagerLayer;
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Session
        .route("/api/v1/session", get(session::get_session))

        // Webhooks (signature-verified, no session)
        .route("/api/v1/webhooks/identity", post(identity_webhook::handle_identity_webhook))
        .route("/api/v1/webhooks/billing", post(billing_webhook::handle_billing_webhook))

        // Tenant Public
        .route("/api/v1/tenants/by-slug/{slug}", get(tenant::get_tenant_by_slug))

        // Tenant Admin
        .route("/api/v1/tenants/current", get(tenant::get_current_tenant))
        .route("/api/v1/tenants/current/members", get(tenant::list_members))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        tenant_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .layer(CookieManagerLayer::new())
        .with_state(state)
}
