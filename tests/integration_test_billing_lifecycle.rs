mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{parse_body, TestApp};
use serde_json::json;
use tower::ServiceExt;
use workshop_backend::domain::models::identity::ProvisionedMetadata;
use workshop_backend::domain::models::tenant::TenantStatus;

/// Signs up a fresh owner and returns (tenant_id, session_token).
async fn seed_tenant(app: &TestApp, ext_id: &str, email: &str) -> (String, String) {
    let token = app.mint_session_token(ext_id, email, None, ProvisionedMetadata::default());
    let response = app.get_authed("/api/v1/session", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    (body["tenant_id"].as_str().unwrap().to_string(), token)
}

fn subscription_event(
    event_id: &str,
    kind: &str,
    subscription_id: &str,
    status: Option<&str>,
    tenant_id: Option<&str>,
) -> serde_json::Value {
    let mut object = json!({ "id": subscription_id });
    if let Some(status) = status {
        object["status"] = json!(status);
    }
    if let Some(tenant_id) = tenant_id {
        object["metadata"] = json!({ "tenant_id": tenant_id });
    }
    json!({ "id": event_id, "type": kind, "data": { "object": object } })
}

fn invoice_event(
    event_id: &str,
    kind: &str,
    subscription_id: &str,
    tenant_id: Option<&str>,
) -> serde_json::Value {
    let mut object = json!({ "id": format!("in_{}", event_id), "subscription": subscription_id });
    if let Some(tenant_id) = tenant_id {
        object["metadata"] = json!({ "tenant_id": tenant_id });
    }
    json!({ "id": event_id, "type": kind, "data": { "object": object } })
}

async fn tenant_status(app: &TestApp, tenant_id: &str) -> TenantStatus {
    app.state
        .tenant_repo
        .find_by_id(tenant_id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn test_trial_start_stamps_trial_dates() {
    let app = TestApp::new().await;
    let (tenant_id, _) = seed_tenant(&app, "ext_o1", "o1@example.com").await;

    let event = subscription_event(
        "evt_1",
        "customer.subscription.created",
        "sub_1",
        Some("trialing"),
        Some(&tenant_id),
    );
    let body = parse_body(app.post_billing_webhook(&event).await).await;
    assert_eq!(body["outcome"], "applied");

    let tenant = app
        .state
        .tenant_repo
        .find_by_id(&tenant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tenant.status, TenantStatus::Trial);
    assert!(tenant.trial_started_at.is_some());
    assert!(tenant.trial_ends_at.is_some());
    assert_eq!(tenant.billing_subscription_id.as_deref(), Some("sub_1"));
}

#[tokio::test]
async fn test_payment_failure_and_recovery() {
    let app = TestApp::new().await;
    let (tenant_id, _) = seed_tenant(&app, "ext_o2", "o2@example.com").await;

    let activate = subscription_event(
        "evt_1",
        "customer.subscription.created",
        "sub_2",
        Some("active"),
        Some(&tenant_id),
    );
    parse_body(app.post_billing_webhook(&activate).await).await;
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::Active);

    let failed = invoice_event("evt_2", "invoice.payment_failed", "sub_2", None);
    let body = parse_body(app.post_billing_webhook(&failed).await).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::PastDue);

    // Recovery located through the stored subscription id, no metadata.
    let paid = invoice_event("evt_3", "invoice.paid", "sub_2", None);
    let body = parse_body(app.post_billing_webhook(&paid).await).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::Active);
}

#[tokio::test]
async fn test_canceled_is_terminal() {
    let app = TestApp::new().await;
    let (tenant_id, _) = seed_tenant(&app, "ext_o3", "o3@example.com").await;

    let activate = subscription_event(
        "evt_1",
        "customer.subscription.created",
        "sub_3",
        Some("active"),
        Some(&tenant_id),
    );
    parse_body(app.post_billing_webhook(&activate).await).await;

    let deleted = subscription_event(
        "evt_2",
        "customer.subscription.deleted",
        "sub_3",
        None,
        None,
    );
    let body = parse_body(app.post_billing_webhook(&deleted).await).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::Canceled);

    // A stale invoice.paid replayed after cancellation must not resurrect
    // the tenant, and must still be acknowledged.
    let stale = invoice_event("evt_3", "invoice.paid", "sub_3", None);
    let response = app.post_billing_webhook(&stale).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    assert_eq!(body["outcome"], "rejected-invalid-transition");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::Canceled);
}

#[tokio::test]
async fn test_redelivered_event_is_unchanged() {
    let app = TestApp::new().await;
    let (tenant_id, _) = seed_tenant(&app, "ext_o4", "o4@example.com").await;

    let event = subscription_event(
        "evt_1",
        "customer.subscription.created",
        "sub_4",
        Some("active"),
        Some(&tenant_id),
    );
    let first = parse_body(app.post_billing_webhook(&event).await).await;
    assert_eq!(first["outcome"], "applied");

    let second = parse_body(app.post_billing_webhook(&event).await).await;
    assert_eq!(second["outcome"], "unchanged");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::Active);
}

#[tokio::test]
async fn test_unknown_subscription_status_suspends() {
    let app = TestApp::new().await;
    let (tenant_id, _) = seed_tenant(&app, "ext_o5", "o5@example.com").await;

    let event = subscription_event(
        "evt_1",
        "customer.subscription.updated",
        "sub_5",
        Some("some_future_status"),
        Some(&tenant_id),
    );
    let body = parse_body(app.post_billing_webhook(&event).await).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::Suspended);
}

#[tokio::test]
async fn test_suspension_blocks_next_request() {
    let app = TestApp::new().await;
    let (tenant_id, token) = seed_tenant(&app, "ext_o6", "o6@example.com").await;

    let activate = subscription_event(
        "evt_1",
        "customer.subscription.created",
        "sub_6",
        Some("active"),
        Some(&tenant_id),
    );
    parse_body(app.post_billing_webhook(&activate).await).await;

    // Warm the cache through a protected route.
    let response = app.get_authed("/api/v1/tenants/current", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let suspend = subscription_event(
        "evt_2",
        "customer.subscription.updated",
        "sub_6",
        Some("unpaid"),
        Some(&tenant_id),
    );
    parse_body(app.post_billing_webhook(&suspend).await).await;

    // The cached pair was invalidated by the billing write; the very next
    // request sees the suspension.
    let response = app.get_authed("/api/v1/tenants/current", &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = parse_body(response).await;
    assert_eq!(body["tenant_status"], "SUSPENDED");
    assert_eq!(body["redirect"], "/account/suspended");
}

#[tokio::test]
async fn test_past_due_keeps_access() {
    let app = TestApp::new().await;
    let (tenant_id, token) = seed_tenant(&app, "ext_o7", "o7@example.com").await;

    let activate = subscription_event(
        "evt_1",
        "customer.subscription.created",
        "sub_7",
        Some("active"),
        Some(&tenant_id),
    );
    parse_body(app.post_billing_webhook(&activate).await).await;

    let failed = invoice_event("evt_2", "invoice.payment_failed", "sub_7", None);
    parse_body(app.post_billing_webhook(&failed).await).await;

    // Grace period: dunning has started but the workshop keeps working.
    let response = app.get_authed("/api/v1/tenants/current", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    assert_eq!(body["status"], "PAST_DUE");
}

#[tokio::test]
async fn test_invoice_id_is_never_recorded_as_subscription_ref() {
    let app = TestApp::new().await;
    let (tenant_id, _) = seed_tenant(&app, "ext_o8", "o8@example.com").await;

    // Invoice located via metadata only; its object id is an invoice id,
    // not a subscription id, and must not be stored as one.
    let paid = json!({
        "id": "evt_1",
        "type": "invoice.paid",
        "data": { "object": { "id": "in_12345", "metadata": { "tenant_id": tenant_id } } }
    });
    let body = parse_body(app.post_billing_webhook(&paid).await).await;
    assert_eq!(body["outcome"], "applied");

    let tenant = app
        .state
        .tenant_repo
        .find_by_id(&tenant_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tenant.status, TenantStatus::Active);
    assert_eq!(tenant.billing_subscription_id, None);
    assert!(app
        .state
        .tenant_repo
        .find_by_subscription("in_12345")
        .await
        .unwrap()
        .is_none());

    // The real subscription reference still gets recorded afterwards.
    let failing = subscription_event(
        "evt_2",
        "customer.subscription.updated",
        "sub_real",
        Some("past_due"),
        Some(&tenant_id),
    );
    let body = parse_body(app.post_billing_webhook(&failing).await).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::PastDue);

    // And later events can locate the tenant through it without metadata.
    let suspend = subscription_event(
        "evt_3",
        "customer.subscription.updated",
        "sub_real",
        Some("unpaid"),
        None,
    );
    let body = parse_body(app.post_billing_webhook(&suspend).await).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(tenant_status(&app, &tenant_id).await, TenantStatus::Suspended);
}

#[tokio::test]
async fn test_event_for_unknown_tenant_is_acknowledged() {
    let app = TestApp::new().await;

    let event = invoice_event("evt_1", "invoice.paid", "sub_none", None);
    let response = app.post_billing_webhook(&event).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    assert_eq!(body["outcome"], "tenant-not-found");
}

#[tokio::test]
async fn test_unhandled_event_type_is_acknowledged() {
    let app = TestApp::new().await;

    let event = json!({
        "id": "evt_1",
        "type": "charge.refunded",
        "data": { "object": { "id": "ch_1" } }
    });
    let response = app.post_billing_webhook(&event).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    assert_eq!(body["outcome"], "ignored");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = TestApp::new().await;
    let payload = json!({ "id": "evt_1", "type": "invoice.paid", "data": { "object": { "id": "in_1" } } });

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/webhooks/billing")
                .header(header::CONTENT_TYPE, "application/json")
                .header(
                    "billing-signature",
                    format!("t={},v1=deadbeef", chrono::Utc::now().timestamp()),
                )
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
