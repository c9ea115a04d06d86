use workshop_backend::{
    api::router::create_router,
    state::AppState,
    config::Config,
    domain::models::identity::{IdentityMetadata, ProvisionedMetadata},
    domain::ports::IdentityProvider,
    domain::services::identity_cache::IdentityCache,
    domain::services::lifecycle::LifecycleService,
    domain::services::reconciliation::ReconciliationService,
    infra::repositories::{
        sqlite_tenant_repo::SqliteTenantRepo,
        sqlite_user_repo::SqliteUserRepo,
    },
    error::AppError,
};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Pool, Sqlite};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use axum::{
    body::Body,
    http::{Request, Response, header},
    Router,
};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

pub const IDENTITY_SECRET_RAW: &[u8] = b"identity-test-secret-key";
pub const BILLING_SECRET: &str = "whsec_billing-test-secret-key";

/// Captures every metadata push instead of calling out over HTTP.
pub struct RecordingIdentityProvider {
    pub pushes: Mutex<Vec<(String, IdentityMetadata)>>,
}

impl RecordingIdentityProvider {
    pub fn new() -> Self {
        Self {
            pushes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentityProvider {
    async fn push_metadata(
        &self,
        external_identity_id: &str,
        metadata: &IdentityMetadata,
    ) -> Result<(), AppError> {
        self.pushes
            .lock()
            .unwrap()
            .push((external_identity_id.to_string(), metadata.clone()));
        Ok(())
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub identity_provider: Arc<RecordingIdentityProvider>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_cache_ttl(30).await
    }

    pub async fn with_cache_ttl(ttl_secs: u64) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let pub_key_pem = include_str!("../tests/keys/test_public.pem");

        let config = Config {
            database_url: db_url.clone(),
            port: 0,
            identity_webhook_secret: identity_secret(),
            billing_webhook_secret: BILLING_SECRET.to_string(),
            identity_api_url: "http://localhost".to_string(),
            identity_api_token: "token".to_string(),
            session_public_key: pub_key_pem.to_string(),
            session_issuer: "test-issuer".to_string(),
            session_audience: "test-frontend".to_string(),
            identity_cache_ttl_secs: ttl_secs,
        };

        let tenant_repo = Arc::new(SqliteTenantRepo::new(pool.clone()));
        let user_repo = Arc::new(SqliteUserRepo::new(pool.clone()));
        let identity_provider = Arc::new(RecordingIdentityProvider::new());
        let identity_cache = Arc::new(IdentityCache::new(Duration::from_secs(ttl_secs)));

        let reconciliation = Arc::new(ReconciliationService::new(
            tenant_repo.clone(),
            user_repo.clone(),
            identity_provider.clone(),
            identity_cache.clone(),
        ));
        let lifecycle = Arc::new(LifecycleService::new(
            tenant_repo.clone(),
            identity_cache.clone(),
        ));

        let state = Arc::new(AppState {
            config: config.clone(),
            tenant_repo,
            user_repo,
            identity_provider: identity_provider.clone(),
            identity_cache,
            reconciliation,
            lifecycle,
        });

        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
            identity_provider,
        }
    }

    /// Signs a session token the way the identity provider would.
    pub fn mint_session_token(
        &self,
        sub: &str,
        email: &str,
        name: Option<&str>,
        metadata: ProvisionedMetadata,
    ) -> String {
        let priv_key_pem = include_str!("../tests/keys/test_private.pem");
        let now = chrono::Utc::now().timestamp() as usize;

        let claims = json!({
            "iss": "test-issuer",
            "sub": sub,
            "aud": "test-frontend",
            "exp": now + 3600,
            "iat": now,
            "email": email,
            "name": name,
            "public_metadata": metadata,
        });

        encode(
            &Header::new(Algorithm::EdDSA),
            &claims,
            &EncodingKey::from_ed_pem(priv_key_pem.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    pub async fn get_authed(&self, uri: &str, token: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Delivers an identity-provider event with a valid signature.
    pub async fn post_identity_webhook(&self, body: &Value) -> Response<Body> {
        let payload = body.to_string();
        let message_id = format!("msg_{}", Uuid::new_v4());
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_identity(&message_id, &timestamp, &payload);

        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/webhooks/identity")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("webhook-id", message_id)
                    .header("webhook-timestamp", timestamp)
                    .header("webhook-signature", signature)
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Delivers a billing event with a valid signature.
    pub async fn post_billing_webhook(&self, body: &Value) -> Response<Body> {
        let payload = body.to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = sign_billing(timestamp, &payload);

        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/webhooks/billing")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("billing-signature", signature)
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub fn identity_secret() -> String {
    format!("whsec_{}", general_purpose::STANDARD.encode(IDENTITY_SECRET_RAW))
}

pub fn sign_identity(message_id: &str, timestamp: &str, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(IDENTITY_SECRET_RAW).unwrap();
    mac.update(format!("{}.{}.{}", message_id, timestamp, payload).as_bytes());
    format!("v1,{}", general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn sign_billing(timestamp: i64, payload: &str) -> String {
    let secret = BILLING_SECRET.strip_prefix("whsec_").unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

pub async fn parse_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
    }
}
