use axum::{
    extract::{FromRequestParts, FromRef},
    http::request::Parts,
};
use crate::config::Config;
use crate::domain::models::identity::SessionClaims;
use crate::domain::services::identity_cache::ResolvedIdentity;
use crate::error::AppError;
use crate::state::AppState;
use std::sync::Arc;
use tower_cookies::Cookies;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::Span;

/// Authenticated, tenant-gated identity. Rejection carries the redirect
/// target (sign-in for missing/bad tokens, the activation/suspension pages
/// for blocked tenants).
pub struct AuthUser(pub ResolvedIdentity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);

        let token = session_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = decode_session(&token, &app_state.config)?;

        let identity = app_state.reconciliation.resolve(&claims).await?;

        // Billing-driven gate: reads the same state the billing writer
        // invalidates, so suspension is visible on the very next request.
        if !identity.tenant.status.allows_access() {
            return Err(AppError::TenantBlocked(identity.tenant.status));
        }

        Span::current().record("tenant_id", identity.tenant.id.as_str());
        Span::current().record("user_id", identity.user.id.as_str());

        Ok(AuthUser(identity))
    }
}

pub(crate) fn session_token(parts: &Parts) -> Option<String> {
    if let Some(cookies) = parts.extensions.get::<Cookies>() {
        if let Some(cookie) = cookies.get("session_token") {
            return Some(cookie.value().to_string());
        }
    }

    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

pub(crate) fn decode_session(token: &str, config: &Config) -> Result<SessionClaims, AppError> {
    let decoding_key = DecodingKey::from_ed_pem(config.session_public_key.as_bytes())
        .map_err(|_| AppError::Internal)?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.set_audience(&[config.session_audience.as_str()]);
    validation.set_issuer(&[config.session_issuer.as_str()]);

    let token_data = decode::<SessionClaims>(token, &decoding_key, &validation)
        .map_err(|_| AppError::Unauthorized)?;

    Ok(token_data.claims)
}
