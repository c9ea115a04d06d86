use axum::{
    extract::{FromRequestParts, FromRef},
    http::request::Parts,
};
use crate::api::extractors::auth::{decode_session, session_token};
use crate::domain::services::identity_cache::ResolvedIdentity;
use crate::error::AppError;
use crate::state::AppState;
use std::sync::Arc;
use tracing::debug;

/// Anonymous-tolerant resolution: invalid or missing tokens become guests,
/// and no tenant-status gate applies. Used by the session endpoint so a
/// blocked tenant's frontend can still learn where to redirect.
pub struct MaybeAuthUser(pub Option<ResolvedIdentity>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);

        let Some(token) = session_token(parts) else {
            return Ok(MaybeAuthUser(None));
        };

        let claims = match decode_session(&token, &app_state.config) {
            Ok(claims) => claims,
            Err(_) => {
                // Invalid token (expired, bad signature) -> Treat as guest
                debug!("MaybeAuth: invalid session token, resolving as anonymous");
                return Ok(MaybeAuthUser(None));
            }
        };

        // Store unavailability stays fatal: resolution failures are not guests.
        let identity = app_state.reconciliation.resolve(&claims).await?;
        Ok(MaybeAuthUser(Some(identity)))
    }
}
