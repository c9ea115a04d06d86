use axum::{response::IntoResponse, Json};

use crate::api::dtos::responses::{SessionResponse, SessionUser};
use crate::api::extractors::maybe_auth::MaybeAuthUser;
use crate::error::AppError;

/// Session probe for the frontend. Works for blocked tenants too: the
/// response carries the tenant status so the client can route to the
/// activation/suspension pages without tripping the access gate.
pub async fn get_session(user: MaybeAuthUser) -> Result<impl IntoResponse, AppError> {
    let Some(identity) = user.0 else {
        return Ok(Json(SessionResponse::anonymous()));
    };

    Ok(Json(SessionResponse {
        user: Some(SessionUser::from(&identity.user)),
        tenant_id: Some(identity.tenant.id.clone()),
        tenant_status: Some(identity.tenant.status),
    }))
}
