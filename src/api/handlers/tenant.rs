use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::api::dtos::responses::MemberResponse;
use crate::api::extractors::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_current_tenant(user: AuthUser) -> Result<impl IntoResponse, AppError> {
    Ok(Json(user.0.tenant))
}

pub async fn list_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let members = state.user_repo.list_by_tenant(&user.0.tenant.id).await?;
    let members: Vec<MemberResponse> = members.into_iter().map(MemberResponse::from).collect();
    Ok(Json(members))
}

/// Public lookup used by the booking frontend. Exposes the display fields
/// only, never the billing state.
pub async fn get_tenant_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state
        .tenant_repo
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Tenant not found".to_string()))?;

    Ok(Json(json!({
        "id": tenant.id,
        "name": tenant.name,
        "slug": tenant.slug,
    })))
}
