use serde::Serialize;
use crate::domain::models::tenant::TenantStatus;
use crate::domain::models::user::{User, UserRole, UserStatus};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
    pub tenant_id: Option<String>,
    pub tenant_status: Option<TenantStatus>,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
}

impl SessionResponse {
    pub fn anonymous() -> Self {
        SessionResponse {
            user: None,
            tenant_id: None,
            tenant_status: None,
        }
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            status: user.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for MemberResponse {
    fn from(user: User) -> Self {
        MemberResponse {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
            role: user.role,
            status: user.status,
            created_at: user.created_at,
        }
    }
}
