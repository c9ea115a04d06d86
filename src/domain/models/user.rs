use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    PlatformAdmin,
    Owner,
    Manager,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Invited,
    Active,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub external_identity_id: Option<String>,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// First user of a fresh tenant, created reactively on sign-up.
    pub fn owner(tenant_id: String, external_identity_id: String, email: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            external_identity_id: Some(external_identity_id),
            email,
            name: None,
            avatar_url: None,
            role: UserRole::Owner,
            status: UserStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// Pre-provisioned row created by the invitation flow: no external
    /// identity yet, claimed later by sign-in or webhook.
    pub fn invited(tenant_id: String, email: String, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id,
            external_identity_id: None,
            email,
            name: None,
            avatar_url: None,
            role,
            status: UserStatus::Invited,
            created_at: Utc::now(),
        }
    }
}
