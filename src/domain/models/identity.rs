use serde::{Deserialize, Serialize};

use crate::domain::models::user::UserRole;

/// Session token claims issued by the external identity provider. `sub` is
/// the durable external identity id; `public_metadata` is the provider's
/// cached copy of what the store assigned, never trusted over the store.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,

    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub public_metadata: ProvisionedMetadata,
}

/// Metadata blob the provider holds per account. Present (fully or in part)
/// when a previous reconciliation run already told the provider where this
/// identity belongs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionedMetadata {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// The authoritative values pushed back to the provider after every
/// reconciliation write. Fire-and-forget; the store never waits on it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IdentityMetadata {
    pub tenant_id: String,
    pub role: UserRole,
    pub user_id: String,
}

impl IdentityMetadata {
    pub fn for_user(user: &crate::domain::models::user::User) -> Self {
        Self {
            tenant_id: user.tenant_id.clone(),
            role: user.role,
            user_id: user.id.clone(),
        }
    }

    /// True when the provider's cached claims already match the store.
    pub fn matches(&self, cached: &ProvisionedMetadata) -> bool {
        cached.tenant_id.as_deref() == Some(self.tenant_id.as_str())
            && cached.role == Some(self.role)
            && cached.user_id.as_deref() == Some(self.user_id.as_str())
    }
}

/// Identity provider webhook events. Unknown types decode to `Unknown` and
/// are acknowledged without action (forward compatibility).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IdentityEvent {
    #[serde(rename = "user.created")]
    UserCreated(AccountPayload),
    #[serde(rename = "user.updated")]
    UserUpdated(AccountPayload),
    #[serde(untagged)]
    Unknown {},
}

#[derive(Debug, Deserialize)]
pub struct AccountPayload {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub public_metadata: ProvisionedMetadata,
}

#[derive(Debug, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

impl AccountPayload {
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses.first().map(|e| e.email_address.as_str())
    }

    pub fn display_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
            (Some(f), None) => Some(f.to_string()),
            (None, Some(l)) => Some(l.to_string()),
            (None, None) => None,
        }
    }
}
