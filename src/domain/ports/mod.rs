use crate::domain::models::{
    identity::IdentityMetadata,
    tenant::Tenant,
    user::User,
};
use crate::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Creates the tenant and its first user in one transaction. A unique
    /// violation on the owner's external identity surfaces as
    /// `AppError::Conflict` with zero rows left behind.
    async fn create_with_owner(&self, tenant: &Tenant, owner: &User) -> Result<(Tenant, User), AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>, AppError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError>;
    async fn find_by_subscription(&self, subscription_id: &str) -> Result<Option<Tenant>, AppError>;
    async fn update(&self, tenant: &Tenant) -> Result<Tenant, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User, AppError>;
    async fn find_by_external_id(&self, external_identity_id: &str) -> Result<Option<User>, AppError>;
    /// Email is only unique per tenant; cross-tenant lookups may return
    /// several rows. Callers take the first match and flag the ambiguity.
    async fn find_by_email(&self, email: &str) -> Result<Vec<User>, AppError>;
    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<User>, AppError>;
    async fn update(&self, user: &User) -> Result<User, AppError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn push_metadata(
        &self,
        external_identity_id: &str,
        metadata: &IdentityMetadata,
    ) -> Result<(), AppError>;
}
