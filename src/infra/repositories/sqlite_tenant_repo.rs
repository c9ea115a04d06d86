use crate::domain::{
    models::{tenant::Tenant, user::User},
    ports::TenantRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteTenantRepo {
    pool: SqlitePool,
}

impl SqliteTenantRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for SqliteTenantRepo {
    async fn create_with_owner(&self, tenant: &Tenant, owner: &User) -> Result<(Tenant, User), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let created_tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, name, slug, status, trial_started_at, trial_ends_at, billing_subscription_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&tenant.id)
            .bind(&tenant.name)
            .bind(&tenant.slug)
            .bind(tenant.status)
            .bind(tenant.trial_started_at)
            .bind(tenant.trial_ends_at)
            .bind(&tenant.billing_subscription_id)
            .bind(tenant.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::from_db)?;

        let created_owner = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, tenant_id, external_identity_id, email, name, avatar_url, role, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&owner.id)
            .bind(&owner.tenant_id)
            .bind(&owner.external_identity_id)
            .bind(&owner.email)
            .bind(&owner.name)
            .bind(&owner.avatar_url)
            .bind(owner.role)
            .bind(owner.status)
            .bind(owner.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::from_db)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok((created_tenant, created_owner))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>, AppError> {
        sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE id = ?",
        )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError> {
        sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE slug = ?",
        )
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_subscription(&self, subscription_id: &str) -> Result<Option<Tenant>, AppError> {
        sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE billing_subscription_id = ?",
        )
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update(&self, tenant: &Tenant) -> Result<Tenant, AppError> {
        sqlx::query_as::<_, Tenant>(
            "UPDATE tenants SET name=?, status=?, trial_started_at=?, trial_ends_at=?, billing_subscription_id=? WHERE id=? RETURNING *"
        )
            .bind(&tenant.name)
            .bind(tenant.status)
            .bind(tenant.trial_started_at)
            .bind(tenant.trial_ends_at)
            .bind(&tenant.billing_subscription_id)
            .bind(&tenant.id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
