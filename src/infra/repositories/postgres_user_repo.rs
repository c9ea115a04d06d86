use crate::domain::{models::user::User, ports::UserRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;

pub struct PostgresUserRepo {
    pool: PgPool,
}

impl PostgresUserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepo {
    async fn create(&self, user: &User) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, tenant_id, external_identity_id, email, name, avatar_url, role, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
            .bind(&user.id)
            .bind(&user.tenant_id)
            .bind(&user.external_identity_id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.avatar_url)
            .bind(user.role)
            .bind(user.status)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from_db)
    }

    async fn find_by_external_id(&self, external_identity_id: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE external_identity_id = $1",
        )
            .bind(external_identity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 ORDER BY created_at ASC",
        )
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 ORDER BY created_at ASC",
        )
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET external_identity_id=$1, email=$2, name=$3, avatar_url=$4, role=$5, status=$6 WHERE id=$7 RETURNING *",
        )
            .bind(&user.external_identity_id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.avatar_url)
            .bind(user.role)
            .bind(user.status)
            .bind(&user.id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from_db)
    }
}
