use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::state::AppState;
use crate::domain::services::identity_cache::IdentityCache;
use crate::domain::services::lifecycle::LifecycleService;
use crate::domain::services::reconciliation::ReconciliationService;
use crate::infra::identity::http_identity_provider::HttpIdentityProvider;
use crate::infra::repositories::{
    postgres_tenant_repo::PostgresTenantRepo, postgres_user_repo::PostgresUserRepo,
    sqlite_tenant_repo::SqliteTenantRepo, sqlite_user_repo::SqliteUserRepo,
};

pub async fn bootstrap_state(config: &Config) -> AppState {
    let database_url = &config.database_url;

    let identity_provider = Arc::new(HttpIdentityProvider::new(
        config.identity_api_url.clone(),
        config.identity_api_token.clone(),
    ));

    let identity_cache = Arc::new(IdentityCache::new(Duration::from_secs(
        config.identity_cache_ttl_secs,
    )));

    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse().expect("Invalid Postgres URL");
        opts = opts.log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .expect("Failed to connect to Postgres");

        run_postgres_migrations(&pool).await;

        let tenant_repo = Arc::new(PostgresTenantRepo::new(pool.clone()));
        let user_repo = Arc::new(PostgresUserRepo::new(pool.clone()));

        let reconciliation = Arc::new(ReconciliationService::new(
            tenant_repo.clone(),
            user_repo.clone(),
            identity_provider.clone(),
            identity_cache.clone(),
        ));
        let lifecycle = Arc::new(LifecycleService::new(
            tenant_repo.clone(),
            identity_cache.clone(),
        ));

        AppState {
            config: config.clone(),
            tenant_repo,
            user_repo,
            identity_provider,
            identity_cache,
            reconciliation,
            lifecycle,
        }
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .expect("Invalid SQLite connection string")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .expect("Failed to connect to SQLite");

        run_sqlite_migrations(&pool).await;

        let tenant_repo = Arc::new(SqliteTenantRepo::new(pool.clone()));
        let user_repo = Arc::new(SqliteUserRepo::new(pool.clone()));

        let reconciliation = Arc::new(ReconciliationService::new(
            tenant_repo.clone(),
            user_repo.clone(),
            identity_provider.clone(),
            identity_cache.clone(),
        ));
        let lifecycle = Arc::new(LifecycleService::new(
            tenant_repo.clone(),
            identity_cache.clone(),
        ));

        AppState {
            config: config.clone(),
            tenant_repo,
            user_repo,
            identity_provider,
            identity_cache,
            reconciliation,
            lifecycle,
        }
    }
}

async fn run_postgres_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .expect("Failed to run Postgres migrations");
}

async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
