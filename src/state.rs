use std::sync::Arc;
use crate::config::Config;
use crate::domain::ports::{IdentityProvider, TenantRepository, UserRepository};
use crate::domain::services::identity_cache::IdentityCache;
use crate::domain::services::lifecycle::LifecycleService;
use crate::domain::services::reconciliation::ReconciliationService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tenant_repo: Arc<dyn TenantRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub identity_cache: Arc<IdentityCache>,
    pub reconciliation: Arc<ReconciliationService>,
    pub lifecycle: Arc<LifecycleService>,
}
