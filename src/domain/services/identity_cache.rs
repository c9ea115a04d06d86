use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::models::{tenant::Tenant, user::User};

/// A resolved `(User, Tenant)` pair, the unit the request path works with.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedIdentity {
    pub user: User,
    pub tenant: Tenant,
}

struct CacheEntry {
    inserted_at: Instant,
    resolved: ResolvedIdentity,
}

/// Process-local read-through cache keyed by external identity id. Bounded
/// by TTL only; never authoritative. The billing writer invalidates every
/// entry of a tenant it touches, so access-control decisions are no staler
/// than the store.
pub struct IdentityCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, external_identity_id: &str) -> Option<ResolvedIdentity> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(external_identity_id) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.resolved.clone()),
            Some(_) => {
                entries.remove(external_identity_id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, external_identity_id: &str, resolved: ResolvedIdentity) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            external_identity_id.to_string(),
            CacheEntry {
                inserted_at: Instant::now(),
                resolved,
            },
        );
    }

    pub fn invalidate(&self, external_identity_id: &str) {
        self.entries.lock().unwrap().remove(external_identity_id);
    }

    /// Invalidation hook for the billing-writer path: drops every cached
    /// pair belonging to the tenant.
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        self.entries
            .lock()
            .unwrap()
            .retain(|_, entry| entry.resolved.tenant.id != tenant_id);
    }
}
