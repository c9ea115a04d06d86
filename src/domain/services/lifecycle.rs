use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::models::tenant::{Tenant, TenantStatus};
use crate::domain::ports::TenantRepository;
use crate::domain::services::identity_cache::IdentityCache;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(TenantStatus),
    Unchanged,
    Rejected { from: TenantStatus, to: TenantStatus },
}

impl TransitionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TransitionOutcome::Applied(_) => "applied",
            TransitionOutcome::Unchanged => "unchanged",
            TransitionOutcome::Rejected { .. } => "rejected-invalid-transition",
        }
    }
}

/// Sole writer of billing-driven tenant status transitions. Invalidates the
/// identity cache on every applied write so access-control checks never act
/// on a stale status.
pub struct LifecycleService {
    tenant_repo: Arc<dyn TenantRepository>,
    cache: Arc<IdentityCache>,
}

impl LifecycleService {
    pub fn new(tenant_repo: Arc<dyn TenantRepository>, cache: Arc<IdentityCache>) -> Self {
        Self { tenant_repo, cache }
    }

    pub async fn apply(
        &self,
        tenant: &Tenant,
        target: TenantStatus,
        subscription_id: Option<&str>,
    ) -> Result<TransitionOutcome, AppError> {
        if tenant.status == target {
            // Redelivered or repeated event; still record a newly learned
            // subscription reference.
            if let Some(sub) = subscription_id {
                if tenant.billing_subscription_id.is_none() {
                    let mut updated = tenant.clone();
                    updated.billing_subscription_id = Some(sub.to_string());
                    self.tenant_repo.update(&updated).await?;
                }
            }
            return Ok(TransitionOutcome::Unchanged);
        }

        if !tenant.status.can_transition_to(target) {
            warn!(
                tenant_id = %tenant.id,
                from = ?tenant.status,
                to = ?target,
                "Rejected invalid tenant status transition (stale or out-of-order billing event?)"
            );
            return Ok(TransitionOutcome::Rejected {
                from: tenant.status,
                to: target,
            });
        }

        let mut updated = tenant.clone();
        updated.status = target;
        if target == TenantStatus::Trial && updated.trial_started_at.is_none() {
            let now = Utc::now();
            updated.trial_started_at = Some(now);
            updated.trial_ends_at = Some(now + chrono::Duration::days(14));
        }
        if let Some(sub) = subscription_id {
            if updated.billing_subscription_id.is_none() {
                updated.billing_subscription_id = Some(sub.to_string());
            }
        }

        let updated = self.tenant_repo.update(&updated).await?;
        self.cache.invalidate_tenant(&updated.id);

        info!(
            tenant_id = %updated.id,
            from = ?tenant.status,
            to = ?target,
            "Tenant status transition applied"
        );
        Ok(TransitionOutcome::Applied(target))
    }
}

/// Maps the payment processor's subscription status vocabulary onto the
/// tenant lifecycle. Unknown statuses land in the conservative non-active
/// bucket rather than failing open.
pub fn map_subscription_status(raw: &str) -> TenantStatus {
    match raw {
        "trialing" => TenantStatus::Trial,
        "active" => TenantStatus::Active,
        "past_due" => TenantStatus::PastDue,
        "canceled" => TenantStatus::Canceled,
        "incomplete" | "incomplete_expired" => TenantStatus::PendingActivation,
        "unpaid" | "paused" => TenantStatus::Suspended,
        other => {
            warn!(status = %other, "Unknown subscription status; defaulting to SUSPENDED");
            TenantStatus::Suspended
        }
    }
}
