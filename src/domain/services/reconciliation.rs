use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use chrono::Utc;

use crate::domain::models::identity::{AccountPayload, IdentityMetadata, SessionClaims};
use crate::domain::models::tenant::Tenant;
use crate::domain::models::user::{User, UserRole, UserStatus};
use crate::domain::ports::{IdentityProvider, TenantRepository, UserRepository};
use crate::domain::services::identity_cache::{IdentityCache, ResolvedIdentity};
use crate::error::AppError;

/// Terminal outcome of an identity-provider account event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileOutcome {
    Linked,
    CreatedInExistingTenant,
    CreatedNewTenant,
    Ignored,
}

/// The authority over User/Tenant consistency. Sole writer of identity-driven
/// state: invitation claims, first-signup creation, profile syncs. The store
/// always wins over the provider's cached claims; disagreements are resolved
/// by pushing the store's values out, never by pulling the provider's in.
pub struct ReconciliationService {
    tenant_repo: Arc<dyn TenantRepository>,
    user_repo: Arc<dyn UserRepository>,
    identity_provider: Arc<dyn IdentityProvider>,
    cache: Arc<IdentityCache>,
}

impl ReconciliationService {
    pub fn new(
        tenant_repo: Arc<dyn TenantRepository>,
        user_repo: Arc<dyn UserRepository>,
        identity_provider: Arc<dyn IdentityProvider>,
        cache: Arc<IdentityCache>,
    ) -> Self {
        Self {
            tenant_repo,
            user_repo,
            identity_provider,
            cache,
        }
    }

    /// Request-time resolution: returns the consistent `(User, Tenant)` pair
    /// for an authenticated external identity, creating it on first sign-in.
    pub async fn resolve(&self, claims: &SessionClaims) -> Result<ResolvedIdentity, AppError> {
        if let Some(hit) = self.cache.get(&claims.sub) {
            return Ok(hit);
        }

        if let Some(user) = self.user_repo.find_by_external_id(&claims.sub).await? {
            let tenant = self.load_tenant(&user.tenant_id).await?;
            let authoritative = IdentityMetadata::for_user(&user);
            if !authoritative.matches(&claims.public_metadata) {
                let _push = self.spawn_metadata_push(claims.sub.clone(), authoritative);
            }
            let resolved = ResolvedIdentity { user, tenant };
            self.cache.insert(&claims.sub, resolved.clone());
            return Ok(resolved);
        }

        if let Some(user) = self
            .claim_invitation(
                &claims.sub,
                &claims.email,
                claims.name.as_deref(),
                claims.image_url.as_deref(),
            )
            .await?
        {
            let tenant = self.load_tenant(&user.tenant_id).await?;
            let _push =
                self.spawn_metadata_push(claims.sub.clone(), IdentityMetadata::for_user(&user));
            let resolved = ResolvedIdentity { user, tenant };
            self.cache.insert(&claims.sub, resolved.clone());
            return Ok(resolved);
        }

        let (resolved, _created) = self
            .create_fresh_signup(&claims.sub, &claims.email, claims.name.as_deref())
            .await?;
        let _push = self.spawn_metadata_push(
            claims.sub.clone(),
            IdentityMetadata::for_user(&resolved.user),
        );
        self.cache.insert(&claims.sub, resolved.clone());
        Ok(resolved)
    }

    /// Account-created webhook state machine. Deterministic regardless of
    /// delivery order or duplicates: replays find the linked row and resolve
    /// to `Linked` without touching it.
    pub async fn handle_account_created(
        &self,
        account: &AccountPayload,
    ) -> Result<ReconcileOutcome, AppError> {
        if let Some(user) = self.user_repo.find_by_external_id(&account.id).await? {
            info!(
                user_id = %user.id,
                external_identity_id = %account.id,
                "Account-created redelivery for already-linked identity"
            );
            return Ok(ReconcileOutcome::Linked);
        }

        let email = account
            .primary_email()
            .ok_or_else(|| AppError::Validation("Account event carries no email address".into()))?;

        // State A: a row pre-provisioned by an invitation. role/tenant_id were
        // assigned by whoever sent the invitation and stay untouched.
        if let Some(user) = self
            .claim_invitation(
                &account.id,
                email,
                account.display_name().as_deref(),
                account.image_url.as_deref(),
            )
            .await?
        {
            let _push =
                self.spawn_metadata_push(account.id.clone(), IdentityMetadata::for_user(&user));
            return Ok(ReconcileOutcome::Linked);
        }

        // State B: no row, but the provider already carries a tenant id from
        // some earlier partial run. Recovery path, not the common case.
        if let Some(tenant_id) = account.public_metadata.tenant_id.clone() {
            if let Some(tenant) = self.tenant_repo.find_by_id(&tenant_id).await? {
                let role = account.public_metadata.role.unwrap_or(UserRole::Member);
                warn!(
                    tenant_id = %tenant.id,
                    external_identity_id = %account.id,
                    role = ?role,
                    "No user row matched, but provider metadata claims a tenant; creating user from metadata (unexpected prior state)"
                );
                let user = User {
                    id: Uuid::new_v4().to_string(),
                    tenant_id: tenant.id.clone(),
                    external_identity_id: Some(account.id.clone()),
                    email: email.to_string(),
                    name: account.display_name(),
                    avatar_url: account.image_url.clone(),
                    role,
                    status: UserStatus::Active,
                    created_at: Utc::now(),
                };
                let user = self.user_repo.create(&user).await.map_err(|e| match e {
                    AppError::Database(db) => AppError::from_db(db),
                    other => other,
                })?;
                let _push =
                    self.spawn_metadata_push(account.id.clone(), IdentityMetadata::for_user(&user));
                return Ok(ReconcileOutcome::CreatedInExistingTenant);
            }
            warn!(
                tenant_id = %tenant_id,
                external_identity_id = %account.id,
                "Provider metadata names a tenant that does not exist; treating as fresh signup"
            );
        }

        // State C: fresh signup. Any database failure propagates so the
        // provider redelivers; the transactional create leaves zero rows behind.
        let (resolved, created) = self
            .create_fresh_signup(&account.id, email, account.display_name().as_deref())
            .await?;
        let _push = self.spawn_metadata_push(
            account.id.clone(),
            IdentityMetadata::for_user(&resolved.user),
        );
        if created {
            Ok(ReconcileOutcome::CreatedNewTenant)
        } else {
            Ok(ReconcileOutcome::Linked)
        }
    }

    /// Profile sync from the provider. Touches name/avatar/email only;
    /// role and tenant are owned by the store.
    pub async fn handle_account_updated(
        &self,
        account: &AccountPayload,
    ) -> Result<ReconcileOutcome, AppError> {
        let Some(mut user) = self.user_repo.find_by_external_id(&account.id).await? else {
            info!(
                external_identity_id = %account.id,
                "Profile update for an unlinked identity ignored"
            );
            return Ok(ReconcileOutcome::Ignored);
        };

        if let Some(name) = account.display_name() {
            user.name = Some(name);
        }
        if let Some(image_url) = &account.image_url {
            user.avatar_url = Some(image_url.clone());
        }
        if let Some(email) = account.primary_email() {
            user.email = email.to_string();
        }

        let user = self.user_repo.update(&user).await?;
        self.cache.invalidate(&account.id);
        info!(user_id = %user.id, "Profile fields synced from identity provider");
        Ok(ReconcileOutcome::Linked)
    }

    /// Best-effort side effect: the caller observes the handle but never
    /// awaits it for correctness. Failures are logged and left to converge
    /// on the next resolution cycle.
    pub fn spawn_metadata_push(
        &self,
        external_identity_id: String,
        metadata: IdentityMetadata,
    ) -> JoinHandle<bool> {
        let provider = self.identity_provider.clone();
        tokio::spawn(async move {
            match provider.push_metadata(&external_identity_id, &metadata).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        external_identity_id = %external_identity_id,
                        "Identity metadata push failed, deferring convergence: {}",
                        e
                    );
                    false
                }
            }
        })
    }

    async fn load_tenant(&self, tenant_id: &str) -> Result<Tenant, AppError> {
        self.tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalWithMsg(format!("User references missing tenant {}", tenant_id))
            })
    }

    /// Links an external identity to a pre-provisioned (invited) row matched
    /// by email. First match wins; ambiguous duplicates are logged as a
    /// latent provisioning bug.
    async fn claim_invitation(
        &self,
        external_identity_id: &str,
        email: &str,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let matches = self.user_repo.find_by_email(email).await?;
        if matches.len() > 1 {
            warn!(
                email = %email,
                count = matches.len(),
                "Ambiguous email match across tenants; first match wins"
            );
        }

        let Some(mut user) = matches.into_iter().next() else {
            return Ok(None);
        };

        if let Some(existing) = user.external_identity_id.as_deref() {
            warn!(
                user_id = %user.id,
                linked_identity = %existing,
                incoming_identity = %external_identity_id,
                "Email already linked to a different external identity; not claimable"
            );
            return Ok(None);
        }

        user.external_identity_id = Some(external_identity_id.to_string());
        user.status = UserStatus::Active;
        if let Some(name) = name {
            user.name = Some(name.to_string());
        }
        if let Some(avatar_url) = avatar_url {
            user.avatar_url = Some(avatar_url.to_string());
        }

        let user = self.user_repo.update(&user).await?;
        info!(
            user_id = %user.id,
            tenant_id = %user.tenant_id,
            "Invitation claimed, external identity linked"
        );
        Ok(Some(user))
    }

    /// Atomic Tenant+User creation for a brand-new identity. Losing the
    /// concurrent-signup race surfaces as a unique violation on the external
    /// identity id; the loser falls back to reading the winner's rows.
    async fn create_fresh_signup(
        &self,
        external_identity_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<(ResolvedIdentity, bool), AppError> {
        let tenant = Tenant::new(tenant_name_for(name, email));
        let mut owner = User::owner(
            tenant.id.clone(),
            external_identity_id.to_string(),
            email.to_string(),
        );
        owner.name = name.map(|n| n.to_string());

        match self.tenant_repo.create_with_owner(&tenant, &owner).await {
            Ok((tenant, user)) => {
                info!(
                    tenant_id = %tenant.id,
                    user_id = %user.id,
                    "Created new tenant with owner for first sign-in"
                );
                Ok((ResolvedIdentity { user, tenant }, true))
            }
            Err(AppError::Conflict(_)) => {
                let user = self
                    .user_repo
                    .find_by_external_id(external_identity_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalWithMsg(format!(
                            "Signup race fallback found no user for {}",
                            external_identity_id
                        ))
                    })?;
                let tenant = self.load_tenant(&user.tenant_id).await?;
                info!(
                    tenant_id = %tenant.id,
                    user_id = %user.id,
                    "Concurrent signup lost the race; resolved to existing pair"
                );
                Ok((ResolvedIdentity { user, tenant }, false))
            }
            Err(e) => Err(e),
        }
    }
}

fn tenant_name_for(name: Option<&str>, email: &str) -> String {
    match name {
        Some(n) => format!("{}'s Workshop", n),
        None => {
            let local = email.split('@').next().unwrap_or(email);
            format!("{}'s Workshop", local)
        }
    }
}
