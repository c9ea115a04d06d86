use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use rand::{distributions::Alphanumeric, Rng};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    PendingActivation,
    Trial,
    Active,
    PastDue,
    Suspended,
    Canceled,
}

impl TenantStatus {
    /// Lifecycle table: forward moves along the chain (jumps allowed),
    /// recovery from PAST_DUE/SUSPENDED back to ACTIVE, CANCELED terminal.
    pub fn can_transition_to(self, next: TenantStatus) -> bool {
        use TenantStatus::*;
        matches!(
            (self, next),
            (PendingActivation, Trial | Active | PastDue | Suspended | Canceled)
                | (Trial, Active | PastDue | Suspended | Canceled)
                | (Active, PastDue | Suspended | Canceled)
                | (PastDue, Active | Suspended | Canceled)
                | (Suspended, Active | Canceled)
        )
    }

    /// PAST_DUE keeps access (grace period); everything outside the paying
    /// states is denied on protected routes.
    pub fn allows_access(self) -> bool {
        matches!(self, TenantStatus::Trial | TenantStatus::Active | TenantStatus::PastDue)
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub billing_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// A fresh tenant awaits activation; trial dates stay unset until the
    /// billing side moves it into TRIAL.
    pub fn new(name: String) -> Self {
        let slug = derive_slug(&name);
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            slug,
            status: TenantStatus::PendingActivation,
            trial_started_at: None,
            trial_ends_at: None,
            billing_subscription_id: None,
            created_at: Utc::now(),
        }
    }
}

// Slugs carry a random disambiguator so two workshops named "Shine & Go"
// never collide on the unique index.
fn derive_slug(name: &str) -> String {
    let mut base = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            base.push(c.to_ascii_lowercase());
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }
    let base = base.trim_matches('-');
    let base = if base.is_empty() { "workshop" } else { base };

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();

    format!("{}-{}", base, suffix)
}
