pub mod identity_cache;
pub mod lifecycle;
pub mod reconciliation;
