pub mod factory;
pub mod identity;
pub mod repositories;
pub mod webhooks;
