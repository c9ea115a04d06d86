pub mod billing_webhook;
pub mod health;
pub mod identity_webhook;
pub mod session;
pub mod tenant;
