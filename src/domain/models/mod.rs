pub mod billing;
pub mod identity;
pub mod tenant;
pub mod user;
