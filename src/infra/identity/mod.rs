pub mod http_identity_provider;
