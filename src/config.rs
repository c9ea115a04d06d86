use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub identity_webhook_secret: String,
    pub billing_webhook_secret: String,
    pub identity_api_url: String,
    pub identity_api_token: String,
    pub session_public_key: String, // Identity provider's Ed25519 verification key (PEM)
    pub session_issuer: String,
    pub session_audience: String,
    pub identity_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().expect("PORT must be a number"),
            identity_webhook_secret: env::var("IDENTITY_WEBHOOK_SECRET").expect("IDENTITY_WEBHOOK_SECRET must be set"),
            billing_webhook_secret: env::var("BILLING_WEBHOOK_SECRET").expect("BILLING_WEBHOOK_SECRET must be set"),
            identity_api_url: env::var("IDENTITY_API_URL").unwrap_or_else(|_| "https://api.identity.local/v1".to_string()),
            identity_api_token: env::var("IDENTITY_API_TOKEN").unwrap_or_else(|_| "test-token-1".to_string()),
            session_public_key: env::var("SESSION_PUBLIC_KEY").expect("SESSION_PUBLIC_KEY must be set (Ed25519 Public Key)"),
            session_issuer: env::var("SESSION_ISSUER").unwrap_or_else(|_| "https://identity.workshop-system.local".to_string()),
            session_audience: env::var("SESSION_AUDIENCE").unwrap_or_else(|_| "workshop-frontend".to_string()),
            identity_cache_ttl_secs: env::var("IDENTITY_CACHE_TTL_SECS").unwrap_or_else(|_| "30".to_string()).parse().expect("IDENTITY_CACHE_TTL_SECS must be a number"),
        }
    }
}
