use crate::domain::models::identity::IdentityMetadata;
use crate::domain::ports::IdentityProvider;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::error;

pub struct HttpIdentityProvider {
    client: Client,
    api_url: String,
    api_token: String,
}

impl HttpIdentityProvider {
    pub fn new(api_url: String, api_token: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_token,
        }
    }
}

#[derive(Serialize)]
struct MetadataPayload<'a> {
    public_metadata: &'a IdentityMetadata,
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn push_metadata(
        &self,
        external_identity_id: &str,
        metadata: &IdentityMetadata,
    ) -> Result<(), AppError> {
        let url = format!("{}/users/{}/metadata", self.api_url, external_identity_id);

        let res = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&MetadataPayload {
                public_metadata: metadata,
            })
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Identity provider connection error: {}", e);
                error!("{}", msg);
                AppError::InternalWithMsg(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("Identity provider metadata push failed. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::InternalWithMsg(msg));
        }

        Ok(())
    }
}
