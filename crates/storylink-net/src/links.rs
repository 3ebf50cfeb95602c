//! Pairing link creation through a link-shortening service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use storylink_shared::PairingLinkRequest;

use crate::error::LinkServiceError;

#[async_trait]
pub trait LinkService: Send + Sync {
    /// Create a shareable link for the given story name and secret.
    async fn create_link(&self, request: &PairingLinkRequest) -> Result<String, LinkServiceError>;
}

#[derive(Deserialize)]
struct LinkResponse {
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpLinkService {
    client: reqwest::Client,
    endpoint: String,
    link_key: String,
}

impl HttpLinkService {
    pub fn new(
        endpoint: impl Into<String>,
        link_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LinkServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            link_key: link_key.into(),
        })
    }
}

#[async_trait]
impl LinkService for HttpLinkService {
    async fn create_link(&self, request: &PairingLinkRequest) -> Result<String, LinkServiceError> {
        let body = request.query_body(&self.link_key)?;
        debug!(story_name = %request.story_name, "Requesting pairing link");

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LinkServiceError::Status(status.as_u16()));
        }

        let link: LinkResponse = response.json().await?;
        link.url
            .filter(|url| !url.is_empty())
            .ok_or(LinkServiceError::MissingUrl)
    }
}
