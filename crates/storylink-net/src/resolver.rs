//! Story metadata lookups.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use storylink_shared::{StoryId, StoryMetadata, ViewKey};

use crate::error::ResolveError;

/// Resolves a story to its cover image and title.
///
/// A story that exists but has no media yet resolves to [`ResolveError::Empty`].
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve_by_view_key(&self, view_key: &ViewKey) -> Result<StoryMetadata, ResolveError>;

    async fn resolve_by_id(&self, id: &StoryId) -> Result<StoryMetadata, ResolveError>;
}

/// Resolver backed by the story JSON API.
#[derive(Debug, Clone)]
pub struct HttpMetadataResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, url: String) -> Result<StoryMetadata, ResolveError> {
        debug!(url = %url, "Fetching story metadata");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ResolveError::Empty);
        }
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let metadata: StoryMetadata = response.json().await?;
        if metadata.image_source.is_empty() {
            return Err(ResolveError::Empty);
        }
        Ok(metadata)
    }
}

#[async_trait]
impl MetadataResolver for HttpMetadataResolver {
    async fn resolve_by_view_key(&self, view_key: &ViewKey) -> Result<StoryMetadata, ResolveError> {
        self.fetch(format!("{}/stories/viewkey/{}", self.base_url, view_key))
            .await
    }

    async fn resolve_by_id(&self, id: &StoryId) -> Result<StoryMetadata, ResolveError> {
        self.fetch(format!("{}/stories/{}", self.base_url, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer) -> HttpMetadataResolver {
        HttpMetadataResolver::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_by_view_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stories/viewkey/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "src": "https://cdn.test/abc.jpg",
                "title": "Beach day",
            })))
            .mount(&server)
            .await;

        let meta = resolver(&server)
            .resolve_by_view_key(&ViewKey::new("abc").unwrap())
            .await
            .unwrap();
        assert_eq!(meta.image_source.as_str(), "https://cdn.test/abc.jpg");
        assert_eq!(meta.title, "Beach day");
    }

    #[tokio::test]
    async fn test_not_found_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = resolver(&server)
            .resolve_by_view_key(&ViewKey::new("abc").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn test_empty_src_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stories/42"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "src": "" })),
            )
            .mount(&server)
            .await;

        let err = resolver(&server)
            .resolve_by_id(&StoryId("42".into()))
            .await
            .unwrap_err();
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_not_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = resolver(&server)
            .resolve_by_id(&StoryId("42".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Status(503)));
        assert!(!err.is_empty());
    }
}
