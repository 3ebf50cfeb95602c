//! Pairing link encoder: turns a story name and secret into a shareable link
//! and a scannable image of that link.

use std::sync::Arc;

use async_trait::async_trait;
use qrcode::render::svg;
use qrcode::QrCode;
use tracing::debug;

use storylink_net::LinkService;
use storylink_shared::{ImageSource, PairingLinkRequest, SecretKey};

use crate::error::{PairingError, RenderError};

/// Encoded image of some text (typically a QR code).
#[derive(Debug, Clone)]
pub struct RenderedCode {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Renders text as a machine-readable image.
#[async_trait]
pub trait CodeRenderer: Send + Sync {
    async fn render(&self, data: &str) -> Result<RenderedCode, RenderError>;
}

const QR_MIN_DIMENSION: u32 = 200;

/// QR code rendered as SVG.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrRenderer;

#[async_trait]
impl CodeRenderer for QrRenderer {
    async fn render(&self, data: &str) -> Result<RenderedCode, RenderError> {
        let code = QrCode::new(data.as_bytes()).map_err(|e| RenderError(e.to_string()))?;
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();

        Ok(RenderedCode {
            mime: "image/svg+xml".to_string(),
            bytes: image.into_bytes(),
        })
    }
}

#[derive(Clone)]
pub struct PairingEncoder {
    links: Arc<dyn LinkService>,
    renderer: Arc<dyn CodeRenderer>,
}

impl PairingEncoder {
    pub fn new(links: Arc<dyn LinkService>, renderer: Arc<dyn CodeRenderer>) -> Self {
        Self { links, renderer }
    }

    pub async fn create_link(
        &self,
        story_name: &str,
        secret_key: &SecretKey,
    ) -> Result<String, PairingError> {
        let request = PairingLinkRequest::new(story_name, secret_key.clone());
        let link = self.links.create_link(&request).await?;
        debug!(story_name, "Pairing link created");
        Ok(link)
    }

    /// Render `link` as an inline image reference.
    pub async fn render(&self, link: &str) -> Result<ImageSource, PairingError> {
        let code = self.renderer.render(link).await?;
        Ok(ImageSource::data_url(&code.mime, &code.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLinks, FakeRenderer};

    fn encoder(links: FakeLinks) -> PairingEncoder {
        PairingEncoder::new(Arc::new(links), Arc::new(FakeRenderer))
    }

    #[tokio::test]
    async fn test_link_then_image() {
        let links = FakeLinks::default();
        let encoder = encoder(links.clone());

        let link = encoder
            .create_link("abc", &SecretKey::new("s1").unwrap())
            .await
            .unwrap();
        let image = encoder.render(&link).await.unwrap();

        assert_eq!(link, "https://pair.test/abc");
        assert_eq!(image, FakeRenderer::expected("https://pair.test/abc"));
        assert!(image.is_data_url());
        assert_eq!(links.requests(), vec![("abc".to_string(), "s1".to_string())]);
    }

    #[tokio::test]
    async fn test_link_failure_propagates() {
        let err = encoder(FakeLinks::failing())
            .create_link("abc", &SecretKey::new("s1").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PairingError::Link(_)));
    }

    #[tokio::test]
    async fn test_qr_renderer_produces_svg() {
        let code = QrRenderer.render("https://pair.test/abc").await.unwrap();
        assert_eq!(code.mime, "image/svg+xml");
        let svg = String::from_utf8(code.bytes).unwrap();
        assert!(svg.contains("<svg"));

        let encoder = PairingEncoder::new(Arc::new(FakeLinks::default()), Arc::new(QrRenderer));
        let image = encoder.render("https://pair.test/abc").await.unwrap();
        assert!(image.as_str().starts_with("data:image/svg+xml;base64,"));
    }

    #[tokio::test]
    async fn test_qr_renderer_rejects_oversized_data() {
        let data = "a".repeat(8000);
        let err = QrRenderer.render(&data).await.unwrap_err();
        assert!(!err.0.is_empty());
    }
}
