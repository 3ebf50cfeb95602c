use serde::{Deserialize, Serialize};

/// External story identifier, used for stories resolved by id rather than view key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StoryId(pub String);

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image reference: a remote URL or an inline `data:` URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSource(pub String);

impl ImageSource {
    /// Build a `data:<mime>;base64,<payload>` reference.
    pub fn data_url(mime: &str, bytes: &[u8]) -> Self {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        Self(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_data_url(&self) -> bool {
        self.0.starts_with("data:")
    }
}

impl From<&str> for ImageSource {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ImageSource {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Presentation data returned by a metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMetadata {
    #[serde(rename = "src")]
    pub image_source: ImageSource,
    #[serde(default)]
    pub title: String,
}
