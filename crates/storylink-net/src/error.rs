use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The story exists but has no media yet. Routine for a freshly minted story.
    #[error("Story has no content yet")]
    Empty,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),
}

impl ResolveError {
    pub fn is_empty(&self) -> bool {
        matches!(self, ResolveError::Empty)
    }
}

#[derive(Error, Debug)]
pub enum LinkServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Link service response has no url")]
    MissingUrl,

    #[error("Invalid link request: {0}")]
    Request(#[from] storylink_shared::error::LinkError),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Realtime connect failed: {0}")]
    Connect(String),

    #[error("Realtime channel closed")]
    Closed,
}
