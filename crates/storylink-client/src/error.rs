use thiserror::Error;

use storylink_net::{LinkServiceError, ResolveError};

#[derive(Error, Debug)]
pub enum StoryError {
    /// The template lacks a region the story needs to present itself.
    #[error("Story does not contain element with name: {0}")]
    MissingRegion(String),

    #[error("Metadata lookup failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Pairing failed: {0}")]
    Pairing(#[from] PairingError),
}

#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Link creation failed: {0}")]
    Link(#[from] LinkServiceError),

    #[error("Code rendering failed: {0}")]
    Render(#[from] RenderError),
}

#[derive(Error, Debug)]
#[error("{0}")]
pub struct RenderError(pub String);
