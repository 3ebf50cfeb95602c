use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Secret key is empty")]
    EmptySecretKey,

    #[error("View key is empty")]
    EmptyViewKey,
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
