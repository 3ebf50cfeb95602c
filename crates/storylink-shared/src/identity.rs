use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::{KDF_CONTEXT_VIEW_KEY, SECRET_KEY_SIZE};
use crate::error::IdentityError;

/// Private key proving ownership of a freshly minted story.
/// Only the device that generated the story (or was handed the key through a
/// pairing link) holds one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(String);

/// Public story identifier, derived one-way from a [`SecretKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewKey(String);

impl SecretKey {
    /// Generate a new random secret key (32 bytes from the OS RNG, hex-encoded).
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a caller-supplied secret. Any non-empty string is accepted.
    pub fn new(secret: impl Into<String>) -> Result<Self, IdentityError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(IdentityError::EmptySecretKey);
        }
        Ok(Self(secret))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the public view key for this secret.
    pub fn view_key(&self) -> ViewKey {
        ViewKey::derive(self)
    }
}

// Never print the secret itself.
impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl ViewKey {
    pub fn new(key: impl Into<String>) -> Result<Self, IdentityError> {
        let key = key.into();
        if key.is_empty() {
            return Err(IdentityError::EmptyViewKey);
        }
        Ok(Self(key))
    }

    /// BLAKE3 KDF over the secret's bytes, hex-encoded.
    pub fn derive(secret: &SecretKey) -> Self {
        let hash = blake3::derive_key(KDF_CONTEXT_VIEW_KEY, secret.as_str().as_bytes());
        Self(hex::encode(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable story name: the first `len` characters of the key.
    pub fn story_name(&self, len: usize) -> String {
        self.0.chars().take(len).collect()
    }

    pub fn short(&self) -> String {
        self.story_name(8)
    }
}

impl std::fmt::Display for ViewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_STORY_NAME_LEN;

    #[test]
    fn test_secret_generation() {
        let secret = SecretKey::generate();
        assert_eq!(secret.as_str().len(), SECRET_KEY_SIZE * 2);
        assert_ne!(secret, SecretKey::generate());
    }

    #[test]
    fn test_view_key_derivation_deterministic() {
        let secret = SecretKey::new("s1").unwrap();
        assert_eq!(ViewKey::derive(&secret), ViewKey::derive(&secret));
        assert_eq!(secret.view_key(), ViewKey::derive(&secret));
    }

    #[test]
    fn test_different_secrets_different_view_keys() {
        let a = SecretKey::new("secret-a").unwrap();
        let b = SecretKey::new("secret-b").unwrap();
        assert_ne!(a.view_key(), b.view_key());
        assert_ne!(a.view_key().as_str(), a.as_str());
    }

    #[test]
    fn test_story_name() {
        let key = SecretKey::generate().view_key();
        let name = key.story_name(DEFAULT_STORY_NAME_LEN);
        assert_eq!(name.len(), DEFAULT_STORY_NAME_LEN);
        assert!(key.as_str().starts_with(&name));

        let short = ViewKey::new("abc").unwrap();
        assert_eq!(short.story_name(DEFAULT_STORY_NAME_LEN), "abc");
    }

    #[test]
    fn test_empty_keys_rejected() {
        assert!(SecretKey::new("").is_err());
        assert!(ViewKey::new("").is_err());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = SecretKey::new("top-secret").unwrap();
        assert!(!format!("{secret:?}").contains("top-secret"));
    }
}
