//! Types and primitives shared by the storylink crates: story identity keys,
//! the pairing-link payload and the presentation value types.

pub mod constants;
pub mod error;
pub mod identity;
pub mod link;
pub mod types;

pub use identity::{SecretKey, ViewKey};
pub use link::PairingLinkRequest;
pub use types::{ImageSource, StoryId, StoryMetadata};
