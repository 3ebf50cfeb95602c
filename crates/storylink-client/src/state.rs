//! Mutable state of one story.
//!
//! [`StoryState`] lives behind a mutex shared by the [`crate::story::Story`]
//! handle and its background jobs. Every mutation is a short synchronous
//! critical section; the lock is never held across an await.

use std::sync::Arc;

use storylink_shared::{ImageSource, SecretKey, StoryId, StoryMetadata, ViewKey};

use crate::channel::ChannelHandle;
use crate::variant::{Regions, StoryVariant};

/// Where a story is in acquiring its identity and content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryPhase {
    /// Freshly minted; keys generated, nothing requested yet.
    New,
    /// Looking up content by view key (or looked up and found none, without
    /// the secret needed to offer pairing).
    ResolvingByViewKey,
    /// Looking up content by id.
    ResolvingById,
    /// Showing a pairing code, waiting for a paired device to upload media.
    AwaitingPairedMedia,
    /// Title and avatar are known.
    Resolved,
}

pub struct StoryState {
    /// External identifier, only for stories opened by id.
    pub id: Option<StoryId>,

    /// Public identifier. `None` only for stories opened by id.
    pub view_key: Option<ViewKey>,

    /// Present only on the device that owns a newly minted story.
    pub secret_key: Option<SecretKey>,

    pub avatar: ImageSource,

    /// Concrete presentation; owns title, description and color.
    pub variant: Box<dyn StoryVariant>,

    pub regions: Regions,

    pub phase: StoryPhase,

    /// Realtime subscription, if one was opened.
    pub channel: Option<Arc<ChannelHandle>>,

    /// Set by `destroy()`; no mutation is applied afterwards.
    pub destroyed: bool,
}

impl StoryState {
    pub fn title(&self) -> &str {
        self.variant.title()
    }

    pub fn set_title(&mut self, title: &str) {
        self.variant.set_title(&self.regions, title);
    }

    pub fn set_description(&mut self, description: &str) {
        self.variant.set_description(&self.regions, description);
    }

    pub fn set_color(&mut self, color: &str) {
        self.variant.set_color(&self.regions, color);
    }

    /// Store the avatar and paint it into the avatar region.
    pub fn set_avatar(&mut self, src: ImageSource) {
        self.regions
            .avatar
            .set_style("background-image", &format!("url({})", src.as_str()));
        self.avatar = src;
    }

    /// Fill only the fields that are still empty. Evaluated against the live
    /// values, so anything set since the lookup started wins.
    pub fn fill_missing(&mut self, metadata: StoryMetadata) {
        if self.avatar.is_empty() {
            self.set_avatar(metadata.image_source);
        }
        if self.title().is_empty() {
            self.set_title(&metadata.title);
        }
    }

    /// Replace title and avatar with freshly uploaded content.
    pub fn apply(&mut self, metadata: StoryMetadata) {
        self.set_avatar(metadata.image_source);
        self.set_title(&metadata.title);
    }
}
