//! Ownership list of everything a story attached outside itself.

use tracing::debug;

use storylink_shared::ViewKey;

use crate::events::ListenerId;

/// What a registry entry refers to, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    /// An activation listener on a select region.
    Listener(ListenerId),
    /// The realtime subscription for a view key.
    Channel(ViewKey),
}

type Release = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct ResourceRegistry {
    entries: Vec<(ResourceHandle, Release)>,
}

impl ResourceRegistry {
    pub fn register(&mut self, handle: ResourceHandle, release: impl FnOnce() + Send + 'static) {
        self.entries.push((handle, Box::new(release)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every entry, most recently registered first. Each release
    /// runs once; the registry is empty afterwards.
    pub fn release_all(&mut self) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();
        for (handle, release) in entries.into_iter().rev() {
            debug!(handle = ?handle, "Releasing story resource");
            release();
        }
        count
    }
}
