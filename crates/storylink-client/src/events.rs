use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::story::Story;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned when a listener is attached, used to detach it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub type SelectCallback = Arc<dyn Fn(&Story) + Send + Sync>;

/// Observers of a story's "select" event.
#[derive(Default)]
pub struct SelectEmitter {
    observers: Vec<(ListenerId, SelectCallback)>,
}

impl SelectEmitter {
    pub fn on(&mut self, callback: SelectCallback) -> ListenerId {
        let id = ListenerId::next();
        self.observers.push((id, callback));
        id
    }

    /// Returns whether a listener with this id was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn off_all(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Snapshot of the current observers, so they can be called without
    /// holding the emitter.
    pub fn observers(&self) -> Vec<SelectCallback> {
        self.observers.iter().map(|(_, cb)| cb.clone()).collect()
    }
}
