//! Handle on a story's realtime subscription.
//!
//! The subscription can be closed by two triggers, the first media arrival or
//! `destroy()`. Whichever comes first closes it; the other is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info};

use storylink_net::ChannelCommand;
use storylink_shared::ViewKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Subscribed,
    Closed,
}

pub struct ChannelHandle {
    view_key: ViewKey,
    closed: AtomicBool,
    cmd_tx: Mutex<Option<mpsc::Sender<ChannelCommand>>>,
    task: Mutex<Option<AbortHandle>>,
    state: watch::Sender<ChannelState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelHandle {
    pub fn new(view_key: ViewKey) -> Self {
        let (state, _) = watch::channel(ChannelState::Connecting);
        Self {
            view_key,
            closed: AtomicBool::new(false),
            cmd_tx: Mutex::new(None),
            task: Mutex::new(None),
            state,
        }
    }

    pub fn view_key(&self) -> &ViewKey {
        &self.view_key
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the subscription is closed, by either trigger.
    pub async fn closed(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == ChannelState::Closed).await;
    }

    pub(crate) fn set_task(&self, task: AbortHandle) {
        *lock(&self.task) = Some(task);
    }

    /// Hand over the command sender of a fresh connection. If the handle was
    /// closed while connecting, the connection is dropped straight away.
    pub(crate) fn attach(&self, cmd_tx: mpsc::Sender<ChannelCommand>) -> bool {
        let mut slot = lock(&self.cmd_tx);
        if self.is_closed() {
            let _ = cmd_tx.try_send(ChannelCommand::Disconnect);
            return false;
        }
        *slot = Some(cmd_tx);
        true
    }

    pub(crate) async fn subscribe(&self) {
        let Some(cmd_tx) = lock(&self.cmd_tx).clone() else {
            return;
        };

        let command = ChannelCommand::Subscribe {
            view_key: self.view_key.clone(),
        };
        if cmd_tx.send(command).await.is_ok() && self.transition(ChannelState::Subscribed) {
            debug!(view_key = %self.view_key.short(), "Listening for paired media");
        }
    }

    /// The connection dropped without either trigger; a new one is on its way.
    pub(crate) fn reconnecting(&self) {
        if self.transition(ChannelState::Connecting) {
            debug!(view_key = %self.view_key.short(), "Realtime channel reconnecting");
        }
    }

    /// Move to `next` unless already closed. `Closed` is final.
    fn transition(&self, next: ChannelState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ChannelState::Closed || *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Close the subscription. Returns `true` only for the call that
    /// actually closed it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        if let Some(cmd_tx) = lock(&self.cmd_tx).take() {
            let _ = cmd_tx.try_send(ChannelCommand::Disconnect);
        }
        info!(view_key = %self.view_key.short(), "Realtime channel closed");
        self.state.send_replace(ChannelState::Closed);
        true
    }

    /// Close and stop the listener task.
    pub(crate) fn shutdown(&self) {
        self.close();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}
