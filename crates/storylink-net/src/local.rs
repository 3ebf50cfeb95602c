//! In-process realtime relay.
//!
//! Serves the same command / notification contract as [`crate::ws::WsConnector`]
//! without a network: media published for a view key is delivered to every
//! connection subscribed to it. Used for same-process pairing and in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tracing::debug;

use storylink_shared::ViewKey;

use crate::error::ChannelError;
use crate::realtime::{
    ChannelCommand, ChannelEndpoints, ChannelNotification, RealtimeConnector, CHANNEL_CAPACITY,
};

/// Connection counters, for observing how a relay was used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connects: usize,
    pub subscribes: usize,
    pub disconnects: usize,
}

struct Subscriber {
    conn: u64,
    view_key: ViewKey,
    tx: mpsc::Sender<ChannelNotification>,
}

#[derive(Default)]
struct RelayState {
    next_conn: u64,
    /// Server-side hang-up signal of every open connection.
    connections: HashMap<u64, Arc<Notify>>,
    subscribers: Vec<Subscriber>,
    stats: RelayStats,
}

#[derive(Clone, Default)]
pub struct LocalRelay {
    state: Arc<Mutex<RelayState>>,
    changed: Arc<Notify>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a media notification to every subscriber of `view_key`.
    /// Returns the number of connections it was queued for.
    pub fn publish_media(&self, view_key: &ViewKey, media: Value) -> usize {
        let state = self.lock();
        let mut delivered = 0;
        for sub in state.subscribers.iter().filter(|s| &s.view_key == view_key) {
            let notification = ChannelNotification::MediaArrived {
                view_key: view_key.clone(),
                media: media.clone(),
            };
            if sub.tx.try_send(notification).is_ok() {
                delivered += 1;
            }
        }
        debug!(view_key = %view_key.short(), delivered, "Published media");
        delivered
    }

    /// Hang up, from the relay's side, every connection subscribed to
    /// `view_key`, as a network failure would. Returns how many were dropped.
    pub fn drop_subscribers(&self, view_key: &ViewKey) -> usize {
        let state = self.lock();
        let mut dropped: Vec<u64> = state
            .subscribers
            .iter()
            .filter(|s| &s.view_key == view_key)
            .map(|s| s.conn)
            .collect();
        dropped.sort_unstable();
        dropped.dedup();
        for conn in &dropped {
            if let Some(hang_up) = state.connections.get(conn) {
                hang_up.notify_one();
            }
        }
        debug!(view_key = %view_key.short(), dropped = dropped.len(), "Dropping subscribers");
        dropped.len()
    }

    pub fn subscriber_count(&self, view_key: &ViewKey) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| &s.view_key == view_key)
            .count()
    }

    pub fn stats(&self) -> RelayStats {
        self.lock().stats.clone()
    }

    /// Wait until at least one connection is subscribed to `view_key`.
    pub async fn wait_for_subscriber(&self, view_key: &ViewKey) {
        loop {
            let changed = self.changed.notified();
            if self.subscriber_count(view_key) > 0 {
                return;
            }
            changed.await;
        }
    }

    /// Wait until `count` connections have been closed.
    pub async fn wait_for_disconnects(&self, count: usize) {
        loop {
            let changed = self.changed.notified();
            if self.stats().disconnects >= count {
                return;
            }
            changed.await;
        }
    }

    async fn run_connection(
        self,
        conn: u64,
        hang_up: Arc<Notify>,
        mut cmd_rx: mpsc::Receiver<ChannelCommand>,
        notif_tx: mpsc::Sender<ChannelNotification>,
    ) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(ChannelCommand::Subscribe { view_key }) => {
                        let mut state = self.lock();
                        state.stats.subscribes += 1;
                        state.subscribers.push(Subscriber {
                            conn,
                            view_key,
                            tx: notif_tx.clone(),
                        });
                        drop(state);
                        self.changed.notify_waiters();
                    }
                    Some(ChannelCommand::Disconnect) | None => break,
                },
                _ = hang_up.notified() => {
                    debug!(conn, "Local relay hung up");
                    break;
                }
            }
        }

        {
            let mut state = self.lock();
            state.connections.remove(&conn);
            state.subscribers.retain(|s| s.conn != conn);
            state.stats.disconnects += 1;
        }
        debug!(conn, "Local relay connection closed");
        let _ = notif_tx.try_send(ChannelNotification::Disconnected);
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl RealtimeConnector for LocalRelay {
    async fn connect(&self) -> Result<ChannelEndpoints, ChannelError> {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (notif_tx, notif_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let hang_up = Arc::new(Notify::new());
        let conn = {
            let mut state = self.lock();
            state.next_conn += 1;
            state.stats.connects += 1;
            let conn = state.next_conn;
            state.connections.insert(conn, hang_up.clone());
            conn
        };

        notif_tx
            .try_send(ChannelNotification::Connected)
            .map_err(|_| ChannelError::Closed)?;
        tokio::spawn(self.clone().run_connection(conn, hang_up, cmd_rx, notif_tx));

        Ok((cmd_tx, notif_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(s: &str) -> ViewKey {
        ViewKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let relay = LocalRelay::new();
        let (cmd_tx, mut notif_rx) = relay.connect().await.unwrap();

        assert!(matches!(
            notif_rx.recv().await,
            Some(ChannelNotification::Connected)
        ));

        cmd_tx
            .send(ChannelCommand::Subscribe { view_key: key("abc") })
            .await
            .unwrap();
        relay.wait_for_subscriber(&key("abc")).await;

        assert_eq!(relay.publish_media(&key("other"), json!({})), 0);
        assert_eq!(relay.publish_media(&key("abc"), json!({"n": 1})), 1);

        match notif_rx.recv().await {
            Some(ChannelNotification::MediaArrived { view_key, media }) => {
                assert_eq!(view_key, key("abc"));
                assert_eq!(media["n"], 1);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_removes_subscription() {
        let relay = LocalRelay::new();
        let (cmd_tx, mut notif_rx) = relay.connect().await.unwrap();
        cmd_tx
            .send(ChannelCommand::Subscribe { view_key: key("abc") })
            .await
            .unwrap();
        relay.wait_for_subscriber(&key("abc")).await;

        cmd_tx.send(ChannelCommand::Disconnect).await.unwrap();
        relay.wait_for_disconnects(1).await;

        assert_eq!(relay.subscriber_count(&key("abc")), 0);
        assert_eq!(
            relay.stats(),
            RelayStats {
                connects: 1,
                subscribes: 1,
                disconnects: 1,
            }
        );

        // Connected, then Disconnected.
        assert!(matches!(notif_rx.recv().await, Some(ChannelNotification::Connected)));
        assert!(matches!(
            notif_rx.recv().await,
            Some(ChannelNotification::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_dropped_sender_closes_connection() {
        let relay = LocalRelay::new();
        let (cmd_tx, _notif_rx) = relay.connect().await.unwrap();
        drop(cmd_tx);
        relay.wait_for_disconnects(1).await;
        assert_eq!(relay.stats().disconnects, 1);
    }

    #[tokio::test]
    async fn test_drop_subscribers_hangs_up() {
        let relay = LocalRelay::new();
        let (cmd_tx, mut notif_rx) = relay.connect().await.unwrap();
        cmd_tx
            .send(ChannelCommand::Subscribe { view_key: key("abc") })
            .await
            .unwrap();
        relay.wait_for_subscriber(&key("abc")).await;

        assert_eq!(relay.drop_subscribers(&key("other")), 0);
        assert_eq!(relay.drop_subscribers(&key("abc")), 1);
        relay.wait_for_disconnects(1).await;

        assert_eq!(relay.subscriber_count(&key("abc")), 0);
        assert!(matches!(notif_rx.recv().await, Some(ChannelNotification::Connected)));
        assert!(matches!(
            notif_rx.recv().await,
            Some(ChannelNotification::Disconnected)
        ));
    }
}
