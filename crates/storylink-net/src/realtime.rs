//! Realtime pairing channel, modelled as a command / notification pair.
//!
//! A connector opens one connection and hands back the sending half of a
//! command channel plus the receiving half of a notification channel. The
//! connection itself runs in a background task owned by the connector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use storylink_shared::constants::{EVENT_MEDIA, EVENT_SUBSCRIBE_MEDIA};
use storylink_shared::ViewKey;

use crate::error::ChannelError;

/// Capacity of the command and notification queues of one connection.
pub const CHANNEL_CAPACITY: usize = 32;

/// Commands sent *into* a realtime connection.
#[derive(Debug, Clone)]
pub enum ChannelCommand {
    /// Ask to be told when media is uploaded to this story.
    Subscribe { view_key: ViewKey },
    /// Close the connection.
    Disconnect,
}

/// Notifications sent *from* a realtime connection.
#[derive(Debug, Clone)]
pub enum ChannelNotification {
    /// The connection is ready to accept subscriptions.
    Connected,
    /// A paired device uploaded media to a subscribed story.
    MediaArrived { view_key: ViewKey, media: Value },
    /// The connection ended.
    Disconnected,
}

pub type ChannelEndpoints = (
    mpsc::Sender<ChannelCommand>,
    mpsc::Receiver<ChannelNotification>,
);

#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self) -> Result<ChannelEndpoints, ChannelError>;
}

/// JSON frame exchanged with the realtime service: `{ "event": ..., "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn subscribe(view_key: &ViewKey) -> Self {
        Self {
            event: EVENT_SUBSCRIBE_MEDIA.to_string(),
            data: json!({ "viewKey": view_key.as_str() }),
        }
    }

    /// Interpret an inbound frame. Media frames without a `viewKey` are
    /// attributed to the connection's current subscription.
    pub fn into_notification(self, subscribed: Option<&ViewKey>) -> Option<ChannelNotification> {
        if self.event != EVENT_MEDIA {
            return None;
        }

        let view_key = match self.data.get("viewKey").and_then(Value::as_str) {
            Some(key) => ViewKey::new(key).ok()?,
            None => subscribed?.clone(),
        };

        Some(ChannelNotification::MediaArrived {
            view_key,
            media: self.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ViewKey {
        ViewKey::new(s).unwrap()
    }

    #[test]
    fn test_subscribe_frame() {
        let frame = Frame::subscribe(&key("abc"));
        let text = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            text,
            r#"{"event":"subscribe_to_story_media","data":{"viewKey":"abc"}}"#
        );
    }

    #[test]
    fn test_media_frame_with_view_key() {
        let frame: Frame =
            serde_json::from_str(r#"{"event":"media","data":{"viewKey":"abc","id":7}}"#).unwrap();
        match frame.into_notification(None) {
            Some(ChannelNotification::MediaArrived { view_key, media }) => {
                assert_eq!(view_key, key("abc"));
                assert_eq!(media["id"], 7);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[test]
    fn test_media_frame_uses_subscription() {
        let frame: Frame = serde_json::from_str(r#"{"event":"media"}"#).unwrap();
        let subscribed = key("xyz");
        assert!(matches!(
            frame.clone().into_notification(Some(&subscribed)),
            Some(ChannelNotification::MediaArrived { view_key, .. }) if view_key == subscribed
        ));
        assert!(frame.into_notification(None).is_none());
    }

    #[test]
    fn test_other_events_ignored() {
        let frame: Frame = serde_json::from_str(r#"{"event":"ping","data":{}}"#).unwrap();
        assert!(frame.into_notification(Some(&key("abc"))).is_none());
    }
}
