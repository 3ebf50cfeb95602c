//! WebSocket realtime connector.
//!
//! Speaks bare JSON text frames, `{"event": name, "data": payload}`, with no
//! socket.io / Engine.IO envelope. The configured endpoint has to accept that
//! framing directly.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use storylink_shared::ViewKey;

use crate::error::ChannelError;
use crate::realtime::{
    ChannelCommand, ChannelEndpoints, ChannelNotification, Frame, RealtimeConnector,
    CHANNEL_CAPACITY,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the realtime service over a WebSocket carrying JSON frames.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RealtimeConnector for WsConnector {
    async fn connect(&self) -> Result<ChannelEndpoints, ChannelError> {
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        info!(url = %self.url, "Realtime socket connected");

        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (notif_tx, notif_rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run_socket(socket, cmd_rx, notif_tx));

        Ok((cmd_tx, notif_rx))
    }
}

/// Pump commands out and frames in until either side closes.
async fn run_socket(
    socket: Socket,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    notif_tx: mpsc::Sender<ChannelNotification>,
) {
    let (mut write, mut read) = socket.split();
    let mut subscribed: Option<ViewKey> = None;

    let _ = notif_tx.send(ChannelNotification::Connected).await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(ChannelCommand::Subscribe { view_key }) => {
                    let text = match serde_json::to_string(&Frame::subscribe(&view_key)) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode subscribe frame");
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!(error = %e, "Failed to send subscribe frame");
                        break;
                    }
                    debug!(view_key = %view_key.short(), "Subscribed to story media");
                    subscribed = Some(view_key);
                }
                Some(ChannelCommand::Disconnect) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let frame = match serde_json::from_str::<Frame>(text.as_str()) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!(error = %e, "Ignoring malformed realtime frame");
                            continue;
                        }
                    };
                    if let Some(notification) = frame.into_notification(subscribed.as_ref()) {
                        let _ = notif_tx.send(notification).await;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(error = %e, "Realtime socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!("Realtime socket closed");
    let _ = notif_tx.send(ChannelNotification::Disconnected).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on port 9 locally.
        let connector = WsConnector::new("ws://127.0.0.1:9/socket");
        let result = connector.connect().await;
        assert!(matches!(result, Err(ChannelError::Connect(_))));
    }
}
