//! Client-side signaling channel

use crate::error::SignalError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::manager::EngineEvent;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// WebSocket connection to the hub. Outbound messages are queued and written
/// by a background task; inbound frames are decoded and fed straight into the
/// engine queue. When the socket dies, the engine hears `TransportClosed` and
/// cleans up locally; the hub learns of the disconnect from its own side.
pub struct SignalingChannel {
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl SignalingChannel {
    pub async fn connect(
        url: &str,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Self, SignalError> {
        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(_) => continue,
                };
                if write.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Ok(msg) = serde_json::from_str::<ServerMessage>(&text) {
                            if events.send(EngineEvent::Signal(msg)).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            let _ = events.send(EngineEvent::TransportClosed);
        });

        Ok(Self { outbound })
    }

    /// Handle for the engine's outbound side.
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outbound.clone()
    }

    pub fn send(&self, msg: ClientMessage) -> Result<(), SignalError> {
        self.outbound.send(msg).map_err(|_| SignalError::Closed)
    }
}
