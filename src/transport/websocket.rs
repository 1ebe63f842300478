//! WebSocket client transport.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{TransportChannel, TransportEvent};
use crate::error::{Result, SyncError};
use crate::protocol::{ClientMessage, ServerMessage, decode, encode};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport over a single WebSocket connection.
///
/// Emits `Open` first, then decoded messages, then one `Close`. Frames that do
/// not decode are logged and dropped.
pub struct WebSocketTransport {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    announced_open: bool,
    closed: bool,
    close_reported: bool,
}

impl WebSocketTransport {
    /// Connect to `url` (e.g. `ws://localhost:5001`).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transport`] if the handshake fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| SyncError::Transport {
                message: e.to_string(),
            })?;
        tracing::info!(url, "websocket connected");

        let (sink, stream) = ws.split();
        Ok(Self {
            sink,
            stream,
            announced_open: false,
            closed: false,
            close_reported: false,
        })
    }
}

#[async_trait]
impl TransportChannel for WebSocketTransport {
    async fn send(&mut self, message: ClientMessage) -> Result<()> {
        if self.closed {
            return Err(SyncError::Disconnected);
        }
        let text = encode(&message)?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| SyncError::Transport {
                message: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        if !self.announced_open {
            self.announced_open = true;
            return Some(TransportEvent::Open);
        }
        if self.closed {
            if self.close_reported {
                return None;
            }
            self.close_reported = true;
            return Some(TransportEvent::Close { reason: None });
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => match decode::<ServerMessage>(&text) {
                    Ok(message) => return Some(TransportEvent::Message(message)),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    self.close_reported = true;
                    return Some(TransportEvent::Close {
                        reason: frame.map(|f| f.reason.to_string()),
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket error");
                    self.closed = true;
                    return Some(TransportEvent::Error {
                        message: e.to_string(),
                    });
                }
                None => {
                    self.closed = true;
                    self.close_reported = true;
                    return Some(TransportEvent::Close { reason: None });
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.sink.close().await.map_err(|e| SyncError::Transport {
            message: e.to_string(),
        })
    }
}
