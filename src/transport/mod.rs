//! The transport seam.
//!
//! A transport carries wire messages to and from the coordinator and reports
//! open/close as events. Reconnection policy belongs to the transport; a
//! session only ever sees `Open` and `Close`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Result, SyncError};
use crate::protocol::{ClientMessage, ServerMessage};

#[cfg(feature = "websocket")]
mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connection established
    Open,
    /// A decoded coordinator message
    Message(ServerMessage),
    /// Connection closed
    Close {
        /// Why it closed, if known
        reason: Option<String>,
    },
    /// Connection-level error; a `Close` usually follows
    Error {
        /// Description of the error
        message: String,
    },
}

/// Bidirectional message channel to the coordinator.
#[async_trait]
pub trait TransportChannel: Send {
    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is gone.
    async fn send(&mut self, message: ClientMessage) -> Result<()>;

    /// Wait for the next event. `None` means the transport is finished for good.
    ///
    /// Must be cancel-safe: the session driver polls it inside `select!`.
    async fn recv(&mut self) -> Option<TransportEvent>;

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails.
    async fn close(&mut self) -> Result<()>;
}

/// In-process transport over tokio channels.
///
/// The other end is a [`ChannelPeer`], which plays the coordinator's role.
#[derive(Debug)]
pub struct ChannelTransport {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Coordinator-side end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelPeer {
    incoming: mpsc::UnboundedReceiver<ClientMessage>,
    outgoing: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelTransport {
    /// Create a connected transport/peer pair.
    #[must_use]
    pub fn pair() -> (Self, ChannelPeer) {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: client_tx,
                incoming: event_rx,
            },
            ChannelPeer {
                incoming: client_rx,
                outgoing: event_tx,
            },
        )
    }
}

#[async_trait]
impl TransportChannel for ChannelTransport {
    async fn send(&mut self, message: ClientMessage) -> Result<()> {
        self.outgoing
            .send(message)
            .map_err(|_| SyncError::ChannelClosed)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.incoming.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.incoming.close();
        Ok(())
    }
}

impl ChannelPeer {
    /// Report the connection as open.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ChannelClosed`] if the transport was dropped.
    pub fn open(&self) -> Result<()> {
        self.emit(TransportEvent::Open)
    }

    /// Deliver a coordinator message.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ChannelClosed`] if the transport was dropped.
    pub fn deliver(&self, message: ServerMessage) -> Result<()> {
        self.emit(TransportEvent::Message(message))
    }

    /// Report the connection as closed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ChannelClosed`] if the transport was dropped.
    pub fn close(&self, reason: Option<String>) -> Result<()> {
        self.emit(TransportEvent::Close { reason })
    }

    /// Emit any transport event.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ChannelClosed`] if the transport was dropped.
    pub fn emit(&self, event: TransportEvent) -> Result<()> {
        self.outgoing
            .send(event)
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Next message from the client. `None` once the transport is dropped.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.incoming.recv().await
    }

    /// Next message from the client without waiting.
    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        self.incoming.try_recv().ok()
    }

    /// Split into the raw channel halves.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<ClientMessage>,
        mpsc::UnboundedSender<TransportEvent>,
    ) {
        (self.incoming, self.outgoing)
    }
}
