//! WebSocket front end for the hub.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use super::Coordinator;
use crate::error::{Result, SyncError};
use crate::protocol::{ClientMessage, decode, encode};

/// Accept WebSocket clients on `listener` until accepting fails.
///
/// # Errors
///
/// Returns an error if the listener stops accepting connections.
pub async fn serve_websocket(listener: TcpListener, coordinator: Arc<Coordinator>) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "coordinator listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, coordinator).await {
                tracing::warn!(%peer, error = %e, "websocket connection failed");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, coordinator: Arc<Coordinator>) -> Result<()> {
    let peer = stream.peer_addr()?;
    let ws = accept_async(stream)
        .await
        .map_err(|e| SyncError::Transport {
            message: e.to_string(),
        })?;
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (id, mut outbound) = coordinator.connect().await;
    tracing::debug!(%peer, client_id = %id, "websocket client attached");

    let forward = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match encode(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode message");
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                tracing::debug!(error = %e, "websocket send failed");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match decode::<ClientMessage>(&text) {
                Ok(message) => coordinator.handle(&id, message).await,
                Err(e) => {
                    tracing::warn!(client_id = %id, error = %e, "dropping undecodable frame");
                }
            },
            Ok(Message::Close(_)) => break,
            // Pings are answered by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client_id = %id, error = %e, "websocket read failed");
                break;
            }
        }
    }

    coordinator.disconnect(&id).await;
    forward.abort();
    Ok(())
}
