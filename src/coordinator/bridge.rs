//! In-process bridge between the hub and a [`ChannelTransport`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::Coordinator;
use crate::testing::NetworkSimulator;
use crate::transport::{ChannelTransport, TransportEvent};

/// Forward `rx` to `deliver`, holding each item back by `delay()`.
///
/// Items keep their order even when a later one draws a shorter delay.
fn delayed_pipe<T, D, F>(
    mut rx: mpsc::UnboundedReceiver<T>,
    delay: D,
    mut deliver: F,
) -> tokio::task::JoinHandle<()>
where
    T: Send + 'static,
    D: Fn() -> Duration + Send + 'static,
    F: FnMut(T) -> bool + Send + 'static,
{
    let (stamped_tx, mut stamped_rx) = mpsc::unbounded_channel::<(Instant, T)>();

    tokio::spawn(async move {
        let mut last = Instant::now();
        while let Some(item) = rx.recv().await {
            let at = (Instant::now() + delay()).max(last);
            last = at;
            if stamped_tx.send((at, item)).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some((at, item)) = stamped_rx.recv().await {
            tokio::time::sleep_until(at).await;
            if !deliver(item) {
                break;
            }
        }
    })
}

impl Coordinator {
    /// Connect an in-process client over a simulated network.
    ///
    /// The returned transport reports `Open` immediately and `Close` once
    /// the coordinator drops the client. Dropping the transport disconnects
    /// the client.
    pub async fn connect_channel(self: &Arc<Self>, network: NetworkSimulator) -> ChannelTransport {
        let (transport, peer) = ChannelTransport::pair();
        let (uplink_rx, events_tx) = peer.into_parts();
        let (id, downlink_rx) = self.connect().await;

        let _ = events_tx.send(TransportEvent::Open);

        let down_network = network.clone();
        let down_events = events_tx.clone();
        let downlink = delayed_pipe(
            downlink_rx,
            move || down_network.downlink_delay(),
            move |message| down_events.send(TransportEvent::Message(message)).is_ok(),
        );
        tokio::spawn(async move {
            let _ = downlink.await;
            let _ = events_tx.send(TransportEvent::Close {
                reason: Some("coordinator closed the connection".to_string()),
            });
        });

        // Keep the coordinator's handling in arrival order.
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let uplink = delayed_pipe(
            uplink_rx,
            move || network.uplink_delay(),
            move |message| inbound_tx.send(message).is_ok(),
        );
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = inbound_rx.recv().await {
                coordinator.handle(&id, message).await;
            }
            let _ = uplink.await;
            coordinator.disconnect(&id).await;
        });

        transport
    }
}
