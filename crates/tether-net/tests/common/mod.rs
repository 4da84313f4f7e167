//! Shared helpers for dispatcher integration tests.

#![allow(dead_code)]

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tether_core::ConnectionGuard;
use tether_net::http::{Dispatcher, NetworkEvent, RequestId};
use tokio::sync::mpsc;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn id(raw: i64) -> RequestId {
    RequestId::new(raw).expect("non-zero request id")
}

/// Events forwarded from a dispatcher; the slot disconnects on drop.
pub struct Events {
    rx: mpsc::UnboundedReceiver<NetworkEvent>,
    _connection: ConnectionGuard<NetworkEvent>,
}

impl Deref for Events {
    type Target = mpsc::UnboundedReceiver<NetworkEvent>;

    fn deref(&self) -> &Self::Target {
        &self.rx
    }
}

impl DerefMut for Events {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.rx
    }
}

/// Forward every emitted event into a channel.
pub fn collect(dispatcher: &Dispatcher) -> Events {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = dispatcher.events().connect_scoped(move |event: &NetworkEvent| {
        let _ = tx.send(event.clone());
    });
    Events {
        rx,
        _connection: connection,
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<NetworkEvent>) -> NetworkEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Collect events for `id` up to and including its terminal event.
pub async fn until_terminal(
    rx: &mut mpsc::UnboundedReceiver<NetworkEvent>,
    id: RequestId,
) -> Vec<NetworkEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        if event.id() != id {
            continue;
        }
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Assert nothing else arrives within a short window.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<NetworkEvent>) {
    let extra = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(extra.is_err(), "unexpected event: {extra:?}");
}
