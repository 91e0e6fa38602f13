//! Event bus joining producers to the dispatch loop.
//!
//! Push transport and the task poller both publish here; a single consumer
//! drains the bus and feeds the conversation store, so merges stay
//! sequential.

use super::StreamEvent;
use tokio::sync::broadcast;

/// Sender half of the event bus.
#[derive(Clone)]
pub struct EventSender {
    tx: broadcast::Sender<StreamEvent>,
}

impl EventSender {
    /// Send an event.
    pub fn send(&self, event: StreamEvent) -> Result<(), BusError> {
        self.tx.send(event).map_err(|_| BusError::Closed)?;
        Ok(())
    }

    /// Send an event, ignoring a closed bus.
    ///
    /// Producers (transport, poller) outliving every consumer is a normal
    /// teardown order, not an error worth surfacing.
    pub fn publish(&self, event: StreamEvent) {
        let _ = self.send(event);
    }
}

/// Receiver half of the event bus.
pub struct EventReceiver {
    rx: broadcast::Receiver<StreamEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    pub async fn recv(&mut self) -> Result<StreamEvent, BusError> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BusError::Closed,
            broadcast::error::RecvError::Lagged(n) => BusError::Lagged(n),
        })
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<Option<StreamEvent>, BusError> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(BusError::Closed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(BusError::Lagged(n)),
        }
    }
}

/// Broadcast bus for stream events.
pub struct EventBus {
    tx: broadcast::Sender<StreamEvent>,
}

impl EventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Get a sender.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Channel closed")]
    Closed,
    #[error("Lagged behind by {0} events")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamEvent;

    #[test]
    fn test_bus_send_recv() {
        let bus = EventBus::new();
        let sender = bus.sender();
        let mut receiver = bus.subscribe();

        sender
            .send(StreamEvent::create_text("c", "i", "hi"))
            .unwrap();

        let event = receiver.try_recv().unwrap().unwrap();
        assert_eq!(event.item_id, "i");
    }

    #[test]
    fn test_bus_send_without_subscriber_is_err() {
        let bus = EventBus::new();
        let sender = bus.sender();

        let result = sender.send(StreamEvent::create_text("c", "i", "hi"));
        assert!(matches!(result, Err(BusError::Closed)));

        // publish swallows the same condition
        sender.publish(StreamEvent::create_text("c", "i", "hi"));
    }

    #[test]
    fn test_multiple_subscribers_see_every_event() {
        let bus = EventBus::new();
        let sender = bus.sender();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        sender.publish(StreamEvent::create_text("c", "i", "hi"));

        assert!(rx1.try_recv().unwrap().is_some());
        assert!(rx2.try_recv().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recv_closed() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        drop(bus);

        let result = receiver.recv().await;
        assert!(matches!(result, Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn test_recv_lagged() {
        let (tx, _) = broadcast::channel::<StreamEvent>(2);
        let mut receiver = EventReceiver { rx: tx.subscribe() };

        for i in 0..5 {
            let _ = tx.send(StreamEvent::create_text("c", format!("i{}", i), "x"));
        }

        match receiver.recv().await {
            Err(BusError::Lagged(n)) => assert!(n > 0),
            Ok(_) => {}
            Err(BusError::Closed) => panic!("Expected Lagged, got Closed"),
        }
    }

    #[tokio::test]
    async fn test_events_keep_order() {
        let bus = EventBus::new();
        let sender = bus.sender();
        let mut receiver = bus.subscribe();

        sender.publish(StreamEvent::create_text("c", "1", "a"));
        sender.publish(StreamEvent::append_text("c", "1", "b"));

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.op, crate::events::EventOp::Create);
        assert_eq!(second.op, crate::events::EventOp::Append);
    }
}
