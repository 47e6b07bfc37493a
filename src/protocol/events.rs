use tokio::sync::broadcast;

/// Observable lifecycle events a client or server emits, in place of the
/// ambient `println!`/global-singleton logging the Swift/TypeScript ports
/// use for the same purpose (REDESIGN FLAGS). Subscribers that don't care
/// simply never call [`EventBus::subscribe`]; the channel costs nothing
/// until then.
#[derive(Debug, Clone)]
pub enum JanusEvent {
    RequestSent { request_id: String, request: String },
    ResponseReceived { request_id: String, success: bool },
    RequestTimedOut { request_id: String },
    RequestCancelled { request_id: String },
    ClientConnected { client_id: String },
    ClientEvicted { client_id: String },
    HandlerError { request_id: String, message: String },
}

/// Thin wrapper over a broadcast channel so callers don't need to reach for
/// `tokio::sync::broadcast` directly, and so the default capacity lives in
/// one place.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JanusEvent>,
}

impl EventBus {
    /// `capacity` bounds how many events a lagging subscriber can fall
    /// behind before it starts missing them (`broadcast::Receiver` returns
    /// `Lagged` in that case rather than blocking the publisher).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JanusEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Returns `false` if there are currently no
    /// subscribers — never an error, since nobody is required to listen.
    pub fn publish(&self, event: JanusEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        assert!(bus.publish(JanusEvent::ClientConnected { client_id: "c1".to_string() }));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, JanusEvent::ClientConnected { client_id } if client_id == "c1"));
    }

    #[test]
    fn publish_without_subscribers_reports_no_recipients() {
        let bus = EventBus::default();
        assert!(!bus.publish(JanusEvent::RequestCancelled { request_id: "x".to_string() }));
    }
}
