//! Lifecycle event bus.
//!
//! [`Server`](crate::server::Server) and [`crate::app::Application`] emit
//! [`Event`]s alongside `tracing` spans so an embedder can observe the
//! server's state machine without scraping logs. Delivery is best-effort:
//! a [`tokio::sync::broadcast`] channel drops the oldest message for a lagging
//! subscriber rather than applying back-pressure to the request path.

use tokio::sync::broadcast;

/// A lifecycle or per-request notification.
#[derive(Clone, Debug)]
pub enum Event {
    /// The listener is bound and accepting connections.
    Listening { addr: std::net::SocketAddr },
    /// A request finished; carries just enough to build an access-log line.
    Request { method: String, path: String, status: u16, elapsed_ms: u128 },
    /// `close()` was called and the server has stopped accepting new
    /// connections (in-flight ones may still be draining).
    Close,
    /// A shutdown signal was received and graceful drain has begun.
    Shutdown { signal: &'static str },
    /// Graceful drain finished; the process may exit now.
    ShutdownComplete,
    /// Graceful drain did not finish within its deadline.
    ShutdownError(String),
    /// A connection or dispatch error that does not abort the server.
    Error(String),
}

/// A cheap-to-clone broadcast handle. Subscribers lagging behind the
/// configured buffer size (default 256) silently miss the oldest events
/// rather than stalling the publisher.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Registers a new subscriber. Events published before this call are
    /// never delivered to it — late subscribers only observe events from
    /// the point they attach.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publishes `event`. Returns the number of subscribers it reached;
    /// `0` (no receivers) is not an error — emitting with nobody listening
    /// is the common case in production.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(Event::Close);
        assert!(matches!(rx.recv().await.unwrap(), Event::Close));
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.emit(Event::Close);
        let mut rx = bus.subscribe();
        bus.emit(Event::ShutdownComplete);
        assert!(matches!(rx.recv().await.unwrap(), Event::ShutdownComplete));
    }

    #[test]
    fn emit_with_no_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(Event::Close), 0);
    }
}
