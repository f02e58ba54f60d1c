//! Event delivery from the relay core to its front-end.
//!
//! Events are emitted synchronously from whichever task detected them.
//! A front-end with single-threaded state should hand them to its own
//! context, which is what the channel sink does.
//!
//! # Sinks
//!
//! | Sink | Delivery |
//! |------|----------|
//! | [`FnSink`] | Calls a closure inline |
//! | `mpsc::UnboundedSender<E>` | Queues the event for a consumer task |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Error;
use crate::identifiers::ConnectionId;
use crate::protocol::ChatMessage;

// ============================================================================
// EventSink
// ============================================================================

/// Receiver of relay events.
pub trait EventSink<E>: Send + Sync + 'static {
    /// Delivers one event.
    fn emit(&self, event: E);
}

/// Shared, type-erased sink.
pub type SharedSink<E> = Arc<dyn EventSink<E>>;

/// Closure-backed sink.
pub struct FnSink<F>(F);

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSink")
    }
}

impl<E, F> EventSink<E> for FnSink<F>
where
    F: Fn(E) + Send + Sync + 'static,
{
    fn emit(&self, event: E) {
        (self.0)(event);
    }
}

impl<E> EventSink<E> for mpsc::UnboundedSender<E>
where
    E: Send + 'static,
{
    fn emit(&self, event: E) {
        if self.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

/// Wraps a closure as a shared sink.
#[must_use]
pub fn sink_fn<E, F>(f: F) -> SharedSink<E>
where
    E: 'static,
    F: Fn(E) + Send + Sync + 'static,
{
    Arc::new(FnSink(f))
}

/// Creates a queued sink and the receiver that drains it.
#[must_use]
pub fn sink_channel<E>() -> (SharedSink<E>, mpsc::UnboundedReceiver<E>)
where
    E: Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: SharedSink<E> = Arc::new(tx);
    (sink, rx)
}

// ============================================================================
// ServerEvent
// ============================================================================

/// Notifications raised by the relay server.
#[derive(Debug)]
pub enum ServerEvent {
    /// A client completed the handshake and was registered.
    ClientConnected {
        /// Registry key of the connection.
        id: ConnectionId,
        /// Remote address.
        addr: SocketAddr,
        /// Alias sent in the handshake.
        alias: String,
    },

    /// A registered client left.
    ClientDisconnected {
        /// Registry key of the connection.
        id: ConnectionId,
        /// Alias of the departed client.
        alias: String,
    },

    /// A chat message arrived from a client.
    MessageReceived {
        /// Sender alias.
        alias: String,
        /// Message text.
        body: String,
    },

    /// A non-fatal failure on one connection.
    Error(Error),
}

// ============================================================================
// ClientEvent
// ============================================================================

/// Notifications raised by a client session.
#[derive(Debug)]
pub enum ClientEvent {
    /// A relayed or system message arrived.
    Message(ChatMessage),

    /// The session failed or the server closed it.
    ///
    /// [`Error::ConnectionClosed`] marks a close initiated by the server.
    Error(Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fn_sink_calls_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sink = sink_fn(move |_: ServerEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        sink.emit(ServerEvent::Error(Error::ConnectionClosed));
        sink.emit(ServerEvent::Error(Error::ConnectionClosed));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_channel_sink_queues_events() {
        let (sink, mut rx) = sink_channel::<ClientEvent>();
        sink.emit(ClientEvent::Message(ChatMessage::new("bob", "hi")));

        match rx.try_recv() {
            Ok(ClientEvent::Message(msg)) => assert_eq!(msg.body, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = sink_channel::<ClientEvent>();
        drop(rx);
        sink.emit(ClientEvent::Error(Error::NotConnected));
    }
}
