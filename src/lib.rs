//! Chat Relay - multi-client text chat over length-prefixed TCP frames.
//!
//! A relay server accepts concurrent connections, registers each under the
//! alias sent in its first frame, and fans every message out to the other
//! connected clients. Joins and departures are announced with system
//! messages from the reserved `Sistema` alias.
//!
//! # Architecture
//!
//! - **Framing**: 10-byte decimal length header, then the payload
//! - **Session**: client handle; handshake, send, receive task, close
//! - **Registry**: live connections keyed by id, one lock for all fan-out
//! - **RelayServer**: accept loop plus one handler task per connection
//! - **ServerManager**: process-wide start/stop of a single relay
//!
//! # Quick Start
//!
//! ```no_run
//! use chat_relay::{ClientEvent, ServerConfig, ServerManager, Session, sink_fn};
//!
//! #[tokio::main]
//! async fn main() -> chat_relay::Result<()> {
//!     ServerManager::global()
//!         .start(ServerConfig::new(), sink_fn(|event| println!("{event:?}")))
//!         .await?;
//!
//!     let session = Session::connect("127.0.0.1", "alice", sink_fn(|event| {
//!         if let ClientEvent::Message(msg) = event {
//!             println!("{msg}");
//!         }
//!     }))
//!     .await?;
//!
//!     session.send("hola").await?;
//!     session.close().await;
//!     ServerManager::global().stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Server and client configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`event`] | Event sinks and event types |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | Process-wide server lifecycle |
//! | [`protocol`] | Frame codec and chat message model |
//! | [`transport`] | Relay server, registry and client session |

// ============================================================================
// Modules
// ============================================================================

/// Server and client configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event sinks and the events delivered through them.
pub mod event;

/// Type-safe identifiers.
pub mod identifiers;

/// Process-wide relay lifecycle.
pub mod manager;

/// Wire protocol: frames and chat messages.
pub mod protocol;

/// TCP transport: relay server, registry and client session.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{ClientConfig, ServerConfig};

// Error types
pub use error::{Error, Result};

// Events
pub use event::{ClientEvent, EventSink, FnSink, ServerEvent, SharedSink, sink_channel, sink_fn};

// Identifier types
pub use identifiers::ConnectionId;

// Lifecycle
pub use manager::ServerManager;

// Protocol types
pub use protocol::{ChatMessage, DEFAULT_ALIAS, SYSTEM_ALIAS, UNKNOWN_ALIAS};

// Transport types
pub use transport::{RelayHandle, RelayServer, Session};
