//! TCP transport layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐                         ┌──────────────────────────┐
//! │   Session    │ ──── alias frame ─────► │       RelayServer        │
//! │   (alice)    │ ──── body frames ─────► │  accept loop             │
//! │              │ ◄─── alias|body ─────── │  ├─ handler (alice)      │
//! └──────────────┘                         │  ├─ handler (bob)        │
//! ┌──────────────┐                         │  └─ Registry             │
//! │   Session    │ ◄─── alice|hi ───────── │     id → alias, queue    │
//! │    (bob)     │                         └──────────────────────────┘
//! └──────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | Live connections, aliases and fan-out |
//! | `server` | Accept loop and per-connection relay |
//! | `session` | Client side of one connection |

// ============================================================================
// Submodules
// ============================================================================

/// Registry of live connections.
pub mod registry;

/// Relay server.
pub mod server;

/// Client session.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{DeliveryFailure, Registry};
pub use server::{RelayHandle, RelayServer};
pub use session::Session;
