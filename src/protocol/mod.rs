//! Wire protocol for the chat relay.
//!
//! # Protocol Overview
//!
//! Every unit on the wire is a frame: a fixed 10-byte ASCII header holding
//! the decimal payload length (left-justified, space-padded) followed by
//! exactly that many payload bytes.
//!
//! | Frame | Direction | Payload |
//! |-------|-----------|---------|
//! | Handshake | Client → Server | raw alias bytes |
//! | Chat | Client → Server | message body |
//! | Relay | Server → Client | `alias|body` |
//! | System | Server → Client | `Sistema|text` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Length-prefixed frame codec |
//! | `message` | `alias|body` chat message model |

// ============================================================================
// Submodules
// ============================================================================

/// Length-prefixed frame codec.
pub mod frame;

/// Chat message model and reserved aliases.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{HEADER_LEN, MAX_PAYLOAD_LEN, decode_header, encode, read_frame, write_frame};
pub use message::{ChatMessage, DEFAULT_ALIAS, SYSTEM_ALIAS, UNKNOWN_ALIAS};
