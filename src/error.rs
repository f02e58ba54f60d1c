//! Error types for the chat relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chat_relay::{Result, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     session.send("hola").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Framing | [`Error::Encoding`], [`Error::Protocol`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | I/O on a live connection | [`Error::Send`], [`Error::Receive`] |
//! | Lifecycle | [`Error::Startup`], [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::net::SocketAddr;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// Payload too large for the fixed-width length header.
    #[error("Payload of {length} bytes does not fit a {width}-digit header")]
    Encoding {
        /// Byte length of the rejected payload.
        length: usize,
        /// Header width in digits.
        width: usize,
    },

    /// Malformed or absent header, bad handshake, or stream closed mid-frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport could not be established or was refused.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The peer closed the stream at a frame boundary.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Operation attempted on a session that is not connected.
    #[error("Not connected to server")]
    NotConnected,

    // ========================================================================
    // Established Connection Errors
    // ========================================================================
    /// Write failure on an established connection.
    #[error("Send failed: {message}")]
    Send {
        /// Description of the write failure.
        message: String,
    },

    /// Read failure on an established connection.
    #[error("Receive failed: {message}")]
    Receive {
        /// Description of the read failure.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Listening socket could not be bound.
    #[error("Failed to start server on {addr}: {message}")]
    Startup {
        /// Address the server tried to bind.
        addr: SocketAddr,
        /// Description of the bind failure.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON configuration error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an encoding error.
    #[inline]
    pub fn encoding(length: usize, width: usize) -> Self {
        Self::Encoding { length, width }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a send error.
    #[inline]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    /// Creates a receive error.
    #[inline]
    pub fn receive(message: impl Into<String>) -> Self {
        Self::Receive {
            message: message.into(),
        }
    }

    /// Creates a startup error.
    #[inline]
    pub fn startup(addr: SocketAddr, err: &IoError) -> Self {
        Self::Startup {
            addr,
            message: err.to_string(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the peer closed the connection cleanly.
    #[inline]
    #[must_use]
    pub fn is_closed_by_peer(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::NotConnected
        )
    }

    /// Returns `true` if this is a framing or handshake error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::Encoding { .. })
    }

    /// Returns `true` if the error aborts server startup.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
