//! Server and client configuration.
//!
//! Both configs build fluently, and [`ServerConfig`] can also be loaded
//! from JSON with any field omitted.
//!
//! # Example
//!
//! ```ignore
//! use chat_relay::{ClientConfig, ServerConfig};
//!
//! let server = ServerConfig::new().with_port(0).with_outbound_queue(64);
//! let client = ClientConfig::new("alice").with_port(server.port);
//!
//! let loaded = ServerConfig::from_json(r#"{ "port": 6000 }"#)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_ALIAS;

// ============================================================================
// Constants
// ============================================================================

/// Default relay address.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default relay port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default upper bound on an accepted payload (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Default per-recipient outbound queue depth, in frames.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Default wait for the accept loop on stop.
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 1_000;

/// Default connect and liveness-probe timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;

// ============================================================================
// ServerConfig
// ============================================================================

/// Relay server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub host: IpAddr,

    /// Port to listen on (0 for an OS-assigned port).
    pub port: u16,

    /// Largest payload accepted from a client.
    pub max_frame_len: usize,

    /// Frames buffered per recipient before new ones are dropped.
    pub outbound_queue: usize,

    /// Milliseconds `stop` waits for the accept loop to finish.
    pub stop_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// Creates a config listening on `127.0.0.1:5000`.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON config; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the listen address.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Sets the listen port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the largest accepted payload.
    #[inline]
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Sets the per-recipient queue depth (at least 1).
    #[inline]
    #[must_use]
    pub fn with_outbound_queue(mut self, depth: usize) -> Self {
        self.outbound_queue = depth.max(1);
        self
    }

    /// Sets how long `stop` waits for the accept loop.
    #[inline]
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Returns the socket address to bind.
    #[inline]
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the stop timeout.
    #[inline]
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

// ============================================================================
// ClientConfig
// ============================================================================

/// Client session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay host name or address.
    pub host: String,

    /// Relay port.
    pub port: u16,

    /// Alias sent in the handshake.
    pub alias: String,

    /// Largest payload accepted from the relay.
    pub max_frame_len: usize,

    /// Milliseconds to wait for the transport to connect.
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            alias: DEFAULT_ALIAS.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    /// Creates a config for `alias` on the default endpoint.
    #[must_use]
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Self::default()
        }
    }

    /// Sets the relay host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the relay port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Points the config at `addr`.
    #[inline]
    #[must_use]
    pub fn with_addr(self, addr: SocketAddr) -> Self {
        self.with_host(addr.ip().to_string()).with_port(addr.port())
    }

    /// Sets the largest payload accepted from the relay.
    #[inline]
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Returns the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
