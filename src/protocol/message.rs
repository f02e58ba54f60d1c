//! Chat message model.
//!
//! Relayed frames carry `alias|body`. The alias is everything before the
//! first `|`, so bodies may contain further separators.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Sender alias reserved for relay-generated notifications.
pub const SYSTEM_ALIAS: &str = "Sistema";

/// Placeholder alias that joins and leaves silently.
pub const DEFAULT_ALIAS: &str = "chat_user";

/// Alias given to frames that carry no `alias|` prefix.
pub const UNKNOWN_ALIAS: &str = "Desconocido";

/// Separator between alias and body on the wire.
const SEPARATOR: char = '|';

// ============================================================================
// ChatMessage
// ============================================================================

/// A `(sender alias, body)` pair, client-authored or system-generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender alias.
    pub alias: String,
    /// Message text.
    pub body: String,
}

impl ChatMessage {
    /// Creates a message from `alias`.
    #[inline]
    #[must_use]
    pub fn new(alias: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            body: body.into(),
        }
    }

    /// Creates a relay-generated message.
    #[inline]
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM_ALIAS, text)
    }

    /// System notification announcing that `alias` joined.
    #[must_use]
    pub fn joined(alias: &str) -> Self {
        Self::system(format!("{alias} se ha unido al chat."))
    }

    /// System notification announcing that `alias` left.
    #[must_use]
    pub fn left(alias: &str) -> Self {
        Self::system(format!("{alias} se ha desconectado."))
    }

    /// Parses a relayed `alias|body` payload.
    ///
    /// Payloads without a separator are attributed to [`UNKNOWN_ALIAS`].
    #[must_use]
    pub fn parse(payload: &str) -> Self {
        match payload.split_once(SEPARATOR) {
            Some((alias, body)) => Self::new(alias, body),
            None => Self::new(UNKNOWN_ALIAS, payload),
        }
    }

    /// Returns the `alias|body` wire form.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{}{SEPARATOR}{}", self.alias, self.body)
    }

    /// Returns the byte length of [`Self::to_wire`] without building it.
    #[inline]
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.alias.len() + SEPARATOR.len_utf8() + self.body.len()
    }

    /// Returns `true` if this message was generated by the relay.
    #[inline]
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.alias == SYSTEM_ALIAS
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.alias, self.body)
    }
}

// ============================================================================
// Tests
// ============================================================================
