//! Registry of live relay connections.
//!
//! Each registered connection owns a bounded outbound queue drained by its
//! writer task. Registration, removal and broadcast fan-out all run under
//! one lock, so a broadcast never observes a half-removed entry.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │              Registry                │
//! │  order:   [conn-1, conn-3, conn-4]   │
//! │  entries: conn-1 → (alice, queue)    │
//! │           conn-3 → (bob,   queue)    │
//! │           conn-4 → (carol, queue)    │
//! └──────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use crate::identifiers::ConnectionId;

// ============================================================================
// Types
// ============================================================================

/// One encoded frame shared by every recipient of a broadcast.
pub type OutboundFrame = Arc<[u8]>;

/// Sending side of a connection's outbound queue.
pub type OutboundTx = mpsc::Sender<OutboundFrame>;

/// A recipient that could not accept a broadcast frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Recipient connection.
    pub id: ConnectionId,
    /// Recipient alias.
    pub alias: String,
    /// Why the frame was not queued.
    pub reason: &'static str,
}

/// Registry entry.
struct Entry {
    alias: String,
    outbound: OutboundTx,
}

#[derive(Default)]
struct Inner {
    entries: FxHashMap<ConnectionId, Entry>,
    order: Vec<ConnectionId>,
}

// ============================================================================
// Registry
// ============================================================================

/// Live connections and their aliases.
///
/// Thread-safe; shared by every connection handler.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection.
    ///
    /// Returns the number of other live connections already using `alias`.
    pub fn register(&self, id: ConnectionId, alias: &str, outbound: OutboundTx) -> usize {
        let mut inner = self.inner.lock();

        let same_alias = inner
            .entries
            .values()
            .filter(|entry| entry.alias == alias)
            .count();

        let previous = inner.entries.insert(
            id,
            Entry {
                alias: alias.to_string(),
                outbound,
            },
        );
        if previous.is_none() {
            inner.order.push(id);
        }

        debug!(%id, alias, live = inner.order.len(), "Connection registered");
        same_alias
    }

    /// Removes a connection, returning its alias if it was registered.
    ///
    /// Dropping the entry closes the connection's outbound queue.
    pub fn remove(&self, id: ConnectionId) -> Option<String> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.remove(&id)?;
        inner.order.retain(|other| *other != id);

        debug!(%id, alias = %entry.alias, live = inner.order.len(), "Connection removed");
        Some(entry.alias)
    }

    /// Queues `frame` for every connection except `exclude`.
    ///
    /// Never blocks. Recipients whose queue is full or closed are skipped
    /// and returned; they stay registered.
    pub fn broadcast(
        &self,
        frame: &OutboundFrame,
        exclude: Option<ConnectionId>,
    ) -> Vec<DeliveryFailure> {
        let inner = self.inner.lock();
        let mut failures = Vec::new();
        let mut delivered = 0usize;

        for id in &inner.order {
            if Some(*id) == exclude {
                continue;
            }
            let Some(entry) = inner.entries.get(id) else {
                continue;
            };

            match entry.outbound.try_send(Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(err) => failures.push(DeliveryFailure {
                    id: *id,
                    alias: entry.alias.clone(),
                    reason: match err {
                        TrySendError::Full(_) => "outbound queue full",
                        TrySendError::Closed(_) => "connection is closing",
                    },
                }),
            }
        }

        trace!(delivered, failed = failures.len(), "Broadcast queued");
        failures
    }

    /// Returns the alias of a registered connection.
    #[cfg(test)]
    #[must_use]
    pub fn alias_of(&self, id: ConnectionId) -> Option<String> {
        self.inner
            .lock()
            .entries
            .get(&id)
            .map(|entry| entry.alias.clone())
    }

    /// Returns `true` if the connection is registered.
    #[cfg(test)]
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    /// Returns `true` if no connection is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns live aliases in registration order.
    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .map(|entry| entry.alias.clone())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
