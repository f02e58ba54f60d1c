//! Process-wide relay lifecycle.
//!
//! [`ServerManager`] owns at most one running [`RelayServer`] and the task
//! driving its accept loop. [`ServerManager::global`] is the process-wide
//! instance; [`ServerManager::new`] builds an independent one.
//!
//! # Example
//!
//! ```ignore
//! use chat_relay::{ServerConfig, ServerManager, sink_fn};
//!
//! let manager = ServerManager::global();
//! manager.start(ServerConfig::new(), sink_fn(|event| println!("{event:?}"))).await?;
//!
//! assert!(ServerManager::is_running("127.0.0.1", 5000).await);
//!
//! manager.stop().await;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_CONNECT_TIMEOUT_MS, ServerConfig};
use crate::error::Result;
use crate::event::{ServerEvent, SharedSink};
use crate::transport::{RelayHandle, RelayServer};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for the liveness probe.
const PROBE_TIMEOUT: Duration = Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS);

// ============================================================================
// Types
// ============================================================================

/// A started relay and the controls needed to stop it.
struct Running {
    handle: RelayHandle,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    stop_timeout: Duration,
}

static GLOBAL: ServerManager = ServerManager::new();

// ============================================================================
// ServerManager
// ============================================================================

/// Starts and stops a single relay instance.
pub struct ServerManager {
    running: Mutex<Option<Running>>,
}

impl fmt::Debug for ServerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerManager").finish_non_exhaustive()
    }
}

impl Default for ServerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerManager {
    /// Creates a manager with no running relay.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            running: Mutex::const_new(None),
        }
    }

    /// Returns the process-wide manager.
    #[inline]
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Binds and starts a relay.
    ///
    /// Returns `Ok(false)` without binding anything if a relay is already
    /// running under this manager.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Startup`] if the address cannot be bound; the
    /// manager then reports nothing running.
    pub async fn start(&self, config: ServerConfig, sink: SharedSink<ServerEvent>) -> Result<bool> {
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_ref() {
            if !current.task.is_finished() {
                warn!(addr = %current.handle.local_addr(), "Relay already running");
                return Ok(false);
            }
            debug!("Discarding finished relay");
            *running = None;
        }

        let stop_timeout = config.stop_timeout();
        let server = RelayServer::bind(config, sink).await?;
        let handle = server.handle();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(server.run_until(async move {
            let _ = stop_rx.await;
        }));

        info!(addr = %handle.local_addr(), "Relay started");

        *running = Some(Running {
            handle,
            stop_tx,
            task,
            stop_timeout,
        });
        Ok(true)
    }

    /// Stops the relay, waiting a bounded time for the accept loop.
    ///
    /// Connection handlers are left to finish on their own. Calling this
    /// with nothing running is a no-op.
    pub async fn stop(&self) {
        let Some(Running {
            handle,
            stop_tx,
            mut task,
            stop_timeout,
        }) = self.running.lock().await.take()
        else {
            debug!("Stop requested with no relay running");
            return;
        };

        let _ = stop_tx.send(());

        if timeout(stop_timeout, &mut task).await.is_err() {
            warn!(
                addr = %handle.local_addr(),
                timeout_ms = stop_timeout.as_millis() as u64,
                "Accept loop did not stop in time"
            );
            task.abort();
        }

        info!(addr = %handle.local_addr(), "Relay stopped");
    }

    /// Returns `true` if this manager's accept loop is alive.
    pub async fn is_active(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Returns the address of the running relay.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.handle().await.map(|handle| handle.local_addr())
    }

    /// Returns a handle to the running relay.
    pub async fn handle(&self) -> Option<RelayHandle> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| running.handle.clone())
    }

    /// Probes `host:port` with a short-lived TCP connection.
    ///
    /// A successful connect only shows that something is listening, not
    /// that it speaks this protocol.
    pub async fn is_running(host: &str, port: u16) -> bool {
        match timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                debug!(host, port, error = %e, "Probe refused");
                false
            }
            Err(_) => {
                debug!(host, port, "Probe timed out");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
