//! Client session: one connection to a relay server.
//!
//! # Event Loop
//!
//! [`Session::connect`] sends the alias handshake and spawns a receive
//! task that:
//!
//! - Reads frames and parses them as `alias|body`
//! - Emits [`ClientEvent::Message`] for each one
//! - Emits [`ClientEvent::Error`] with [`Error::ConnectionClosed`] when the
//!   server closes the stream, or the read error otherwise
//! - Exits silently once [`Session::close`] has been called or the last
//!   handle is dropped
//!
//! Whichever way the loop ends, it shuts down the write half so the server
//! sees the client leave.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::{ClientEvent, SharedSink};
use crate::protocol::{ChatMessage, read_frame, write_frame};

// ============================================================================
// Types
// ============================================================================

/// State shared between the session handles and the receive task.
struct SessionInner {
    alias: String,
    peer_addr: SocketAddr,
    connected: AtomicBool,
    closed: watch::Sender<bool>,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    sink: SharedSink<ClientEvent>,
}

impl SessionInner {
    /// Flips the session to disconnected, returning whether it was connected.
    fn mark_disconnected(&self) -> bool {
        self.connected.swap(false, Ordering::SeqCst)
    }

    /// Wakes every pending send and the receive task.
    fn signal_close(&self) {
        self.closed.send_replace(true);
    }

    /// Resolves once [`Self::signal_close`] has been called.
    fn wait_closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut closed = self.closed.subscribe();
        async move {
            let _ = closed.wait_for(|is_closed| *is_closed).await;
        }
    }

    /// Takes the write half, if still held, and shuts it down.
    async fn release_writer(&self) -> std::io::Result<bool> {
        let writer = self.writer.lock().await.take();
        match writer {
            Some(mut writer) => writer.shutdown().await.map(|()| true),
            None => Ok(false),
        }
    }
}

/// Owned by the user-facing handles only; closes the session when the last
/// one is dropped.
struct SessionHandle(Arc<SessionInner>);

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.0.mark_disconnected() {
            debug!(alias = %self.0.alias, "Session dropped without close");
        }
        self.0.signal_close();
    }
}

// ============================================================================
// Session
// ============================================================================

/// Client connection to a relay server.
///
/// Clones share the same connection. Dropping the last clone closes it.
///
/// # Example
///
/// ```ignore
/// use chat_relay::{ClientEvent, Session, sink_fn};
///
/// let session = Session::connect("127.0.0.1", "alice", sink_fn(|event| match event {
///     ClientEvent::Message(msg) => println!("{msg}"),
///     ClientEvent::Error(e) => eprintln!("{e}"),
/// }))
/// .await?;
///
/// session.send("hola").await?;
/// session.close().await;
/// ```
#[derive(Clone)]
pub struct Session {
    handle: Arc<SessionHandle>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("alias", &self.inner().alias)
            .field("peer_addr", &self.inner().peer_addr)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects to `host` on the default port.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the server cannot be reached or the
    ///   handshake cannot be written
    /// - [`Error::Timeout`] if the connect does not finish in time
    pub async fn connect(host: &str, alias: &str, sink: SharedSink<ClientEvent>) -> Result<Self> {
        Self::connect_with(ClientConfig::new(alias).with_host(host), sink).await
    }

    /// Connects using `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the server cannot be reached or the
    ///   handshake cannot be written
    /// - [`Error::Timeout`] if the connect does not finish in time
    pub async fn connect_with(config: ClientConfig, sink: SharedSink<ClientEvent>) -> Result<Self> {
        let target = (config.host.as_str(), config.port);
        let connect_timeout = config.connect_timeout();

        let stream = timeout(connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("connect to {} port {}", config.host, config.port),
                    connect_timeout.as_millis() as u64,
                )
            })?
            .map_err(|e| {
                Error::connection(format!("{} port {}: {e}", config.host, config.port))
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| Error::connection(format!("{} port {}: {e}", config.host, config.port)))?;
        let (reader, mut writer) = stream.into_split();

        write_frame(&mut writer, config.alias.as_bytes())
            .await
            .map_err(|e| Error::connection(format!("handshake with {peer_addr} failed: {e}")))?;

        let (closed, _) = watch::channel(false);
        let inner = Arc::new(SessionInner {
            alias: config.alias,
            peer_addr,
            connected: AtomicBool::new(true),
            closed,
            writer: AsyncMutex::new(Some(writer)),
            sink,
        });

        tokio::spawn(Self::receive_loop(
            Arc::clone(&inner),
            reader,
            config.max_frame_len,
        ));

        info!(alias = %inner.alias, %peer_addr, "Connected to relay");
        Ok(Self {
            handle: Arc::new(SessionHandle(inner)),
        })
    }

    #[inline]
    fn inner(&self) -> &SessionInner {
        &self.handle.0
    }

    /// Returns the alias sent in the handshake.
    #[inline]
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.inner().alias
    }

    /// Returns the server address.
    #[inline]
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner().peer_addr
    }

    /// Returns `true` until the session is closed by either side.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner().connected.load(Ordering::SeqCst)
    }

    /// Sends one chat message.
    ///
    /// A send still waiting on the socket is abandoned when the session
    /// closes.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the session is closed
    /// - [`Error::Encoding`] if the body is too large for a frame
    /// - [`Error::Send`] if the write fails or the session closes mid-write
    pub async fn send(&self, body: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let inner = self.inner();
        let closed = inner.wait_closed();
        tokio::pin!(closed);

        let mut writer = tokio::select! {
            biased;
            () = &mut closed => return Err(Error::NotConnected),
            writer = inner.writer.lock() => writer,
        };
        let writer = writer.as_mut().ok_or(Error::NotConnected)?;

        tokio::select! {
            biased;
            () = &mut closed => Err(Error::send("session closed during send")),
            result = write_frame(writer, body.as_bytes()) => result,
        }
    }

    /// Closes the session.
    ///
    /// Idempotent. Pending sends are abandoned. Close failures are
    /// reported through the sink.
    pub async fn close(&self) {
        let inner = self.inner();
        let was_connected = inner.mark_disconnected();
        inner.signal_close();

        if let Err(e) = inner.release_writer().await {
            warn!(alias = %inner.alias, error = %e, "Error closing connection");
            inner
                .sink
                .emit(ClientEvent::Error(Error::connection(format!(
                    "error closing connection: {e}"
                ))));
        }

        if was_connected {
            info!(alias = %inner.alias, "Session closed");
        }
    }

    /// Reads frames until the stream ends, fails, or the session is closed,
    /// then releases the connection.
    async fn receive_loop(
        inner: Arc<SessionInner>,
        mut reader: OwnedReadHalf,
        max_frame_len: usize,
    ) {
        let closed = inner.wait_closed();
        tokio::pin!(closed);

        loop {
            let frame = tokio::select! {
                () = &mut closed => break,
                frame = read_frame(&mut reader, max_frame_len) => frame,
            };

            match frame {
                Ok(Some(payload)) => {
                    if !inner.connected.load(Ordering::SeqCst) {
                        break;
                    }
                    let text = String::from_utf8_lossy(&payload);
                    inner.sink.emit(ClientEvent::Message(ChatMessage::parse(&text)));
                }

                Ok(None) => {
                    if inner.mark_disconnected() {
                        debug!(alias = %inner.alias, "Connection closed by server");
                        inner.sink.emit(ClientEvent::Error(Error::ConnectionClosed));
                    }
                    break;
                }

                Err(e) => {
                    if inner.mark_disconnected() {
                        warn!(alias = %inner.alias, error = %e, "Receive failed");
                        inner.sink.emit(ClientEvent::Error(e));
                    }
                    break;
                }
            }
        }

        inner.signal_close();
        drop(reader);
        match inner.release_writer().await {
            Ok(true) => debug!(alias = %inner.alias, "Connection released"),
            Ok(false) => {}
            Err(e) => debug!(alias = %inner.alias, error = %e, "Socket shutdown failed"),
        }

        debug!(alias = %inner.alias, "Receive loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
