//! Relay server: accept loop, handshake and per-connection relay.
//!
//! # Connection Lifecycle
//!
//! ```text
//! ACCEPTED → HANDSHAKING → REGISTERED → RELAYING → DISCONNECTED
//!                 │
//!                 └── empty header / empty or reserved alias → closed
//! ```
//!
//! 1. The accept loop spawns one handler task per TCP connection
//! 2. The handler reads one frame holding the alias
//! 3. The connection is registered and a writer task drains its queue
//! 4. Every frame read is broadcast to the other connections
//! 5. On EOF or any error the connection is removed and closed
//!
//! Failures on one connection are reported through the event sink and
//! never reach the accept loop or another handler.

// ============================================================================
// Imports
// ============================================================================

use std::future::{Future, pending};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::event::{ServerEvent, SharedSink};
use crate::identifiers::ConnectionId;
use crate::protocol::{ChatMessage, DEFAULT_ALIAS, SYSTEM_ALIAS, encode, read_frame};

use super::registry::{OutboundFrame, Registry};

// ============================================================================
// Constants
// ============================================================================

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Time a departing connection's writer gets to flush its queue.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Shared State
// ============================================================================

/// State shared by the accept loop and every connection handler.
struct Shared {
    registry: Registry,
    sink: SharedSink<ServerEvent>,
    max_frame_len: usize,
    outbound_queue: usize,
}

impl Shared {
    /// Reports a non-fatal failure.
    fn report(&self, err: Error) {
        self.sink.emit(ServerEvent::Error(err));
    }

    /// Encodes `message` once and queues it for every connection except
    /// `exclude`.
    ///
    /// Messages whose relayed frame would exceed `max_frame_len` are dropped
    /// and reported, since peers read with the same limit.
    fn broadcast(&self, message: &ChatMessage, exclude: Option<ConnectionId>) {
        let wire_len = message.wire_len();
        if wire_len > self.max_frame_len {
            warn!(alias = %message.alias, wire_len, "Message too large to relay");
            self.report(Error::protocol(format!(
                "message from {} is {wire_len} bytes with its alias prefix, limit is {}",
                message.alias, self.max_frame_len
            )));
            return;
        }

        let frame: OutboundFrame = match encode(message.to_wire().as_bytes()) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                self.report(e);
                return;
            }
        };

        // Reported after the registry lock is released.
        for failure in self.registry.broadcast(&frame, exclude) {
            warn!(
                id = %failure.id,
                alias = %failure.alias,
                reason = failure.reason,
                "Broadcast delivery failed"
            );
            self.report(Error::send(format!(
                "relay to {} failed: {}",
                failure.alias, failure.reason
            )));
        }
    }
}

// ============================================================================
// RelayServer
// ============================================================================

/// A bound relay server.
///
/// # Example
///
/// ```ignore
/// use chat_relay::{RelayServer, ServerConfig, sink_fn};
///
/// let server = RelayServer::bind(ServerConfig::new(), sink_fn(|event| {
///     println!("{event:?}");
/// }))
/// .await?;
///
/// let handle = server.handle();
/// tokio::spawn(server.run());
/// handle.announce("Bienvenidos");
/// ```
pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Startup`] if the address cannot be bound.
    pub async fn bind(config: ServerConfig, sink: SharedSink<ServerEvent>) -> Result<Self> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(%addr, error = %e, "Relay bind failed");
            Error::startup(addr, &e)
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::startup(addr, &e))?;

        info!(%local_addr, "Relay server bound");

        Ok(Self {
            listener,
            local_addr,
            shared: Arc::new(Shared {
                registry: Registry::new(),
                sink,
                max_frame_len: config.max_frame_len,
                outbound_queue: config.outbound_queue.max(1),
            }),
        })
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a handle that stays usable while the server runs.
    #[must_use]
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            local_addr: self.local_addr,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the accept loop forever.
    pub async fn run(self) {
        self.run_until(pending()).await;
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// The listener is closed on return. Connection handlers already
    /// spawned keep running until their peers leave.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            listener,
            local_addr,
            shared,
        } = self;
        tokio::pin!(shutdown);

        debug!(%local_addr, "Accept loop started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    debug!(%local_addr, "Accept loop stopping");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(Arc::clone(&shared), stream, addr));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                        shared.report(Error::receive(format!("accept failed: {e}")));
                        sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        info!(%local_addr, "Relay server stopped");
    }
}

// ============================================================================
// RelayHandle
// ============================================================================

/// Cloneable view of a running relay.
#[derive(Clone)]
pub struct RelayHandle {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
}

impl RelayHandle {
    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends a system message to every connection.
    pub fn announce(&self, text: &str) {
        info!(text, "Announcement");
        self.shared.broadcast(&ChatMessage::system(text), None);
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Returns registered aliases in join order.
    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        self.shared.registry.aliases()
    }
}

// ============================================================================
// Connection Handler
// ============================================================================

/// Drives one connection from handshake to close.
async fn handle_connection(shared: Arc<Shared>, stream: TcpStream, addr: SocketAddr) {
    debug!(?addr, "TCP connection accepted");

    if let Err(e) = stream.set_nodelay(true) {
        debug!(?addr, error = %e, "Failed to set TCP_NODELAY");
    }
    let (mut reader, writer) = stream.into_split();

    let alias = match handshake(&mut reader, shared.max_frame_len).await {
        Ok(alias) => alias,
        Err(e) => {
            warn!(?addr, error = %e, "Handshake rejected");
            shared.report(Error::protocol(format!("handshake from {addr}: {e}")));
            return;
        }
    };

    let id = ConnectionId::next();
    let (outbound_tx, outbound_rx) = mpsc::channel(shared.outbound_queue);
    let mut writer_task = tokio::spawn(write_loop(
        Arc::clone(&shared.sink),
        alias.clone(),
        writer,
        outbound_rx,
    ));

    let same_alias = shared.registry.register(id, &alias, outbound_tx);
    if same_alias > 0 {
        warn!(%id, alias = %alias, same_alias, "Alias already in use");
    }
    info!(%id, ?addr, alias = %alias, "Client registered");

    shared.sink.emit(ServerEvent::ClientConnected {
        id,
        addr,
        alias: alias.clone(),
    });
    if alias != DEFAULT_ALIAS {
        shared.broadcast(&ChatMessage::joined(&alias), None);
    }

    match relay(&shared, id, &alias, &mut reader).await {
        Ok(()) => debug!(%id, alias = %alias, "Client closed connection"),
        Err(e) => {
            warn!(%id, alias = %alias, error = %e, "Connection failed");
            shared.report(Error::receive(format!("messages from {alias}: {e}")));
        }
    }

    // Removing the entry closes the queue, so the writer flushes and exits.
    shared.registry.remove(id);
    if timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await.is_err() {
        debug!(%id, "Writer did not drain in time");
        writer_task.abort();
    }
    drop(reader);

    if alias != DEFAULT_ALIAS {
        shared.broadcast(&ChatMessage::left(&alias), None);
    }
    info!(%id, alias = %alias, "Client disconnected");
    shared.sink.emit(ServerEvent::ClientDisconnected { id, alias });
}

/// Reads the alias frame.
async fn handshake(reader: &mut OwnedReadHalf, max_frame_len: usize) -> Result<String> {
    let payload = read_frame(reader, max_frame_len)
        .await?
        .ok_or_else(|| Error::protocol("connection closed before alias header"))?;

    let alias = String::from_utf8(payload)
        .map_err(|_| Error::protocol("alias is not valid UTF-8"))?
        .trim()
        .to_string();

    if alias.is_empty() {
        return Err(Error::protocol("empty alias"));
    }
    if alias == SYSTEM_ALIAS {
        return Err(Error::protocol(format!("alias {SYSTEM_ALIAS:?} is reserved")));
    }
    Ok(alias)
}

/// Relays frames from one connection until it closes or fails.
async fn relay(
    shared: &Shared,
    id: ConnectionId,
    alias: &str,
    reader: &mut OwnedReadHalf,
) -> Result<()> {
    while let Some(payload) = read_frame(reader, shared.max_frame_len).await? {
        let body = String::from_utf8(payload)
            .map_err(|_| Error::protocol("message is not valid UTF-8"))?;

        shared.sink.emit(ServerEvent::MessageReceived {
            alias: alias.to_string(),
            body: body.clone(),
        });
        shared.broadcast(&ChatMessage::new(alias, body), Some(id));
    }
    Ok(())
}

/// Drains a connection's outbound queue onto the socket.
async fn write_loop(
    sink: SharedSink<ServerEvent>,
    alias: String,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!(alias = %alias, error = %e, "Write failed");
            sink.emit(ServerEvent::Error(Error::send(format!(
                "delivery to {alias} failed: {e}"
            ))));
            // The reader side notices the dead peer and deregisters it.
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(alias = %alias, error = %e, "Socket shutdown failed");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use tokio::io::AsyncReadExt;
    use tokio::sync::{mpsc::UnboundedReceiver, oneshot};

    use crate::config::{ClientConfig, DEFAULT_MAX_FRAME_LEN};
    use crate::event::{ClientEvent, sink_channel};
    use crate::transport::Session;

    const WAIT: Duration = Duration::from_secs(5);
    const QUIET: Duration = Duration::from_millis(200);

    struct TestRelay {
        addr: SocketAddr,
        handle: RelayHandle,
        events: UnboundedReceiver<ServerEvent>,
        stop: Option<oneshot::Sender<()>>,
    }

    impl TestRelay {
        async fn start() -> Self {
            Self::start_with(ServerConfig::new().with_port(0)).await
        }

        async fn start_with(config: ServerConfig) -> Self {
            let (sink, events) = sink_channel();
            let server = RelayServer::bind(config, sink).await.expect("bind");
            let addr = server.local_addr();
            let handle = server.handle();
            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            tokio::spawn(server.run_until(async move {
                let _ = stop_rx.await;
            }));
            Self {
                addr,
                handle,
                events,
                stop: Some(stop_tx),
            }
        }

        async fn connect(&mut self, alias: &str) -> (Session, UnboundedReceiver<ClientEvent>) {
            self.connect_with(ClientConfig::new(alias)).await
        }

        async fn connect_with(
            &mut self,
            config: ClientConfig,
        ) -> (Session, UnboundedReceiver<ClientEvent>) {
            let alias = config.alias.clone();
            let (sink, rx) = sink_channel();
            let session = Session::connect_with(config.with_addr(self.addr), sink)
                .await
                .expect("connect");
            self.wait_connected(&alias).await;
            (session, rx)
        }

        async fn next_event(&mut self) -> ServerEvent {
            timeout(WAIT, self.events.recv())
                .await
                .expect("server event in time")
                .expect("server sink open")
        }

        async fn wait_connected(&mut self, alias: &str) {
            loop {
                if let ServerEvent::ClientConnected { alias: got, .. } = self.next_event().await
                    && got == alias
                {
                    return;
                }
            }
        }

        async fn wait_disconnected(&mut self, alias: &str) {
            loop {
                if let ServerEvent::ClientDisconnected { alias: got, .. } = self.next_event().await
                    && got == alias
                {
                    return;
                }
            }
        }

        async fn wait_error(&mut self) -> Error {
            loop {
                if let ServerEvent::Error(e) = self.next_event().await {
                    return e;
                }
            }
        }
    }

    impl Drop for TestRelay {
        fn drop(&mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
        }
    }

    async fn next_message(rx: &mut UnboundedReceiver<ClientEvent>) -> ChatMessage {
        loop {
            let event = timeout(WAIT, rx.recv())
                .await
                .expect("client event in time")
                .expect("client sink open");
            if let ClientEvent::Message(msg) = event {
                return msg;
            }
        }
    }

    async fn assert_quiet(rx: &mut UnboundedReceiver<ClientEvent>) {
        if let Ok(Some(event)) = timeout(QUIET, rx.recv()).await {
            panic!("unexpected event: {event:?}");
        }
    }

    async fn raw_connect(addr: SocketAddr, alias: &str) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream
            .write_all(&encode(alias.as_bytes()).expect("encode"))
            .await
            .expect("handshake");
        stream
    }

    #[tokio::test]
    async fn test_bind_random_port() {
        let (sink, _events) = sink_channel();
        let server = RelayServer::bind(ServerConfig::new().with_port(0), sink)
            .await
            .expect("bind should succeed");

        assert!(server.local_addr().port() > 0);
        assert_eq!(server.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(server.handle().connection_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_in_use_is_startup_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = taken.local_addr().expect("addr").port();

        let (sink, _events) = sink_channel();
        let result = RelayServer::bind(ServerConfig::new().with_port(port), sink).await;

        assert!(matches!(result, Err(Error::Startup { .. })));
    }

    #[tokio::test]
    async fn test_alice_message_reaches_bob_only() {
        let mut relay = TestRelay::start().await;
        let (alice, mut alice_rx) = relay.connect("alice").await;
        assert_eq!(
            next_message(&mut alice_rx).await,
            ChatMessage::joined("alice")
        );

        let (_bob, mut bob_rx) = relay.connect("bob").await;
        assert_eq!(next_message(&mut alice_rx).await, ChatMessage::joined("bob"));
        assert_eq!(next_message(&mut bob_rx).await, ChatMessage::joined("bob"));

        alice.send("hi").await.expect("send");

        assert_eq!(next_message(&mut bob_rx).await, ChatMessage::new("alice", "hi"));
        assert_quiet(&mut alice_rx).await;

        match relay.next_event().await {
            ServerEvent::MessageReceived { alias, body } => {
                assert_eq!(alias, "alice");
                assert_eq!(body, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leave_notification_sent_once() {
        let mut relay = TestRelay::start().await;
        let (_alice, mut alice_rx) = relay.connect("alice").await;
        next_message(&mut alice_rx).await;

        let (bob, _bob_rx) = relay.connect("bob").await;
        assert_eq!(next_message(&mut alice_rx).await, ChatMessage::joined("bob"));

        bob.close().await;
        bob.close().await;
        relay.wait_disconnected("bob").await;

        assert_eq!(next_message(&mut alice_rx).await, ChatMessage::left("bob"));
        assert_quiet(&mut alice_rx).await;
        assert_eq!(relay.handle.aliases(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_default_alias_joins_and_leaves_silently() {
        let mut relay = TestRelay::start().await;
        let (_alice, mut alice_rx) = relay.connect("alice").await;
        next_message(&mut alice_rx).await;

        let (anon, _anon_rx) = relay.connect(DEFAULT_ALIAS).await;
        assert_eq!(relay.handle.connection_count(), 2);
        anon.close().await;
        relay.wait_disconnected(DEFAULT_ALIAS).await;

        assert_quiet(&mut alice_rx).await;
    }

    #[tokio::test]
    async fn test_empty_alias_rejected() {
        let mut relay = TestRelay::start().await;
        let mut stream = raw_connect(relay.addr, "").await;

        assert!(relay.wait_error().await.is_protocol_error());

        let mut buf = [0u8; 1];
        let read = timeout(WAIT, stream.read(&mut buf)).await.expect("closed in time");
        assert!(matches!(read, Ok(0) | Err(_)));
        assert_eq!(relay.handle.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_header_rejected() {
        let mut relay = TestRelay::start().await;
        let stream = TcpStream::connect(relay.addr).await.expect("connect");
        drop(stream);

        assert!(relay.wait_error().await.is_protocol_error());
        assert_eq!(relay.handle.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_system_alias_rejected() {
        let mut relay = TestRelay::start().await;
        let _stream = raw_connect(relay.addr, SYSTEM_ALIAS).await;

        let err = relay.wait_error().await;
        assert!(err.to_string().contains("reserved"));
        assert_eq!(relay.handle.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_alias_is_trimmed() {
        let mut relay = TestRelay::start().await;
        let _stream = raw_connect(relay.addr, "  dave \n").await;
        relay.wait_connected("dave").await;
        assert_eq!(relay.handle.aliases(), vec!["dave"]);
    }

    #[tokio::test]
    async fn test_failed_connection_is_isolated() {
        let mut relay = TestRelay::start().await;
        let (_bob, mut bob_rx) = relay.connect("bob").await;
        let (carol, _carol_rx) = relay.connect("carol").await;

        let mut broken = raw_connect(relay.addr, "alice").await;
        relay.wait_connected("alice").await;
        broken.write_all(b"not-a-len!").await.expect("garbage");
        relay.wait_disconnected("alice").await;

        carol.send("still here").await.expect("send");
        loop {
            let msg = next_message(&mut bob_rx).await;
            if msg.alias == "carol" {
                assert_eq!(msg.body, "still here");
                break;
            }
        }
        assert_eq!(relay.handle.aliases(), vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_messages_arrive_in_send_order() {
        let mut relay = TestRelay::start().await;
        let (alice, _alice_rx) = relay.connect("alice").await;
        let (_bob, mut bob_rx) = relay.connect("bob").await;

        for i in 0..50 {
            alice.send(&format!("msg {i}")).await.expect("send");
        }

        let mut received = Vec::new();
        while received.len() < 50 {
            let msg = next_message(&mut bob_rx).await;
            if msg.alias == "alice" {
                received.push(msg.body);
            }
        }
        let expected: Vec<String> = (0..50).map(|i| format!("msg {i}")).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_announce_reaches_everyone() {
        let mut relay = TestRelay::start().await;
        let (_a, mut a_rx) = relay.connect(DEFAULT_ALIAS).await;
        let (_b, mut b_rx) = relay.connect(DEFAULT_ALIAS).await;

        relay.handle.announce("Servidor en mantenimiento");

        let expected = ChatMessage::system("Servidor en mantenimiento");
        assert_eq!(next_message(&mut a_rx).await, expected);
        assert_eq!(next_message(&mut b_rx).await, expected);
    }

    #[tokio::test]
    async fn test_oversized_frame_disconnects() {
        let mut relay =
            TestRelay::start_with(ServerConfig::new().with_port(0).with_max_frame_len(8)).await;
        let (alice, _alice_rx) = relay.connect("alice").await;

        alice.send("this is far too long").await.expect("send");

        relay.wait_disconnected("alice").await;
        assert_eq!(relay.handle.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_message_at_frame_limit_reaches_peer() {
        let mut relay = TestRelay::start().await;
        let (alice, _alice_rx) = relay.connect("alice").await;
        let (bob, mut bob_rx) = relay.connect("bob").await;

        let body = "x".repeat(DEFAULT_MAX_FRAME_LEN - "alice|".len());
        alice.send(&body).await.expect("send");

        loop {
            let msg = next_message(&mut bob_rx).await;
            if msg.alias == "alice" {
                assert_eq!(msg.body.len(), body.len());
                break;
            }
        }
        assert!(bob.is_connected());
        assert_eq!(relay.handle.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_message_over_relay_limit_is_dropped() {
        const LIMIT: usize = 64;
        let mut relay =
            TestRelay::start_with(ServerConfig::new().with_port(0).with_max_frame_len(LIMIT)).await;
        let (alice, _alice_rx) = relay
            .connect_with(ClientConfig::new("alice").with_max_frame_len(LIMIT))
            .await;
        let (bob, mut bob_rx) = relay
            .connect_with(ClientConfig::new("bob").with_max_frame_len(LIMIT))
            .await;
        assert_eq!(next_message(&mut bob_rx).await, ChatMessage::joined("bob"));

        // Fits a frame on its own but not once prefixed with "alice|".
        alice.send(&"y".repeat(LIMIT - 2)).await.expect("send");
        let err = relay.wait_error().await;
        assert!(err.is_protocol_error());
        assert!(err.to_string().contains("alias prefix"));

        let fits = "z".repeat(LIMIT - "alice|".len());
        alice.send(&fits).await.expect("send");
        assert_eq!(next_message(&mut bob_rx).await, ChatMessage::new("alice", fits));

        assert!(bob.is_connected());
        assert_eq!(relay.handle.aliases(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_dropped_session_deregisters() {
        let mut relay = TestRelay::start().await;
        let (_bob, mut bob_rx) = relay.connect("bob").await;
        next_message(&mut bob_rx).await;
        let (alice, _alice_rx) = relay.connect("alice").await;
        assert_eq!(next_message(&mut bob_rx).await, ChatMessage::joined("alice"));

        drop(alice);
        relay.wait_disconnected("alice").await;

        assert_eq!(next_message(&mut bob_rx).await, ChatMessage::left("alice"));
        assert_eq!(relay.handle.aliases(), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_client_receive_failure_deregisters() {
        let mut relay = TestRelay::start().await;
        let (alice, _alice_rx) = relay.connect("alice").await;
        let (bob, mut bob_rx) = relay
            .connect_with(ClientConfig::new("bob").with_max_frame_len(48))
            .await;
        assert_eq!(next_message(&mut bob_rx).await, ChatMessage::joined("bob"));

        alice.send(&"w".repeat(60)).await.expect("send");

        let failure = loop {
            let event = timeout(WAIT, bob_rx.recv())
                .await
                .expect("client event in time")
                .expect("client sink open");
            if let ClientEvent::Error(e) = event {
                break e;
            }
        };
        assert!(failure.is_protocol_error());
        assert!(!bob.is_connected());

        relay.wait_disconnected("bob").await;
        assert_eq!(relay.handle.aliases(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_stop_closes_listener() {
        let mut relay = TestRelay::start().await;
        let (_alice, _rx) = relay.connect("alice").await;
        let addr = relay.addr;

        drop(relay.stop.take());
        sleep(QUIET).await;

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
