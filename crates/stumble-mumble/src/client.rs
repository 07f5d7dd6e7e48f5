//! Mumble client connection.
//!
//! [`MumbleClient::connect`] opens a TLS connection, queues the version
//! handshake and spawns a background task that owns the framed stream. The
//! returned [`MumbleClient`] is a cheap, cloneable handle that talks to that
//! task; [`ClientEvent`]s come back on a channel.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, interval_at, timeout};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use stumble_core::{Bot, SendResult, User};

use crate::codec::{ControlPacket, MumbleCodec};
use crate::config::ConnectOptions;
use crate::error::{MumbleError, MumbleResult};
use crate::proto::{Authenticate, Ping, TextMessage, Version};
use crate::users::UserTable;

/// Default Mumble server port.
pub const DEFAULT_PORT: u16 = 64738;

/// Events reported by the connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The server finished synchronising state; the client may talk now.
    Ready {
        session: u32,
        welcome_text: Option<String>,
    },
    /// A text message addressed to the bot or its channel.
    Message { text: String, user: User },
    /// The server refused the authentication.
    Rejected { reason: String },
    /// The connection is gone. Sent exactly once, always last.
    ///
    /// `reason` is `None` when the disconnect was requested locally.
    Disconnected { reason: Option<String> },
}

/// Formats the `mumble://host:port` address used in logs and errors.
pub fn address(host: &str, port: u16) -> String {
    format!("mumble://{host}:{port}")
}

// =============================================================================
// Connection task
// =============================================================================

async fn emit(events: &mpsc::Sender<ClientEvent>, address: &str, event: ClientEvent) {
    if events.send(event).await.is_err() {
        trace!(address = %address, "Event receiver dropped");
    }
}

/// State owned by the background connection task.
struct SessionLoop<S> {
    framed: Framed<S, MumbleCodec>,
    outgoing: mpsc::Receiver<ControlPacket>,
    events: mpsc::Sender<ClientEvent>,
    shutdown: watch::Receiver<bool>,
    users: Arc<RwLock<UserTable>>,
    session: Arc<RwLock<Option<u32>>>,
    ping: Interval,
    address: String,
}

impl<S> SessionLoop<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Takes `&mut self` so the loop future needs `S: Send` only.
    async fn emit(&mut self, event: ClientEvent) {
        emit(&self.events, &self.address, event).await;
    }

    /// Applies one incoming packet. Returns `Some(reason)` if the connection
    /// must end.
    async fn handle_packet(&mut self, packet: ControlPacket) -> Option<String> {
        trace!(address = %self.address, packet = packet.name(), "Received");
        match packet {
            ControlPacket::ServerSync(sync) => {
                let session = sync.session.unwrap_or_default();
                *self.session.write() = Some(session);
                info!(address = %self.address, session, "Server sync complete");
                self.emit(ClientEvent::Ready {
                    session,
                    welcome_text: sync.welcome_text,
                })
                .await;
            }
            ControlPacket::UserState(state) => {
                self.users.write().apply(&state);
            }
            ControlPacket::UserRemove(remove) => {
                self.users.write().remove(remove.session);
                if *self.session.read() == Some(remove.session) {
                    let reason = remove.reason.unwrap_or_else(|| "removed".to_string());
                    warn!(address = %self.address, reason = %reason, "Removed from server");
                    return Some(reason);
                }
            }
            ControlPacket::TextMessage(message) => {
                let user = message
                    .actor
                    .and_then(|actor| self.users.read().get(actor).cloned());
                match user {
                    Some(user) => {
                        self.emit(ClientEvent::Message {
                            text: message.message,
                            user,
                        })
                        .await;
                    }
                    None => {
                        debug!(actor = ?message.actor, "Text message from unknown actor ignored");
                    }
                }
            }
            ControlPacket::Reject(reject) => {
                let reason = reject.describe();
                warn!(address = %self.address, reason = %reason, "Connection rejected");
                self.emit(ClientEvent::Rejected {
                    reason: reason.clone(),
                })
                .await;
                return Some(reason);
            }
            ControlPacket::Version(version) => {
                debug!(
                    address = %self.address,
                    release = version.release.as_deref().unwrap_or("unknown"),
                    "Server version"
                );
            }
            _ => {}
        }
        None
    }

    async fn run(mut self) {
        let reason = loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!(address = %self.address, "Mumble client shutting down");
                        let _ = self.framed.close().await;
                        break None;
                    }
                }

                Some(packet) = self.outgoing.recv() => {
                    trace!(address = %self.address, packet = packet.name(), "Sending");
                    if let Err(e) = self.framed.send(packet).await {
                        warn!(address = %self.address, error = %e, "Failed to send packet");
                        break Some(e.to_string());
                    }
                }

                _ = self.ping.tick() => {
                    let timestamp = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or_default();
                    let ping = ControlPacket::Ping(Ping {
                        timestamp: Some(timestamp),
                        ..Default::default()
                    });
                    if let Err(e) = self.framed.send(ping).await {
                        warn!(address = %self.address, error = %e, "Failed to send ping");
                        break Some(e.to_string());
                    }
                }

                incoming = self.framed.next() => match incoming {
                    Some(Ok(packet)) => {
                        if let Some(reason) = self.handle_packet(packet).await {
                            break Some(reason);
                        }
                    }
                    Some(Err(e)) => {
                        warn!(address = %self.address, error = %e, "Connection error");
                        break Some(e.to_string());
                    }
                    None => {
                        info!(address = %self.address, "Server closed connection");
                        break Some("connection closed by server".to_string());
                    }
                },
            }
        };

        self.users.write().clear();
        *self.session.write() = None;
        self.emit(ClientEvent::Disconnected { reason }).await;
    }
}

// =============================================================================
// MumbleClient
// =============================================================================

/// Handle to a live connection.
#[derive(Clone)]
pub struct MumbleClient {
    address: Arc<str>,
    outgoing: mpsc::Sender<ControlPacket>,
    shutdown: Arc<watch::Sender<bool>>,
    users: Arc<RwLock<UserTable>>,
    session: Arc<RwLock<Option<u32>>>,
}

impl MumbleClient {
    /// Connects to `host:port` over TLS.
    ///
    /// Returns the client handle and the receiver for its events.
    pub async fn connect(
        host: &str,
        port: u16,
        options: ConnectOptions,
    ) -> MumbleResult<(Self, mpsc::Receiver<ClientEvent>)> {
        let address = address(host, port);
        let failed = |reason: String| MumbleError::ConnectionFailed {
            address: address.clone(),
            reason,
        };

        info!(address = %address, "Connecting to Mumble server");

        let tcp = timeout(options.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| failed("timed out".to_string()))?
            .map_err(|e| failed(e.to_string()))?;
        tcp.set_nodelay(true)?;

        let mut builder = native_tls::TlsConnector::builder();
        builder.danger_accept_invalid_certs(options.accept_invalid_certs);
        if let Some(identity) = options.identity()? {
            builder.identity(identity);
        }
        let connector = builder
            .build()
            .map_err(|e| MumbleError::Tls(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let tls = timeout(options.connect_timeout, connector.connect(host, tcp))
            .await
            .map_err(|_| failed("TLS handshake timed out".to_string()))?
            .map_err(|e| failed(format!("TLS handshake failed: {e}")))?;

        info!(address = %address, "Mumble client connected");
        Ok(Self::from_stream(address, tls, &options))
    }

    /// Runs the protocol over an already established stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(
        address: String,
        stream: S,
        options: &ConnectOptions,
    ) -> (Self, mpsc::Receiver<ClientEvent>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<ControlPacket>(256);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let users = Arc::new(RwLock::new(UserTable::new()));
        let session = Arc::new(RwLock::new(None));

        // The channel is empty, so the handshake is always first in line.
        let _ = outgoing_tx.try_send(ControlPacket::Version(Version::client(&options.release)));

        let period = options.ping_interval.max(Duration::from_millis(10));
        let state = SessionLoop {
            framed: Framed::new(stream, MumbleCodec),
            outgoing: outgoing_rx,
            events: event_tx,
            shutdown: shutdown_rx,
            users: Arc::clone(&users),
            session: Arc::clone(&session),
            ping: interval_at(Instant::now() + period, period),
            address: address.clone(),
        };
        tokio::spawn(state.run());

        let client = Self {
            address: address.into(),
            outgoing: outgoing_tx,
            shutdown: Arc::new(shutdown_tx),
            users,
            session,
        };
        (client, event_rx)
    }

    async fn send(&self, packet: ControlPacket) -> MumbleResult<()> {
        self.outgoing
            .send(packet)
            .await
            .map_err(|_| MumbleError::NotConnected)
    }

    /// Sends credentials. The server answers with `ServerSync` or `Reject`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: Option<&str>,
        tokens: &[String],
    ) -> MumbleResult<()> {
        debug!(address = %self.address, username, "Authenticating");
        self.send(ControlPacket::Authenticate(Authenticate {
            username: Some(username.to_string()),
            password: password.map(str::to_string),
            tokens: tokens.to_vec(),
            opus: Some(true),
            client_type: Some(1),
            ..Default::default()
        }))
        .await
    }

    pub async fn send_text_to_user(&self, session: u32, text: &str) -> MumbleResult<()> {
        self.send(ControlPacket::TextMessage(TextMessage::to_user(session, text)))
            .await
    }

    pub async fn send_text_to_channel(&self, channel_id: u32, text: &str) -> MumbleResult<()> {
        self.send(ControlPacket::TextMessage(TextMessage::to_channel(
            channel_id, text,
        )))
        .await
    }

    /// Asks the connection task to close the stream.
    ///
    /// A `Disconnected { reason: None }` event follows.
    pub fn disconnect(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether both handles belong to the same connection.
    pub fn same_connection(&self, other: &MumbleClient) -> bool {
        Arc::ptr_eq(&self.shutdown, &other.shutdown)
    }

    /// `false` once the connection task has stopped.
    pub fn is_connected(&self) -> bool {
        !self.outgoing.is_closed()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Own session id, known after `Ready`.
    pub fn session(&self) -> Option<u32> {
        *self.session.read()
    }

    pub fn user(&self, session: u32) -> Option<User> {
        self.users.read().get(session).cloned()
    }

    pub fn find_user(&self, name: &str) -> Option<User> {
        self.users.read().find_by_name(name).cloned()
    }

    /// Connected users sorted by session id.
    pub fn users(&self) -> Vec<User> {
        self.users.read().snapshot()
    }
}

impl std::fmt::Debug for MumbleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MumbleClient")
            .field("address", &self.address)
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bot for MumbleClient {
    fn id(&self) -> &str {
        &self.address
    }

    async fn send_to_user(&self, session: u32, text: &str) -> SendResult<()> {
        Ok(self.send_text_to_user(session, text).await?)
    }

    async fn send_to_channel(&self, channel_id: u32, text: &str) -> SendResult<()> {
        Ok(self.send_text_to_channel(channel_id, text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Reject, ServerSync, UserRemove, UserState};
    use tokio::io::DuplexStream;

    type Server = Framed<DuplexStream, MumbleCodec>;

    fn pair() -> (MumbleClient, mpsc::Receiver<ClientEvent>, Server) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let options = ConnectOptions {
            ping_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let (client, events) =
            MumbleClient::from_stream(address("test", DEFAULT_PORT), client_io, &options);
        (client, events, Framed::new(server_io, MumbleCodec))
    }

    async fn next_packet(server: &mut Server) -> ControlPacket {
        server.next().await.unwrap().unwrap()
    }

    fn user_state(session: u32, name: &str) -> ControlPacket {
        ControlPacket::UserState(UserState {
            session: Some(session),
            name: Some(name.to_string()),
            channel_id: Some(0),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_handshake_and_authenticate() {
        let (client, _events, mut server) = pair();

        match next_packet(&mut server).await {
            ControlPacket::Version(v) => assert!(v.version_v2.is_some()),
            other => panic!("expected version, got {other:?}"),
        }

        client
            .authenticate("stumble", Some("hunter2"), &["tok".to_string()])
            .await
            .unwrap();
        match next_packet(&mut server).await {
            ControlPacket::Authenticate(auth) => {
                assert_eq!(auth.username.as_deref(), Some("stumble"));
                assert_eq!(auth.password.as_deref(), Some("hunter2"));
                assert_eq!(auth.tokens, vec!["tok"]);
            }
            other => panic!("expected authenticate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ready_message_and_reply() {
        let (client, mut events, mut server) = pair();
        let _version = next_packet(&mut server).await;

        server.send(user_state(1, "alice")).await.unwrap();
        server
            .send(ControlPacket::ServerSync(ServerSync {
                session: Some(2),
                welcome_text: Some("hello".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Ready {
                session: 2,
                welcome_text: Some("hello".into())
            })
        );
        assert_eq!(client.session(), Some(2));

        server
            .send(ControlPacket::TextMessage(TextMessage {
                actor: Some(1),
                session: vec![2],
                message: "!ping".into(),
                ..Default::default()
            }))
            .await
            .unwrap();

        match events.recv().await {
            Some(ClientEvent::Message { text, user }) => {
                assert_eq!(text, "!ping");
                assert_eq!(user.name, "alice");
                assert_eq!(user.session, 1);
            }
            other => panic!("expected message, got {other:?}"),
        }
        assert_eq!(client.find_user("alice").map(|u| u.session), Some(1));
        assert!(client.same_connection(&client.clone()));

        client.send_to_user(1, "pong").await.unwrap();
        match next_packet(&mut server).await {
            ControlPacket::TextMessage(reply) => {
                assert_eq!(reply.session, vec![1]);
                assert_eq!(reply.message, "pong");
            }
            other => panic!("expected text message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_actor_is_ignored() {
        let (_client, mut events, mut server) = pair();
        let _version = next_packet(&mut server).await;

        server
            .send(ControlPacket::TextMessage(TextMessage {
                actor: Some(99),
                message: "who am i".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        server.send(user_state(1, "alice")).await.unwrap();
        server
            .send(ControlPacket::TextMessage(TextMessage {
                actor: Some(1),
                message: "hi".into(),
                ..Default::default()
            }))
            .await
            .unwrap();

        match events.recv().await {
            Some(ClientEvent::Message { text, .. }) => assert_eq!(text, "hi"),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_disconnect() {
        let (client, mut events, mut server) = pair();
        let _version = next_packet(&mut server).await;

        client.disconnect();
        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Disconnected { reason: None })
        );
        assert_eq!(events.recv().await, None);
        assert!(matches!(
            client.send_to_user(1, "late").await,
            Err(stumble_core::SendError::NotConnected)
        ));
    }

    /// A stream that is `Send` but not `Sync`.
    struct SendOnly {
        inner: DuplexStream,
        _not_sync: std::marker::PhantomData<std::cell::Cell<()>>,
    }

    impl AsyncRead for SendOnly {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for SendOnly {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::pin::Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    #[tokio::test]
    async fn test_stream_need_not_be_sync() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let stream = SendOnly {
            inner: client_io,
            _not_sync: std::marker::PhantomData,
        };
        let (_client, mut events) =
            MumbleClient::from_stream(address("test", DEFAULT_PORT), stream, &ConnectOptions::default());
        let mut server = Framed::new(server_io, MumbleCodec);
        let _version = next_packet(&mut server).await;

        server
            .send(ControlPacket::ServerSync(ServerSync {
                session: Some(9),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Ready {
                session: 9,
                welcome_text: None
            })
        );
    }

    #[tokio::test]
    async fn test_server_close_disconnects_once() {
        let (_client, mut events, server) = pair();
        drop(server);

        match events.recv().await {
            Some(ClientEvent::Disconnected { reason: Some(_) }) => {}
            other => panic!("expected disconnect, got {other:?}"),
        }
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_reject_ends_connection() {
        let (_client, mut events, mut server) = pair();
        let _version = next_packet(&mut server).await;

        server
            .send(ControlPacket::Reject(Reject {
                r#type: Some(3),
                reason: Some("Wrong password".into()),
            }))
            .await
            .unwrap();

        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Rejected {
                reason: "WrongUserPW: Wrong password".into()
            })
        );
        match events.recv().await {
            Some(ClientEvent::Disconnected { reason: Some(reason) }) => {
                assert!(reason.contains("WrongUserPW"));
            }
            other => panic!("expected disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_removed_from_server() {
        let (_client, mut events, mut server) = pair();
        let _version = next_packet(&mut server).await;

        server
            .send(ControlPacket::ServerSync(ServerSync {
                session: Some(4),
                ..Default::default()
            }))
            .await
            .unwrap();
        let _ready = events.recv().await;

        server
            .send(ControlPacket::UserRemove(UserRemove {
                session: 4,
                reason: Some("kicked".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(
            events.recv().await,
            Some(ClientEvent::Disconnected {
                reason: Some("kicked".into())
            })
        );
    }
}
