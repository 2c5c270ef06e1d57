//! Client handle
//!
//! `JmqtClient` is the consumer-facing side of a session. Creating one
//! spawns the session task; the handle only sends it commands, so every
//! call returns immediately. Results arrive through the returned futures,
//! each of which completes exactly once. A future whose session is gone
//! completes with `StatusCode::NetworkError` instead of hanging.
//!
//! The session task lives as long as some `JmqtClient` clone does. It only
//! keeps a `WeakJmqtClient` itself, which it upgrades to hand the client to
//! the disconnect handler. Handlers that need the client should use that
//! argument or capture `client.downgrade()`. A strong clone captured by a
//! handler keeps the session alive.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::message::{AuthResult, ChannelResult, Push, PublishResult};
use super::registry::PacketIdGenerator;
use super::session::{Command, Session, SessionSnapshot};
use crate::config::Settings;
use crate::protocol::StatusCode;
use crate::utils::error::JmqtError;

/// Result of an asynchronous client operation.
#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<T>,
    fallback: Option<T>,
}

impl<T> Pending<T> {
    fn new(receiver: oneshot::Receiver<T>, fallback: T) -> Self {
        Self {
            receiver,
            fallback: Some(fallback),
        }
    }
}

impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(_)) => Poll::Ready(
                self.fallback
                    .take()
                    .expect("Pending polled after completion"),
            ),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// An in-flight publish. The packet identifier is known as soon as
/// `publish` returns; awaiting the value yields the server's `pubAck`.
#[derive(Debug)]
pub struct Publication {
    packet_id: String,
    reply: Pending<PublishResult>,
}

impl Publication {
    pub fn packet_id(&self) -> &str {
        &self.packet_id
    }
}

impl Future for Publication {
    type Output = PublishResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<PublishResult> {
        Pin::new(&mut self.reply).poll(cx)
    }
}

/// State shared by every clone of a client. The only strong command sender
/// lives here, so the session's command channel closes with the last clone.
#[derive(Debug)]
struct Shared {
    address: String,
    commands: mpsc::UnboundedSender<Command>,
    packet_ids: PacketIdGenerator,
}

#[derive(Debug, Clone)]
pub struct JmqtClient {
    shared: Arc<Shared>,
}

/// Client reference that does not keep the session alive.
#[derive(Debug, Clone, Default)]
pub struct WeakJmqtClient {
    shared: Weak<Shared>,
}

impl WeakJmqtClient {
    pub fn upgrade(&self) -> Option<JmqtClient> {
        self.shared.upgrade().map(|shared| JmqtClient { shared })
    }
}

impl JmqtClient {
    /// Spawns the session task. Must be called from within a tokio runtime.
    pub fn new(settings: &Settings) -> Self {
        let session = Session::new(
            settings.server.address(),
            settings.client.control_prefix.clone(),
        );
        Self::start(session, settings.client.packet_id_limit)
    }

    pub(crate) fn start(mut session: Session, packet_id_limit: u32) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            address: session.address().to_string(),
            commands,
            packet_ids: PacketIdGenerator::new(packet_id_limit),
        });
        let client = Self { shared };
        session.bind(client.downgrade());
        tokio::spawn(session.run(rx));
        client
    }

    pub fn downgrade(&self) -> WeakJmqtClient {
        WeakJmqtClient {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// WebSocket address of the server.
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    fn command(&self, command: Command) -> bool {
        self.shared.commands.send(command).is_ok()
    }

    /// Registers the consumer of pushed messages, replacing any earlier one.
    /// Handlers run on the session task and must not block.
    pub fn on_push<F>(&self, handler: F)
    where
        F: Fn(Push) + Send + 'static,
    {
        self.command(Command::OnPush(Box::new(handler)));
    }

    /// Registers the callback invoked with the client and the server address
    /// whenever the connection is lost or closed. The client argument can be
    /// used to reconnect.
    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: Fn(&JmqtClient, String) + Send + 'static,
    {
        self.command(Command::OnDisconnect(Box::new(handler)));
    }

    /// Sends `credentials` in an `auth` packet, opening the socket first if
    /// needed.
    pub fn authenticate(&self, credentials: Value) -> Pending<AuthResult> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Authenticate { credentials, reply });
        Pending::new(rx, AuthResult::failed(StatusCode::NetworkError))
    }

    /// Starts a session with credentials obtained from `authenticate`.
    /// Resolves with `Ok` straight away when already connected.
    pub fn connect(&self, client_id: &str, token: &str) -> Pending<StatusCode> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect {
            client_id: client_id.to_string(),
            token: token.to_string(),
            reply,
        });
        Pending::new(rx, StatusCode::NetworkError)
    }

    pub fn subscribe(&self, channel: &str, persistent: bool) -> Pending<ChannelResult> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Subscribe {
            channel: channel.to_string(),
            persistent,
            reply,
        });
        Pending::new(rx, network_error(channel))
    }

    pub fn unsubscribe(&self, channel: &str) -> Pending<ChannelResult> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Unsubscribe {
            channel: channel.to_string(),
            reply,
        });
        Pending::new(rx, network_error(channel))
    }

    /// Publishes `payload` on `channel`. A packet identifier is taken for
    /// every call, even when the client is offline.
    pub fn publish(&self, channel: &str, payload: Value, retain: bool, qos: u8) -> Publication {
        let packet_id = self.shared.packet_ids.next_id();
        let (reply, rx) = oneshot::channel();
        self.command(Command::Publish {
            channel: channel.to_string(),
            payload,
            retain,
            qos,
            packet_id: packet_id.clone(),
            reply,
        });

        let fallback = PublishResult {
            status: StatusCode::NetworkError,
            packet_id: packet_id.clone(),
            response: None,
        };
        Publication {
            packet_id,
            reply: Pending::new(rx, fallback),
        }
    }

    /// Closes the connection, sending `disconn` first when `send_notice` is
    /// set. Safe to call in any state.
    pub async fn disconnect(&self, send_notice: bool) {
        let (done, rx) = oneshot::channel();
        if self.command(Command::Disconnect { send_notice, done }) {
            let _ = rx.await;
        }
    }

    pub async fn stop(&self, send_notice: bool) {
        self.disconnect(send_notice).await;
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, JmqtError> {
        let (reply, rx) = oneshot::channel();
        if !self.command(Command::Snapshot(reply)) {
            return Err(JmqtError::SessionClosed);
        }
        rx.await.map_err(|_| JmqtError::SessionClosed)
    }

    pub async fn is_connected(&self) -> bool {
        self.snapshot()
            .await
            .map(|snapshot| snapshot.state.connected)
            .unwrap_or(false)
    }
}

fn network_error(channel: &str) -> ChannelResult {
    ChannelResult {
        status: StatusCode::NetworkError,
        channel: channel.to_string(),
    }
}
