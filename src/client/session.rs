//! Session state machine
//!
//! One `Session` runs as a single tokio task per client and owns every
//! piece of mutable state: the socket, the session flags, the correlation
//! registry, the heartbeat timer and the consumer handlers. Commands from
//! the `JmqtClient` handle, transport events and heartbeat deadlines are
//! multiplexed in `run`, so handlers always run to completion one at a
//! time.
//!
//! Lifecycle:
//! `Idle -> Opening -> AuthPending | ConnectPending -> Connected`, and
//! `Disconnected` from anywhere when the socket closes or the consumer
//! disconnects.

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use super::heartbeat::{Heartbeat, Liveness};
use super::message::{AuthResult, ChannelResult, ClientIdentity, Push, PublishResult};
use super::pubsub_client::WeakJmqtClient;
use super::push::{DisconnectHandler, PushDispatcher, PushHandler};
use super::registry::{Registry, Reply};
use crate::protocol::{self, Inbound, Outbound, StatusCode};
use crate::transport::{self, Connection, TransportEvent};
use crate::utils::error::JmqtError;

/// Requests from the client handle to the session task.
pub enum Command {
    Authenticate {
        credentials: Value,
        reply: Reply<AuthResult>,
    },
    Connect {
        client_id: String,
        token: String,
        reply: Reply<StatusCode>,
    },
    Subscribe {
        channel: String,
        persistent: bool,
        reply: Reply<ChannelResult>,
    },
    Unsubscribe {
        channel: String,
        reply: Reply<ChannelResult>,
    },
    Publish {
        channel: String,
        payload: Value,
        retain: bool,
        qos: u8,
        packet_id: String,
        reply: Reply<PublishResult>,
    },
    Disconnect {
        send_notice: bool,
        done: Reply<()>,
    },
    OnPush(PushHandler),
    OnDisconnect(DisconnectHandler),
    Snapshot(Reply<SessionSnapshot>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Opening,
    /// Socket open, no authentication or session request in flight.
    Open,
    AuthPending,
    ConnectPending,
    Connected,
    Disconnected,
}

/// Session flags. Reset to their initial values whenever the socket goes
/// away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub opening: bool,
    pub socket_open: bool,
    pub auth_pending: bool,
    pub connect_pending: bool,
    pub connected: bool,
    pub disconnected: bool,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.connected {
            SessionPhase::Connected
        } else if self.opening {
            SessionPhase::Opening
        } else if self.socket_open && self.auth_pending {
            SessionPhase::AuthPending
        } else if self.socket_open && self.connect_pending {
            SessionPhase::ConnectPending
        } else if self.socket_open {
            SessionPhase::Open
        } else if self.disconnected {
            SessionPhase::Disconnected
        } else {
            SessionPhase::Idle
        }
    }

    fn reset(&mut self) {
        *self = Self {
            disconnected: true,
            ..Self::default()
        };
    }
}

/// Point-in-time view of a session, for consumers and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub state: SessionState,
    pub identity: Option<ClientIdentity>,
    pub heartbeat_timeout: std::time::Duration,
    pub heartbeat_cadence: std::time::Duration,
    pub outstanding: usize,
}

struct PendingAuth {
    credentials: Value,
    reply: Reply<AuthResult>,
}

struct PendingConnect {
    client_id: String,
    token: String,
    reply: Reply<StatusCode>,
}

pub struct Session {
    address: String,
    control_prefix: String,
    state: SessionState,
    identity: Option<ClientIdentity>,
    credentials: Option<Value>,
    generation: u64,
    link: Option<JoinHandle<()>>,
    connection: Option<Connection>,
    pending_auth: Option<PendingAuth>,
    pending_connect: Option<PendingConnect>,
    registry: Registry,
    heartbeat: Heartbeat,
    push: PushDispatcher,
    on_disconnect: Option<DisconnectHandler>,
    client: WeakJmqtClient,
    events_tx: UnboundedSender<TransportEvent>,
    events_rx: UnboundedReceiver<TransportEvent>,
}

impl Session {
    pub fn new(address: String, control_prefix: String) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            address,
            control_prefix,
            state: SessionState::default(),
            identity: None,
            credentials: None,
            generation: 0,
            link: None,
            connection: None,
            pending_auth: None,
            pending_connect: None,
            registry: Registry::new(),
            heartbeat: Heartbeat::new(),
            push: PushDispatcher::new(),
            on_disconnect: None,
            client: WeakJmqtClient::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Attaches the handle passed to the disconnect handler.
    pub fn bind(&mut self, client: WeakJmqtClient) {
        self.client = client;
    }

    /// Event loop. Ends when every client handle has been dropped, closing
    /// the socket without notice.
    pub async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        loop {
            let deadline = self.heartbeat.deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = sleep_until_some(deadline) => self.heartbeat_due(),
            }
        }

        debug!("Session for {} shutting down", self.address);
        self.close_transport(false);
        self.heartbeat.stop();
        self.registry.fail_all();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Authenticate { credentials, reply } => self.authenticate(credentials, reply),
            Command::Connect {
                client_id,
                token,
                reply,
            } => self.connect(client_id, token, reply),
            Command::Subscribe {
                channel,
                persistent,
                reply,
            } => self.subscribe(channel, persistent, reply),
            Command::Unsubscribe { channel, reply } => self.unsubscribe(channel, reply),
            Command::Publish {
                channel,
                payload,
                retain,
                qos,
                packet_id,
                reply,
            } => self.publish(channel, payload, retain, qos, packet_id, reply),
            Command::Disconnect { send_notice, done } => {
                self.disconnect(send_notice);
                let _ = done.send(());
            }
            Command::OnPush(handler) => self.push.register(handler),
            Command::OnDisconnect(handler) => self.on_disconnect = Some(handler),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.state.phase(),
            state: self.state.clone(),
            identity: self.identity.clone(),
            heartbeat_timeout: self.heartbeat.timeout(),
            heartbeat_cadence: self.heartbeat.cadence(),
            outstanding: self.registry.outstanding(),
        }
    }

    // ---- operations ------------------------------------------------------

    fn authenticate(&mut self, credentials: Value, reply: Reply<AuthResult>) {
        if let Some(previous) = self.pending_auth.take() {
            warn!("auth superseded by a newer request");
            let _ = previous.reply.send(AuthResult::failed(StatusCode::Failed));
        }
        self.pending_auth = Some(PendingAuth { credentials, reply });
        self.state.auth_pending = true;

        if self.state.socket_open {
            self.send_auth();
        } else {
            self.open_transport();
        }
    }

    fn connect(&mut self, client_id: String, token: String, reply: Reply<StatusCode>) {
        if self.state.connected {
            info!("already connected..");
            let _ = reply.send(StatusCode::Ok);
            return;
        }
        if let Some(previous) = self.pending_connect.take() {
            warn!("conn superseded by a newer request");
            let _ = previous.reply.send(StatusCode::Failed);
        }
        self.pending_connect = Some(PendingConnect {
            client_id,
            token,
            reply,
        });
        self.state.connect_pending = true;

        if self.state.socket_open {
            self.send_conn();
        } else {
            self.open_transport();
        }
    }

    fn subscribe(&mut self, channel: String, persistent: bool, reply: Reply<ChannelResult>) {
        let packet = Outbound::Sub {
            channel: channel.clone(),
            persistent: u8::from(persistent),
        };
        match self.send_connected(&packet) {
            Ok(()) => {
                info!("sub '{channel}' persistent {persistent}");
                self.registry.expect_subscribe(&channel, reply);
            }
            Err(e) => {
                error!("in sub '{channel}': {e}");
                let _ = reply.send(ChannelResult {
                    status: StatusCode::NetworkError,
                    channel,
                });
            }
        }
    }

    fn unsubscribe(&mut self, channel: String, reply: Reply<ChannelResult>) {
        let packet = Outbound::Unsub {
            channel: channel.clone(),
        };
        match self.send_connected(&packet) {
            Ok(()) => {
                info!("unsub '{channel}'");
                self.registry.expect_unsubscribe(&channel, reply);
            }
            Err(e) => {
                error!("in unsub '{channel}': {e}");
                let _ = reply.send(ChannelResult {
                    status: StatusCode::NetworkError,
                    channel,
                });
            }
        }
    }

    fn publish(
        &mut self,
        channel: String,
        payload: Value,
        retain: bool,
        qos: u8,
        packet_id: String,
        reply: Reply<PublishResult>,
    ) {
        let packet = Outbound::publish(
            &channel,
            payload,
            retain,
            qos,
            &packet_id,
            &self.control_prefix,
        );
        match self.send_connected(&packet) {
            Ok(()) => {
                debug!("pub '{channel}' packet # {packet_id} qos {qos} retain {retain}");
                self.registry.expect_publish(&packet_id, reply);
            }
            Err(e) => {
                error!("in pub '{channel}' packet # {packet_id}: {e}");
                let _ = reply.send(PublishResult {
                    status: StatusCode::NetworkError,
                    packet_id,
                    response: None,
                });
            }
        }
    }

    /// Closes the socket, optionally telling the server first. Harmless
    /// when there is no socket.
    pub fn disconnect(&mut self, send_notice: bool) {
        if self.close_transport(send_notice) {
            self.closed();
        }
    }

    // ---- transport -------------------------------------------------------

    fn open_transport(&mut self) {
        if self.state.opening || self.state.socket_open {
            return;
        }
        self.generation += 1;
        self.state.opening = true;
        self.state.disconnected = false;
        self.link = Some(transport::open(
            self.address.clone(),
            self.generation,
            self.events_tx.clone(),
        ));
    }

    /// Drops the current socket. Returns `false` if there was none.
    fn close_transport(&mut self, send_notice: bool) -> bool {
        let link = self.link.take();
        let connection = self.connection.take();
        if link.is_none() && connection.is_none() {
            return false;
        }

        if let Some(connection) = connection {
            if send_notice {
                info!("Sending disconn..");
                if let Err(e) = protocol::encode(&Outbound::Disconn {})
                    .and_then(|text| connection.send(text))
                {
                    debug!("disconn not sent: {e}");
                }
            }
            info!("Closing web socket {}", self.address);
            connection.close();
        }
        if let Some(link) = link {
            link.abort();
        }
        // anything still queued from this socket is stale now
        self.generation += 1;
        true
    }

    fn send(&self, packet: &Outbound) -> Result<(), JmqtError> {
        let connection = self.connection.as_ref().ok_or(JmqtError::NotOpen)?;
        connection
            .send(protocol::encode(packet)?)
            .inspect_err(|e| debug!("{} not sent: {e}", packet.kind()))
    }

    fn send_connected(&self, packet: &Outbound) -> Result<(), JmqtError> {
        if !self.state.connected {
            return Err(JmqtError::NotConnected);
        }
        self.send(packet)
    }

    fn send_auth(&mut self) {
        let Some(pending) = &self.pending_auth else {
            return;
        };
        let packet = Outbound::Auth {
            data: pending.credentials.clone(),
        };
        info!("auth..");
        if let Err(e) = self.send(&packet) {
            error!("in auth: {e}");
            self.state.auth_pending = false;
            if let Some(pending) = self.pending_auth.take() {
                let _ = pending.reply.send(AuthResult::failed(StatusCode::NetworkError));
            }
        }
    }

    fn send_conn(&mut self) {
        let Some(pending) = &self.pending_connect else {
            return;
        };
        let packet = Outbound::Conn {
            token: pending.token.clone(),
            client_id: pending.client_id.clone(),
        };
        info!("conn..");
        if let Err(e) = self.send(&packet) {
            error!("in conn: {e}");
            self.state.connect_pending = false;
            if let Some(pending) = self.pending_connect.take() {
                let _ = pending.reply.send(StatusCode::NetworkError);
            }
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        if event.generation() != self.generation {
            debug!("ignoring event from an abandoned socket");
            return;
        }
        match event {
            TransportEvent::Opened { connection, .. } => self.opened(connection),
            TransportEvent::Message { text, .. } => match protocol::decode(&text) {
                Ok(packet) => self.incoming(packet),
                Err(e) => warn!(
                    "Invalid packet from server: {e} | {}",
                    text.chars().take(100).collect::<String>()
                ),
            },
            TransportEvent::Closed { .. } => {
                self.link = None;
                self.connection = None;
                self.generation += 1;
                self.closed();
            }
        }
    }

    fn opened(&mut self, connection: Connection) {
        self.state.opening = false;
        self.state.socket_open = true;
        self.connection = Some(connection);

        if self.pending_auth.is_some() {
            self.send_auth();
        }
        if self.pending_connect.is_some() {
            self.send_conn();
        }
    }

    /// The socket is gone, whoever closed it.
    fn closed(&mut self) {
        info!("Disconnected from {}", self.address);
        self.heartbeat.stop();

        if let Some(pending) = self.pending_auth.take() {
            let _ = pending.reply.send(AuthResult::failed(StatusCode::NetworkError));
        }
        if let Some(pending) = self.pending_connect.take() {
            let _ = pending.reply.send(StatusCode::NetworkError);
        }
        let abandoned = self.registry.fail_all();
        if abandoned > 0 {
            info!("{abandoned} outstanding request(s) failed by disconnect");
        }

        self.identity = None;
        self.credentials = None;
        self.state.reset();

        if let (Some(handler), Some(client)) = (&self.on_disconnect, self.client.upgrade()) {
            handler(&client, self.address.clone());
        }
    }

    // ---- inbound packets -------------------------------------------------

    fn incoming(&mut self, packet: Inbound) {
        match packet {
            Inbound::AuthAck {
                status,
                token,
                client_id,
                message,
            } => self.auth_ack(status, token, client_id, message),
            Inbound::ConnAck { status, interval } => self.conn_ack(status, interval),
            Inbound::HeartbeatAck {} => {
                debug!("hbAck");
                self.heartbeat.acknowledged(Instant::now());
            }
            Inbound::SubAck { status, channel } => {
                if self.registry.resolve_subscribe(status, &channel) {
                    debug!("subAck for '{channel}', status {status}");
                } else {
                    warn!("subAck for unknown channel '{channel}', status {status}");
                }
            }
            Inbound::UnsubAck { status, channel } => {
                if self.registry.resolve_unsubscribe(status, &channel) {
                    debug!("unsubAck for '{channel}', status {status}");
                } else {
                    warn!("unsubAck for unknown channel '{channel}', status {status}");
                }
            }
            Inbound::PubAck {
                status,
                packet_id,
                data,
            } => {
                if self.registry.resolve_publish(status, &packet_id, data) {
                    debug!("pubAck for packet # {packet_id}, status {status}");
                } else {
                    warn!("pubAck for unknown packet # {packet_id}, status {status}");
                }
            }
            Inbound::Push {
                channel,
                sender,
                data,
                qos,
                retained,
                packet_id,
            } => {
                let push = Push {
                    channel,
                    sender,
                    payload: data,
                    qos,
                    retained,
                };
                if let Some(packet_id) = PushDispatcher::acknowledgement(&push, packet_id) {
                    self.push_ack(packet_id);
                }
                self.push.deliver(push);
            }
        }
    }

    fn auth_ack(
        &mut self,
        status: StatusCode,
        token: Option<String>,
        client_id: Option<String>,
        message: Option<String>,
    ) {
        info!("authAck, status {status}");
        self.state.auth_pending = false;
        let Some(pending) = self.pending_auth.take() else {
            warn!("authAck without a pending auth request");
            return;
        };

        let result = if status.is_ok() {
            let token = token.unwrap_or_default();
            let client_id = client_id.unwrap_or_default();
            self.identity = Some(ClientIdentity {
                credentials: pending.credentials.clone(),
                client_id: client_id.clone(),
                auth_token: token.clone(),
            });
            self.credentials = Some(pending.credentials);
            AuthResult {
                status,
                token,
                client_id,
                message: String::new(),
            }
        } else {
            AuthResult {
                message: message.unwrap_or_default(),
                ..AuthResult::failed(status)
            }
        };
        let _ = pending.reply.send(result);
    }

    fn conn_ack(&mut self, status: StatusCode, interval: u64) {
        info!("connAck, status {status}");
        self.state.connect_pending = false;
        let pending = self.pending_connect.take();

        if status.is_ok() {
            self.state.connected = true;
            if let Some(pending) = &pending {
                self.identity = Some(ClientIdentity {
                    credentials: self.credentials.clone().unwrap_or(Value::Null),
                    client_id: pending.client_id.clone(),
                    auth_token: pending.token.clone(),
                });
            }
            if let Liveness::Alive(due) = self.heartbeat.start(interval, Instant::now()) {
                debug!(
                    "heartbeat every {:?}, timeout {:?}, first due in {:?}",
                    self.heartbeat.cadence(),
                    self.heartbeat.timeout(),
                    due.saturating_duration_since(Instant::now())
                );
            }
        }

        match pending {
            Some(pending) => {
                let _ = pending.reply.send(status);
            }
            None => warn!("connAck without a pending conn request"),
        }
    }

    fn push_ack(&self, packet_id: String) {
        info!("pushAck packet # '{packet_id}'");
        if let Err(e) = self.send(&Outbound::PushAck { packet_id }) {
            error!("in pushAck: {e}");
        }
    }

    // ---- heartbeat -------------------------------------------------------

    fn heartbeat_due(&mut self) {
        if !self.state.connected {
            debug!("heartbeat skipped!");
            self.heartbeat.cancel();
            return;
        }

        let now = Instant::now();
        self.heartbeat.sent(now);
        debug!("heartbeat..");
        if let Err(e) = self.send(&Outbound::Heartbeat {}) {
            error!("Heartbeat error: {e}");
        }

        if let Liveness::TimedOut { gap } = self.heartbeat.schedule(now) {
            warn!("hb ack timeout!! last ack {gap:?} before last probe");
            self.disconnect(false);
        }
    }
}

#[cfg(test)]
impl Session {
    /// Installs `connection` as an open socket without going through
    /// `transport::open`.
    pub(crate) fn attach(&mut self, connection: Connection) {
        self.state.disconnected = false;
        self.state.socket_open = true;
        self.connection = Some(connection);
    }

    pub(crate) fn events(&self) -> UnboundedSender<TransportEvent> {
        self.events_tx.clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn command(&mut self, command: Command) {
        self.handle_command(command);
    }

    pub(crate) fn inbound(&mut self, packet: Inbound) {
        self.incoming(packet);
    }

    pub(crate) fn fire_heartbeat(&mut self) {
        self.heartbeat_due();
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
