//! WebSocket transport
//!
//! Opens the single full-duplex connection a client session runs over and
//! turns it into a stream of `TransportEvent`s. Responsibilities:
//! - Connect asynchronously so the session task is never blocked
//! - Run a send loop fed by an unbounded channel, one per connection
//! - Forward every text frame to the session, then report the closure
//!
//! Events carry the generation of the connection that produced them so the
//! session can ignore stragglers from a socket it already abandoned.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::utils::error::JmqtError;

/// Something that happened on a connection.
#[derive(Debug)]
pub enum TransportEvent {
    Opened {
        generation: u64,
        connection: Connection,
    },
    Message {
        generation: u64,
        text: String,
    },
    Closed {
        generation: u64,
    },
}

impl TransportEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TransportEvent::Opened { generation, .. }
            | TransportEvent::Message { generation, .. }
            | TransportEvent::Closed { generation } => *generation,
        }
    }
}

/// Sending half of an open connection.
#[derive(Debug)]
pub struct Connection {
    sender: UnboundedSender<WsMessage>,
}

impl Connection {
    /// Queues a text frame. Fails once the send loop has stopped, which
    /// only happens when the socket is broken or closed.
    pub fn send(&self, text: String) -> Result<(), JmqtError> {
        self.sender
            .send(WsMessage::text(text))
            .map_err(|_| JmqtError::NotOpen)
    }

    /// Starts the closing handshake. The send loop exits after the close
    /// frame goes out.
    pub fn close(self) {
        let _ = self.sender.send(WsMessage::Close(None));
    }
}

#[cfg(test)]
impl Connection {
    /// A connection whose send loop has already gone away.
    pub(crate) fn detached() -> Self {
        let (sender, _) = mpsc::unbounded_channel();
        Self { sender }
    }

    /// A connection backed by an in-memory channel instead of a socket.
    pub(crate) fn pipe() -> (Self, mpsc::UnboundedReceiver<WsMessage>) {
        let (sender, frames) = mpsc::unbounded_channel();
        (Self { sender }, frames)
    }
}

/// Spawns a task that connects to `address` and reports through `events`
/// until the connection ends. Exactly one `Closed` event is emitted per
/// call unless the returned task is aborted.
pub fn open(
    address: String,
    generation: u64,
    events: UnboundedSender<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Opening web socket {address}");

        let ws_stream = match connect_async(address.as_str()).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                error!("Failed to open {address}: {e}");
                let _ = events.send(TransportEvent::Closed { generation });
                return;
            }
        };

        info!("Web socket opened {address}");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

        // Send loop: session -> socket
        {
            let address = address.clone();
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let closing = msg.is_close();
                    if let Err(e) = ws_sender.send(msg).await {
                        warn!("Failed to send to {address}: {e}");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
                debug!("Send loop closed for {address}");
            });
        }

        let opened = TransportEvent::Opened {
            generation,
            connection: Connection { sender: tx },
        };
        if events.send(opened).is_err() {
            return;
        }

        // Read loop: socket -> session
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    let text = text.as_str().to_owned();
                    if events.send(TransportEvent::Message { generation, text }).is_err() {
                        return;
                    }
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Read error on {address}: {e}");
                    break;
                }
            }
        }

        info!("Web socket closed {address}");
        let _ = events.send(TransportEvent::Closed { generation });
    })
}
