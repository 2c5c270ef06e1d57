//! Values handed back to the consumer of a `JmqtClient`.

use serde_json::Value;

use crate::protocol::StatusCode;

/// Outcome of `authenticate`. On success `token` and `client_id` hold the
/// server-assigned credentials for `connect`; on failure `message` may
/// explain why.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub status: StatusCode,
    pub token: String,
    pub client_id: String,
    pub message: String,
}

impl AuthResult {
    pub fn failed(status: StatusCode) -> Self {
        Self {
            status,
            token: String::new(),
            client_id: String::new(),
            message: String::new(),
        }
    }
}

/// Outcome of `subscribe` / `unsubscribe`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResult {
    pub status: StatusCode,
    pub channel: String,
}

/// Outcome of `publish`. `response` is the optional payload the server
/// attached to its acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    pub status: StatusCode,
    pub packet_id: String,
    pub response: Option<Value>,
}

/// Credentials of an authenticated client. Dropped when the session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIdentity {
    pub credentials: Value,
    pub client_id: String,
    pub auth_token: String,
}

/// A message pushed by the server on a subscribed channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Push {
    pub channel: String,
    /// Publishing client, empty when the server itself originated the push.
    pub sender: String,
    pub payload: Value,
    pub qos: u8,
    pub retained: bool,
}

impl Push {
    pub fn is_server_originated(&self) -> bool {
        self.sender.is_empty()
    }
}
