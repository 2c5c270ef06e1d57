//! Typed JMQT envelopes.
//!
//! Every frame on the wire is a JSON object with a single top-level key
//! naming the packet kind, e.g. `{"sub": {"cn": "chat", "pr": 0}}`. That is
//! serde's externally tagged enum layout, so the kinds map one-to-one onto
//! enum variants and field names onto the protocol's two-letter keys.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::status::StatusCode;

/// Packets sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outbound {
    #[serde(rename = "auth")]
    Auth {
        #[serde(rename = "dt")]
        data: Value,
    },
    #[serde(rename = "conn")]
    Conn {
        #[serde(rename = "at")]
        token: String,
        #[serde(rename = "cl")]
        client_id: String,
    },
    #[serde(rename = "hb")]
    Heartbeat {},
    #[serde(rename = "sub")]
    Sub {
        #[serde(rename = "cn")]
        channel: String,
        #[serde(rename = "pr")]
        persistent: u8,
    },
    #[serde(rename = "unsub")]
    Unsub {
        #[serde(rename = "cn")]
        channel: String,
    },
    #[serde(rename = "pub")]
    Pub {
        #[serde(rename = "cn")]
        channel: String,
        #[serde(rename = "dt")]
        data: Value,
        #[serde(rename = "id", skip_serializing_if = "Option::is_none", default)]
        packet_id: Option<String>,
        #[serde(rename = "q", skip_serializing_if = "Option::is_none", default)]
        qos: Option<u8>,
        #[serde(rename = "rt", skip_serializing_if = "Option::is_none", default)]
        retain: Option<u8>,
    },
    #[serde(rename = "pushAck")]
    PushAck {
        #[serde(rename = "id")]
        packet_id: String,
    },
    #[serde(rename = "disconn")]
    Disconn {},
}

impl Outbound {
    /// Builds a `pub` packet. Control channels always carry the packet id
    /// and never a QoS; other channels carry both only when `qos > 0`.
    pub fn publish(
        channel: &str,
        data: Value,
        retain: bool,
        qos: u8,
        packet_id: &str,
        control_prefix: &str,
    ) -> Self {
        let (packet_id, qos) = if is_control_channel(channel, control_prefix) {
            (Some(packet_id.to_string()), None)
        } else if qos > 0 {
            (Some(packet_id.to_string()), Some(qos))
        } else {
            (None, None)
        };

        Outbound::Pub {
            channel: channel.to_string(),
            data,
            packet_id,
            qos,
            retain: retain.then_some(1),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Auth { .. } => "auth",
            Outbound::Conn { .. } => "conn",
            Outbound::Heartbeat {} => "hb",
            Outbound::Sub { .. } => "sub",
            Outbound::Unsub { .. } => "unsub",
            Outbound::Pub { .. } => "pub",
            Outbound::PushAck { .. } => "pushAck",
            Outbound::Disconn {} => "disconn",
        }
    }
}

/// Control channels start with the configured prefix. An empty prefix
/// disables them.
pub fn is_control_channel(channel: &str, control_prefix: &str) -> bool {
    !control_prefix.is_empty() && channel.starts_with(control_prefix)
}

/// Packets received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inbound {
    #[serde(rename = "authAck")]
    AuthAck {
        #[serde(rename = "st")]
        status: StatusCode,
        #[serde(rename = "at", default)]
        token: Option<String>,
        #[serde(rename = "cl", default)]
        client_id: Option<String>,
        #[serde(rename = "mg", default)]
        message: Option<String>,
    },
    #[serde(rename = "connAck")]
    ConnAck {
        #[serde(rename = "st")]
        status: StatusCode,
        /// Heartbeat interval in seconds.
        #[serde(rename = "ts", default)]
        interval: u64,
    },
    #[serde(rename = "hbAck")]
    HeartbeatAck {},
    #[serde(rename = "subAck")]
    SubAck {
        #[serde(rename = "st")]
        status: StatusCode,
        #[serde(rename = "cn")]
        channel: String,
    },
    #[serde(rename = "unsubAck")]
    UnsubAck {
        #[serde(rename = "st")]
        status: StatusCode,
        #[serde(rename = "cn")]
        channel: String,
    },
    #[serde(rename = "pubAck")]
    PubAck {
        #[serde(rename = "st")]
        status: StatusCode,
        #[serde(rename = "id")]
        packet_id: String,
        #[serde(rename = "dt", default)]
        data: Option<Value>,
    },
    #[serde(rename = "push")]
    Push {
        #[serde(rename = "cn")]
        channel: String,
        #[serde(rename = "cl", default)]
        sender: String,
        #[serde(rename = "dt", default)]
        data: Value,
        #[serde(rename = "q", default)]
        qos: u8,
        #[serde(rename = "rt", default, deserialize_with = "flag")]
        retained: bool,
        #[serde(rename = "id", default)]
        packet_id: Option<String>,
    },
}

/// Flags travel as `0`/`1` but some peers send JSON booleans.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_i64().is_some_and(|v| v != 0)),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid flag value: {other}"
        ))),
    }
}
