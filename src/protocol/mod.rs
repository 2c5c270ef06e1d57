//! The `protocol` module is the JMQT wire codec.
//!
//! It defines the status codes and the typed envelopes exchanged with the
//! server, and converts them to and from the text frames carried by the
//! transport. Frames are decoded exactly once, here, so the rest of the
//! client only ever sees `Inbound` values.

pub mod envelope;
pub mod status;

pub use envelope::{Inbound, Outbound, is_control_channel};
pub use status::StatusCode;

use crate::utils::error::JmqtError;

/// Serializes an outbound packet into a text frame.
pub fn encode(packet: &Outbound) -> Result<String, JmqtError> {
    Ok(serde_json::to_string(packet)?)
}

/// Parses a text frame received from the server.
pub fn decode(text: &str) -> Result<Inbound, JmqtError> {
    Ok(serde_json::from_str(text)?)
}
