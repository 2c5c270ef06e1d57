//! The `transport` module is responsible for the network connection to the
//! JMQT server, a single WebSocket carrying text frames.
//!
//! It knows nothing about the protocol: it opens the socket, ships text
//! frames out and reports inbound frames and closure as events.

pub mod websocket;

pub use websocket::{Connection, TransportEvent, open};

#[cfg(test)]
mod tests;
