//! # JMQT
//!
//! `jmqt` is a client for the JMQT publish/subscribe protocol: JSON
//! envelopes over a single WebSocket, with an authenticate -> connect ->
//! heartbeat -> disconnect session lifecycle.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `client`: The `JmqtClient` handle, the session state machine, request/ack correlation,
//!   heartbeats and push delivery.
//! - `config`: Handles loading and managing client configuration.
//! - `protocol`: Status codes and the typed wire envelopes.
//! - `transport`: Manages the WebSocket connection to the server.
//! - `utils`: Contains shared utilities, such as error handling and logging.
//!
//! ## Example
//!
//! ```no_run
//! use jmqt::{JmqtClient, StatusCode, config::Settings};
//! use serde_json::json;
//!
//! # async fn run() {
//! let client = JmqtClient::new(&Settings::default());
//! client.on_push(|push| println!("{}: {}", push.channel, push.payload));
//!
//! let auth = client.authenticate(json!({ "name": "c1" })).await;
//! if auth.status == StatusCode::Ok
//!     && client.connect(&auth.client_id, &auth.token).await == StatusCode::Ok
//! {
//!     client.subscribe("chat", false).await;
//!     let ack = client.publish("chat", json!("hello"), false, 1).await;
//!     println!("pub {} -> {}", ack.packet_id, ack.status);
//! }
//! # }
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod testing;

pub use client::{JmqtClient, Push};
pub use protocol::StatusCode;
