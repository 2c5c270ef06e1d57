//! The `error` module defines the error type used within the `jmqt` crate.
//!
//! Protocol outcomes are reported to callers as `StatusCode`s, never as
//! errors; `JmqtError` covers the plumbing underneath them: decoding
//! frames and talking to the socket.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JmqtError {
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("transport is not open")]
    NotOpen,

    #[error("client not connected")]
    NotConnected,

    #[error("session task has stopped")]
    SessionClosed,
}
