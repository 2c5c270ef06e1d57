//! The `client` module is the JMQT client proper.
//!
//! - `pubsub_client`: the `JmqtClient` handle consumers talk to
//! - `session`: the task that owns the connection and drives the protocol
//! - `registry`: correlation of requests with their acknowledgements
//! - `heartbeat`: liveness probing while connected
//! - `push`: delivery of server pushes to the consumer

pub mod heartbeat;
pub mod message;
pub mod pubsub_client;
pub mod push;
pub mod registry;
pub(crate) mod session;

pub use message::{AuthResult, ChannelResult, ClientIdentity, Push, PublishResult};
pub use pubsub_client::{JmqtClient, Pending, Publication, WeakJmqtClient};
pub use session::{SessionPhase, SessionSnapshot, SessionState};
