//! Delivery of server pushes to the registered consumer.

use tracing::{debug, warn};

use super::message::Push;
use super::pubsub_client::JmqtClient;

pub type PushHandler = Box<dyn Fn(Push) + Send + 'static>;
pub type DisconnectHandler = Box<dyn Fn(&JmqtClient, String) + Send + 'static>;

#[derive(Default)]
pub struct PushDispatcher {
    handler: Option<PushHandler>,
}

impl PushDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the consumer, replacing any previous one.
    pub fn register(&mut self, handler: PushHandler) {
        self.handler = Some(handler);
    }

    /// Packet id the client must answer with `pushAck`. Only QoS 1 pushes
    /// that are not retained are acknowledged.
    pub fn acknowledgement(push: &Push, packet_id: Option<String>) -> Option<String> {
        if push.qos != 1 || push.retained {
            return None;
        }
        if packet_id.is_none() {
            warn!("QoS 1 push on '{}' without packet id", push.channel);
        }
        packet_id
    }

    pub fn deliver(&self, push: Push) {
        debug!(
            "push on '{}' from '{}', qos {} retained {}",
            push.channel, push.sender, push.qos, push.retained
        );
        match &self.handler {
            Some(handler) => handler(push),
            None => warn!("Dropping push on '{}': no push handler registered", push.channel),
        }
    }
}

impl std::fmt::Debug for PushDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushDispatcher")
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
