//! Correlation registry
//!
//! Every request that the server answers asynchronously leaves a reply slot
//! here until the matching acknowledgement arrives:
//! - `sub` / `unsub` are keyed by channel name. Several requests for the
//!   same channel may be outstanding; acknowledgements resolve them oldest
//!   first, which is the order the server answers them in.
//! - `pub` is keyed by the packet identifier generated for it.
//!
//! An acknowledgement consumes its entry. Acknowledgements that match
//! nothing are reported back to the caller (the session logs them).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use super::message::{ChannelResult, PublishResult};
use crate::protocol::StatusCode;

pub type Reply<T> = oneshot::Sender<T>;

/// FIFO of reply slots per channel name.
#[derive(Debug, Default)]
struct ChannelWaiters {
    waiting: HashMap<String, VecDeque<Reply<ChannelResult>>>,
}

impl ChannelWaiters {
    fn expect(&mut self, channel: &str, reply: Reply<ChannelResult>) {
        self.waiting
            .entry(channel.to_string())
            .or_default()
            .push_back(reply);
    }

    fn resolve(&mut self, status: StatusCode, channel: &str) -> bool {
        let Some(queue) = self.waiting.get_mut(channel) else {
            return false;
        };
        let reply = queue.pop_front();
        if queue.is_empty() {
            self.waiting.remove(channel);
        }
        match reply {
            Some(reply) => {
                let _ = reply.send(ChannelResult {
                    status,
                    channel: channel.to_string(),
                });
                true
            }
            None => false,
        }
    }

    fn fail_all(&mut self) -> usize {
        let mut failed = 0;
        for (channel, queue) in self.waiting.drain() {
            for reply in queue {
                let _ = reply.send(ChannelResult {
                    status: StatusCode::NetworkError,
                    channel: channel.clone(),
                });
                failed += 1;
            }
        }
        failed
    }

    fn len(&self) -> usize {
        self.waiting.values().map(VecDeque::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    subscriptions: ChannelWaiters,
    unsubscriptions: ChannelWaiters,
    publishes: HashMap<String, Reply<PublishResult>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_subscribe(&mut self, channel: &str, reply: Reply<ChannelResult>) {
        self.subscriptions.expect(channel, reply);
    }

    /// Routes a `subAck`. Returns `false` when nobody was waiting for it.
    pub fn resolve_subscribe(&mut self, status: StatusCode, channel: &str) -> bool {
        self.subscriptions.resolve(status, channel)
    }

    pub fn expect_unsubscribe(&mut self, channel: &str, reply: Reply<ChannelResult>) {
        self.unsubscriptions.expect(channel, reply);
    }

    /// Routes an `unsubAck`. Returns `false` when nobody was waiting for it.
    pub fn resolve_unsubscribe(&mut self, status: StatusCode, channel: &str) -> bool {
        self.unsubscriptions.resolve(status, channel)
    }

    pub fn expect_publish(&mut self, packet_id: &str, reply: Reply<PublishResult>) {
        // Fire-and-forget publishes are never acknowledged; forget the ones
        // whose caller stopped listening.
        self.publishes.retain(|_, pending| !pending.is_closed());

        if let Some(stale) = self.publishes.insert(packet_id.to_string(), reply) {
            warn!("Packet id {packet_id} reused while still pending");
            let _ = stale.send(PublishResult {
                status: StatusCode::NetworkError,
                packet_id: packet_id.to_string(),
                response: None,
            });
        }
    }

    /// Routes a `pubAck`. Returns `false` when nobody was waiting for it.
    pub fn resolve_publish(
        &mut self,
        status: StatusCode,
        packet_id: &str,
        response: Option<Value>,
    ) -> bool {
        match self.publishes.remove(packet_id) {
            Some(reply) => {
                let _ = reply.send(PublishResult {
                    status,
                    packet_id: packet_id.to_string(),
                    response,
                });
                true
            }
            None => false,
        }
    }

    /// Resolves every outstanding request with `NetworkError`. Returns how
    /// many there were.
    pub fn fail_all(&mut self) -> usize {
        let mut failed = self.subscriptions.fail_all() + self.unsubscriptions.fail_all();
        for (packet_id, reply) in self.publishes.drain() {
            let _ = reply.send(PublishResult {
                status: StatusCode::NetworkError,
                packet_id,
                response: None,
            });
            failed += 1;
        }
        failed
    }

    pub fn outstanding(&self) -> usize {
        self.subscriptions.len() + self.unsubscriptions.len() + self.publishes.len()
    }
}

/// Decimal packet identifiers `1, 2, ...`; the counter goes back to 1 when
/// it reaches `limit`, so `limit` itself is never issued.
#[derive(Debug)]
pub struct PacketIdGenerator {
    next: AtomicU32,
    limit: u32,
}

impl PacketIdGenerator {
    pub fn new(limit: u32) -> Self {
        Self {
            next: AtomicU32::new(1),
            limit: limit.max(2),
        }
    }

    pub fn next_id(&self) -> String {
        let limit = self.limit;
        let current = match self.next.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            Some(if n + 1 >= limit { 1 } else { n + 1 })
        }) {
            Ok(n) | Err(n) => n,
        };
        current.to_string()
    }
}
