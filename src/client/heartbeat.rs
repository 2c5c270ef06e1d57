//! Heartbeat monitor
//!
//! While connected the client probes the server every `cadence` and
//! expects `hbAck`s back. Each round first checks the gap between the last
//! probe sent and the last acknowledgement received; once that gap exceeds
//! the server-provided `timeout` the monitor stops scheduling and reports
//! the connection dead. The session owns the only timer, `deadline`, and
//! clears it whenever the connection goes away.

use std::time::Duration;

use tokio::time::Instant;

/// Seconds subtracted from the server interval so probes arrive before the
/// server's own timeout.
const CADENCE_MARGIN_SECS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Next probe is due at the given instant.
    Alive(Instant),
    /// No acknowledgement within the timeout.
    TimedOut { gap: Duration },
}

#[derive(Debug, Default)]
pub struct Heartbeat {
    timeout: Duration,
    cadence: Duration,
    last_sent: Option<Instant>,
    last_ack: Option<Instant>,
    deadline: Option<Instant>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the monitor from a `connAck` interval (seconds) and schedules
    /// the first probe.
    pub fn start(&mut self, interval_secs: u64, now: Instant) -> Liveness {
        self.timeout = Duration::from_secs(interval_secs);
        self.cadence = Duration::from_secs(interval_secs.saturating_sub(CADENCE_MARGIN_SECS));
        self.last_sent = None;
        self.last_ack = None;
        self.schedule(now)
    }

    /// Evaluates the previous round and, if the server is still answering,
    /// sets the deadline for the next probe.
    pub fn schedule(&mut self, now: Instant) -> Liveness {
        match self.last_sent {
            // grace period for the very first probe
            None => self.last_ack = Some(now),
            Some(sent) => {
                let ack = self.last_ack.unwrap_or(sent);
                let gap = sent
                    .saturating_duration_since(ack)
                    .max(ack.saturating_duration_since(sent));
                if gap > self.timeout {
                    self.deadline = None;
                    return Liveness::TimedOut { gap };
                }
            }
        }

        let due = now + self.cadence;
        self.deadline = Some(due);
        Liveness::Alive(due)
    }

    /// Records that a probe went out at `now`.
    pub fn sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
        self.deadline = None;
    }

    pub fn acknowledged(&mut self, now: Instant) {
        self.last_ack = Some(now);
    }

    /// Cancels the pending probe and forgets all timing.
    pub fn stop(&mut self) {
        *self = Self::default();
    }

    /// Clears the pending probe without touching the timing history.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }
}
