//! Outbound canonical event stream
//!
//! A bounded channel between the reader loops (producers) and a single
//! consumer. What a producer does on a full buffer is set by
//! [`OverflowPolicy`]; it never waits without a bound.

use std::time::Duration;
use streamgate_metadata::{EventsConfig, OverflowMode};
use tokio::sync::mpsc;
use tracing::warn;

use crate::model::CanonicalEvent;

/// Upper bound on waiting to deliver a connection-ending error
pub const TERMINAL_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the event when the buffer is full
    #[default]
    Drop,
    /// Wait up to `timeout` for space, then drop
    Block { timeout: Duration },
}

impl From<&EventsConfig> for OverflowPolicy {
    fn from(config: &EventsConfig) -> Self {
        match config.overflow {
            OverflowMode::Drop => OverflowPolicy::Drop,
            OverflowMode::Block => OverflowPolicy::Block {
                timeout: config.block_timeout(),
            },
        }
    }
}

/// Producer half. Clones share the same buffer.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<CanonicalEvent>,
    policy: OverflowPolicy,
}

/// Consumer half
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<CanonicalEvent>,
}

/// Bounded event channel holding at most `buffer` undelivered events
pub fn event_channel(buffer: usize, policy: OverflowPolicy) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (EventSink { tx, policy }, EventStream { rx })
}

impl EventSink {
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Deliver according to the overflow policy; false if the event was dropped
    pub async fn emit(&self, event: CanonicalEvent) -> bool {
        match self.policy {
            OverflowPolicy::Drop => match self.tx.try_send(event) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(event)) => {
                    warn!(event_type = event.kind(), "Event buffer full, dropping event");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
            OverflowPolicy::Block { timeout } => self.send_within(event, timeout).await,
        }
    }

    /// Deliver a connection-ending event, waiting for space up to
    /// [`TERMINAL_DELIVERY_TIMEOUT`] regardless of policy
    pub async fn emit_terminal(&self, event: CanonicalEvent) -> bool {
        self.send_within(event, TERMINAL_DELIVERY_TIMEOUT).await
    }

    async fn send_within(&self, event: CanonicalEvent, timeout: Duration) -> bool {
        let kind = event.kind();
        match self.tx.send_timeout(event, timeout).await {
            Ok(()) => true,
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                warn!(event_type = kind, ?timeout, "Event consumer stalled, dropping event");
                false
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => false,
        }
    }

    /// True once the consumer has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl EventStream {
    /// Next event; `None` once every sink is dropped and the buffer is drained
    pub async fn recv(&mut self) -> Option<CanonicalEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CanonicalEvent> {
        self.rx.try_recv().ok()
    }
}
