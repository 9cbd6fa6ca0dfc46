//! Outstanding correlated requests
//!
//! Each request id maps to a single-fulfillment slot. A slot is consumed
//! exactly once: by its reply, by its caller's timeout, or by connection
//! teardown. Ids come from a 64-bit counter and are never reused; registering
//! an id that is still pending is rejected rather than overwriting the waiter.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::traits::Frame;

type Slot = oneshot::Sender<Result<Frame, GatewayError>>;

#[derive(Debug)]
struct Inner {
    next_id: AtomicU64,
    slots: DashMap<u64, Slot>,
}

/// Request-id to waiter table. Cloning shares the table.
#[derive(Debug, Clone)]
pub struct PendingRequests {
    inner: Arc<Inner>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                slots: DashMap::new(),
            }),
        }
    }

    /// Fresh id, unique for the lifetime of this table
    pub fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create the slot for `id`
    pub fn register(&self, id: u64) -> Result<Waiter, GatewayError> {
        match self.inner.slots.entry(id) {
            Entry::Occupied(_) => Err(GatewayError::DuplicateRequestId(id)),
            Entry::Vacant(vacant) => {
                let (tx, rx) = oneshot::channel();
                vacant.insert(tx);
                Ok(Waiter {
                    id,
                    rx,
                    table: self.clone(),
                })
            }
        }
    }

    /// Register under a freshly generated id
    pub fn register_next(&self) -> Result<Waiter, GatewayError> {
        self.register(self.next_id())
    }

    /// Deliver `payload` to the waiter for `id`. Unknown or late ids are a
    /// logged no-op; returns whether a waiter received the payload.
    pub fn resolve(&self, id: u64, payload: Frame) -> bool {
        let Some((_, slot)) = self.inner.slots.remove(&id) else {
            warn!(id, "Reply for unknown or expired request");
            return false;
        };
        if slot.send(Ok(payload)).is_err() {
            debug!(id, "Waiter dropped before reply arrived");
            return false;
        }
        true
    }

    /// Drop the slot for `id` without resolving it
    pub fn remove(&self, id: u64) -> bool {
        self.inner.slots.remove(&id).is_some()
    }

    /// Resolve every outstanding slot with a terminal error
    pub fn fail_all(&self, reason: &str) -> usize {
        let ids: Vec<u64> = self.inner.slots.iter().map(|e| *e.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, slot)) = self.inner.slots.remove(&id) {
                let _ = slot.send(Err(GatewayError::ConnectionClosed(reason.to_string())));
                failed += 1;
            }
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner.slots.contains_key(&id)
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller side of one pending request. Dropping it releases the slot.
#[derive(Debug)]
pub struct Waiter {
    id: u64,
    rx: oneshot::Receiver<Result<Frame, GatewayError>>,
    table: PendingRequests,
}

impl Waiter {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the reply; on timeout the slot is removed
    pub async fn wait(mut self, timeout: Duration) -> Result<Frame, GatewayError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::ConnectionClosed(
                "request abandoned".to_string(),
            )),
            Err(_) => {
                self.table.remove(self.id);
                Err(GatewayError::RequestTimeout {
                    id: self.id,
                    timeout,
                })
            }
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}
