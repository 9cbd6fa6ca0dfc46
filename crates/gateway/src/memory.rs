//! In-process transport
//!
//! `MemoryTransport` stands in for a network connection. The paired
//! `MemoryPeer` plays the venue: it pushes inbound frames, injects read and
//! write failures, and observes every frame the gateway writes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::traits::{Frame, FrameReader, FrameWriter, Transport};

enum Inbound {
    Frame(Frame),
    Fail(String),
    Close,
}

#[derive(Default)]
struct Shared {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    fail_next_dial: Option<String>,
    fail_writes: Option<String>,
    dials: usize,
    closes: usize,
    last_url: Option<String>,
}

pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
    outbound: mpsc::UnboundedSender<Frame>,
}

/// Venue side of a [`MemoryTransport`]
pub struct MemoryPeer {
    shared: Arc<Mutex<Shared>>,
    outbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryPeer) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                shared: Arc::clone(&shared),
                outbound: tx,
            },
            MemoryPeer {
                shared,
                outbound: tokio::sync::Mutex::new(rx),
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>), GatewayError> {
        let mut shared = self.shared.lock();
        shared.dials += 1;
        shared.last_url = Some(url.to_string());
        if let Some(reason) = shared.fail_next_dial.take() {
            return Err(GatewayError::Connect(reason));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        shared.inbound = Some(tx);
        Ok((
            Box::new(MemoryWriter {
                shared: Arc::clone(&self.shared),
                outbound: self.outbound.clone(),
                closed: false,
            }),
            Box::new(MemoryReader { inbound: rx }),
        ))
    }
}

struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>, GatewayError> {
        match self.inbound.recv().await {
            Some(Inbound::Frame(frame)) => Ok(Some(frame)),
            Some(Inbound::Fail(reason)) => Err(GatewayError::Transport(reason)),
            Some(Inbound::Close) | None => Ok(None),
        }
    }
}

struct MemoryWriter {
    shared: Arc<Mutex<Shared>>,
    outbound: mpsc::UnboundedSender<Frame>,
    closed: bool,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), GatewayError> {
        if self.closed {
            return Err(GatewayError::Transport("writer closed".to_string()));
        }
        if let Some(reason) = self.shared.lock().fail_writes.clone() {
            return Err(GatewayError::Transport(reason));
        }
        self.outbound
            .send(frame)
            .map_err(|_| GatewayError::Transport("peer gone".to_string()))
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        if !self.closed {
            self.closed = true;
            self.shared.lock().closes += 1;
        }
        Ok(())
    }
}

impl MemoryPeer {
    /// Deliver a frame to the current connection's reader
    pub fn push(&self, frame: impl Into<Frame>) -> bool {
        self.send(Inbound::Frame(frame.into()))
    }

    /// Make the reader's next read fail
    pub fn fail_read(&self, reason: impl Into<String>) -> bool {
        self.send(Inbound::Fail(reason.into()))
    }

    /// Close the connection cleanly from the venue side
    pub fn close(&self) -> bool {
        self.send(Inbound::Close)
    }

    fn send(&self, item: Inbound) -> bool {
        match &self.shared.lock().inbound {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }

    pub fn fail_next_dial(&self, reason: impl Into<String>) {
        self.shared.lock().fail_next_dial = Some(reason.into());
    }

    /// Fail every write until cleared with `None`
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.shared.lock().fail_writes = reason.map(str::to_string);
    }

    pub fn dial_count(&self) -> usize {
        self.shared.lock().dials
    }

    pub fn close_count(&self) -> usize {
        self.shared.lock().closes
    }

    pub fn last_url(&self) -> Option<String> {
        self.shared.lock().last_url.clone()
    }

    /// Next frame written by the gateway, waiting up to `timeout`
    pub async fn next_outbound(&self, timeout: Duration) -> Option<Frame> {
        let mut rx = self.outbound.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Every frame written so far, without waiting
    pub async fn drain_outbound(&self) -> Vec<Frame> {
        let mut rx = self.outbound.lock().await;
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}
