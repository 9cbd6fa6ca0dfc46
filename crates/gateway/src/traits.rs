use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{GatewayError, ResolverError};

/// Raw inbound or outbound frame
pub type Frame = Vec<u8>;

/// Dialer for a duplex, message-framed connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection and split it into its write and read halves
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>), GatewayError>;
}

/// Read half of a connection, owned by exactly one reader loop
#[async_trait]
pub trait FrameReader: Send {
    /// Next frame in receipt order. `Ok(None)` means the peer closed cleanly.
    async fn read_frame(&mut self) -> Result<Option<Frame>, GatewayError>;
}

/// Write half of a connection
#[async_trait]
pub trait FrameWriter: Send {
    /// Write one complete frame
    async fn write_frame(&mut self, frame: Frame) -> Result<(), GatewayError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), GatewayError>;
}

/// Gate consulted before every outbound write
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until a write is permitted
    async fn acquire(&self);
}

/// KeyResolver trait for credential sources (env vars, Vault, etc.)
pub trait KeyResolver: Send + Sync {
    /// Resolve keys from a source string (e.g., "env:VAR1,VAR2")
    fn resolve(&self, source: &str) -> Result<HashMap<String, String>, ResolverError>;
}
