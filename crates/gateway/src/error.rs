use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Dial or handshake failed. Fatal to the connection, never retried here.
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("not connected")]
    NotConnected,

    #[error("reader loop already running for this connection")]
    AlreadyRunning,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Venue answered with a non-success code
    #[error("request failed, message: {message}, error code: {code} ({description})")]
    Protocol {
        code: i64,
        message: String,
        description: String,
    },

    #[error("unparseable frame: {0}")]
    Unparseable(String),

    #[error("unhandled channel: {0:?}")]
    UnhandledChannel(String),

    #[error("request {id} timed out after {timeout:?}")]
    RequestTimeout { id: u64, timeout: Duration },

    #[error("request id {0} is already pending")]
    DuplicateRequestId(u64),

    #[error("invalid snapshot for {key}: {reason}")]
    InvalidSnapshot { key: String, reason: String },

    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("subscription to {channel} failed: {reason}")]
    Subscription { channel: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Errors that end the connection they occurred on
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GatewayError::Connect(_)
                | GatewayError::Transport(_)
                | GatewayError::ConnectionClosed(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
    #[error("missing key: {0}")]
    MissingKey(String),
}
