//! WebSocket transport
//!
//! Dials with tokio-tungstenite and splits the stream into a frame reader
//! and a frame writer. Pings are answered by the protocol layer and never
//! surface as frames.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, trace};
use url::Url;

use crate::error::GatewayError;
use crate::traits::{Frame, FrameReader, FrameWriter, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A read that yields nothing for this long means the connection is dead
pub const READ_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    read_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>), GatewayError> {
        let url = Url::parse(url).map_err(|e| GatewayError::Connect(e.to_string()))?;
        info!(url = %url, "Connecting to WebSocket");

        let (ws, response) = connect_async(url.as_str())
            .await
            .map_err(|e| GatewayError::Connect(e.to_string()))?;
        info!(status = ?response.status(), "WebSocket connected");

        let (sink, stream) = ws.split();
        Ok((
            Box::new(WsFrameWriter { sink }),
            Box::new(WsFrameReader {
                stream,
                read_timeout: self.read_timeout,
            }),
        ))
    }
}

pub struct WsFrameReader {
    stream: SplitStream<WsStream>,
    read_timeout: Duration,
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>, GatewayError> {
        loop {
            let next = tokio::time::timeout(self.read_timeout, self.stream.next())
                .await
                .map_err(|_| {
                    GatewayError::Transport(format!(
                        "no data received for {}s",
                        self.read_timeout.as_secs()
                    ))
                })?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.into_bytes())),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    trace!("WebSocket keepalive");
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by peer");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(GatewayError::Transport(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}

pub struct WsFrameWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for WsFrameWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), GatewayError> {
        let message = match String::from_utf8(frame) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        self.sink
            .close()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }
}
