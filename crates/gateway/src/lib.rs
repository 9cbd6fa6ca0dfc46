//! streamgate-lib: streaming-protocol gateway for trading venues
//!
//! Connects to a venue over a persistent message-framed connection,
//! classifies every inbound frame, correlates replies with outstanding
//! requests, keeps per-instrument order books and emits canonical market
//! data events on a single bounded stream.

pub mod classifier;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod gateway;
pub mod instrument;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod orderbook;
pub mod pending;
pub mod ratelimit;
pub mod repair;
pub mod resolver;
pub mod signer;
pub mod subscription;
pub mod traits;
pub mod venue;
pub mod websocket;
pub mod zb;

pub use classifier::{Classification, Classifier};
pub use error::{GatewayError, ResolverError};
pub use events::{event_channel, EventSink, EventStream, OverflowPolicy};
pub use gateway::{Gateway, GatewayConfig};
pub use instrument::{AssetClass, CurrencyPair, Instrument, InstrumentRegistry};
pub use memory::{MemoryPeer, MemoryTransport};
pub use metrics::{encode_metrics, GatewayMetrics};
pub use model::{
    CanonicalEvent, ErrorEvent, MarketInfo, OrderbookUpdate, PriceLevel, TickerUpdate, TradeSide,
    TradeUpdate,
};
pub use orderbook::{BookKey, OrderbookState, OrderbookSynchronizer};
pub use pending::{PendingRequests, Waiter};
pub use ratelimit::{FixedRateLimiter, Unlimited};
pub use repair::repair_frame;
pub use resolver::{resolve_credentials, EnvResolver};
pub use signer::{Credentials, Signer};
pub use subscription::{Subscription, SubscriptionManager, SubscriptionResult};
pub use traits::{Frame, FrameReader, FrameWriter, KeyResolver, RateLimiter, Transport};
pub use venue::{TopicKind, VenueDecoder, VenueProfile};
pub use websocket::WebSocketTransport;

/// Profile for a venue id from configuration
pub fn venue_profile(name: &str) -> Option<VenueProfile> {
    match name.to_ascii_lowercase().as_str() {
        "zb" => Some(zb::profile()),
        _ => None,
    }
}
