//! Per-venue protocol configuration
//!
//! Everything venue-specific the generic core needs (success code, error code
//! table, channel routing, channel naming, payload decoding) lives in one
//! immutable `VenueProfile` injected at construction time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::instrument::Instrument;
use crate::model::{MarketInfo, PriceLevel, TickerUpdate, TradeUpdate};

/// Streaming topic families, in routing priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Markets,
    Ticker,
    Depth,
    Trades,
}

/// Decoded depth sides, wire order preserved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthLevels {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// Decodes topic-specific payloads out of a repaired frame
pub trait VenueDecoder: Send + Sync {
    fn markets(&self, frame: &[u8]) -> Result<Vec<MarketInfo>, GatewayError>;

    fn ticker(
        &self,
        exchange: &str,
        instrument: &Instrument,
        frame: &[u8],
    ) -> Result<TickerUpdate, GatewayError>;

    fn depth(&self, frame: &[u8]) -> Result<DepthLevels, GatewayError>;

    /// Trades in wire delivery order
    fn trades(
        &self,
        exchange: &str,
        instrument: &Instrument,
        frame: &[u8],
    ) -> Result<Vec<TradeUpdate>, GatewayError>;
}

#[derive(Clone)]
pub struct VenueProfile {
    pub name: String,
    pub endpoint: String,
    /// Status code that means success even when present
    pub success_code: i64,
    pub error_codes: HashMap<i64, &'static str>,
    /// Substring routes, matched in order
    pub topic_routes: Vec<(&'static str, TopicKind)>,
    /// Market-wide channel subscribed once per connection
    pub market_channel: String,
    /// Per-instrument channel templates; `{symbol}` is replaced
    pub instrument_topics: Vec<&'static str>,
    /// Separator between the symbol and the topic in a channel name
    pub channel_separator: char,
    pub symbol_delimiter: &'static str,
    pub symbol_lowercase: bool,
    pub subscribe_event: &'static str,
    pub unsubscribe_event: Option<&'static str>,
    pub default_rate_limit_per_second: Option<u32>,
    pub decoder: Arc<dyn VenueDecoder>,
}

impl VenueProfile {
    pub fn is_success(&self, code: i64) -> bool {
        code == self.success_code
    }

    pub fn describe_error(&self, code: i64) -> &'static str {
        self.error_codes.get(&code).copied().unwrap_or("unknown error code")
    }

    /// First route whose pattern occurs in `topic`
    pub fn route(&self, topic: &str) -> Option<TopicKind> {
        self.topic_routes
            .iter()
            .find(|(pattern, _)| topic.contains(pattern))
            .map(|(_, kind)| *kind)
    }

    pub fn venue_symbol(&self, instrument: &Instrument) -> String {
        instrument
            .pair
            .format(self.symbol_delimiter, self.symbol_lowercase)
    }

    pub fn instrument_channel(&self, template: &str, instrument: &Instrument) -> String {
        template.replace("{symbol}", &self.venue_symbol(instrument))
    }

    /// Symbol portion of a channel name, e.g. `btcusdt` from `btcusdt_depth`
    pub fn channel_symbol<'a>(&self, channel: &'a str) -> &'a str {
        channel
            .split(self.channel_separator)
            .next()
            .unwrap_or(channel)
    }
}

impl fmt::Debug for VenueProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenueProfile")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("success_code", &self.success_code)
            .field("market_channel", &self.market_channel)
            .field("instrument_topics", &self.instrument_topics)
            .finish_non_exhaustive()
    }
}
