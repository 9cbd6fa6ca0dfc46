//! Streaming event normalization
//!
//! Maps a classified stream event onto the canonical model. The topic is
//! routed by the venue profile's substring table; the instrument comes from
//! the symbol portion of the channel name.

use std::sync::Arc;

use crate::error::GatewayError;
use crate::instrument::{AssetClass, Instrument, InstrumentRegistry};
use crate::model::{DepthSnapshot, MarketInfo, TickerUpdate, TradeUpdate};
use crate::venue::{TopicKind, VenueProfile};

/// Normalizer output
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Markets(Vec<MarketInfo>),
    Ticker(TickerUpdate),
    /// Full book replacement, handed to the orderbook synchronizer
    Depth(DepthSnapshot),
    Trade(TradeUpdate),
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    profile: Arc<VenueProfile>,
    registry: Arc<InstrumentRegistry>,
    asset_class: AssetClass,
}

impl Normalizer {
    pub fn new(
        profile: Arc<VenueProfile>,
        registry: Arc<InstrumentRegistry>,
        asset_class: AssetClass,
    ) -> Self {
        Self {
            profile,
            registry,
            asset_class,
        }
    }

    fn instrument(&self, topic: &str) -> Instrument {
        self.registry
            .resolve(self.profile.channel_symbol(topic), self.asset_class)
    }

    /// `Ok(None)` when the event carries nothing to emit (an empty trade batch)
    pub fn normalize(&self, topic: &str, payload: &[u8]) -> Result<Option<Normalized>, GatewayError> {
        let kind = self
            .profile
            .route(topic)
            .ok_or_else(|| GatewayError::UnhandledChannel(topic.to_string()))?;
        let decoder = &self.profile.decoder;
        let exchange = self.profile.name.as_str();

        match kind {
            TopicKind::Markets => Ok(Some(Normalized::Markets(decoder.markets(payload)?))),
            TopicKind::Ticker => {
                let ticker = decoder.ticker(exchange, &self.instrument(topic), payload)?;
                Ok(Some(Normalized::Ticker(ticker)))
            }
            TopicKind::Depth => {
                let levels = decoder.depth(payload)?;
                Ok(Some(Normalized::Depth(DepthSnapshot {
                    instrument: self.instrument(topic),
                    bids: levels.bids,
                    asks: levels.asks,
                    timestamp: levels.timestamp,
                })))
            }
            TopicKind::Trades => {
                // Latest print only: the last trade in wire order
                let latest = decoder
                    .trades(exchange, &self.instrument(topic), payload)?
                    .pop();
                Ok(latest.map(Normalized::Trade))
            }
        }
    }
}
