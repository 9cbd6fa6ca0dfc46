//! Canonical, venue-agnostic event model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::instrument::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One resting level: (price, amount)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerUpdate {
    pub exchange: String,
    pub instrument: Instrument,
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeUpdate {
    pub exchange: String,
    pub instrument: Instrument,
    pub price: Decimal,
    pub amount: Decimal,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

/// Change notification only. Consumers re-read the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderbookUpdate {
    pub exchange: String,
    pub instrument: Instrument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub exchange: String,
    pub message: String,
    /// Set when the connection that produced this event is gone
    pub terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    Ticker(TickerUpdate),
    Trade(TradeUpdate),
    OrderbookUpdate(OrderbookUpdate),
    Error(ErrorEvent),
}

impl CanonicalEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalEvent::Ticker(_) => "ticker",
            CanonicalEvent::Trade(_) => "trade",
            CanonicalEvent::OrderbookUpdate(_) => "orderbook_update",
            CanonicalEvent::Error(_) => "error",
        }
    }
}

/// Full book replacement decoded from a depth event
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    pub instrument: Instrument,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Per-market precision from the venue's market listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketInfo {
    pub symbol: String,
    pub amount_scale: u32,
    pub price_scale: u32,
}
