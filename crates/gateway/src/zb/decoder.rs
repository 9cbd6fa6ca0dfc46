use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::instrument::Instrument;
use crate::model::{MarketInfo, PriceLevel, TickerUpdate, TradeUpdate};
use crate::venue::{DepthLevels, VenueDecoder};
use crate::zb::messages::{DepthFrame, MarketsFrame, TickerFrame, TradesFrame};

#[derive(Debug, Clone, Copy, Default)]
pub struct ZbDecoder;

fn from_millis(ms: i64) -> Result<DateTime<Utc>, GatewayError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| GatewayError::Unparseable(format!("timestamp out of range: {}ms", ms)))
}

fn from_secs(secs: i64) -> Result<DateTime<Utc>, GatewayError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| GatewayError::Unparseable(format!("timestamp out of range: {}s", secs)))
}

fn levels(raw: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>) -> Vec<PriceLevel> {
    raw.into_iter()
        .map(|(price, amount)| PriceLevel::new(price, amount))
        .collect()
}

impl VenueDecoder for ZbDecoder {
    fn markets(&self, frame: &[u8]) -> Result<Vec<MarketInfo>, GatewayError> {
        let markets: MarketsFrame = serde_json::from_slice(frame)?;
        Ok(markets
            .data
            .into_iter()
            .map(|(symbol, scale)| MarketInfo {
                symbol,
                amount_scale: scale.amount_scale,
                price_scale: scale.price_scale,
            })
            .collect())
    }

    fn ticker(
        &self,
        exchange: &str,
        instrument: &Instrument,
        frame: &[u8],
    ) -> Result<TickerUpdate, GatewayError> {
        let ticker: TickerFrame = serde_json::from_slice(frame)?;
        Ok(TickerUpdate {
            exchange: exchange.to_string(),
            instrument: instrument.clone(),
            last: ticker.ticker.last,
            bid: ticker.ticker.buy,
            ask: ticker.ticker.sell,
            high: ticker.ticker.high,
            low: ticker.ticker.low,
            volume: ticker.ticker.vol,
            timestamp: from_millis(ticker.date)?,
        })
    }

    fn depth(&self, frame: &[u8]) -> Result<DepthLevels, GatewayError> {
        let depth: DepthFrame = serde_json::from_slice(frame)?;
        Ok(DepthLevels {
            bids: levels(depth.bids),
            asks: levels(depth.asks),
            timestamp: depth.timestamp.map(from_secs).transpose()?,
        })
    }

    fn trades(
        &self,
        exchange: &str,
        instrument: &Instrument,
        frame: &[u8],
    ) -> Result<Vec<TradeUpdate>, GatewayError> {
        let trades: TradesFrame = serde_json::from_slice(frame)?;
        trades
            .data
            .into_iter()
            .map(|t| {
                Ok(TradeUpdate {
                    exchange: exchange.to_string(),
                    instrument: instrument.clone(),
                    price: t.price,
                    amount: t.amount,
                    side: t.side,
                    timestamp: from_secs(t.date)?,
                })
            })
            .collect()
    }
}
