//! Per-instrument order book state
//!
//! Books are keyed by (venue, instrument, asset class). A book is created by
//! its first snapshot, replaced wholesale by every later snapshot and removed
//! on unsubscribe or connection loss. Each key holds an immutable
//! `Arc<OrderbookState>` that is swapped in one step, so a reader holding a
//! book never sees a mix of two snapshots. Locking is per map shard, not
//! global.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::GatewayError;
use crate::instrument::Instrument;
use crate::model::{OrderbookUpdate, PriceLevel};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookKey {
    pub exchange: String,
    pub instrument: Instrument,
}

impl BookKey {
    pub fn new(exchange: impl Into<String>, instrument: Instrument) -> Self {
        Self {
            exchange: exchange.into(),
            instrument,
        }
    }
}

impl fmt::Display for BookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.exchange, self.instrument)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// Price -> resting amount for both sides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderbookState {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    timestamp: Option<DateTime<Utc>>,
}

impl OrderbookState {
    /// Build a book from snapshot levels. Duplicate prices on one side and
    /// negative amounts are rejected; zero amounts are left out.
    pub fn from_levels(
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, String> {
        Ok(Self {
            bids: side_from_levels("bid", bids)?,
            asks: side_from_levels("ask", asks)?,
            timestamp,
        })
    }

    /// Bids, best (highest) first
    pub fn bids(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.bids
            .iter()
            .rev()
            .map(|(price, amount)| PriceLevel::new(*price, *amount))
    }

    /// Asks, best (lowest) first
    pub fn asks(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.asks
            .iter()
            .map(|(price, amount)| PriceLevel::new(*price, *amount))
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids().next()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks().next()
    }

    pub fn depth(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Delta merge rule: zero amount removes the level, anything else upserts
    pub fn apply_delta(&mut self, side: BookSide, level: PriceLevel) -> Result<(), String> {
        if level.amount.is_sign_negative() && !level.amount.is_zero() {
            return Err(format!("negative amount {} at {}", level.amount, level.price));
        }
        let book = match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        };
        if level.amount.is_zero() {
            book.remove(&level.price);
        } else {
            book.insert(level.price, level.amount);
        }
        Ok(())
    }
}

fn side_from_levels(side: &str, levels: &[PriceLevel]) -> Result<BTreeMap<Decimal, Decimal>, String> {
    let mut seen = BTreeMap::new();
    for level in levels {
        if level.amount.is_sign_negative() && !level.amount.is_zero() {
            return Err(format!(
                "negative {} amount {} at {}",
                side, level.amount, level.price
            ));
        }
        if seen.insert(level.price, level.amount).is_some() {
            return Err(format!("duplicate {} price {}", side, level.price));
        }
    }
    seen.retain(|_, amount| !amount.is_zero());
    Ok(seen)
}

#[derive(Debug, Default)]
pub struct OrderbookSynchronizer {
    books: DashMap<BookKey, Arc<OrderbookState>>,
}

impl OrderbookSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the book for `key`. On error the previous book is kept.
    pub fn load_snapshot(
        &self,
        key: BookKey,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<OrderbookUpdate, GatewayError> {
        let state = OrderbookState::from_levels(bids, asks, timestamp).map_err(|reason| {
            GatewayError::InvalidSnapshot {
                key: key.to_string(),
                reason,
            }
        })?;

        trace!(key = %key, bids = state.bids.len(), asks = state.asks.len(), "Loaded snapshot");
        let update = OrderbookUpdate {
            exchange: key.exchange.clone(),
            instrument: key.instrument.clone(),
        };
        self.books.insert(key, Arc::new(state));
        Ok(update)
    }

    /// Merge deltas into a live book. The book must already hold a snapshot.
    pub fn apply_deltas(
        &self,
        key: &BookKey,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
    ) -> Result<OrderbookUpdate, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidSnapshot {
            key: key.to_string(),
            reason,
        };

        let mut entry = self
            .books
            .get_mut(key)
            .ok_or_else(|| invalid("no snapshot loaded".to_string()))?;

        let mut next = OrderbookState::clone(&entry);
        for level in bids {
            next.apply_delta(BookSide::Bid, *level).map_err(invalid)?;
        }
        for level in asks {
            next.apply_delta(BookSide::Ask, *level).map_err(invalid)?;
        }
        *entry = Arc::new(next);

        Ok(OrderbookUpdate {
            exchange: key.exchange.clone(),
            instrument: key.instrument.clone(),
        })
    }

    /// Current book for `key`
    pub fn get(&self, key: &BookKey) -> Option<Arc<OrderbookState>> {
        self.books.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, key: &BookKey) -> bool {
        let removed = self.books.remove(key).is_some();
        if removed {
            debug!(key = %key, "Removed order book");
        }
        removed
    }

    /// Drop every book belonging to `exchange`
    pub fn clear_exchange(&self, exchange: &str) -> usize {
        let before = self.books.len();
        self.books.retain(|key, _| key.exchange != exchange);
        before - self.books.len()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
