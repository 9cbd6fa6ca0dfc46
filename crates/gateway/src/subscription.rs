//! Channel subscriptions
//!
//! Builds the default channel set for a venue and tracks which
//! (channel, instrument) pairs are active so the same channel is never
//! subscribed twice on one connection.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::instrument::{AssetClass, Instrument};
use crate::venue::VenueProfile;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Subscription {
    pub channel: String,
    pub instrument: Option<Instrument>,
    pub asset_class: Option<AssetClass>,
}

type SubscriptionKey = (String, Option<Instrument>);

impl Subscription {
    /// Market-wide channel
    pub fn market(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            instrument: None,
            asset_class: None,
        }
    }

    pub fn for_instrument(channel: impl Into<String>, instrument: Instrument) -> Self {
        let asset_class = Some(instrument.asset_class);
        Self {
            channel: channel.into(),
            instrument: Some(instrument),
            asset_class,
        }
    }

    fn key(&self) -> SubscriptionKey {
        (self.channel.clone(), self.instrument.clone())
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instrument {
            Some(instrument) => write!(f, "{} ({})", self.channel, instrument),
            None => f.write_str(&self.channel),
        }
    }
}

/// Outbound channel command, e.g. `{"event":"addChannel","channel":"markets"}`
#[derive(Debug, Serialize)]
pub struct ChannelCommand<'a> {
    pub event: &'a str,
    pub channel: &'a str,
}

/// Outcome of subscribing a batch of channels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionResult {
    pub successful: usize,
    /// Already active, nothing sent
    pub skipped: usize,
    pub failed: usize,
    pub failed_channels: Vec<String>,
}

impl SubscriptionResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Active subscriptions for one connection
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    active: DashMap<SubscriptionKey, Subscription>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The market-wide channel followed by one channel per topic for every
    /// instrument of `asset_class`, duplicates removed, in a fixed order.
    pub fn default_subscriptions(
        profile: &VenueProfile,
        instruments: &[Instrument],
        asset_class: AssetClass,
    ) -> Vec<Subscription> {
        let mut seen = HashSet::new();
        let mut subs = Vec::with_capacity(1 + instruments.len() * profile.instrument_topics.len());

        let market = Subscription::market(profile.market_channel.clone());
        seen.insert(market.key());
        subs.push(market);

        for instrument in instruments.iter().filter(|i| i.asset_class == asset_class) {
            for template in &profile.instrument_topics {
                let channel = profile.instrument_channel(template, instrument);
                let sub = Subscription::for_instrument(channel, instrument.clone());
                if seen.insert(sub.key()) {
                    subs.push(sub);
                }
            }
        }
        subs
    }

    /// Mark `sub` active. Returns false if it already was.
    pub fn reserve(&self, sub: &Subscription) -> bool {
        match self.active.entry(sub.key()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(sub.clone());
                true
            }
        }
    }

    pub fn release(&self, sub: &Subscription) -> Option<Subscription> {
        self.active.remove(&sub.key()).map(|(_, sub)| sub)
    }

    pub fn is_active(&self, sub: &Subscription) -> bool {
        self.active.contains_key(&sub.key())
    }

    pub fn active(&self) -> Vec<Subscription> {
        self.active.iter().map(|e| e.value().clone()).collect()
    }

    pub fn clear(&self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
