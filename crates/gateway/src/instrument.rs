//! Instrument identity
//!
//! A currency pair plus asset class. Pairs compare on their case- and
//! delimiter-normalized form, so `btc_usdt`, `BTC/USDT` and `btcusdt` are the
//! same dictionary key.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use streamgate_metadata::AssetClassConfig;

const PAIR_DELIMITERS: [char; 3] = ['/', '_', '-'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[default]
    Spot,
    Margin,
    Futures,
}

impl From<AssetClassConfig> for AssetClass {
    fn from(value: AssetClassConfig) -> Self {
        match value {
            AssetClassConfig::Spot => AssetClass::Spot,
            AssetClassConfig::Margin => AssetClass::Margin,
            AssetClassConfig::Futures => AssetClass::Futures,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetClass::Spot => "spot",
            AssetClass::Margin => "margin",
            AssetClass::Futures => "futures",
        };
        f.write_str(s)
    }
}

/// Base/quote pair. `quote` is empty when the split is unknown
/// (a delimiter-free symbol read off the wire).
#[derive(Debug, Clone)]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.trim().to_uppercase(),
            quote: quote.trim().to_uppercase(),
        }
    }

    /// Parse `BASE/QUOTE`, `BASE_QUOTE`, `BASE-QUOTE` or a bare symbol
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.split_once(|c| PAIR_DELIMITERS.contains(&c)) {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Self::new(base, quote)
            }
            _ => Self::new(&s.replace(PAIR_DELIMITERS, ""), ""),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Uppercase, delimiter-free form used for equality
    pub fn normalized(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// Symbol as a venue spells it
    pub fn format(&self, delimiter: &str, lowercase: bool) -> String {
        let s = if self.quote.is_empty() {
            self.base.clone()
        } else {
            format!("{}{}{}", self.base, delimiter, self.quote)
        };
        if lowercase {
            s.to_lowercase()
        } else {
            s
        }
    }
}

impl PartialEq for CurrencyPair {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for CurrencyPair {}

impl Hash for CurrencyPair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format("/", false))
    }
}

impl Serialize for CurrencyPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Instrument {
    pub pair: CurrencyPair,
    pub asset_class: AssetClass,
}

impl Instrument {
    pub fn new(pair: CurrencyPair, asset_class: AssetClass) -> Self {
        Self { pair, asset_class }
    }

    pub fn parse(pair: &str, asset_class: AssetClass) -> Self {
        Self::new(CurrencyPair::parse(pair), asset_class)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pair, self.asset_class)
    }
}

/// Maps venue symbols back to configured instruments
#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    by_symbol: HashMap<(String, AssetClass), Instrument>,
}

impl InstrumentRegistry {
    pub fn new(instruments: &[Instrument]) -> Self {
        let by_symbol = instruments
            .iter()
            .map(|i| ((i.pair.normalized(), i.asset_class), i.clone()))
            .collect();
        Self { by_symbol }
    }

    /// Configured instrument for a wire symbol, or a bare-symbol instrument
    pub fn resolve(&self, symbol: &str, asset_class: AssetClass) -> Instrument {
        let pair = CurrencyPair::parse(symbol);
        self.by_symbol
            .get(&(pair.normalized(), asset_class))
            .cloned()
            .unwrap_or_else(|| Instrument::new(pair, asset_class))
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
