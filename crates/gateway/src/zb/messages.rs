//! ZB WebSocket message types
//!
//! Prices and amounts arrive either as JSON strings or numbers; both decode
//! into `Decimal`. Ids that the venue sometimes quotes decode through
//! [`string_or_number`].

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::model::TradeSide;

/// Value of the `event` field on every outbound command
pub const ADD_CHANNEL: &str = "addChannel";

/// Accepts `"123"` or `123` and keeps the textual form
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = string_or_number(deserializer)?;
    raw.trim()
        .parse()
        .map_err(|e| serde::de::Error::custom(format!("invalid integer {:?}: {}", raw, e)))
}

// ============================================================================
// Streaming payloads
// ============================================================================

/// `markets` channel: symbol -> precision
#[derive(Debug, Deserialize)]
pub struct MarketsFrame {
    pub data: BTreeMap<String, MarketScale>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketScale {
    pub amount_scale: u32,
    pub price_scale: u32,
}

/// `{symbol}_ticker` channel
#[derive(Debug, Deserialize)]
pub struct TickerFrame {
    /// Epoch milliseconds
    #[serde(deserialize_with = "flexible_i64")]
    pub date: i64,
    pub ticker: TickerData,
}

#[derive(Debug, Deserialize)]
pub struct TickerData {
    pub last: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub buy: Decimal,
    pub sell: Decimal,
    /// 24h volume
    pub vol: Decimal,
}

/// `{symbol}_depth` channel
#[derive(Debug, Deserialize)]
pub struct DepthFrame {
    #[serde(default)]
    pub asks: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    pub bids: Vec<(Decimal, Decimal)>,
    /// Epoch seconds
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// `{symbol}_trades` channel
#[derive(Debug, Deserialize)]
pub struct TradesFrame {
    #[serde(default)]
    pub data: Vec<TradeData>,
}

#[derive(Debug, Deserialize)]
pub struct TradeData {
    pub price: Decimal,
    pub amount: Decimal,
    /// Epoch seconds
    #[serde(deserialize_with = "flexible_i64")]
    pub date: i64,
    #[serde(rename = "type")]
    pub side: TradeSide,
    #[serde(default)]
    pub tid: Option<i64>,
}

// ============================================================================
// Authenticated commands
// ============================================================================

/// Signed command envelope. `sign` is left out while signing.
#[derive(Debug, Serialize)]
pub struct AuthenticatedCommand<P: Serialize> {
    pub accesskey: String,
    pub channel: String,
    pub event: &'static str,
    pub no: u64,
    #[serde(flatten)]
    pub params: P,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NoParams {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubUserParams {
    pub memo: &'static str,
    pub password: String,
    pub sub_user_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFundsParams {
    pub amount: Decimal,
    pub currency: String,
    pub from_user_name: String,
    pub to_user_name: String,
}

/// Permissions granted to a sub-user API key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPermissions {
    pub asset_perm: bool,
    pub entrust_perm: bool,
    pub lever_perm: bool,
    pub money_perm: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubUserKeyParams {
    #[serde(flatten)]
    pub permissions: KeyPermissions,
    pub key_name: String,
    pub to_user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderParams {
    pub amount: Decimal,
    pub price: Decimal,
    /// 1 = buy, 0 = sell
    pub trade_type: u8,
}

#[derive(Debug, Serialize)]
pub struct OrderIdParams {
    pub id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersPageParams {
    pub page_index: u32,
    pub trade_type: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersIgnoreTypeParams {
    pub page_index: u32,
    pub page_size: u32,
}

pub fn trade_type(side: TradeSide) -> u8 {
    match side {
        TradeSide::Buy => 1,
        TradeSide::Sell => 0,
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Status-only reply (transfers, key creation, cancels)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub coins: Vec<CoinBalance>,
    #[serde(default)]
    pub base: Option<AccountBase>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinBalance {
    #[serde(rename = "enName")]
    pub currency: String,
    pub available: Decimal,
    #[serde(rename = "freez")]
    pub frozen: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountBase {
    pub username: String,
    #[serde(default)]
    pub auth_google_enabled: bool,
    #[serde(default)]
    pub auth_mobile_enabled: bool,
    #[serde(default)]
    pub trade_password_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubUser {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedOrder {
    #[serde(deserialize_with = "string_or_number")]
    pub entrust_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub currency: String,
    pub price: Decimal,
    pub total_amount: Decimal,
    #[serde(default)]
    pub trade_amount: Decimal,
    #[serde(default)]
    pub trade_money: Decimal,
    /// Epoch milliseconds
    #[serde(default)]
    pub trade_date: i64,
    /// 0 pending, 1 cancelled, 2 filled, 3 partially filled
    pub status: i32,
    /// 1 buy, 0 sell
    #[serde(rename = "type")]
    pub trade_type: u8,
}
