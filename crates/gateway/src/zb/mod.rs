//! ZB venue adapter
//!
//! Channel naming, error codes and payload decoding for the ZB WebSocket
//! API, plus its authenticated request set.

pub mod api;
pub mod decoder;
pub mod messages;

pub use api::ZbApi;
pub use decoder::ZbDecoder;

use std::collections::HashMap;
use std::sync::Arc;

use crate::venue::{TopicKind, VenueProfile};

pub const ZB_WS_URL: &str = "wss://api.zb.cn:9999/websocket";
pub const ZB_RATE_LIMIT_PER_SECOND: u32 = 20;
pub const ZB_SUCCESS_CODE: i64 = 1000;

fn error_codes() -> HashMap<i64, &'static str> {
    HashMap::from([
        (1000, "Successful call"),
        (1001, "General error message"),
        (1002, "Internal error"),
        (1003, "Verification failed"),
        (1004, "Financial security password lock"),
        (1005, "The fund security password is incorrect, please confirm and re-enter"),
        (1006, "Real-name authentication is awaiting review or review failed"),
        (1007, "Channel is empty"),
        (1008, "Event is empty"),
        (1009, "This interface is being maintained"),
        (2001, "Insufficient CNY account balance"),
        (2002, "Insufficient BTC account balance"),
        (2003, "Insufficient LTC account balance"),
        (2005, "Insufficient ETH account balance"),
        (2006, "Insufficient ETC account balance"),
        (2007, "Insufficient BTS account balance"),
        (2008, "Insufficient EOS account balance"),
        (2009, "Insufficient account balance"),
        (3001, "Order not found"),
        (3002, "Invalid amount"),
        (3003, "Invalid quantity"),
        (3004, "User does not exist"),
        (3005, "Invalid parameter"),
        (3006, "Invalid IP or inconsistent with the bound IP address"),
        (3007, "Request time has expired"),
        (3008, "Transaction history not found"),
        (4001, "API interface is locked"),
        (4002, "Request too frequently"),
    ])
}

/// Immutable ZB protocol profile
pub fn profile() -> VenueProfile {
    VenueProfile {
        name: "zb".to_string(),
        endpoint: ZB_WS_URL.to_string(),
        success_code: ZB_SUCCESS_CODE,
        error_codes: error_codes(),
        topic_routes: vec![
            ("markets", TopicKind::Markets),
            ("ticker", TopicKind::Ticker),
            ("depth", TopicKind::Depth),
            ("trades", TopicKind::Trades),
        ],
        market_channel: "markets".to_string(),
        instrument_topics: vec!["{symbol}_ticker", "{symbol}_depth", "{symbol}_trades"],
        channel_separator: '_',
        symbol_delimiter: "",
        symbol_lowercase: true,
        subscribe_event: messages::ADD_CHANNEL,
        unsubscribe_event: None,
        default_rate_limit_per_second: Some(ZB_RATE_LIMIT_PER_SECOND),
        decoder: Arc::new(ZbDecoder),
    }
}
