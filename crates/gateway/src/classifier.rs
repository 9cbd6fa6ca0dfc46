//! Inbound frame classification
//!
//! Every frame is repaired, parsed into a generic envelope, and sorted into a
//! correlated reply, a venue error, or a streaming event.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::repair::repair_frame;
use crate::venue::VenueProfile;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    String(String),
}

/// Accepts `12`, `"12"`, `""` and `null`
fn flexible_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Option::<NumberOrString<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid number {:?}: {}", s, e))),
    }
}

/// Generic inbound envelope
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Correlation id
    #[serde(default, alias = "id", deserialize_with = "flexible_number")]
    pub no: Option<u64>,
    #[serde(default, deserialize_with = "flexible_number")]
    pub code: Option<i64>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    CorrelatedReply { id: u64, payload: Vec<u8> },
    ProtocolError { code: i64, message: String },
    StreamEvent { topic: String, payload: Vec<u8> },
    Unparseable(String),
}

impl Classification {
    pub fn kind(&self) -> &'static str {
        match self {
            Classification::CorrelatedReply { .. } => "reply",
            Classification::ProtocolError { .. } => "protocol_error",
            Classification::StreamEvent { .. } => "event",
            Classification::Unparseable(_) => "unparseable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    profile: Arc<VenueProfile>,
}

impl Classifier {
    pub fn new(profile: Arc<VenueProfile>) -> Self {
        Self { profile }
    }

    pub fn classify(&self, frame: &[u8]) -> Classification {
        let repaired = repair_frame(frame);
        let envelope: Envelope = match serde_json::from_slice(&repaired) {
            Ok(envelope) => envelope,
            Err(e) => return Classification::Unparseable(e.to_string()),
        };

        if let Some(id) = envelope.no.filter(|id| *id > 0) {
            return Classification::CorrelatedReply {
                id,
                payload: repaired.into_owned(),
            };
        }

        if let Some(code) = envelope.code.filter(|c| !self.profile.is_success(*c)) {
            return Classification::ProtocolError {
                code,
                message: envelope.message.unwrap_or_default(),
            };
        }

        Classification::StreamEvent {
            topic: envelope.channel.unwrap_or_default(),
            payload: repaired.into_owned(),
        }
    }

    /// Venue error enriched with the profile's code description
    pub fn protocol_error(&self, code: i64, message: impl Into<String>) -> GatewayError {
        GatewayError::Protocol {
            code,
            message: message.into(),
            description: self.profile.describe_error(code).to_string(),
        }
    }

    /// Decode a correlated reply: non-success codes become `Protocol`,
    /// otherwise `data` is decoded as `T`.
    pub fn decode_reply<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, GatewayError> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        if let Some(code) = envelope.code.filter(|c| !self.profile.is_success(*c)) {
            return Err(self.protocol_error(code, envelope.message.unwrap_or_default()));
        }
        let data = envelope
            .data
            .ok_or_else(|| GatewayError::Unparseable("reply has no data".to_string()))?;
        Ok(serde_json::from_str(data.get())?)
    }

    /// Check a reply's status without decoding its data
    pub fn check_reply(&self, payload: &[u8]) -> Result<(), GatewayError> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        match envelope.code.filter(|c| !self.profile.is_success(*c)) {
            Some(code) => Err(self.protocol_error(code, envelope.message.unwrap_or_default())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zb;

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(zb::profile()))
    }

    #[test]
    fn test_reply_with_string_id() {
        let frame = br#"{"success":true,"code":1000,"channel":"getaccountinfo","message":"ok","no":"15"}"#;
        match classifier().classify(frame) {
            Classification::CorrelatedReply { id, payload } => {
                assert_eq!(id, 15);
                assert_eq!(payload, frame.to_vec());
            }
            other => panic!("Expected CorrelatedReply, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_wins_over_error_code() {
        let frame = br#"{"code":1003,"message":"verify failed","no":9}"#;
        assert!(matches!(
            classifier().classify(frame),
            Classification::CorrelatedReply { id: 9, .. }
        ));
    }

    #[test]
    fn test_error_code() {
        let frame = br#"{"success":false,"code":1003,"channel":"btcusdt_order","message":"verify failed"}"#;
        assert_eq!(
            classifier().classify(frame),
            Classification::ProtocolError {
                code: 1003,
                message: "verify failed".to_string()
            }
        );
    }

    #[test]
    fn test_success_code_is_not_an_error() {
        let frame = br#"{"code":1000,"channel":"btcusdt_ticker","ticker":{}}"#;
        assert!(matches!(
            classifier().classify(frame),
            Classification::StreamEvent { ref topic, .. } if topic == "btcusdt_ticker"
        ));
    }

    #[test]
    fn test_stream_event_payload_is_repaired() {
        let frame = br#"{"channel":"markets","data":"{"btc_usdt":{"amountScale":4,"priceScale":2}}"}"#;
        match classifier().classify(frame) {
            Classification::StreamEvent { topic, payload } => {
                assert_eq!(topic, "markets");
                let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
                assert_eq!(value["data"]["btc_usdt"]["priceScale"], 2);
            }
            other => panic!("Expected StreamEvent, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            classifier().classify(b"not json"),
            Classification::Unparseable(_)
        ));
        assert!(matches!(
            classifier().classify(br#"{"no":"abc"}"#),
            Classification::Unparseable(_)
        ));
    }

    #[test]
    fn test_zero_and_empty_ids_are_not_replies() {
        for frame in [
            br#"{"no":0,"channel":"x"}"#.as_slice(),
            br#"{"no":"","channel":"x"}"#.as_slice(),
        ] {
            assert!(matches!(
                classifier().classify(frame),
                Classification::StreamEvent { .. }
            ));
        }
    }

    #[test]
    fn test_decode_reply() {
        #[derive(Deserialize)]
        struct Entrust {
            #[serde(rename = "entrustId")]
            entrust_id: i64,
        }

        let ok = br#"{"code":1000,"no":"3","data":{"entrustId":42}}"#;
        let entrust: Entrust = classifier().decode_reply(ok).unwrap();
        assert_eq!(entrust.entrust_id, 42);

        let failed = br#"{"code":3001,"no":"3","message":"missing"}"#;
        match classifier().decode_reply::<Entrust>(failed) {
            Err(GatewayError::Protocol { code, description, .. }) => {
                assert_eq!(code, 3001);
                assert_eq!(description, "Order not found");
            }
            other => panic!("Expected Protocol error, got {:?}", other.err()),
        }
    }
}
