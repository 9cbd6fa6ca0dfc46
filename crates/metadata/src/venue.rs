use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::MetadataError;

/// Default capacity of the canonical event buffer
pub const DEFAULT_EVENT_BUFFER: usize = 1024;
/// Default budget for a correlated request
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
/// Default wait before a blocked event is dropped
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetClassConfig {
    #[default]
    Spot,
    Margin,
    Futures,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    /// Drop the newest event when the buffer is full
    #[default]
    Drop,
    /// Wait up to `block_timeout_ms` for room, then drop
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Key source, e.g. "env:ZB_API_KEY,ZB_API_SECRET"
    pub source: String,
    #[serde(default = "default_key_field")]
    pub key_field: String,
    #[serde(default = "default_secret_field")]
    pub secret_field: String,
}

fn default_key_field() -> String {
    "API_KEY".to_string()
}

fn default_secret_field() -> String {
    "API_SECRET".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_buffer")]
    pub buffer: usize,
    #[serde(default)]
    pub overflow: OverflowMode,
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,
}

fn default_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

fn default_block_timeout_ms() -> u64 {
    DEFAULT_BLOCK_TIMEOUT_MS
}

impl EventsConfig {
    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_EVENT_BUFFER,
            overflow: OverflowMode::Drop,
            block_timeout_ms: DEFAULT_BLOCK_TIMEOUT_MS,
        }
    }
}

/// Static configuration for one venue session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue id, selects the venue profile (e.g. "zb")
    pub name: String,
    /// WebSocket endpoint override (None = profile default)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub asset_class: AssetClassConfig,
    /// Enabled currency pairs, e.g. "BTC/USDT"
    pub instruments: Vec<String>,
    #[serde(default)]
    pub keys: Option<KeysConfig>,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Outbound writes per second (None = unlimited)
    #[serde(default)]
    pub rate_limit_per_second: Option<u32>,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl VenueConfig {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path).map_err(|source| MetadataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: VenueConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.name.trim().is_empty() {
            return Err(MetadataError::Validation("venue name is empty".to_string()));
        }
        if self.instruments.is_empty() {
            return Err(MetadataError::Validation(format!(
                "venue {} has no instruments",
                self.name
            )));
        }
        if let Some(bad) = self.instruments.iter().find(|i| i.trim().is_empty()) {
            return Err(MetadataError::Validation(format!(
                "invalid instrument {:?}",
                bad
            )));
        }
        if self.events.buffer == 0 {
            return Err(MetadataError::Validation(
                "events.buffer must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(MetadataError::Validation(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit_per_second == Some(0) {
            return Err(MetadataError::Validation(
                "rate_limit_per_second must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn block_timeout(&self) -> Duration {
        self.events.block_timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_venue() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
name: zb
asset_class: spot
instruments:
  - BTC/USDT
  - ETH/USDT
keys:
  source: env:ZB_API_KEY,ZB_API_SECRET
  key_field: ZB_API_KEY
  secret_field: ZB_API_SECRET
events:
  buffer: 64
  overflow: block
  block_timeout_ms: 250
rate_limit_per_second: 20
"#
        )
        .unwrap();

        let config = VenueConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "zb");
        assert_eq!(config.instruments.len(), 2);
        assert_eq!(config.asset_class, AssetClassConfig::Spot);
        assert_eq!(config.events.buffer, 64);
        assert_eq!(config.events.overflow, OverflowMode::Block);
        assert_eq!(config.block_timeout(), Duration::from_millis(250));
        assert_eq!(config.rate_limit_per_second, Some(20));
        assert_eq!(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        let keys = config.keys.unwrap();
        assert_eq!(keys.key_field, "ZB_API_KEY");
        assert_eq!(keys.secret_field, "ZB_API_SECRET");
    }

    #[test]
    fn test_defaults() {
        let config: VenueConfig = serde_yaml::from_str(
            r#"
name: zb
instruments: [BTC/USDT]
"#,
        )
        .unwrap();

        assert!(config.endpoint.is_none());
        assert!(config.keys.is_none());
        assert_eq!(config.events.buffer, DEFAULT_EVENT_BUFFER);
        assert_eq!(config.events.overflow, OverflowMode::Drop);
        assert!(config.rate_limit_per_second.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_instruments() {
        let config: VenueConfig = serde_yaml::from_str("name: zb\ninstruments: []\n").unwrap();
        match config.validate() {
            Err(MetadataError::Validation(msg)) => assert!(msg.contains("no instruments")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_zero_buffer() {
        let config: VenueConfig = serde_yaml::from_str(
            "name: zb\ninstruments: [BTC/USDT]\nevents:\n  buffer: 0\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_rate_limit() {
        let config: VenueConfig = serde_yaml::from_str(
            "name: zb\ninstruments: [BTC/USDT]\nrate_limit_per_second: 0\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = VenueConfig::load(Path::new("/nonexistent/venue.yaml"));
        match result {
            Err(MetadataError::Read { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/venue.yaml"))
            }
            other => panic!("Expected read error, got {:?}", other),
        }
    }
}
