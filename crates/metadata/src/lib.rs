//! streamgate-metadata: static venue configuration

pub mod error;
pub mod venue;

pub use error::MetadataError;
pub use venue::{
    AssetClassConfig, EventsConfig, KeysConfig, OverflowMode, VenueConfig,
    DEFAULT_BLOCK_TIMEOUT_MS, DEFAULT_EVENT_BUFFER, DEFAULT_REQUEST_TIMEOUT_MS,
};
