use std::path::PathBuf;
use thiserror::Error;

/// Venue configuration load and validation errors
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid venue config: {0}")]
    Validation(String),
}
