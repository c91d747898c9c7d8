use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cannot write cache file {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Package universe not found: {0}")]
    UniverseMissing(PathBuf),

    #[error("Package universe {path} is not valid TOML: {source}")]
    UniverseParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Homebrew lookup failed for {package}: {reason}")]
    Homebrew { package: String, reason: String },

    #[error("Invalid segment '{0}': expected 0-6 or 'all'")]
    InvalidSegment(String),

    #[error("Mapping table validation failed with {} problem(s):\n  {}", .0.len(), .0.join("\n  "))]
    Validation(Vec<String>),

    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
