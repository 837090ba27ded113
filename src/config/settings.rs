//! TOML-based configuration.
//!
//! Supports a config file (tablestream.toml); every field has a default so a
//! missing file or a partial file is fine.
//!
//! Example configuration:
//! ```toml
//! [ingest]
//! chunk_size = 65536
//!
//! [protocol]
//! page_len = 20
//! timeout_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// File streaming configuration.
    pub ingest: IngestSettings,

    /// Message protocol configuration.
    pub protocol: ProtocolSettings,
}

/// File streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Size of each byte chunk read from the input stream.
    pub chunk_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { chunk_size: 64 * 1024 }
    }
}

/// Message protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Default number of rows per fetched page.
    pub page_len: usize,

    /// Seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            page_len: 20,
            timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from the given path, or fall back to defaults when absent.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.ingest.chunk_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "ingest.chunk_size must be positive".to_string(),
            ));
        }
        if self.protocol.page_len == 0 {
            return Err(SettingsError::InvalidConfig(
                "protocol.page_len must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.protocol.page_len, 20);
        assert_eq!(settings.protocol.timeout_secs, 30);
        assert!(settings.ingest.chunk_size > 0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let settings: Settings = toml::from_str("[protocol]\npage_len = 5\n").unwrap();
        assert_eq!(settings.protocol.page_len, 5);
        assert_eq!(settings.protocol.timeout_secs, 30);
        assert_eq!(settings.ingest.chunk_size, 64 * 1024);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let settings: Settings = toml::from_str("[ingest]\nchunk_size = 0\n").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Settings::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, SettingsError::FileNotFound(_)));
    }
}
