//! Configuration module for tablestream.
//!
//! Handles ingestion and protocol settings.

mod settings;

pub use settings::{IngestSettings, ProtocolSettings, Settings, SettingsError};
