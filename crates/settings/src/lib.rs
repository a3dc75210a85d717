//! PrizeCraft Settings
//!
//! Configuration for the settlement daemon and CLI.
//!
//! ## Features
//!
//! - Scheduler settings (tick interval, catch-up bound, leaderboard top-N)
//! - Versioned period duration history
//! - Claim signer domain and key location
//! - Store persistence path
//! - JSON serialization with defaults for every field
//!
//! ## Usage
//!
//! ```no_run
//! use prizecraft_settings::Settings;
//!
//! let mut settings = Settings::load_or_default()?;
//! settings.scheduler.leaderboard_top_n = 25;
//! settings.save()?;
//! # Ok::<(), prizecraft_settings::SettingsError>(())
//! ```

mod config;

pub use config::{
    Settings, SchedulerSettings, PeriodSettings, ClaimSettings, StorageSettings,
};

use std::path::PathBuf;

use thiserror::Error;
use prizecraft_keystore::default_config_dir;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Get the default settings file path
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}
