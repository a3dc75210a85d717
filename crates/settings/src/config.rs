//! Configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use prizecraft_core::PeriodConfig;
use prizecraft_keystore::{default_data_dir, default_key_path, expand_path};

use crate::{default_settings_path, Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Settlement scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Period duration history
    #[serde(default)]
    pub periods: PeriodSettings,

    /// Claim authorization settings
    #[serde(default)]
    pub claims: ClaimSettings,

    /// Store persistence
    #[serde(default)]
    pub storage: StorageSettings,

    /// Custom settings file path (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default path, or create defaults
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&default_settings_path())
    }

    /// Load settings from a specific path, or create defaults
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.clone());
            settings.validate()?;
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            let mut settings = Self::default();
            settings.config_path = Some(path.clone());
            Ok(settings)
        }
    }

    /// Save settings to the configured path
    pub fn save(&self) -> Result<()> {
        let path = self.config_path.clone().unwrap_or_else(default_settings_path);
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Reject values the engine can't run with.
    ///
    /// An empty period history is allowed: the period track reports
    /// ConfigurationMissing each tick until an operator adds an entry.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick_interval_secs == 0 {
            return Err(SettingsError::Invalid("scheduler.tick_interval_secs must be positive".into()));
        }
        if self.scheduler.leaderboard_top_n == 0 {
            return Err(SettingsError::Invalid("scheduler.leaderboard_top_n must be positive".into()));
        }
        if self.periods.history.iter().any(|c| c.duration_secs == 0) {
            return Err(SettingsError::Invalid("periods.history has a zero duration".into()));
        }
        Ok(())
    }
}

/// Settlement scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between scheduler ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Upper bound on periods settled in one tick
    #[serde(default = "default_max_periods")]
    pub max_periods_per_tick: u64,

    /// Number of ranked leaderboard entries snapshotted per period
    #[serde(default = "default_top_n")]
    pub leaderboard_top_n: usize,

    /// The bot's own social identity (never eligible to win)
    #[serde(default)]
    pub bot_identity: String,

    /// Checkpoint key of the leaderboard catch-up job
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// Token reference stamped on leaderboard snapshots
    #[serde(default = "default_reward_denomination")]
    pub reward_denomination: String,
}

fn default_tick_interval() -> u64 {
    3600
}

fn default_max_periods() -> u64 {
    64
}

fn default_top_n() -> usize {
    10
}

fn default_job_name() -> String {
    "leaderboard-rewards".to_string()
}

fn default_reward_denomination() -> String {
    "USDC".to_string()
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            max_periods_per_tick: default_max_periods(),
            leaderboard_top_n: default_top_n(),
            bot_identity: String::new(),
            job_name: default_job_name(),
            reward_denomination: default_reward_denomination(),
        }
    }
}

/// Period duration history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSettings {
    /// Versioned duration configuration, append-only
    #[serde(default = "default_history")]
    pub history: Vec<PeriodConfig>,

    /// How long a loaded history stays cached
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_history() -> Vec<PeriodConfig> {
    vec![PeriodConfig {
        effective_start: 0,
        duration_secs: 604_800,
        period_offset: 0,
    }]
}

fn default_cache_ttl() -> u64 {
    60
}

impl Default for PeriodSettings {
    fn default() -> Self {
        Self {
            history: default_history(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Claim authorization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSettings {
    /// Domain tag bound into every signed claim
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Settlement contract identifier bound into every signed claim
    #[serde(default)]
    pub settlement_contract: String,

    /// Signer key file (defaults to the keystore directory)
    #[serde(default)]
    pub signer_key_path: Option<String>,
}

fn default_domain() -> String {
    "prizecraft-claim-v1".to_string()
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            settlement_contract: String::new(),
            signer_key_path: None,
        }
    }
}

impl ClaimSettings {
    /// Resolved signer key path
    pub fn signer_key_path(&self) -> PathBuf {
        self.signer_key_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(default_key_path)
    }
}

/// Store persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// JSON state file (defaults to the data directory)
    #[serde(default)]
    pub state_path: Option<String>,
}

impl StorageSettings {
    /// Resolved state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(|| default_data_dir().join("state.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.scheduler.tick_interval_secs, 3600);
        assert_eq!(settings.scheduler.leaderboard_top_n, 10);
        assert_eq!(settings.scheduler.job_name, "leaderboard-rewards");
        assert_eq!(settings.periods.history.len(), 1);
        assert_eq!(settings.periods.history[0].duration_secs, 604_800);
        assert_eq!(settings.periods.cache_ttl_secs, 60);
        assert_eq!(settings.claims.domain, "prizecraft-claim-v1");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scheduler.tick_interval_secs, settings.scheduler.tick_interval_secs);
        assert_eq!(parsed.periods.history, settings.periods.history);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: Settings =
            serde_json::from_str(r#"{"scheduler": {"bot_identity": "prizebot"}}"#).unwrap();
        assert_eq!(parsed.scheduler.bot_identity, "prizebot");
        assert_eq!(parsed.scheduler.max_periods_per_tick, 64);
        assert_eq!(parsed.periods.history.len(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut settings = Settings::default();
        settings.scheduler.tick_interval_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let mut settings = Settings::default();
        settings.periods.history.push(PeriodConfig {
            effective_start: 10,
            duration_secs: 0,
            period_offset: 1,
        });
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("prizecraft-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let mut settings = Settings::default();
        settings.scheduler.leaderboard_top_n = 3;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.scheduler.leaderboard_top_n, 3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_explicit_paths_are_expanded() {
        let claims = ClaimSettings {
            signer_key_path: Some("/tmp/prize/signer.key".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.signer_key_path(), PathBuf::from("/tmp/prize/signer.key"));
    }
}
