//! PrizeCraft Daemon
//!
//! Background service that settles contests and leaderboard periods.
//!
//! ## Components
//!
//! - **DaemonService**: builds a `SettlementService` from the settings file,
//!   the claim signer key in the keystore and the persisted store, then
//!   ticks it on the configured interval
//!
//! ## Collaborators
//!
//! The social client, wallet service, settlement contract and leaderboard
//! are injected. Without live adapters the daemon runs against the
//! in-memory mocks, which is useful for dry runs of a settings file.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use prizecraft_keystore::{load_or_generate_signing_keypair, KeystoreError};
use prizecraft_settings::{Settings, SettingsError};
use prizecraft_settlement::mock::{MockChain, MockLeaderboard, MockSocial, MockWallet};
use prizecraft_settlement::{
    ClaimConfig, Collaborators, MemoryStore, SchedulerConfig, ServiceConfig, SettlementError,
    SettlementService, StaticPeriodConfig, Stores,
};

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),
}

pub type Result<T> = std::result::Result<T, DaemonError>;

/// Engine configuration derived from the settings file
pub fn service_config(settings: &Settings) -> ServiceConfig {
    ServiceConfig {
        scheduler: SchedulerConfig {
            bot_identity: settings.scheduler.bot_identity.clone(),
            job_name: settings.scheduler.job_name.clone(),
            top_n: settings.scheduler.leaderboard_top_n,
            max_periods_per_tick: settings.scheduler.max_periods_per_tick,
            reward_denomination: settings.scheduler.reward_denomination.clone(),
        },
        claims: ClaimConfig {
            domain: settings.claims.domain.clone(),
            settlement_contract: settings.claims.settlement_contract.clone(),
        },
        period_cache_ttl: Duration::from_secs(settings.periods.cache_ttl_secs),
        selection_seed: None,
    }
}

/// In-memory collaborators, with the period history from settings
pub fn mock_collaborators(settings: &Settings) -> Collaborators {
    Collaborators {
        social: Arc::new(MockSocial::new()),
        wallet: Arc::new(MockWallet::new()),
        chain: Arc::new(MockChain::new()),
        leaderboard: Arc::new(MockLeaderboard::new()),
        period_config: Arc::new(StaticPeriodConfig::new(settings.periods.history.clone())),
    }
}

/// Settlement daemon
pub struct DaemonService {
    settings: Settings,
    service: Arc<SettlementService>,
}

impl DaemonService {
    /// Build the service with the given collaborators
    pub fn new(settings: Settings, collaborators: Collaborators) -> Result<Self> {
        let key_path = settings.claims.signer_key_path();
        let signer = load_or_generate_signing_keypair(&key_path)?;
        info!("Claim signer {} ({})", signer.public_key_hex(), key_path.display());

        let state_path = settings.storage.state_path();
        let store = Arc::new(MemoryStore::open(&state_path)?);
        info!("Store state at {}", state_path.display());

        let service = SettlementService::new(
            service_config(&settings),
            collaborators,
            Stores::memory(store),
            signer,
        );

        Ok(Self {
            settings,
            service: Arc::new(service),
        })
    }

    /// Build the service against in-memory collaborators
    pub fn with_mock_collaborators(settings: Settings) -> Result<Self> {
        let collaborators = mock_collaborators(&settings);
        Self::new(settings, collaborators)
    }

    pub fn service(&self) -> Arc<SettlementService> {
        self.service.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.settings.scheduler.tick_interval_secs)
    }

    /// Tick until `shutdown` flips to true
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        self.service.run(self.tick_interval(), shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_settings(name: &str) -> (Settings, PathBuf) {
        let dir = std::env::temp_dir().join(format!("prizecraft-daemon-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut settings = Settings::default();
        settings.claims.signer_key_path = Some(dir.join("signer.key").display().to_string());
        settings.storage.state_path = Some(dir.join("state.json").display().to_string());
        (settings, dir)
    }

    #[test]
    fn test_service_config_from_settings() {
        let mut settings = Settings::default();
        settings.scheduler.bot_identity = "prizebot".to_string();
        settings.scheduler.leaderboard_top_n = 5;
        settings.claims.settlement_contract = "contract-9".to_string();

        let config = service_config(&settings);
        assert_eq!(config.scheduler.bot_identity, "prizebot");
        assert_eq!(config.scheduler.top_n, 5);
        assert_eq!(config.scheduler.job_name, "leaderboard-rewards");
        assert_eq!(config.claims.settlement_contract, "contract-9");
        assert_eq!(config.period_cache_ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_signer_key_is_stable_across_restarts() {
        let (settings, dir) = temp_settings("signer");
        let first = DaemonService::with_mock_collaborators(settings.clone()).unwrap();
        let second = DaemonService::with_mock_collaborators(settings).unwrap();
        assert_eq!(
            first.service().signer_public_key(),
            second.service().signer_public_key()
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_tick_persists_checkpoint() {
        let (settings, dir) = temp_settings("tick");
        let daemon = DaemonService::with_mock_collaborators(settings.clone()).unwrap();
        // Weekly periods: period 3 is current, period 2 gets settled
        let report = daemon.service().tick_at(604_800 * 3 + 1).await;
        assert_eq!(report.periods.settled_periods(), vec![2]);

        let state = std::fs::read_to_string(settings.storage.state_path()).unwrap();
        assert!(state.contains("leaderboard-rewards"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (mut settings, dir) = temp_settings("run");
        settings.scheduler.tick_interval_secs = 1;
        let daemon = Arc::new(DaemonService::with_mock_collaborators(settings).unwrap());

        let (tx, rx) = watch::channel(false);
        let handle = {
            let daemon = daemon.clone();
            tokio::spawn(async move { daemon.run(rx).await })
        };
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
