//! Settlement service facade
//!
//! Owns every engine component and exposes the operations the rest of the
//! application uses. Collaborators and stores are injected, so tests and the
//! daemon only differ in what they pass in.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use prizecraft_core::{Contest, PeriodBounds, PeriodId, PeriodSnapshot, Timestamp};
use prizecraft_crypto::{ClaimAuthorization, SigningKeypair};

use crate::{
    now_secs, CheckpointStore, ClaimAuthorizer, ClaimConfig, ClaimableReward, ContestRegistry,
    ContestStore, ContestTickReport, CreateContest, Leaderboard, MemoryStore, PeriodAccountant,
    PeriodConfigSource, PeriodTickReport, Result, SchedulerConfig, SettlementContract,
    SettlementScheduler, SnapshotStore, SocialClient, TickReport, WalletService,
    DEFAULT_CACHE_TTL,
};

/// External services the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub social: Arc<dyn SocialClient>,
    pub wallet: Arc<dyn WalletService>,
    pub chain: Arc<dyn SettlementContract>,
    pub leaderboard: Arc<dyn Leaderboard>,
    pub period_config: Arc<dyn PeriodConfigSource>,
}

/// Persistence backends
#[derive(Clone)]
pub struct Stores {
    pub contests: Arc<dyn ContestStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl Stores {
    /// All three stores served by one [`MemoryStore`]
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            contests: store.clone(),
            snapshots: store.clone(),
            checkpoints: store,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub scheduler: SchedulerConfig,
    pub claims: ClaimConfig,
    /// How long a loaded period configuration history is reused
    pub period_cache_ttl: Duration,
    /// Fixed winner-selection seed (tests)
    pub selection_seed: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            claims: ClaimConfig {
                domain: "prizecraft-claim-v1".to_string(),
                settlement_contract: String::new(),
            },
            period_cache_ttl: DEFAULT_CACHE_TTL,
            selection_seed: None,
        }
    }
}

pub struct SettlementService {
    contests: ContestRegistry,
    claims: ClaimAuthorizer,
    accountant: Arc<PeriodAccountant>,
    scheduler: SettlementScheduler,
}

impl SettlementService {
    pub fn new(
        config: ServiceConfig,
        collaborators: Collaborators,
        stores: Stores,
        signer: SigningKeypair,
    ) -> Self {
        let accountant = Arc::new(PeriodAccountant::with_ttl(
            collaborators.period_config.clone(),
            config.period_cache_ttl,
        ));

        let mut scheduler =
            SettlementScheduler::new(&stores, &collaborators, accountant.clone(), config.scheduler);
        if let Some(seed) = config.selection_seed {
            scheduler = scheduler.with_seed(seed);
        }

        Self {
            contests: ContestRegistry::new(
                collaborators.social.clone(),
                collaborators.wallet.clone(),
                stores.contests.clone(),
            ),
            claims: ClaimAuthorizer::new(
                stores.snapshots.clone(),
                collaborators.wallet.clone(),
                collaborators.chain.clone(),
                signer,
                config.claims,
            ),
            accountant,
            scheduler,
        }
    }

    // ========================================================================
    // Contests
    // ========================================================================

    pub async fn create_contest(&self, request: CreateContest) -> Result<Contest> {
        self.create_contest_at(request, now_secs()).await
    }

    pub async fn create_contest_at(&self, request: CreateContest, now: Timestamp) -> Result<Contest> {
        self.contests.create(request, now).await
    }

    pub async fn cancel_contest(&self, contest_id: &str, requester: &str) -> Result<Contest> {
        self.contests.cancel(contest_id, requester).await
    }

    pub async fn get_contest(&self, contest_id: &str) -> Result<Contest> {
        self.contests.get(contest_id).await
    }

    // ========================================================================
    // Scheduler
    // ========================================================================

    pub async fn run_due_contests(&self) -> ContestTickReport {
        self.scheduler.run_due_contests(now_secs()).await
    }

    pub async fn run_due_contests_at(&self, now: Timestamp) -> ContestTickReport {
        self.scheduler.run_due_contests(now).await
    }

    pub async fn run_due_periods(&self) -> PeriodTickReport {
        self.scheduler.run_due_periods(now_secs()).await
    }

    pub async fn run_due_periods_at(&self, now: Timestamp) -> PeriodTickReport {
        self.scheduler.run_due_periods(now).await
    }

    pub async fn tick(&self) -> TickReport {
        self.scheduler.tick(now_secs()).await
    }

    pub async fn tick_at(&self, now: Timestamp) -> TickReport {
        self.scheduler.tick(now).await
    }

    /// Tick every `interval` until `shutdown` flips to true
    pub async fn run(&self, interval: Duration, shutdown: watch::Receiver<bool>) {
        self.scheduler.run(interval, shutdown).await
    }

    // ========================================================================
    // Periods & claims
    // ========================================================================

    pub async fn period_id(&self, timestamp: Timestamp) -> Result<PeriodId> {
        self.accountant.period_id(timestamp).await
    }

    pub async fn period_bounds(&self, period: PeriodId) -> Result<PeriodBounds> {
        self.accountant.period_bounds(period).await
    }

    pub async fn get_claimable(&self, participant: &str) -> Result<Vec<ClaimableReward>> {
        self.claims.claimable(participant).await
    }

    pub async fn request_claim_authorization(
        &self,
        period: PeriodId,
        participant: &str,
    ) -> Result<ClaimAuthorization> {
        self.claims.authorize(period, participant, now_secs()).await
    }

    pub async fn confirm_claim(
        &self,
        period: PeriodId,
        participant: &str,
        tx_ref: &str,
    ) -> Result<PeriodSnapshot> {
        self.claims.confirm(period, participant, tx_ref, now_secs()).await
    }

    pub fn signer_public_key(&self) -> [u8; 32] {
        self.claims.signer_public_key()
    }
}
