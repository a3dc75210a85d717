//! Integration tests for the leaderboard track
//!
//! Tests the period settlement lifecycle:
//! 1. Catch-up from the checkpoint over closed periods only
//! 2. Deterministic ranking with ties
//! 3. Crash mid-range and resume with identical final snapshots
//! 4. Period duration changes across the catch-up range
//! 5. Claim authorization, confirmation and on-chain reconciliation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use prizecraft_core::{Amount, Checkpoint, PeriodConfig, PeriodId, PeriodSnapshot, Timestamp};
use prizecraft_crypto::{verify_claim_authorization, SigningKeypair};
use prizecraft_settlement::mock::{MockChain, MockLeaderboard, MockSocial, MockWallet};
use prizecraft_settlement::{
    CheckpointStore, Collaborators, MemoryStore, PeriodConfigSource, PeriodOutcome, Result,
    ServiceConfig, SettlementError, SettlementService, SnapshotStore, StaticPeriodConfig, Stores,
};

// =============================================================================
// HELPERS
// =============================================================================

const WEEK: u64 = 604_800;
const JOB: &str = "leaderboard-rewards";

fn weekly() -> Vec<PeriodConfig> {
    vec![PeriodConfig { effective_start: 0, duration_secs: WEEK, period_offset: 0 }]
}

fn collaborators(
    leaderboard: Arc<MockLeaderboard>,
    chain: Arc<MockChain>,
    period_config: Arc<dyn PeriodConfigSource>,
) -> Collaborators {
    Collaborators {
        social: Arc::new(MockSocial::new()),
        wallet: Arc::new(MockWallet::new()),
        chain,
        leaderboard,
        period_config,
    }
}

fn service_with(collaborators: Collaborators, stores: Stores, top_n: usize) -> SettlementService {
    let mut config = ServiceConfig { period_cache_ttl: Duration::ZERO, ..Default::default() };
    config.scheduler.top_n = top_n;
    SettlementService::new(config, collaborators, stores, SigningKeypair::generate())
}

fn service(leaderboard: Arc<MockLeaderboard>, chain: Arc<MockChain>, store: Arc<MemoryStore>) -> SettlementService {
    service_with(
        collaborators(leaderboard, chain, Arc::new(StaticPeriodConfig::new(weekly()))),
        Stores::memory(store),
        3,
    )
}

async fn all_snapshots(store: &MemoryStore, periods: std::ops::RangeInclusive<PeriodId>) -> Vec<PeriodSnapshot> {
    let mut rows = Vec::new();
    for period in periods {
        rows.extend(store.snapshots_for_period(period).await.unwrap());
    }
    rows
}

/// Checkpoint store that fails one advance, as if the process died right
/// after writing a period's snapshot rows
struct CrashingCheckpoints {
    inner: Arc<MemoryStore>,
    crash_at: PeriodId,
    armed: AtomicBool,
}

#[async_trait]
impl CheckpointStore for CrashingCheckpoints {
    async fn get_checkpoint(&self, job: &str) -> Result<Option<Checkpoint>> {
        self.inner.get_checkpoint(job).await
    }

    async fn advance_checkpoint(&self, job: &str, period: PeriodId, at: Timestamp) -> Result<Checkpoint> {
        if period == self.crash_at && self.armed.swap(false, Ordering::SeqCst) {
            return Err(SettlementError::Storage("simulated crash".to_string()));
        }
        self.inner.advance_checkpoint(job, period, at).await
    }
}

/// Period history an operator can edit while the service runs
#[derive(Default)]
struct EditableHistory(RwLock<Vec<PeriodConfig>>);

#[async_trait]
impl PeriodConfigSource for EditableHistory {
    async fn load(&self) -> Result<Vec<PeriodConfig>> {
        Ok(self.0.read().clone())
    }
}

fn seed_standings(leaderboard: &MockLeaderboard) {
    leaderboard.set_standings(6, &[("alice", 40), ("bob", 40), ("carl", 10), ("dave", 5)]);
    leaderboard.set_standings(7, &[("bob", 12), ("erin", 30)]);
    leaderboard.set_standings(8, &[]);
    leaderboard.set_standings(9, &[("alice", 99)]);
}

// =============================================================================
// CATCH-UP
// =============================================================================

#[tokio::test]
async fn test_checkpoint_five_current_nine() {
    let store = Arc::new(MemoryStore::new());
    let leaderboard = Arc::new(MockLeaderboard::new());
    seed_standings(&leaderboard);
    store.advance_checkpoint(JOB, 5, 0).await.unwrap();

    let svc = service(leaderboard.clone(), Arc::new(MockChain::new()), store.clone());
    assert_eq!(svc.period_id(WEEK * 5 / 2).await.unwrap(), 2);
    let bounds = svc.period_bounds(2).await.unwrap();
    assert_eq!((bounds.start, bounds.end), (WEEK * 2, WEEK * 3));

    let report = svc.run_due_periods_at(WEEK * 9 + WEEK / 2).await;

    assert_eq!(report.current_period, Some(9));
    assert_eq!(report.settled_periods(), vec![6, 7, 8]);
    assert_eq!(leaderboard.calls(), vec![6, 7, 8]);
    assert_eq!(store.get_checkpoint(JOB).await.unwrap().unwrap().last_period, 8);

    // Top 3 of period 6, ties broken by identity
    let ranks: Vec<_> = store
        .snapshots_for_period(6)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.participant_id, s.rank))
        .collect();
    assert_eq!(
        ranks,
        vec![("alice".to_string(), 1), ("bob".to_string(), 2), ("carl".to_string(), 3)]
    );
    assert!(store.snapshots_for_period(9).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ranking_is_reproducible_across_runs() {
    let mut results = Vec::new();
    for order in [
        vec![("zed", 7), ("amy", 7), ("kim", 7), ("bo", 9)],
        vec![("kim", 7), ("bo", 9), ("zed", 7), ("amy", 7)],
    ] {
        let store = Arc::new(MemoryStore::new());
        let leaderboard = Arc::new(MockLeaderboard::new());
        leaderboard.set_standings(1, &order);
        let svc = service(leaderboard, Arc::new(MockChain::new()), store.clone());
        svc.run_due_periods_at(WEEK * 2).await;

        let ranks: Vec<_> = store
            .snapshots_for_period(1)
            .await
            .unwrap()
            .into_iter()
            .map(|s| (s.participant_id, s.rank))
            .collect();
        results.push(ranks);
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0][0], ("bo".to_string(), 1));
    assert_eq!(results[0][1], ("amy".to_string(), 2));
    assert_eq!(results[0][2], ("kim".to_string(), 3));
}

#[tokio::test]
async fn test_crash_mid_range_resumes_to_same_snapshots() {
    let leaderboard = Arc::new(MockLeaderboard::new());
    seed_standings(&leaderboard);
    let now = WEEK * 9 + 1;

    // Uninterrupted reference run
    let reference = Arc::new(MemoryStore::new());
    reference.advance_checkpoint(JOB, 5, 0).await.unwrap();
    service(leaderboard.clone(), Arc::new(MockChain::new()), reference.clone())
        .run_due_periods_at(now)
        .await;

    // Crash after period 7's rows are written, before its checkpoint
    let store = Arc::new(MemoryStore::new());
    store.advance_checkpoint(JOB, 5, 0).await.unwrap();
    let crashing = Stores {
        contests: store.clone(),
        snapshots: store.clone(),
        checkpoints: Arc::new(CrashingCheckpoints {
            inner: store.clone(),
            crash_at: 7,
            armed: AtomicBool::new(true),
        }),
    };
    let svc = service_with(
        collaborators(leaderboard.clone(), Arc::new(MockChain::new()), Arc::new(StaticPeriodConfig::new(weekly()))),
        crashing,
        3,
    );
    let report = svc.run_due_periods_at(now).await;
    assert_eq!(report.settled_periods(), vec![6]);
    assert!(matches!(report.periods.last(), Some(PeriodOutcome::Failed { period: 7, .. })));
    assert_eq!(store.snapshots_for_period(7).await.unwrap().len(), 2);
    assert_eq!(store.get_checkpoint(JOB).await.unwrap().unwrap().last_period, 6);

    // Restart: period 7 is re-attempted and its rows are left as they were
    let restarted = service(leaderboard, Arc::new(MockChain::new()), store.clone());
    let report = restarted.run_due_periods_at(now).await;
    assert_eq!(
        report.periods[0],
        PeriodOutcome::Settled { period: 7, recorded: 0, already_present: 2 }
    );
    assert_eq!(report.settled_periods(), vec![7, 8]);

    assert_eq!(all_snapshots(&store, 6..=9).await, all_snapshots(&reference, 6..=9).await);
    assert_eq!(store.get_checkpoint(JOB).await.unwrap().unwrap().last_period, 8);
}

#[tokio::test]
async fn test_duration_change_mid_range() {
    // Weekly until period 4 starts, then daily
    let history = vec![
        PeriodConfig { effective_start: 0, duration_secs: WEEK, period_offset: 0 },
        PeriodConfig { effective_start: WEEK * 4, duration_secs: 86_400, period_offset: 4 },
    ];
    let store = Arc::new(MemoryStore::new());
    store.advance_checkpoint(JOB, 2, 0).await.unwrap();
    let leaderboard = Arc::new(MockLeaderboard::new());
    for period in 3..=5 {
        leaderboard.set_standings(period, &[("alice", 1)]);
    }

    let svc = service_with(
        collaborators(leaderboard, Arc::new(MockChain::new()), Arc::new(StaticPeriodConfig::new(history))),
        Stores::memory(store.clone()),
        3,
    );
    let report = svc.run_due_periods_at(WEEK * 4 + 86_400 * 2 + 10).await;
    assert_eq!(report.current_period, Some(6));
    assert_eq!(report.settled_periods(), vec![3, 4, 5]);

    let p3 = store.get_snapshot(3, "alice").await.unwrap().unwrap();
    assert_eq!((p3.period_start, p3.period_end, p3.period_duration_secs), (WEEK * 3, WEEK * 4, WEEK));
    let p5 = store.get_snapshot(5, "alice").await.unwrap().unwrap();
    assert_eq!(p5.period_start, WEEK * 4 + 86_400);
    assert_eq!(p5.period_duration_secs, 86_400);
}

#[tokio::test]
async fn test_missing_configuration_retries_next_tick() {
    let history = Arc::new(EditableHistory::default());
    let store = Arc::new(MemoryStore::new());
    let svc = service_with(
        collaborators(Arc::new(MockLeaderboard::new()), Arc::new(MockChain::new()), history.clone()),
        Stores::memory(store.clone()),
        3,
    );

    let report = svc.tick_at(WEEK * 3).await;
    assert_eq!(report.periods.error, Some(SettlementError::ConfigurationMissing));
    assert!(store.get_checkpoint(JOB).await.unwrap().is_none());

    history.0.write().extend(weekly());
    let report = svc.tick_at(WEEK * 3).await;
    assert_eq!(report.periods.settled_periods(), vec![2]);
}

// =============================================================================
// CLAIMS
// =============================================================================

async fn settled_claims() -> (Arc<MemoryStore>, Arc<MockChain>, SettlementService) {
    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(MockChain::new());
    let leaderboard = Arc::new(MockLeaderboard::new());
    leaderboard.set_standings(1, &[("alice", 50), ("bob", 20)]);
    chain.set_current_period(2);
    chain.fund_pool(1);
    chain.set_reward(1, Amount::new(1_000));
    chain.set_reward(2, Amount::new(400));

    let svc = service(leaderboard, chain.clone(), store.clone());
    assert_eq!(svc.run_due_periods_at(WEEK * 2 + 1).await.settled_periods(), vec![1]);
    (store, chain, svc)
}

#[tokio::test]
async fn test_claim_authorization_round_trip() {
    let (_store, chain, svc) = settled_claims().await;
    chain.set_nonce("addr-alice", 1, 3);

    let claimable = svc.get_claimable("alice").await.unwrap();
    assert_eq!(claimable.len(), 1);
    assert_eq!((claimable[0].period, claimable[0].rank), (1, 1));
    assert_eq!(claimable[0].entitlement, Amount::new(1_000));

    let auth = svc.request_claim_authorization(1, "alice").await.unwrap();
    assert_eq!(auth.message.nonce, 3);
    assert_eq!(auth.message.amount, Amount::new(1_000));
    assert_eq!(auth.message.domain, "prizecraft-claim-v1");
    assert!(verify_claim_authorization(&auth, &svc.signer_public_key()));

    // A different signer key doesn't verify
    let other = SigningKeypair::generate();
    assert!(!verify_claim_authorization(&auth, &other.public_key_bytes()));
}

#[tokio::test]
async fn test_no_authorization_after_mark_claimed() {
    let (store, _chain, svc) = settled_claims().await;
    let svc = Arc::new(svc);

    svc.confirm_claim(1, "bob", "tx-redeem").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move { svc.request_claim_authorization(1, "bob").await }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(SettlementError::AlreadyClaimed { .. })));
    }

    let row = store.get_snapshot(1, "bob").await.unwrap().unwrap();
    assert_eq!(row.claim_tx_ref.as_deref(), Some("tx-redeem"));
    assert!(svc.get_claimable("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claim_failures_name_the_reason() {
    let (_store, chain, svc) = settled_claims().await;

    assert!(matches!(
        svc.request_claim_authorization(1, "nobody").await,
        Err(SettlementError::NoSnapshot { .. })
    ));

    chain.redeem(1, "addr-alice");
    assert!(matches!(
        svc.request_claim_authorization(1, "alice").await,
        Err(SettlementError::AlreadyClaimed { .. })
    ));
    // Reconciled locally: no longer listed
    assert!(svc.get_claimable("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unfunded_pool() {
    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(MockChain::new());
    let leaderboard = Arc::new(MockLeaderboard::new());
    leaderboard.set_standings(1, &[("alice", 50)]);
    chain.set_current_period(2);
    chain.set_reward(1, Amount::new(1_000));

    let svc = service(leaderboard, chain.clone(), store);
    svc.run_due_periods_at(WEEK * 2 + 1).await;
    assert_eq!(
        svc.request_claim_authorization(1, "alice").await.unwrap_err(),
        SettlementError::PoolNotFunded(1)
    );

    chain.fund_pool(1);
    assert!(svc.request_claim_authorization(1, "alice").await.is_ok());
}
