//! Settlement scheduler
//!
//! Drives both reward tracks from a periodic tick. Within a tick every
//! contest and every period is handled sequentially, and a failure in one
//! item is logged and recorded in the tick report without stopping the
//! rest of the batch.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use prizecraft_core::{
    Contest, ContestStatus, Entitlement, LeaderboardEntry, ParticipantId, PeriodId, PeriodSnapshot,
    Timestamp, Winner,
};

use crate::{
    now_secs, select_winners, CheckpointStore, Collaborators, ContestStore, DistributionReport,
    FundDistributor, Leaderboard, ParticipantSelector, PeriodAccountant, RecordOutcome, Result,
    SettlementError, SnapshotStore, SocialClient, Stores,
};

/// Scheduler parameters
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The bot's own identity, never eligible to win
    pub bot_identity: ParticipantId,
    /// Checkpoint key of the leaderboard job
    pub job_name: String,
    /// Ranked entries snapshotted per period
    pub top_n: usize,
    pub max_periods_per_tick: u64,
    /// Denomination stamped on leaderboard snapshots
    pub reward_denomination: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            bot_identity: String::new(),
            job_name: "leaderboard-rewards".to_string(),
            top_n: 10,
            max_periods_per_tick: 64,
            reward_denomination: "USDC".to_string(),
        }
    }
}

/// A leaderboard entry with its position in the period ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub participant_id: ParticipantId,
    pub score: u64,
    /// 1-based, gapless
    pub rank: u32,
}

/// Rank leaderboard entries: score descending, then identity ascending.
///
/// The order is total, so equal scores rank the same way on every run.
/// Zero scores and empty identities never rank; a repeated identity keeps
/// its best entry.
pub fn rank_entries(mut entries: Vec<LeaderboardEntry>, top_n: usize) -> Vec<RankedEntry> {
    entries.retain(|e| e.score > 0 && !e.participant_id.is_empty());
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    });

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.participant_id.clone()))
        .take(top_n)
        .zip(1u32..)
        .map(|(e, rank)| RankedEntry {
            participant_id: e.participant_id,
            score: e.score,
            rank,
        })
        .collect()
}

/// What happened to one contest during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContestOutcome {
    /// Nobody eligible: completed with zero winners, no transfer issued
    NoParticipants,
    /// Winners selected and paid (per-winner results in the report)
    Distributed(DistributionReport),
    /// Payouts of an interrupted distribution finished
    Resumed(DistributionReport),
    /// Winners are recorded but paying them couldn't start; retried next tick
    DistributionDeferred { winners: usize, error: SettlementError },
    /// Selection failed; the contest stays active and is retried next tick
    Deferred(SettlementError),
    /// The contest left `Active` while it was being settled (a creator
    /// cancel won the race); left as stored, nothing paid
    Superseded(ContestStatus),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContestTickReport {
    /// Another contest run was in progress; nothing was done
    pub busy: bool,
    /// Failure to list contests at all
    pub error: Option<SettlementError>,
    pub contests: Vec<(String, ContestOutcome)>,
}

/// What happened to one period during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodOutcome {
    Settled {
        period: PeriodId,
        recorded: usize,
        already_present: usize,
    },
    Failed {
        period: PeriodId,
        error: SettlementError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodTickReport {
    /// Another period run was in progress; nothing was done
    pub busy: bool,
    pub current_period: Option<PeriodId>,
    /// Failure that stopped the track before any period was attempted
    pub error: Option<SettlementError>,
    pub periods: Vec<PeriodOutcome>,
}

impl PeriodTickReport {
    pub fn settled_periods(&self) -> Vec<PeriodId> {
        self.periods
            .iter()
            .filter_map(|p| match p {
                PeriodOutcome::Settled { period, .. } => Some(*period),
                PeriodOutcome::Failed { .. } => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub contests: ContestTickReport,
    pub periods: PeriodTickReport,
}

pub struct SettlementScheduler {
    contests: Arc<dyn ContestStore>,
    snapshots: Arc<dyn SnapshotStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    social: Arc<dyn SocialClient>,
    leaderboard: Arc<dyn Leaderboard>,
    selector: ParticipantSelector,
    distributor: FundDistributor,
    accountant: Arc<PeriodAccountant>,
    config: SchedulerConfig,
    rng: parking_lot::Mutex<StdRng>,
    contest_guard: tokio::sync::Mutex<()>,
    period_guard: tokio::sync::Mutex<()>,
}

impl SettlementScheduler {
    pub fn new(
        stores: &Stores,
        collaborators: &Collaborators,
        accountant: Arc<PeriodAccountant>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            contests: stores.contests.clone(),
            snapshots: stores.snapshots.clone(),
            checkpoints: stores.checkpoints.clone(),
            social: collaborators.social.clone(),
            leaderboard: collaborators.leaderboard.clone(),
            selector: ParticipantSelector::new(collaborators.social.clone(), config.bot_identity.clone()),
            distributor: FundDistributor::new(collaborators.wallet.clone(), stores.contests.clone()),
            accountant,
            config,
            rng: parking_lot::Mutex::new(StdRng::from_entropy()),
            contest_guard: tokio::sync::Mutex::new(()),
            period_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Use a fixed seed for winner selection (reproducible runs)
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run both tracks once
    pub async fn tick(&self, now: Timestamp) -> TickReport {
        let contests = self.run_due_contests(now).await;
        let periods = self.run_due_periods(now).await;
        TickReport { contests, periods }
    }

    /// Tick every `interval` until `shutdown` flips to true
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("Settlement scheduler started, tick every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick(now_secs()).await;
                    info!(
                        contests = report.contests.contests.len(),
                        periods = report.periods.settled_periods().len(),
                        current_period = ?report.periods.current_period,
                        "Tick complete"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Settlement scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    // ========================================================================
    // Contest track
    // ========================================================================

    /// Resume interrupted distributions, then settle every due contest
    pub async fn run_due_contests(&self, now: Timestamp) -> ContestTickReport {
        let mut report = ContestTickReport::default();
        let Ok(_guard) = self.contest_guard.try_lock() else {
            debug!("Contest run already in progress, skipping");
            report.busy = true;
            return report;
        };

        match self.contests.contests_with_pending_winners().await {
            Ok(interrupted) => {
                for contest in interrupted {
                    let id = contest.id.clone();
                    let outcome = self.resume_contest(contest).await;
                    report.contests.push((id, outcome));
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to list interrupted distributions");
                report.error = Some(e);
            }
        }

        let due = match self.contests.due_contests(now).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to list due contests");
                report.error = Some(e);
                return report;
            }
        };
        if !due.is_empty() {
            info!(count = due.len(), "Settling due contests");
        }

        for contest in due {
            let id = contest.id.clone();
            let outcome = self.settle_contest(contest).await;
            report.contests.push((id, outcome));
        }
        report
    }

    async fn settle_contest(&self, mut contest: Contest) -> ContestOutcome {
        let eligible = match self.selector.eligible(&contest).await {
            Ok(eligible) => eligible,
            Err(e) => {
                warn!(contest = %contest.id, error = %e, "Selection deferred to next tick");
                return ContestOutcome::Deferred(e);
            }
        };

        if eligible.is_empty() {
            if let Err(e) = self.complete(&mut contest, Vec::new()).await {
                return Self::not_completed(&contest, e);
            }
            info!(contest = %contest.id, "No eligible participants, reservation released");
            self.announce(&mut contest, "Contest closed with no eligible participants. No prizes were sent.")
                .await;
            return ContestOutcome::NoParticipants;
        }

        let winners = {
            let mut rng = self.rng.lock();
            select_winners(eligible, contest.winner_count, &mut *rng)
        };
        let count = winners.len();
        let winners = winners.into_iter().map(|c| c.into_winner()).collect();
        if let Err(e) = self.complete(&mut contest, winners).await {
            return Self::not_completed(&contest, e);
        }
        info!(contest = %contest.id, winners = count, "Winners selected");

        match self.distributor.distribute(&mut contest).await {
            Ok(report) => {
                self.announce_results(&mut contest).await;
                ContestOutcome::Distributed(report)
            }
            Err(e) => {
                warn!(contest = %contest.id, error = %e, "Distribution deferred to next tick");
                ContestOutcome::DistributionDeferred { winners: count, error: e }
            }
        }
    }

    async fn resume_contest(&self, mut contest: Contest) -> ContestOutcome {
        let pending = contest.pending_winner_indices().len();
        info!(contest = %contest.id, pending, "Resuming interrupted distribution");
        match self.distributor.distribute(&mut contest).await {
            Ok(report) => {
                self.announce_results(&mut contest).await;
                ContestOutcome::Resumed(report)
            }
            Err(e) => {
                warn!(contest = %contest.id, error = %e, "Distribution deferred to next tick");
                ContestOutcome::DistributionDeferred { winners: pending, error: e }
            }
        }
    }

    /// Persist the winners and the completed status in one write, provided
    /// the stored contest is still active
    async fn complete(&self, contest: &mut Contest, winners: Vec<Winner>) -> Result<()> {
        let before = contest.clone();
        contest.complete(winners)?;
        if let Err(e) = self.contests.save_contest(contest, ContestStatus::Active).await {
            *contest = before;
            return Err(e);
        }
        Ok(())
    }

    fn not_completed(contest: &Contest, e: SettlementError) -> ContestOutcome {
        match e {
            SettlementError::ContestChanged { actual, .. } => {
                info!(contest = %contest.id, status = ?actual, "Contest changed during settlement, skipping");
                ContestOutcome::Superseded(actual)
            }
            e => {
                error!(contest = %contest.id, error = %e, "Failed to persist winners");
                ContestOutcome::Deferred(e)
            }
        }
    }

    async fn announce_results(&self, contest: &mut Contest) {
        let summary = DistributionReport::from_contest(contest).summary();
        self.announce(contest, &format!("Contest results! {}", summary)).await;
    }

    /// Best-effort result post, at most once per contest
    async fn announce(&self, contest: &mut Contest, text: &str) {
        if contest.result_post_ref.is_some() {
            return;
        }
        match self.social.reply(&contest.post_ref, text).await {
            Ok(post_ref) => {
                contest.result_post_ref = Some(post_ref);
                if let Err(e) = self.contests.save_contest(contest, ContestStatus::Completed).await {
                    warn!(contest = %contest.id, error = %e, "Failed to store result post reference");
                }
            }
            Err(e) => warn!(contest = %contest.id, error = %e, "Failed to announce results"),
        }
    }

    // ========================================================================
    // Period track
    // ========================================================================

    /// Snapshot every closed period after the checkpoint, oldest first.
    ///
    /// Stops at the first failing period without advancing past it, so the
    /// next tick starts there again. Re-snapshotting a period is harmless
    /// because rows are only ever inserted if absent.
    pub async fn run_due_periods(&self, now: Timestamp) -> PeriodTickReport {
        let mut report = PeriodTickReport::default();
        let Ok(_guard) = self.period_guard.try_lock() else {
            debug!("Period run already in progress, skipping");
            report.busy = true;
            return report;
        };

        let current = match self.accountant.period_id(now).await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "Period track skipped this tick");
                report.error = Some(e);
                return report;
            }
        };
        report.current_period = Some(current);

        let checkpoint = match self.checkpoints.get_checkpoint(&self.config.job_name).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                error!(error = %e, "Failed to read checkpoint");
                report.error = Some(e);
                return report;
            }
        };

        // First run only settles the most recently closed period
        let first = match checkpoint {
            Some(cp) => cp.last_period.saturating_add(1),
            None => match current.checked_sub(1) {
                Some(previous) => previous,
                None => return report,
            },
        };
        let last = current.min(first.saturating_add(self.config.max_periods_per_tick));

        for period in first..last {
            match self.settle_period(period, now).await {
                Ok(outcome) => report.periods.push(outcome),
                Err(e) => {
                    warn!(period, error = %e, "Period settlement failed, retrying next tick");
                    report.periods.push(PeriodOutcome::Failed { period, error: e });
                    break;
                }
            }
        }

        if last < current {
            info!(remaining = current - last, "Catch-up continues next tick");
        }
        report
    }

    async fn settle_period(&self, period: PeriodId, now: Timestamp) -> Result<PeriodOutcome> {
        let bounds = self.accountant.period_bounds(period).await?;
        let standings = self.leaderboard.standings(&bounds).await?;
        let ranked = rank_entries(standings, self.config.top_n);

        let mut recorded = 0;
        let mut already_present = 0;
        for entry in ranked {
            let snapshot = PeriodSnapshot {
                period,
                period_duration_secs: bounds.duration_secs,
                period_start: bounds.start,
                period_end: bounds.end,
                participant_id: entry.participant_id,
                rank: entry.rank,
                score: entry.score,
                entitlement: Entitlement::Deferred,
                denomination: self.config.reward_denomination.clone(),
                claimed: false,
                claimed_at: None,
                claim_tx_ref: None,
            };
            match self.snapshots.record_if_absent(snapshot).await? {
                RecordOutcome::Inserted => recorded += 1,
                RecordOutcome::AlreadyPresent => already_present += 1,
            }
        }

        self.checkpoints
            .advance_checkpoint(&self.config.job_name, period, now)
            .await?;
        info!(period, recorded, already_present, "Period settled");

        Ok(PeriodOutcome::Settled {
            period,
            recorded,
            already_present,
        })
    }
}
