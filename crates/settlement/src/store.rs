//! Durable state: period snapshots, checkpoints and contests
//!
//! The correctness-critical writes are single operations on the store:
//! insert-if-absent, the claimed flag flip, the balance-checked contest
//! insert and the status-conditional contest save. Callers never
//! read-then-write.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use prizecraft_core::{
    Amount, Checkpoint, Contest, ContestStatus, ParticipantId, PeriodId, PeriodSnapshot, Timestamp,
};

use crate::{Result, SettlementError};

/// Result of an idempotent snapshot insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    /// A row for (period, participant) already existed; left untouched
    AlreadyPresent,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert unless a row for (period, participant) exists. A collision is
    /// success: the row came from an earlier attempt.
    async fn record_if_absent(&self, snapshot: PeriodSnapshot) -> Result<RecordOutcome>;

    async fn get_snapshot(&self, period: PeriodId, participant: &str) -> Result<Option<PeriodSnapshot>>;

    /// Flip the claimed flag. Fails with `AlreadyClaimed` if already set.
    async fn mark_claimed(
        &self,
        period: PeriodId,
        participant: &str,
        tx_ref: Option<String>,
        at: Timestamp,
    ) -> Result<PeriodSnapshot>;

    async fn snapshots_for_participant(&self, participant: &str) -> Result<Vec<PeriodSnapshot>>;

    async fn snapshots_for_period(&self, period: PeriodId) -> Result<Vec<PeriodSnapshot>>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, job: &str) -> Result<Option<Checkpoint>>;

    /// Move the checkpoint forward. Never lowers it.
    async fn advance_checkpoint(&self, job: &str, period: PeriodId, at: Timestamp) -> Result<Checkpoint>;
}

#[async_trait]
pub trait ContestStore: Send + Sync {
    /// Insert a new contest; fails if the id is taken
    async fn insert_contest(&self, contest: Contest) -> Result<()>;

    /// Insert a new contest if `balance` covers its reservation on top of
    /// the creator's other active reservations in the same denomination.
    /// Fails with `InsufficientBalance` otherwise.
    async fn reserve_contest(&self, contest: Contest, balance: Amount) -> Result<()>;

    async fn get_contest(&self, id: &str) -> Result<Option<Contest>>;

    /// Overwrite an existing contest if its stored status is still
    /// `expected`, else fail with `ContestChanged`. Contests are never
    /// deleted.
    async fn save_contest(&self, contest: &Contest, expected: ContestStatus) -> Result<()>;

    /// Active contests whose end time has passed, oldest end time first
    async fn due_contests(&self, now: Timestamp) -> Result<Vec<Contest>>;

    /// Completed contests that still have pending winners
    async fn contests_with_pending_winners(&self) -> Result<Vec<Contest>>;
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    snapshots: BTreeMap<(PeriodId, ParticipantId), PeriodSnapshot>,
    checkpoints: HashMap<String, Checkpoint>,
    contests: BTreeMap<String, Contest>,
}

impl StoreState {
    fn insert_contest(&mut self, contest: Contest) -> Result<()> {
        if self.contests.contains_key(&contest.id) {
            return Err(SettlementError::InvalidContest(format!(
                "duplicate contest id {}",
                contest.id
            )));
        }
        self.contests.insert(contest.id.clone(), contest);
        Ok(())
    }

    /// Sum reserved by `creator`'s active contests in `denomination`
    fn reserved_by(&self, creator: &str, denomination: &str) -> u128 {
        self.contests
            .values()
            .filter(|c| {
                c.status() == ContestStatus::Active
                    && c.creator_id == creator
                    && c.denomination == denomination
            })
            .map(|c| c.reserved_amount.minor_units())
            .fold(0u128, u128::saturating_add)
    }
}

// === Persistence types (JSON file) ===

#[derive(Serialize, Deserialize, Default)]
struct StoreStateFile {
    #[serde(default)]
    snapshots: Vec<PeriodSnapshot>,
    #[serde(default)]
    checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    contests: Vec<Contest>,
}

impl From<&StoreState> for StoreStateFile {
    fn from(state: &StoreState) -> Self {
        Self {
            snapshots: state.snapshots.values().cloned().collect(),
            checkpoints: state.checkpoints.values().cloned().collect(),
            contests: state.contests.values().cloned().collect(),
        }
    }
}

impl From<StoreStateFile> for StoreState {
    fn from(file: StoreStateFile) -> Self {
        let mut state = StoreState::default();
        for snapshot in file.snapshots {
            let key = (snapshot.period, snapshot.participant_id.clone());
            state.snapshots.entry(key).or_insert(snapshot);
        }
        for checkpoint in file.checkpoints {
            state.checkpoints.insert(checkpoint.job.clone(), checkpoint);
        }
        for contest in file.contests {
            state.contests.insert(contest.id.clone(), contest);
        }
        state
    }
}

/// In-memory store with optional JSON file persistence.
///
/// Every mutation happens under one write lock and, when a path is set, is
/// written to disk (tmp + rename) before the lock is released. A failed write
/// rolls the in-memory change back, so memory and disk never disagree.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store (tests, dry runs)
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            path: None,
        }
    }

    /// File-backed store. Loads existing state if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| SettlementError::Storage(format!("read {}: {}", path.display(), e)))?;
            let file: StoreStateFile = serde_json::from_str(&contents)
                .map_err(|e| SettlementError::Storage(format!("parse {}: {}", path.display(), e)))?;
            let state = StoreState::from(file);
            info!(
                "Loaded store state: {} snapshots, {} checkpoints, {} contests from {}",
                state.snapshots.len(),
                state.checkpoints.len(),
                state.contests.len(),
                path.display(),
            );
            state
        } else {
            StoreState::default()
        };

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `f` atomically, persisting the result if file-backed
    fn commit<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write();
        let Some(path) = self.path.as_deref() else {
            return f(&mut state);
        };

        let before = state.clone();
        let value = f(&mut state)?;
        if let Err(e) = write_state(path, &state) {
            warn!("Rolling back store mutation: {}", e);
            *state = before;
            return Err(e);
        }
        Ok(value)
    }
}

fn write_state(path: &Path, state: &StoreState) -> Result<()> {
    let json = serde_json::to_string_pretty(&StoreStateFile::from(state))
        .map_err(|e| SettlementError::Storage(format!("serialize: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SettlementError::Storage(format!("create {}: {}", parent.display(), e)))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json)
        .map_err(|e| SettlementError::Storage(format!("write {}: {}", tmp_path.display(), e)))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| SettlementError::Storage(format!("rename {}: {}", path.display(), e)))?;

    debug!("Saved store state to {}", path.display());
    Ok(())
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn record_if_absent(&self, snapshot: PeriodSnapshot) -> Result<RecordOutcome> {
        let key = (snapshot.period, snapshot.participant_id.clone());
        {
            // Fast path: nothing to write, no file I/O
            if self.state.read().snapshots.contains_key(&key) {
                return Ok(RecordOutcome::AlreadyPresent);
            }
        }
        self.commit(|state| {
            if state.snapshots.contains_key(&key) {
                return Ok(RecordOutcome::AlreadyPresent);
            }
            state.snapshots.insert(key, snapshot);
            Ok(RecordOutcome::Inserted)
        })
    }

    async fn get_snapshot(&self, period: PeriodId, participant: &str) -> Result<Option<PeriodSnapshot>> {
        Ok(self
            .state
            .read()
            .snapshots
            .get(&(period, participant.to_string()))
            .cloned())
    }

    async fn mark_claimed(
        &self,
        period: PeriodId,
        participant: &str,
        tx_ref: Option<String>,
        at: Timestamp,
    ) -> Result<PeriodSnapshot> {
        self.commit(|state| {
            let snapshot = state
                .snapshots
                .get_mut(&(period, participant.to_string()))
                .ok_or_else(|| SettlementError::NoSnapshot {
                    period,
                    participant: participant.to_string(),
                })?;
            if snapshot.claimed {
                return Err(SettlementError::AlreadyClaimed {
                    period,
                    participant: participant.to_string(),
                });
            }
            snapshot.claimed = true;
            snapshot.claimed_at = Some(at);
            snapshot.claim_tx_ref = tx_ref;
            Ok(snapshot.clone())
        })
    }

    async fn snapshots_for_participant(&self, participant: &str) -> Result<Vec<PeriodSnapshot>> {
        Ok(self
            .state
            .read()
            .snapshots
            .values()
            .filter(|s| s.participant_id == participant)
            .cloned()
            .collect())
    }

    async fn snapshots_for_period(&self, period: PeriodId) -> Result<Vec<PeriodSnapshot>> {
        let mut rows: Vec<PeriodSnapshot> = self
            .state
            .read()
            .snapshots
            .range((period, String::new())..)
            .take_while(|((p, _), _)| *p == period)
            .map(|(_, s)| s.clone())
            .collect();
        rows.sort_by_key(|s| s.rank);
        Ok(rows)
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn get_checkpoint(&self, job: &str) -> Result<Option<Checkpoint>> {
        Ok(self.state.read().checkpoints.get(job).cloned())
    }

    async fn advance_checkpoint(&self, job: &str, period: PeriodId, at: Timestamp) -> Result<Checkpoint> {
        self.commit(|state| {
            let checkpoint = state
                .checkpoints
                .entry(job.to_string())
                .or_insert_with(|| Checkpoint {
                    job: job.to_string(),
                    last_period: period,
                    updated_at: at,
                });
            if period > checkpoint.last_period {
                checkpoint.last_period = period;
                checkpoint.updated_at = at;
            }
            Ok(checkpoint.clone())
        })
    }
}

#[async_trait]
impl ContestStore for MemoryStore {
    async fn insert_contest(&self, contest: Contest) -> Result<()> {
        self.commit(|state| state.insert_contest(contest))
    }

    async fn reserve_contest(&self, contest: Contest, balance: Amount) -> Result<()> {
        self.commit(|state| {
            let reserved = state.reserved_by(&contest.creator_id, &contest.denomination);
            let available = Amount::new(balance.minor_units().saturating_sub(reserved));
            if available < contest.reserved_amount {
                return Err(SettlementError::InsufficientBalance {
                    required: contest.reserved_amount,
                    available,
                });
            }
            state.insert_contest(contest)
        })
    }

    async fn get_contest(&self, id: &str) -> Result<Option<Contest>> {
        Ok(self.state.read().contests.get(id).cloned())
    }

    async fn save_contest(&self, contest: &Contest, expected: ContestStatus) -> Result<()> {
        self.commit(|state| {
            let slot = state
                .contests
                .get_mut(&contest.id)
                .ok_or_else(|| SettlementError::ContestNotFound(contest.id.clone()))?;
            if slot.status() != expected {
                return Err(SettlementError::ContestChanged {
                    id: contest.id.clone(),
                    expected,
                    actual: slot.status(),
                });
            }
            *slot = contest.clone();
            Ok(())
        })
    }

    async fn due_contests(&self, now: Timestamp) -> Result<Vec<Contest>> {
        let mut due: Vec<Contest> = self
            .state
            .read()
            .contests
            .values()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.end_time().cmp(&b.end_time()).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn contests_with_pending_winners(&self) -> Result<Vec<Contest>> {
        Ok(self
            .state
            .read()
            .contests
            .values()
            .filter(|c| c.has_pending_winners())
            .cloned()
            .collect())
    }
}
