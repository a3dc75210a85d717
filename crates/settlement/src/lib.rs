//! PrizeCraft Settlement
//!
//! The settlement engine behind the prize bot. Both reward tracks share one
//! shape: capture a point-in-time snapshot of a changing population, rank or
//! select it deterministically, then disburse value against that snapshot
//! exactly once.
//!
//! ## Contest track
//!
//! 1. **Create**: a creator reserves `unit × winners` against their custodial
//!    balance; the contest is anchored to a social post.
//! 2. **Select**: once the end time passes, the scheduler fetches replies,
//!    drops retweets, excludes the bot / creator / post author, dedups by
//!    identity and samples winners uniformly.
//! 3. **Distribute**: each pending winner is paid from the creator's wallet.
//!    Failures are recorded per winner and never abort the batch.
//!
//! ## Leaderboard track
//!
//! 1. **Catch up**: every tick settles closed periods from `checkpoint + 1`
//!    up to (not including) the current period, writing one snapshot row per
//!    ranked participant via idempotent insert, then advancing the checkpoint.
//! 2. **Authorize**: on request, the entitlement is checked against the
//!    snapshot and the on-chain pool, and a nonce-bound signed claim is issued.
//! 3. **Confirm**: once redeemed on-chain the snapshot is flagged claimed.

mod accountant;
mod claim;
mod contest;
mod distribution;
pub mod mock;
mod scheduler;
mod selection;
mod service;
mod store;
mod traits;

pub use accountant::{PeriodAccountant, DEFAULT_CACHE_TTL};
pub use claim::{ClaimAuthorizer, ClaimConfig, ClaimableReward};
pub use contest::{ContestRegistry, CreateContest};
pub use distribution::{DistributionReport, FundDistributor, WinnerReport};
pub use scheduler::{
    rank_entries, ContestOutcome, ContestTickReport, PeriodOutcome, PeriodTickReport,
    RankedEntry, SchedulerConfig, SettlementScheduler, TickReport,
};
pub use selection::{filter_eligible, select_winners, Candidate, Exclusions, ParticipantSelector};
pub use service::{Collaborators, ServiceConfig, SettlementService, Stores};
pub use store::{CheckpointStore, ContestStore, MemoryStore, RecordOutcome, SnapshotStore};
pub use traits::{
    Leaderboard, PeriodConfigSource, SettlementContract, SocialClient, StaticPeriodConfig,
    WalletInfo, WalletService,
};

use std::fmt;

use prizecraft_core::{Amount, ContestStatus, CoreError, ParticipantId, PeriodId};
use thiserror::Error;

/// External collaborator named in `ExternalServiceUnavailable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Social,
    Wallet,
    Chain,
    Leaderboard,
    PeriodConfig,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Social => "social client",
            Service::Wallet => "wallet service",
            Service::Chain => "settlement contract",
            Service::Leaderboard => "leaderboard",
            Service::PeriodConfig => "period configuration",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Period configuration missing")]
    ConfigurationMissing,

    #[error("No snapshot for {participant} in period {period}")]
    NoSnapshot { period: PeriodId, participant: ParticipantId },

    #[error("Period {period} already claimed by {participant}")]
    AlreadyClaimed { period: PeriodId, participant: ParticipantId },

    #[error("Reward pool not funded for period {0}")]
    PoolNotFunded(PeriodId),

    #[error("Nothing to claim for {participant} in period {period}")]
    NothingToClaim { period: PeriodId, participant: ParticipantId },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("{service} unavailable: {reason}")]
    ExternalServiceUnavailable { service: Service, reason: String },

    #[error("Insufficient balance: need {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Contest not found: {0}")]
    ContestNotFound(String),

    #[error("Contest post not found: {0}")]
    ContestPostNotFound(String),

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Invalid contest: {0}")]
    InvalidContest(String),

    /// A conditional contest write found the stored status moved on
    #[error("Contest {id} is {actual:?}, expected {expected:?}")]
    ContestChanged { id: String, expected: ContestStatus, actual: ContestStatus },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Core(CoreError),
}

impl SettlementError {
    pub fn unavailable(service: Service, reason: impl Into<String>) -> Self {
        Self::ExternalServiceUnavailable { service, reason: reason.into() }
    }

    /// Whether the failed unit should simply be retried on the next tick
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceUnavailable { .. }
                | Self::Storage(_)
                | Self::TransferFailed(_)
                | Self::ConfigurationMissing
        )
    }
}

impl From<CoreError> for SettlementError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::ConfigurationMissing => SettlementError::ConfigurationMissing,
            other => SettlementError::Core(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;

/// Current unix timestamp in seconds
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
