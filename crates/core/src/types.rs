use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ContestDuration, CoreError, Result};

/// Stable social identity of a participant (user id on the social platform)
pub type ParticipantId = String;

/// Monotonically increasing leaderboard period identifier
pub type PeriodId = u64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Token amount in minor units.
///
/// Serialized as a decimal string so amounts above 2^53 survive JSON
/// round trips through other tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(minor_units: u128) -> Self {
        Self(minor_units)
    }

    pub fn minor_units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiply by a winner count, failing on overflow
    pub fn checked_mul(&self, count: u32) -> Result<Amount> {
        self.0
            .checked_mul(count as u128)
            .map(Amount)
            .ok_or(CoreError::Overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAmount(s.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| CoreError::InvalidAmount(s.to_string()))
    }
}

impl TryFrom<String> for Amount {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

/// Lifecycle of a contest. Only Active -> Completed and Active -> Cancelled
/// are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    Active,
    Completed,
    Cancelled,
}

/// Payout state of a single winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
}

/// Result of attempting a single winner payout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed { address: String, tx_ref: String },
    Failed { address: Option<String>, error: String },
}

/// A contest winner (embedded in its contest)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub participant_id: ParticipantId,
    /// Reference of the comment that made this participant eligible
    pub comment_ref: String,
    /// Custodial payout address, resolved at distribution time
    pub payout_address: Option<String>,
    transfer_status: TransferStatus,
    pub tx_ref: Option<String>,
    pub error: Option<String>,
}

impl Winner {
    pub fn pending(participant_id: impl Into<ParticipantId>, comment_ref: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            comment_ref: comment_ref.into(),
            payout_address: None,
            transfer_status: TransferStatus::Pending,
            tx_ref: None,
            error: None,
        }
    }

    pub fn transfer_status(&self) -> TransferStatus {
        self.transfer_status
    }

    pub fn is_pending(&self) -> bool {
        self.transfer_status == TransferStatus::Pending
    }

    /// Apply a payout outcome. Pending is the only state that accepts one.
    fn settle(&mut self, outcome: TransferOutcome) -> Result<()> {
        if !self.is_pending() {
            return Err(CoreError::WinnerAlreadySettled(self.participant_id.clone()));
        }
        match outcome {
            TransferOutcome::Completed { address, tx_ref } => {
                self.payout_address = Some(address);
                self.tx_ref = Some(tx_ref);
                self.transfer_status = TransferStatus::Completed;
            }
            TransferOutcome::Failed { address, error } => {
                self.payout_address = address;
                self.error = Some(error);
                self.transfer_status = TransferStatus::Failed;
            }
        }
        Ok(())
    }
}

/// A time-boxed, social-post-anchored prize event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub creator_id: ParticipantId,
    /// Social post the contest is attached to
    pub post_ref: String,
    pub unit_amount: Amount,
    pub denomination: String,
    pub winner_count: u32,
    pub reserved_amount: Amount,
    pub created_at: Timestamp,
    end_time: Timestamp,
    status: ContestStatus,
    winners: Vec<Winner>,
    pub confirmation_post_ref: Option<String>,
    pub result_post_ref: Option<String>,
}

impl Contest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        creator_id: impl Into<ParticipantId>,
        post_ref: impl Into<String>,
        unit_amount: Amount,
        denomination: impl Into<String>,
        winner_count: u32,
        created_at: Timestamp,
        duration: ContestDuration,
    ) -> Result<Self> {
        if winner_count == 0 {
            return Err(CoreError::InvalidAmount("winner count must be positive".to_string()));
        }
        if unit_amount.is_zero() {
            return Err(CoreError::InvalidAmount("unit amount must be positive".to_string()));
        }
        let reserved_amount = unit_amount.checked_mul(winner_count)?;
        let end_time = created_at
            .checked_add(duration.as_secs())
            .ok_or(CoreError::Overflow)?;

        Ok(Self {
            id: id.into(),
            creator_id: creator_id.into(),
            post_ref: post_ref.into(),
            unit_amount,
            denomination: denomination.into(),
            winner_count,
            reserved_amount,
            created_at,
            end_time,
            status: ContestStatus::Active,
            winners: Vec::new(),
            confirmation_post_ref: None,
            result_post_ref: None,
        })
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    pub fn status(&self) -> ContestStatus {
        self.status
    }

    pub fn winners(&self) -> &[Winner] {
        &self.winners
    }

    /// Active and past its end time
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == ContestStatus::Active && self.end_time <= now
    }

    /// Completed but with payouts still outstanding (interrupted distribution)
    pub fn has_pending_winners(&self) -> bool {
        self.status == ContestStatus::Completed && self.winners.iter().any(Winner::is_pending)
    }

    /// Indices of winners still awaiting a payout
    pub fn pending_winner_indices(&self) -> Vec<usize> {
        self.winners
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_pending())
            .map(|(i, _)| i)
            .collect()
    }

    /// Record the selected winners and close the contest.
    ///
    /// An empty list completes the contest with zero winners; the reserved
    /// amount is released back to the creator without any transfer.
    pub fn complete(&mut self, winners: Vec<Winner>) -> Result<()> {
        self.transition(ContestStatus::Completed)?;
        self.winners = winners;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.transition(ContestStatus::Cancelled)
    }

    /// Single update path for a winner's payout state
    pub fn settle_winner(&mut self, index: usize, outcome: TransferOutcome) -> Result<()> {
        let winner = self
            .winners
            .get_mut(index)
            .ok_or(CoreError::WinnerNotFound(index))?;
        winner.settle(outcome)
    }

    /// Amount actually paid out to completed winners
    pub fn paid_amount(&self) -> Amount {
        let completed = self
            .winners
            .iter()
            .filter(|w| w.transfer_status() == TransferStatus::Completed)
            .count() as u32;
        self.unit_amount.checked_mul(completed).unwrap_or(self.reserved_amount)
    }

    fn transition(&mut self, to: ContestStatus) -> Result<()> {
        if self.status != ContestStatus::Active || to == ContestStatus::Active {
            return Err(CoreError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }
}

/// Kind of engagement on a social post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Reply,
    Retweet,
    Quote,
}

/// An engagement fetched from the social client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub participant_id: ParticipantId,
    pub comment_ref: String,
    pub text: String,
    pub kind: EngagementKind,
}

/// A leaderboard row as exposed by the point-accrual bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub participant_id: ParticipantId,
    /// Cumulative score at the time of reading
    pub score: u64,
}

/// What a snapshot row is owed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "lowercase")]
pub enum Entitlement {
    /// Amount fixed when the snapshot was taken
    Fixed(Amount),
    /// Resolved from the settlement contract's reward table at claim time
    Deferred,
}

/// Rank and entitlement of one participant in one settled period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub period: PeriodId,
    /// Period geometry as computed at snapshot time
    pub period_duration_secs: u64,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub participant_id: ParticipantId,
    /// 1-based, gapless
    pub rank: u32,
    pub score: u64,
    pub entitlement: Entitlement,
    pub denomination: String,
    pub claimed: bool,
    pub claimed_at: Option<Timestamp>,
    pub claim_tx_ref: Option<String>,
}

/// Last period fully snapshotted by a catch-up job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job: String,
    pub last_period: PeriodId,
    pub updated_at: Timestamp,
}
