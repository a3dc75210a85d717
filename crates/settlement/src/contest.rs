//! Contest creation and cancellation

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use prizecraft_core::{Amount, Contest, ContestDuration, ContestStatus, CoreError, ParticipantId, Timestamp};

use crate::{ContestStore, Result, SettlementError, SocialClient, WalletService};

/// Parameters of a new contest
#[derive(Debug, Clone)]
pub struct CreateContest {
    pub creator_id: ParticipantId,
    pub post_ref: String,
    pub unit_amount: Amount,
    pub denomination: String,
    pub winner_count: u32,
    pub duration: ContestDuration,
}

/// Entry point for user-initiated contest operations
pub struct ContestRegistry {
    social: Arc<dyn SocialClient>,
    wallet: Arc<dyn WalletService>,
    contests: Arc<dyn ContestStore>,
}

impl ContestRegistry {
    pub fn new(
        social: Arc<dyn SocialClient>,
        wallet: Arc<dyn WalletService>,
        contests: Arc<dyn ContestStore>,
    ) -> Self {
        Self { social, wallet, contests }
    }

    /// Create a contest, reserving `unit_amount × winner_count` against the
    /// creator's balance.
    ///
    /// The reservation is bookkeeping only: the creator's available balance
    /// is their wallet balance minus what their other active contests in
    /// the same denomination already reserve. The store checks and inserts
    /// in one step, so concurrent creates can't over-reserve. No funds move
    /// until payout.
    pub async fn create(&self, request: CreateContest, now: Timestamp) -> Result<Contest> {
        let mut contest = Contest::new(
            Uuid::new_v4().to_string(),
            request.creator_id,
            request.post_ref,
            request.unit_amount,
            request.denomination,
            request.winner_count,
            now,
            request.duration,
        )?;

        if self.social.post_author(&contest.post_ref).await?.is_none() {
            return Err(SettlementError::ContestPostNotFound(contest.post_ref));
        }

        let wallet = self.wallet.get_or_create_wallet(&contest.creator_id).await?;
        let balance = self.wallet.balance(&wallet.wallet_id, &contest.denomination).await?;
        self.contests.reserve_contest(contest.clone(), balance).await?;
        info!(
            contest = %contest.id,
            creator = %contest.creator_id,
            reserved = %contest.reserved_amount,
            denomination = %contest.denomination,
            winners = contest.winner_count,
            end_time = contest.end_time(),
            "Contest created"
        );

        let text = format!(
            "Contest live! {} winners get {} {} each. Reply before it closes in {}.",
            contest.winner_count, contest.unit_amount, contest.denomination, request.duration
        );
        match self.social.reply(&contest.post_ref, &text).await {
            Ok(post_ref) => {
                contest.confirmation_post_ref = Some(post_ref);
                if let Err(e) = self.contests.save_contest(&contest, ContestStatus::Active).await {
                    warn!(contest = %contest.id, error = %e, "Failed to store confirmation reference");
                }
            }
            Err(e) => warn!(contest = %contest.id, error = %e, "Failed to post contest confirmation"),
        }

        Ok(contest)
    }

    /// Cancel an active contest. Only its creator may cancel.
    pub async fn cancel(&self, contest_id: &str, requester: &str) -> Result<Contest> {
        let mut contest = self.get(contest_id).await?;
        if contest.creator_id != requester {
            return Err(SettlementError::NotAuthorized);
        }
        contest.cancel()?;
        match self.contests.save_contest(&contest, ContestStatus::Active).await {
            Ok(()) => {}
            // Settled by a tick since we read it
            Err(SettlementError::ContestChanged { actual, .. }) => {
                return Err(CoreError::InvalidTransition {
                    from: actual,
                    to: ContestStatus::Cancelled,
                }
                .into());
            }
            Err(e) => return Err(e),
        }
        info!(contest = %contest.id, "Contest cancelled, reservation released");
        Ok(contest)
    }

    pub async fn get(&self, contest_id: &str) -> Result<Contest> {
        self.contests
            .get_contest(contest_id)
            .await?
            .ok_or_else(|| SettlementError::ContestNotFound(contest_id.to_string()))
    }
}
