//! Fund distribution
//!
//! Pays every pending winner of a completed contest from the creator's
//! wallet. One failed payout never stops the others: each winner ends up
//! with its own outcome. A failed write of an outcome does stop the batch.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use prizecraft_core::{Contest, ContestStatus, ParticipantId, TransferOutcome, TransferStatus};

use crate::{ContestStore, Result, WalletService};

/// Outcome for one winner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerReport {
    pub participant_id: ParticipantId,
    pub status: TransferStatus,
    pub tx_ref: Option<String>,
    pub error: Option<String>,
}

/// Per-winner outcome vector of a distribution run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    pub contest_id: String,
    pub winners: Vec<WinnerReport>,
}

impl DistributionReport {
    /// Report over every winner of `contest`, whichever run settled them
    pub fn from_contest(contest: &Contest) -> Self {
        Self {
            contest_id: contest.id.clone(),
            winners: contest
                .winners()
                .iter()
                .map(|w| WinnerReport {
                    participant_id: w.participant_id.clone(),
                    status: w.transfer_status(),
                    tx_ref: w.tx_ref.clone(),
                    error: w.error.clone(),
                })
                .collect(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.winners
            .iter()
            .filter(|w| w.status == TransferStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.winners
            .iter()
            .filter(|w| w.status == TransferStatus::Failed)
            .count()
    }

    /// Human-readable result line, annotated per winner
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Paid {} of {} winners",
            self.succeeded(),
            self.winners.len()
        );
        for (i, w) in self.winners.iter().enumerate() {
            out.push_str(if i == 0 { ": " } else { ", " });
            match (&w.status, &w.tx_ref, &w.error) {
                (TransferStatus::Completed, Some(tx), _) => {
                    let _ = write!(out, "@{} paid ({})", w.participant_id, tx);
                }
                (TransferStatus::Failed, _, Some(e)) => {
                    let _ = write!(out, "@{} failed ({})", w.participant_id, e);
                }
                _ => {
                    let _ = write!(out, "@{} pending", w.participant_id);
                }
            }
        }
        out
    }
}

pub struct FundDistributor {
    wallet: Arc<dyn WalletService>,
    contests: Arc<dyn ContestStore>,
}

impl FundDistributor {
    pub fn new(wallet: Arc<dyn WalletService>, contests: Arc<dyn ContestStore>) -> Self {
        Self { wallet, contests }
    }

    /// Pay every pending winner of `contest`.
    ///
    /// Each settled winner is persisted before the next transfer starts, so
    /// a crash mid-loop never re-pays a winner whose outcome was stored.
    /// Returns `Err` when the creator wallet is unreachable (nothing is
    /// attempted) or when a winner's outcome can't be persisted. The loop
    /// stops there: only that one payout is unrecorded, and the remaining
    /// winners stay pending for the next tick.
    pub async fn distribute(&self, contest: &mut Contest) -> Result<DistributionReport> {
        let mut report = DistributionReport {
            contest_id: contest.id.clone(),
            winners: Vec::new(),
        };

        let pending = contest.pending_winner_indices();
        if pending.is_empty() {
            debug!(contest = %contest.id, "No pending winners");
            return Ok(report);
        }

        let source = self.wallet.get_or_create_wallet(&contest.creator_id).await?;

        for index in pending {
            let participant = contest.winners()[index].participant_id.clone();
            let outcome = self.pay(contest, &source.wallet_id, &participant).await;

            match &outcome {
                TransferOutcome::Completed { tx_ref, .. } => {
                    info!(contest = %contest.id, winner = %participant, tx = %tx_ref, "Winner paid")
                }
                TransferOutcome::Failed { error, .. } => {
                    warn!(contest = %contest.id, winner = %participant, error = %error, "Winner payout failed")
                }
            }

            contest.settle_winner(index, outcome)?;
            let winner = &contest.winners()[index];
            report.winners.push(WinnerReport {
                participant_id: participant,
                status: winner.transfer_status(),
                tx_ref: winner.tx_ref.clone(),
                error: winner.error.clone(),
            });

            if let Err(e) = self.contests.save_contest(contest, ContestStatus::Completed).await {
                error!(
                    contest = %contest.id,
                    winner = %contest.winners()[index].participant_id,
                    error = %e,
                    "Failed to persist winner outcome, stopping distribution"
                );
                return Err(e);
            }
        }

        info!(
            contest = %contest.id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Distribution finished"
        );
        Ok(report)
    }

    async fn pay(&self, contest: &Contest, source_wallet: &str, participant: &str) -> TransferOutcome {
        let recipient = match self.wallet.get_or_create_wallet(participant).await {
            Ok(wallet) => wallet,
            Err(e) => {
                return TransferOutcome::Failed {
                    address: None,
                    error: e.to_string(),
                }
            }
        };

        match self
            .wallet
            .transfer(source_wallet, &recipient.address, contest.unit_amount, &contest.denomination)
            .await
        {
            Ok(tx_ref) => TransferOutcome::Completed {
                address: recipient.address,
                tx_ref,
            },
            Err(e) => TransferOutcome::Failed {
                address: Some(recipient.address),
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use prizecraft_core::{Amount, ContestDuration, Timestamp, Winner};

    use crate::mock::MockWallet;
    use crate::{MemoryStore, SettlementError};

    /// Contest store whose saves fail while `failing` is set
    struct FlakyContests {
        inner: Arc<MemoryStore>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ContestStore for FlakyContests {
        async fn insert_contest(&self, contest: Contest) -> Result<()> {
            self.inner.insert_contest(contest).await
        }

        async fn reserve_contest(&self, contest: Contest, balance: Amount) -> Result<()> {
            self.inner.reserve_contest(contest, balance).await
        }

        async fn get_contest(&self, id: &str) -> Result<Option<Contest>> {
            self.inner.get_contest(id).await
        }

        async fn save_contest(&self, contest: &Contest, expected: ContestStatus) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SettlementError::Storage("disk full".to_string()));
            }
            self.inner.save_contest(contest, expected).await
        }

        async fn due_contests(&self, now: Timestamp) -> Result<Vec<Contest>> {
            self.inner.due_contests(now).await
        }

        async fn contests_with_pending_winners(&self) -> Result<Vec<Contest>> {
            self.inner.contests_with_pending_winners().await
        }
    }

    async fn completed_contest(store: &MemoryStore, winners: &[&str]) -> Contest {
        let mut contest = Contest::new(
            "k1", "carol", "post-1", Amount::new(10), "USDC", winners.len() as u32, 0,
            ContestDuration::Hours(1),
        )
        .unwrap();
        store.insert_contest(contest.clone()).await.unwrap();
        contest
            .complete(winners.iter().map(|w| Winner::pending(*w, format!("r-{}", w))).collect())
            .unwrap();
        store.save_contest(&contest, ContestStatus::Active).await.unwrap();
        contest
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let store = Arc::new(MemoryStore::new());
        let wallet = Arc::new(MockWallet::new());
        wallet.set_balance("carol", "USDC", Amount::new(30));
        wallet.fail_transfers_to("bob");

        let mut contest = completed_contest(&store, &["alice", "bob", "dave"]).await;
        let distributor = FundDistributor::new(wallet.clone(), store.clone());
        let report = distributor.distribute(&mut contest).await.unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.winners[1].status, TransferStatus::Failed);
        assert!(report.winners[1].error.is_some());
        assert_ne!(report.winners[0].tx_ref, report.winners[2].tx_ref);

        let stored = store.get_contest("k1").await.unwrap().unwrap();
        assert!(!stored.has_pending_winners());
        assert_eq!(stored.winners()[0].payout_address.as_deref(), Some("addr-alice"));
        assert_eq!(wallet.transfers().len(), 2);
        assert_eq!(wallet.balance_of("carol", "USDC"), Amount::new(10));

        let summary = report.summary();
        assert!(summary.starts_with("Paid 2 of 3 winners"));
        assert!(summary.contains("@bob failed"));
    }

    #[tokio::test]
    async fn test_wallet_creation_failure_is_per_winner() {
        let store = Arc::new(MemoryStore::new());
        let wallet = Arc::new(MockWallet::new());
        wallet.set_balance("carol", "USDC", Amount::new(30));
        wallet.fail_wallet_for("alice");

        let mut contest = completed_contest(&store, &["alice", "bob"]).await;
        let report = FundDistributor::new(wallet, store)
            .distribute(&mut contest)
            .await
            .unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(contest.winners()[0].payout_address, None);
        assert_eq!(contest.winners()[1].transfer_status(), TransferStatus::Completed);
    }

    #[tokio::test]
    async fn test_unreachable_creator_leaves_winners_pending() {
        let store = Arc::new(MemoryStore::new());
        let wallet = Arc::new(MockWallet::new());
        wallet.set_unavailable(true);

        let mut contest = completed_contest(&store, &["alice"]).await;
        let err = FundDistributor::new(wallet, store.clone())
            .distribute(&mut contest)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(store.get_contest("k1").await.unwrap().unwrap().has_pending_winners());
    }

    #[tokio::test]
    async fn test_resume_never_repays() {
        let store = Arc::new(MemoryStore::new());
        let wallet = Arc::new(MockWallet::new());
        wallet.set_balance("carol", "USDC", Amount::new(100));

        let mut contest = completed_contest(&store, &["alice", "bob"]).await;
        contest
            .settle_winner(0, TransferOutcome::Completed {
                address: "addr-alice".to_string(),
                tx_ref: "tx-earlier".to_string(),
            })
            .unwrap();

        let report = FundDistributor::new(wallet.clone(), store)
            .distribute(&mut contest)
            .await
            .unwrap();
        assert_eq!(report.winners.len(), 1);
        assert_eq!(report.winners[0].participant_id, "bob");
        assert_eq!(wallet.transfers().len(), 1);
        assert_eq!(contest.winners()[0].tx_ref.as_deref(), Some("tx-earlier"));

        let full = DistributionReport::from_contest(&contest);
        assert_eq!(full.succeeded(), 2);
        assert!(full.summary().contains("@alice paid (tx-earlier)"));
    }

    #[tokio::test]
    async fn test_failed_save_stops_payouts() {
        let store = Arc::new(MemoryStore::new());
        let wallet = Arc::new(MockWallet::new());
        wallet.set_balance("carol", "USDC", Amount::new(100));
        let mut contest = completed_contest(&store, &["alice", "bob", "dave"]).await;

        let flaky = Arc::new(FlakyContests {
            inner: store.clone(),
            failing: AtomicBool::new(true),
        });
        let distributor = FundDistributor::new(wallet.clone(), flaky.clone());
        let err = distributor.distribute(&mut contest).await.unwrap_err();
        assert_eq!(err, SettlementError::Storage("disk full".to_string()));

        // Only the payout whose outcome couldn't be stored went out
        assert_eq!(wallet.transfers().len(), 1);
        let stored = store.get_contest("k1").await.unwrap().unwrap();
        assert_eq!(stored.pending_winner_indices(), vec![0, 1, 2]);

        // Resume from what the store knows
        flaky.failing.store(false, Ordering::SeqCst);
        let mut resumed = store.get_contest("k1").await.unwrap().unwrap();
        let report = distributor.distribute(&mut resumed).await.unwrap();
        assert_eq!(report.succeeded(), 3);
        assert!(!store.get_contest("k1").await.unwrap().unwrap().has_pending_winners());

        // bob and dave were each paid once; alice's unrecorded payout is the
        // only one repeated
        let transfers = wallet.transfers();
        assert_eq!(transfers.len(), 4);
        for participant in ["bob", "dave"] {
            let to = MockWallet::address_of(participant);
            assert_eq!(transfers.iter().filter(|t| t.to_address == to).count(), 1);
        }
    }

    #[test]
    fn test_empty_summary() {
        let report = DistributionReport::default();
        assert_eq!(report.summary(), "Paid 0 of 0 winners");
    }
}
