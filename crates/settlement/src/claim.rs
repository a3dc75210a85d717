//! Claim authorization
//!
//! Issues signed, nonce-bound claim messages for settled leaderboard periods.
//! The participant's wallet submits the message to the settlement contract,
//! which checks the signer and consumes the nonce.

use std::sync::Arc;

use tracing::{debug, info, warn};

use prizecraft_core::{Amount, ClaimMessage, Entitlement, PeriodId, PeriodSnapshot, Timestamp};
use prizecraft_crypto::{sign_claim, ClaimAuthorization, SigningKeypair};

use crate::{Result, SettlementContract, SettlementError, SnapshotStore, WalletService};

/// Values bound into every signed claim
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    pub domain: String,
    pub settlement_contract: String,
}

/// An unclaimed reward with its live entitlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimableReward {
    pub period: PeriodId,
    pub rank: u32,
    pub entitlement: Amount,
    pub denomination: String,
}

pub struct ClaimAuthorizer {
    snapshots: Arc<dyn SnapshotStore>,
    wallet: Arc<dyn WalletService>,
    chain: Arc<dyn SettlementContract>,
    signer: SigningKeypair,
    config: ClaimConfig,
}

impl ClaimAuthorizer {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        wallet: Arc<dyn WalletService>,
        chain: Arc<dyn SettlementContract>,
        signer: SigningKeypair,
        config: ClaimConfig,
    ) -> Self {
        Self {
            snapshots,
            wallet,
            chain,
            signer,
            config,
        }
    }

    /// Public key the settlement contract must trust
    pub fn signer_public_key(&self) -> [u8; 32] {
        self.signer.public_key_bytes()
    }

    /// Produce a signed claim for `participant`'s reward in `period`.
    ///
    /// Fails with `NoSnapshot`, `AlreadyClaimed`, `PoolNotFunded` or
    /// `NothingToClaim` when the reward can't be claimed. An on-chain claim
    /// the store doesn't know about yet is reconciled into the store before
    /// failing.
    pub async fn authorize(
        &self,
        period: PeriodId,
        participant: &str,
        now: Timestamp,
    ) -> Result<ClaimAuthorization> {
        let snapshot = self
            .snapshots
            .get_snapshot(period, participant)
            .await?
            .ok_or_else(|| SettlementError::NoSnapshot {
                period,
                participant: participant.to_string(),
            })?;
        if snapshot.claimed {
            return Err(already_claimed(period, participant));
        }

        let address = self.wallet.get_or_create_wallet(participant).await?.address;

        // The pool for a still-running period can't be final
        if period >= self.chain.current_period().await? || !self.chain.pool_funded(period).await? {
            return Err(SettlementError::PoolNotFunded(period));
        }

        if self.chain.claimed(period, &address).await? {
            info!(period, participant, "Reconciling claim observed on-chain");
            match self.snapshots.mark_claimed(period, participant, None, now).await {
                Ok(_) | Err(SettlementError::AlreadyClaimed { .. }) => {}
                Err(e) => warn!(period, participant, error = %e, "Failed to reconcile claimed flag"),
            }
            return Err(already_claimed(period, participant));
        }

        let amount = self.entitlement(&snapshot).await?;
        if amount.is_zero() {
            return Err(SettlementError::NothingToClaim {
                period,
                participant: participant.to_string(),
            });
        }
        let nonce = self.chain.nonce(&address, period).await?;

        let message = ClaimMessage {
            domain: self.config.domain.clone(),
            contract: self.config.settlement_contract.clone(),
            period,
            address,
            rank: snapshot.rank,
            amount,
            nonce,
        };
        debug!(period, participant, rank = snapshot.rank, %amount, nonce, "Signing claim");
        Ok(sign_claim(&self.signer, message))
    }

    /// Record that the participant's wallet redeemed the claim
    pub async fn confirm(
        &self,
        period: PeriodId,
        participant: &str,
        tx_ref: impl Into<String>,
        now: Timestamp,
    ) -> Result<PeriodSnapshot> {
        let tx_ref = tx_ref.into();
        let snapshot = self
            .snapshots
            .mark_claimed(period, participant, Some(tx_ref.clone()), now)
            .await?;
        info!(period, participant, tx = %tx_ref, "Claim confirmed");
        Ok(snapshot)
    }

    /// Unclaimed rewards of `participant`, oldest period first.
    ///
    /// Deferred entitlements are read live from the reward table; ranks the
    /// table pays nothing for are left out.
    pub async fn claimable(&self, participant: &str) -> Result<Vec<ClaimableReward>> {
        let mut snapshots = self.snapshots.snapshots_for_participant(participant).await?;
        snapshots.retain(|s| !s.claimed);
        snapshots.sort_by_key(|s| s.period);

        let mut rewards = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let entitlement = self.entitlement(&snapshot).await?;
            if entitlement.is_zero() {
                continue;
            }
            rewards.push(ClaimableReward {
                period: snapshot.period,
                rank: snapshot.rank,
                entitlement,
                denomination: snapshot.denomination,
            });
        }
        Ok(rewards)
    }

    async fn entitlement(&self, snapshot: &PeriodSnapshot) -> Result<Amount> {
        match snapshot.entitlement {
            Entitlement::Fixed(amount) => Ok(amount),
            Entitlement::Deferred => self.chain.reward(snapshot.period, snapshot.rank).await,
        }
    }
}

fn already_claimed(period: PeriodId, participant: &str) -> SettlementError {
    SettlementError::AlreadyClaimed {
        period,
        participant: participant.to_string(),
    }
}
