//! External collaborators
//!
//! The engine never talks to a network directly. Each collaborator is an
//! async trait object injected at construction so production adapters and
//! the in-memory mocks are interchangeable.

use async_trait::async_trait;

use prizecraft_core::{Amount, LeaderboardEntry, ParticipantId, PeriodBounds, PeriodConfig, PeriodId, Reply};

use crate::Result;

/// Social-media client
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// All engagements on a post (replies, retweets, quotes)
    async fn fetch_replies(&self, post_id: &str) -> Result<Vec<Reply>>;

    /// Map a raw engagement author to a stable participant identity.
    /// `None` when the account can't be resolved (deleted, suspended).
    async fn resolve_participant(&self, id: &str) -> Result<Option<ParticipantId>>;

    /// Author of a post, `None` if the post doesn't exist
    async fn post_author(&self, post_id: &str) -> Result<Option<ParticipantId>>;

    /// Reply to a post, returning the new post's reference
    async fn reply(&self, post_id: &str, text: &str) -> Result<String>;
}

/// Custodial wallet of a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInfo {
    pub wallet_id: String,
    pub address: String,
}

/// Custodial wallet / signing service
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Existing wallet, or a freshly created one
    async fn get_or_create_wallet(&self, participant: &str) -> Result<WalletInfo>;

    async fn balance(&self, wallet_id: &str, denomination: &str) -> Result<Amount>;

    /// Send value, returning the transaction reference
    async fn transfer(
        &self,
        wallet_id: &str,
        to_address: &str,
        amount: Amount,
        denomination: &str,
    ) -> Result<String>;
}

/// Read side of the on-chain settlement contract
#[async_trait]
pub trait SettlementContract: Send + Sync {
    async fn current_period(&self) -> Result<PeriodId>;

    async fn pool_funded(&self, period: PeriodId) -> Result<bool>;

    async fn claimed(&self, period: PeriodId, address: &str) -> Result<bool>;

    /// Next unused claim nonce for `address` in `period`
    async fn nonce(&self, address: &str, period: PeriodId) -> Result<u64>;

    /// Reward for `rank` in `period` from the contract's reward table
    async fn reward(&self, period: PeriodId, rank: u32) -> Result<Amount>;
}

/// Point-accrual bookkeeping
#[async_trait]
pub trait Leaderboard: Send + Sync {
    /// Cumulative standings for a closed period
    async fn standings(&self, bounds: &PeriodBounds) -> Result<Vec<LeaderboardEntry>>;
}

/// Where the versioned period configuration history lives
#[async_trait]
pub trait PeriodConfigSource: Send + Sync {
    async fn load(&self) -> Result<Vec<PeriodConfig>>;
}

/// Fixed history, typically from the settings file
#[derive(Debug, Clone, Default)]
pub struct StaticPeriodConfig {
    history: Vec<PeriodConfig>,
}

impl StaticPeriodConfig {
    pub fn new(history: Vec<PeriodConfig>) -> Self {
        Self { history }
    }
}

#[async_trait]
impl PeriodConfigSource for StaticPeriodConfig {
    async fn load(&self) -> Result<Vec<PeriodConfig>> {
        Ok(self.history.clone())
    }
}
