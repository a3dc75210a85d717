//! In-memory collaborators
//!
//! Stand-ins for the social client, the custodial wallet service, the
//! settlement contract and the leaderboard. State lives behind a lock and
//! every mock has switches to simulate outages or per-item failures, so
//! engine tests (and a daemon started without live adapters) run entirely
//! in-process.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use prizecraft_core::{
    Amount, EngagementKind, LeaderboardEntry, ParticipantId, PeriodBounds, PeriodId, Reply,
};

use crate::{
    Leaderboard, Result, Service, SettlementContract, SettlementError, SocialClient, WalletInfo,
    WalletService,
};

// === Social ===

#[derive(Default)]
struct SocialState {
    replies: HashMap<String, Vec<Reply>>,
    authors: HashMap<String, ParticipantId>,
    /// Raw id -> resolved identity; absent ids resolve to themselves
    identities: HashMap<String, Option<ParticipantId>>,
    posted: Vec<(String, String)>,
    unavailable: bool,
    fail_posting: bool,
    fail_author_lookup: bool,
    post_counter: u64,
}

/// Social client backed by in-memory posts
#[derive(Default)]
pub struct MockSocial {
    state: RwLock<SocialState>,
}

impl MockSocial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a post and its author
    pub fn add_post(&self, post_id: &str, author: &str) {
        self.state
            .write()
            .authors
            .insert(post_id.to_string(), author.to_string());
    }

    pub fn add_engagement(&self, post_id: &str, author: &str, comment_ref: &str, kind: EngagementKind) {
        self.state
            .write()
            .replies
            .entry(post_id.to_string())
            .or_default()
            .push(Reply {
                participant_id: author.to_string(),
                comment_ref: comment_ref.to_string(),
                text: format!("entry from {}", author),
                kind,
            });
    }

    pub fn add_reply(&self, post_id: &str, author: &str, comment_ref: &str) {
        self.add_engagement(post_id, author, comment_ref, EngagementKind::Reply);
    }

    /// Map a raw author id to an identity (`None` = unresolvable)
    pub fn set_identity(&self, raw: &str, identity: Option<&str>) {
        self.state
            .write()
            .identities
            .insert(raw.to_string(), identity.map(str::to_string));
    }

    /// Fail every call as if the platform API were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    /// Fail only `reply` (announcements, confirmations)
    pub fn set_posting_fails(&self, fail: bool) {
        self.state.write().fail_posting = fail;
    }

    /// Fail only `post_author`
    pub fn set_author_lookup_fails(&self, fail: bool) {
        self.state.write().fail_author_lookup = fail;
    }

    /// Replies posted so far as (parent post, text)
    pub fn posted(&self) -> Vec<(String, String)> {
        self.state.read().posted.clone()
    }

    fn check(state: &SocialState) -> Result<()> {
        if state.unavailable {
            return Err(SettlementError::unavailable(Service::Social, "mock outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl SocialClient for MockSocial {
    async fn fetch_replies(&self, post_id: &str) -> Result<Vec<Reply>> {
        let state = self.state.read();
        Self::check(&state)?;
        Ok(state.replies.get(post_id).cloned().unwrap_or_default())
    }

    async fn resolve_participant(&self, id: &str) -> Result<Option<ParticipantId>> {
        let state = self.state.read();
        Self::check(&state)?;
        Ok(state
            .identities
            .get(id)
            .cloned()
            .unwrap_or_else(|| Some(id.to_string())))
    }

    async fn post_author(&self, post_id: &str) -> Result<Option<ParticipantId>> {
        let state = self.state.read();
        Self::check(&state)?;
        if state.fail_author_lookup {
            return Err(SettlementError::unavailable(Service::Social, "author lookup timed out"));
        }
        Ok(state.authors.get(post_id).cloned())
    }

    async fn reply(&self, post_id: &str, text: &str) -> Result<String> {
        let mut state = self.state.write();
        Self::check(&state)?;
        if state.fail_posting {
            return Err(SettlementError::unavailable(Service::Social, "posting rejected"));
        }
        state.post_counter += 1;
        let post_ref = format!("post-{}", state.post_counter);
        state.posted.push((post_id.to_string(), text.to_string()));
        debug!("[MOCK] Replied to {} as {}", post_id, post_ref);
        Ok(post_ref)
    }
}

// === Wallet ===

/// A transfer the mock wallet executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub from_wallet: String,
    pub to_address: String,
    pub amount: Amount,
    pub denomination: String,
    pub tx_ref: String,
}

#[derive(Default)]
struct WalletState {
    wallets: HashMap<ParticipantId, WalletInfo>,
    balances: HashMap<(String, String), Amount>,
    failing_recipients: HashSet<String>,
    failing_wallets: HashSet<ParticipantId>,
    transfers: Vec<TransferRecord>,
    unavailable: bool,
    tx_counter: u64,
}

impl WalletState {
    fn wallet_for(&mut self, participant: &str) -> WalletInfo {
        self.wallets
            .entry(participant.to_string())
            .or_insert_with(|| MockWallet::wallet_info(participant))
            .clone()
    }
}

/// Custodial wallet service with in-memory balances
#[derive(Default)]
pub struct MockWallet {
    state: RwLock<WalletState>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic wallet of a participant
    pub fn wallet_info(participant: &str) -> WalletInfo {
        WalletInfo {
            wallet_id: format!("wallet-{}", participant),
            address: Self::address_of(participant),
        }
    }

    pub fn address_of(participant: &str) -> String {
        format!("addr-{}", participant)
    }

    /// Create the participant's wallet (if needed) and set its balance
    pub fn set_balance(&self, participant: &str, denomination: &str, amount: Amount) {
        let mut state = self.state.write();
        let wallet = state.wallet_for(participant);
        state
            .balances
            .insert((wallet.wallet_id, denomination.to_string()), amount);
    }

    pub fn balance_of(&self, participant: &str, denomination: &str) -> Amount {
        let wallet_id = Self::wallet_info(participant).wallet_id;
        self.state
            .read()
            .balances
            .get(&(wallet_id, denomination.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Make transfers to this participant's address fail
    pub fn fail_transfers_to(&self, participant: &str) {
        self.state
            .write()
            .failing_recipients
            .insert(Self::address_of(participant));
    }

    /// Make wallet lookup/creation fail for this participant
    pub fn fail_wallet_for(&self, participant: &str) {
        self.state
            .write()
            .failing_wallets
            .insert(participant.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.state.read().transfers.clone()
    }
}

#[async_trait]
impl WalletService for MockWallet {
    async fn get_or_create_wallet(&self, participant: &str) -> Result<WalletInfo> {
        let mut state = self.state.write();
        if state.unavailable || state.failing_wallets.contains(participant) {
            return Err(SettlementError::unavailable(
                Service::Wallet,
                format!("cannot provision wallet for {}", participant),
            ));
        }
        Ok(state.wallet_for(participant))
    }

    async fn balance(&self, wallet_id: &str, denomination: &str) -> Result<Amount> {
        let state = self.state.read();
        if state.unavailable {
            return Err(SettlementError::unavailable(Service::Wallet, "mock outage"));
        }
        Ok(state
            .balances
            .get(&(wallet_id.to_string(), denomination.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn transfer(
        &self,
        wallet_id: &str,
        to_address: &str,
        amount: Amount,
        denomination: &str,
    ) -> Result<String> {
        let mut state = self.state.write();
        if state.unavailable {
            return Err(SettlementError::unavailable(Service::Wallet, "mock outage"));
        }
        if state.failing_recipients.contains(to_address) {
            return Err(SettlementError::TransferFailed(format!(
                "recipient {} rejected",
                to_address
            )));
        }

        let key = (wallet_id.to_string(), denomination.to_string());
        let available = state.balances.get(&key).copied().unwrap_or_default();
        let remaining = available
            .minor_units()
            .checked_sub(amount.minor_units())
            .ok_or_else(|| {
                SettlementError::TransferFailed(format!(
                    "insufficient funds in {}: have {}, need {}",
                    wallet_id, available, amount
                ))
            })?;
        state.balances.insert(key, Amount::new(remaining));

        state.tx_counter += 1;
        let tx_ref = format!("tx-{:06}", state.tx_counter);
        state.transfers.push(TransferRecord {
            from_wallet: wallet_id.to_string(),
            to_address: to_address.to_string(),
            amount,
            denomination: denomination.to_string(),
            tx_ref: tx_ref.clone(),
        });
        debug!("[MOCK] Transfer {} {} {} -> {}: {}", amount, denomination, wallet_id, to_address, tx_ref);
        Ok(tx_ref)
    }
}

// === Chain ===

#[derive(Default)]
struct ChainState {
    current_period: PeriodId,
    funded: HashSet<PeriodId>,
    claimed: HashSet<(PeriodId, String)>,
    nonces: HashMap<(String, PeriodId), u64>,
    rewards: HashMap<u32, Amount>,
    unavailable: bool,
}

/// Settlement contract reads served from memory
#[derive(Default)]
pub struct MockChain {
    state: RwLock<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_period(&self, period: PeriodId) {
        self.state.write().current_period = period;
    }

    pub fn fund_pool(&self, period: PeriodId) {
        self.state.write().funded.insert(period);
    }

    /// Reward table entry, applied to every period
    pub fn set_reward(&self, rank: u32, amount: Amount) {
        self.state.write().rewards.insert(rank, amount);
    }

    pub fn set_nonce(&self, address: &str, period: PeriodId, nonce: u64) {
        self.state
            .write()
            .nonces
            .insert((address.to_string(), period), nonce);
    }

    /// Simulate the user's wallet redeeming a claim: flags the address and
    /// consumes the nonce
    pub fn redeem(&self, period: PeriodId, address: &str) {
        let mut state = self.state.write();
        state.claimed.insert((period, address.to_string()));
        *state.nonces.entry((address.to_string(), period)).or_default() += 1;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    fn check(state: &ChainState) -> Result<()> {
        if state.unavailable {
            return Err(SettlementError::unavailable(Service::Chain, "rpc timeout"));
        }
        Ok(())
    }
}

#[async_trait]
impl SettlementContract for MockChain {
    async fn current_period(&self) -> Result<PeriodId> {
        let state = self.state.read();
        Self::check(&state)?;
        Ok(state.current_period)
    }

    async fn pool_funded(&self, period: PeriodId) -> Result<bool> {
        let state = self.state.read();
        Self::check(&state)?;
        Ok(state.funded.contains(&period))
    }

    async fn claimed(&self, period: PeriodId, address: &str) -> Result<bool> {
        let state = self.state.read();
        Self::check(&state)?;
        Ok(state.claimed.contains(&(period, address.to_string())))
    }

    async fn nonce(&self, address: &str, period: PeriodId) -> Result<u64> {
        let state = self.state.read();
        Self::check(&state)?;
        Ok(state
            .nonces
            .get(&(address.to_string(), period))
            .copied()
            .unwrap_or_default())
    }

    async fn reward(&self, _period: PeriodId, rank: u32) -> Result<Amount> {
        let state = self.state.read();
        Self::check(&state)?;
        Ok(state.rewards.get(&rank).copied().unwrap_or_default())
    }
}

// === Leaderboard ===

#[derive(Default)]
struct LeaderboardState {
    standings: HashMap<PeriodId, Vec<LeaderboardEntry>>,
    failing: HashSet<PeriodId>,
    calls: Vec<PeriodId>,
}

/// Leaderboard with per-period standings
#[derive(Default)]
pub struct MockLeaderboard {
    state: RwLock<LeaderboardState>,
}

impl MockLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_standings(&self, period: PeriodId, entries: &[(&str, u64)]) {
        let entries = entries
            .iter()
            .map(|(id, score)| LeaderboardEntry {
                participant_id: id.to_string(),
                score: *score,
            })
            .collect();
        self.state.write().standings.insert(period, entries);
    }

    /// Make reads of `period` fail until cleared
    pub fn fail_period(&self, period: PeriodId, fail: bool) {
        let mut state = self.state.write();
        if fail {
            state.failing.insert(period);
        } else {
            state.failing.remove(&period);
        }
    }

    /// Periods read so far, in call order
    pub fn calls(&self) -> Vec<PeriodId> {
        self.state.read().calls.clone()
    }
}

#[async_trait]
impl Leaderboard for MockLeaderboard {
    async fn standings(&self, bounds: &PeriodBounds) -> Result<Vec<LeaderboardEntry>> {
        let mut state = self.state.write();
        state.calls.push(bounds.period);
        if state.failing.contains(&bounds.period) {
            return Err(SettlementError::unavailable(
                Service::Leaderboard,
                format!("period {} unavailable", bounds.period),
            ));
        }
        Ok(state.standings.get(&bounds.period).cloned().unwrap_or_default())
    }
}
