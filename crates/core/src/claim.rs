use serde::{Deserialize, Serialize};

use crate::{Amount, PeriodId};

/// Tag prefixed to every claim message so the bytes can't be confused with
/// any other signed payload.
pub const CLAIM_MESSAGE_TAG: &[u8] = b"PRIZECRAFT_CLAIM_V1";

/// Typed, domain-separated claim authorization payload.
///
/// The settlement contract checks this against the signer key and consumes
/// `nonce`, so a given message can be redeemed at most once on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMessage {
    /// Deployment domain (e.g. "prizecraft-claim-v1")
    pub domain: String,
    /// Settlement contract the authorization is valid for
    pub contract: String,
    pub period: PeriodId,
    /// Claimant's on-chain address
    pub address: String,
    pub rank: u32,
    pub amount: Amount,
    pub nonce: u64,
}

impl ClaimMessage {
    /// Canonical byte encoding.
    ///
    /// Variable-length fields are length-prefixed (u32 LE) and integers are
    /// little-endian, so distinct messages never share an encoding.
    pub fn signable_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(
            CLAIM_MESSAGE_TAG.len() + self.domain.len() + self.contract.len() + self.address.len() + 52,
        );
        data.extend_from_slice(CLAIM_MESSAGE_TAG);
        push_prefixed(&mut data, self.domain.as_bytes());
        push_prefixed(&mut data, self.contract.as_bytes());
        data.extend_from_slice(&self.period.to_le_bytes());
        push_prefixed(&mut data, self.address.as_bytes());
        data.extend_from_slice(&self.rank.to_le_bytes());
        data.extend_from_slice(&self.amount.minor_units().to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data
    }
}

fn push_prefixed(data: &mut Vec<u8>, field: &[u8]) {
    data.extend_from_slice(&(field.len() as u32).to_le_bytes());
    data.extend_from_slice(field);
}
