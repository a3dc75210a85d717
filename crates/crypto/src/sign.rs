use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use prizecraft_core::ClaimMessage;

use crate::keys::SigningKeypair;

/// Sign data with a signing keypair
pub fn sign_data(keypair: &SigningKeypair, data: &[u8]) -> [u8; 64] {
    let signature: Signature = keypair.signing_key.sign(data);
    signature.to_bytes()
}

/// Verify a signature
pub fn verify_signature(pubkey: &[u8; 32], data: &[u8], signature: &[u8; 64]) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(pubkey) {
        Ok(vk) => vk,
        Err(_) => return false,
    };

    let signature = Signature::from_bytes(signature);

    verifying_key.verify(data, &signature).is_ok()
}

/// SHA-256 over the claim message's canonical encoding
pub fn claim_digest(message: &ClaimMessage) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(message.signable_data());
    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Signed claim payload handed to the user's wallet for on-chain redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAuthorization {
    pub message: ClaimMessage,
    /// Hex-encoded ed25519 signature over `claim_digest(message)`
    pub signature: String,
    /// Hex-encoded signer public key
    pub signer: String,
}

/// Sign a claim message with the service's dedicated signer key
pub fn sign_claim(keypair: &SigningKeypair, message: ClaimMessage) -> ClaimAuthorization {
    let digest = claim_digest(&message);
    let signature = sign_data(keypair, &digest);
    ClaimAuthorization {
        message,
        signature: hex::encode(signature),
        signer: keypair.public_key_hex(),
    }
}

/// Verify a claim authorization against an expected signer key
pub fn verify_claim_authorization(auth: &ClaimAuthorization, signer_pubkey: &[u8; 32]) -> bool {
    let Ok(sig_bytes) = hex::decode(&auth.signature) else { return false };
    let Ok(signature) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else { return false };
    if auth.signer != hex::encode(signer_pubkey) {
        return false;
    }
    verify_signature(signer_pubkey, &claim_digest(&auth.message), &signature)
}
