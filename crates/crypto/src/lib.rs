//! PrizeCraft Cryptography
//!
//! Signer keypairs and claim authorization signatures.

mod keys;
mod sign;

pub use keys::*;
pub use sign::*;
