//! PrizeCraft Keystore
//!
//! Claim signer key management and path utilities for PrizeCraft apps.
//!
//! ## Features
//!
//! - Ed25519 claim signer loading/generation (hex key files)
//! - Cross-platform path expansion (~, environment variables)
//! - Platform config/data directories

mod keypair;
mod paths;

pub use keypair::{
    load_or_generate_signing_keypair,
    load_signing_keypair,
    default_key_path,
    save_keypair_bytes,
    KeystoreError,
};
pub use paths::{expand_path, default_keystore_dir, default_config_dir, default_data_dir};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
