//! Signer key files
//!
//! Keys are stored as 64 hex characters (the 32-byte ed25519 secret) with
//! owner-only permissions on unix.

use std::fs;
use std::path::{Path, PathBuf};

use prizecraft_crypto::SigningKeypair;
use thiserror::Error;
use tracing::{debug, info};

use crate::paths::default_keystore_dir;

#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("Failed to read key file: {0}")]
    ReadError(String),
    #[error("Failed to write key file: {0}")]
    WriteError(String),
    #[error("Invalid key format")]
    InvalidFormat,
    #[error("Key file not found: {0}")]
    NotFound(String),
    #[error("Failed to create directory: {0}")]
    CreateDirError(String),
}

/// Default claim signer key path
pub fn default_key_path() -> PathBuf {
    default_keystore_dir().join("claim-signer.key")
}

/// Load an existing signer key. Fails if the file is absent.
pub fn load_signing_keypair(path: &Path) -> Result<SigningKeypair, KeystoreError> {
    if !path.exists() {
        return Err(KeystoreError::NotFound(path.display().to_string()));
    }
    debug!("Loading signer key from {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| KeystoreError::ReadError(e.to_string()))?;
    let bytes = hex::decode(content.trim()).map_err(|_| KeystoreError::InvalidFormat)?;
    SigningKeypair::from_secret_slice(&bytes).map_err(|_| KeystoreError::InvalidFormat)
}

/// Load the signer key, generating and saving a new one if the file is absent
pub fn load_or_generate_signing_keypair(path: &Path) -> Result<SigningKeypair, KeystoreError> {
    if path.exists() {
        load_signing_keypair(path)
    } else {
        info!("Generating new claim signer key at {}", path.display());
        let keypair = SigningKeypair::generate();
        save_keypair_bytes(path, hex::encode(keypair.secret_key_bytes()).as_bytes())?;
        Ok(keypair)
    }
}

/// Save raw key bytes to a file, creating parent directories as needed
pub fn save_keypair_bytes(path: &Path, bytes: &[u8]) -> Result<(), KeystoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| KeystoreError::CreateDirError(e.to_string()))?;
    }
    fs::write(path, bytes).map_err(|e| KeystoreError::WriteError(e.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| KeystoreError::WriteError(e.to_string()))?;
    }

    Ok(())
}
