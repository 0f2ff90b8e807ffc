//! The process-wide cipher behind [`crate::encrypt`], [`crate::decrypt`]
//! and [`crate::verify`].
//!
//! The cipher is installed once at startup, either explicitly or from the
//! environment, and never replaced afterwards.

use std::sync::OnceLock;

use tracing::info;

use crate::cipher::PasswordCipher;
use crate::config::CipherConfig;
use crate::error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};

static CIPHER: OnceLock<PasswordCipher> = OnceLock::new();

/// Install the process-wide cipher. Fails if one is already installed.
pub fn install(cipher: PasswordCipher) -> Result<()> {
    let primary = cipher.keyring().primary_id();
    CIPHER.set(cipher).map_err(|_| {
        PwcipherError::with_kind(
            Operation::Configure,
            ErrorCategory::User,
            ErrorKind::AlreadyInstalled,
            "a process-wide cipher is already installed",
        )
    })?;
    info!(primary_key_id = %primary, "installed process-wide cipher");
    Ok(())
}

/// Build a cipher from `PWCIPHER_*` variables and install it.
pub fn install_from_env() -> Result<()> {
    let keyring = CipherConfig::from_env()?.into_keyring()?;
    install(PasswordCipher::new(keyring))
}

/// The installed cipher, if any.
pub fn installed() -> Option<&'static PasswordCipher> {
    CIPHER.get()
}

fn require(operation: Operation) -> Result<&'static PasswordCipher> {
    installed().ok_or_else(|| {
        PwcipherError::with_kind(
            operation,
            ErrorCategory::User,
            ErrorKind::KeyUnavailable,
            "no process-wide cipher installed; call pwcipher::install first",
        )
    })
}

/// Encrypt a password with the process-wide cipher, returning the armored envelope.
pub fn encrypt(plaintext: &str) -> Result<String> {
    require(Operation::Encrypt)?.encrypt_str(plaintext)
}

/// Decrypt an armored envelope with the process-wide cipher.
pub fn decrypt(envelope: &str) -> Result<String> {
    require(Operation::Decrypt)?.decrypt_str(envelope)
}

/// Check a password against an armored envelope. False if no cipher is
/// installed or the envelope cannot be opened.
pub fn verify(plaintext: &str, envelope: &str) -> bool {
    match installed() {
        Some(cipher) => cipher.verify_str(plaintext, envelope),
        None => false,
    }
}
