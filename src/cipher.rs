//! Password encryption with NaCl secretbox (XSalsa20Poly1305)
//!
//! Every envelope is sealed under the keyring's primary key with a fresh
//! 24-byte random nonce. Opening looks the key up by the id recorded in the
//! envelope, so retired keys keep working until they are removed from
//! configuration.

use std::fmt;

use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::envelope::{Envelope, NONCE_LEN};
use crate::error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};
use crate::key::{Keyring, SecretKey};
use crate::nonce::{NonceSource, OsNonceSource};

/// Largest plaintext accepted by [`PasswordCipher::encrypt`].
pub const MAX_PLAINTEXT_LEN: usize = 64 * 1024;

/// Encrypts, decrypts and verifies passwords under a fixed keyring.
///
/// A cipher holds no mutable state apart from its nonce source and can be
/// shared freely between threads.
pub struct PasswordCipher {
    keyring: Keyring,
    nonces: Box<dyn NonceSource>,
}

impl PasswordCipher {
    /// Creates a cipher that draws nonces from the OS CSPRNG.
    pub fn new(keyring: Keyring) -> Self {
        Self::with_nonce_source(keyring, OsNonceSource)
    }

    /// Creates a cipher with a custom nonce source, e.g. a seeded one in tests.
    pub fn with_nonce_source(keyring: Keyring, nonces: impl NonceSource + 'static) -> Self {
        Self {
            keyring,
            nonces: Box::new(nonces),
        }
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Encrypt plaintext under the primary key with a fresh nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        let mut nonce = [0u8; NONCE_LEN];
        self.nonces.fill_nonce(&mut nonce)?;
        self.seal_with_nonce(plaintext, &nonce)
    }

    /// Encrypt plaintext under the primary key using the provided nonce.
    ///
    /// This function is ONLY for known-answer tests that need deterministic output.
    /// NEVER use this in production - always use `encrypt()`, which never
    /// reuses a nonce.
    pub fn seal_with_nonce(&self, plaintext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Envelope> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(PwcipherError::with_kind(
                Operation::Encrypt,
                ErrorCategory::User,
                ErrorKind::PlaintextTooLong,
                format!(
                    "plaintext is {} bytes; at most {} are accepted",
                    plaintext.len(),
                    MAX_PLAINTEXT_LEN
                ),
            ));
        }

        let (key_id, key) = self.keyring.primary();
        let cipher = build_cipher(key, Operation::Encrypt)?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| {
                PwcipherError::with_kind(
                    Operation::Encrypt,
                    ErrorCategory::Internal,
                    ErrorKind::SecretboxFailure,
                    format!("encryption failed: {}", e),
                )
            })?;

        debug!(
            key_id = %key_id,
            plaintext_len = plaintext.len(),
            "sealed envelope"
        );
        Ok(Envelope::new(key_id, *nonce, sealed))
    }

    /// Open an envelope, returning the plaintext in a buffer wiped on drop.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Zeroizing<Vec<u8>>> {
        let key_id = envelope.key_id();
        let key = self.keyring.get(key_id).ok_or_else(|| {
            warn!(key_id = %key_id, "envelope sealed under unknown key id");
            PwcipherError::with_kind(
                Operation::Decrypt,
                ErrorCategory::User,
                ErrorKind::UnknownKeyId,
                format!("envelope was sealed under key id {} which is not configured", key_id),
            )
        })?;

        let cipher = build_cipher(key, Operation::Decrypt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(envelope.nonce()), envelope.sealed())
            .map_err(|_| {
                warn!(key_id = %key_id, "envelope failed authentication");
                PwcipherError::with_kind(
                    Operation::Decrypt,
                    ErrorCategory::User,
                    ErrorKind::AuthenticationFailed,
                    "corrupt input, tampered-with data, or wrong key",
                )
            })?;

        debug!(
            key_id = %key_id,
            plaintext_len = plaintext.len(),
            "opened envelope"
        );
        Ok(Zeroizing::new(plaintext))
    }

    /// Check whether `envelope` holds `plaintext`.
    ///
    /// Any failure to open the envelope yields `false`; the comparison itself
    /// runs in constant time with respect to the contents.
    pub fn verify(&self, plaintext: &[u8], envelope: &Envelope) -> bool {
        match self.decrypt(envelope) {
            Ok(decrypted) => constant_time_eq(&decrypted, plaintext),
            Err(_) => false,
        }
    }

    /// Encrypt a string, returning the armored envelope.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String> {
        Ok(self.encrypt(plaintext.as_bytes())?.to_armored())
    }

    /// Decrypt an armored envelope whose plaintext is expected to be UTF-8.
    pub fn decrypt_str(&self, armored: &str) -> Result<String> {
        let envelope = Envelope::from_armored(armored)?;
        let plaintext = self.decrypt(&envelope)?;
        let text = std::str::from_utf8(&plaintext).map_err(|e| {
            PwcipherError::with_kind_and_source(
                Operation::Decrypt,
                ErrorCategory::User,
                ErrorKind::InvalidUtf8,
                "decrypted plaintext is not valid UTF-8",
                e,
            )
        })?;
        Ok(text.to_owned())
    }

    /// [`verify`](Self::verify) for a string and an armored envelope.
    pub fn verify_str(&self, plaintext: &str, armored: &str) -> bool {
        match Envelope::from_armored(armored) {
            Ok(envelope) => self.verify(plaintext.as_bytes(), &envelope),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCipher")
            .field("primary_key_id", &self.keyring.primary_id())
            .field("keys", &self.keyring.len())
            .finish_non_exhaustive()
    }
}

fn build_cipher(key: &SecretKey, operation: Operation) -> Result<XSalsa20Poly1305> {
    XSalsa20Poly1305::new_from_slice(key.expose()).map_err(|e| {
        PwcipherError::with_kind(
            operation,
            ErrorCategory::Internal,
            ErrorKind::KeyInvalid,
            format!("secretbox rejected key: {}", e),
        )
    })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

// Lets tests build a single-key cipher without going through configuration.
#[cfg(test)]
pub(crate) fn test_cipher(key_byte: u8) -> PasswordCipher {
    let key = SecretKey::from_bytes(&[key_byte; crate::key::KEY_LEN]).unwrap();
    PasswordCipher::new(Keyring::new(crate::key::KeyId::default(), key))
}
