//! Secret keys, key ids and the keyring used for rotation

use std::fmt;

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
};
use scrypt::{Params, scrypt};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};

/// Length of a secret key in bytes
pub const KEY_LEN: usize = 32;

/// Shortest salt accepted for passphrase derivation
pub const MIN_SALT_LEN: usize = 8;

/// Default scrypt cost, N = 2^15
pub const DEFAULT_SCRYPT_LOG_N: u8 = 15;

/// Highest accepted scrypt cost. scrypt needs 128 * r * 2^log_n bytes of
/// memory, so 20 already means 1 GiB.
pub const MAX_SCRYPT_LOG_N: u8 = 20;

/// scrypt r parameter (block size)
const SCRYPT_R: u32 = 8;

/// scrypt p parameter (parallelization)
const SCRYPT_P: u32 = 1;

/// Identifies which keyring entry sealed an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

impl KeyId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for KeyId {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 256-bit secret key, wiped from memory on drop.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            key_error(format!(
                "secret key must be exactly {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(Zeroizing::new(array)))
    }

    /// Decode a key from standard base64 (padding optional).
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim().trim_end_matches('=');
        let decoded = Zeroizing::new(STANDARD_NO_PAD.decode(trimmed).map_err(|e| {
            PwcipherError::with_kind_and_source(
                Operation::Configure,
                ErrorCategory::User,
                ErrorKind::KeyInvalid,
                format!("secret key is not valid base64: {}", e),
                e,
            )
        })?);
        Self::from_bytes(&decoded)
    }

    /// Derive a key from a passphrase and salt with scrypt (r=8, p=1).
    pub fn derive(passphrase: &[u8], salt: &[u8], log_n: u8) -> Result<Self> {
        if salt.len() < MIN_SALT_LEN {
            return Err(key_error(format!(
                "salt must be at least {} bytes, got {}",
                MIN_SALT_LEN,
                salt.len()
            )));
        }

        if log_n == 0 || log_n > MAX_SCRYPT_LOG_N {
            return Err(PwcipherError::with_kind(
                Operation::Configure,
                ErrorCategory::User,
                ErrorKind::ScryptFailure,
                format!(
                    "scrypt log_n must be between 1 and {}, got {}",
                    MAX_SCRYPT_LOG_N, log_n
                ),
            ));
        }

        let params = Params::new(log_n, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
            PwcipherError::with_kind_and_source(
                Operation::Configure,
                ErrorCategory::User,
                ErrorKind::ScryptFailure,
                "failed to create scrypt params",
                e,
            )
        })?;

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        scrypt(passphrase, salt, &params, &mut key[..]).map_err(|e| {
            PwcipherError::with_kind_and_source(
                Operation::Configure,
                ErrorCategory::Internal,
                ErrorKind::ScryptFailure,
                "scrypt key derivation failed",
                e,
            )
        })?;

        Ok(Self(key))
    }

    /// Encode as standard base64, the form accepted by configuration.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(&self.0[..]))
    }

    pub(crate) fn expose(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// The primary key used for encryption plus retired keys still accepted
/// for decryption.
#[derive(Debug, Clone)]
pub struct Keyring {
    primary: KeyId,
    keys: Vec<(KeyId, SecretKey)>,
}

impl Keyring {
    pub fn new(primary_id: KeyId, primary: SecretKey) -> Self {
        Self {
            primary: primary_id,
            keys: vec![(primary_id, primary)],
        }
    }

    /// Add a key that can still open old envelopes but is never used to seal.
    pub fn with_retired(mut self, id: KeyId, key: SecretKey) -> Result<Self> {
        if self.get(id).is_some() {
            return Err(PwcipherError::with_kind(
                Operation::Configure,
                ErrorCategory::User,
                ErrorKind::Config,
                format!("duplicate key id {} in keyring", id),
            ));
        }
        self.keys.push((id, key));
        Ok(self)
    }

    pub fn primary_id(&self) -> KeyId {
        self.primary
    }

    pub(crate) fn primary(&self) -> (KeyId, &SecretKey) {
        // The constructor always stores the primary key first.
        (self.primary, &self.keys[0].1)
    }

    pub fn get(&self, id: KeyId) -> Option<&SecretKey> {
        self.keys.iter().find(|(k, _)| *k == id).map(|(_, key)| key)
    }

    pub fn ids(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.keys.iter().map(|(id, _)| *id)
    }

    // Never empty: the primary key is always present.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

fn key_error(msg: String) -> PwcipherError {
    PwcipherError::with_kind(
        Operation::Configure,
        ErrorCategory::User,
        ErrorKind::KeyInvalid,
        msg,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keeps derivation fast in debug builds.
    const TEST_LOG_N: u8 = 10;

    #[test]
    fn test_from_bytes_length() {
        assert!(SecretKey::from_bytes(&[7u8; KEY_LEN]).is_ok());

        let err = SecretKey::from_bytes(&[7u8; 16]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::KeyInvalid));
        assert_eq!(err.operation, Operation::Configure);
    }

    #[test]
    fn test_base64_with_and_without_padding() {
        let key = SecretKey::from_bytes(&[0x42u8; KEY_LEN]).unwrap();
        let encoded = key.to_base64();
        assert!(encoded.ends_with('='));

        let padded = SecretKey::from_base64(&encoded).unwrap();
        let unpadded = SecretKey::from_base64(encoded.trim_end_matches('=')).unwrap();
        assert_eq!(padded.expose(), key.expose());
        assert_eq!(unpadded.expose(), key.expose());
    }

    #[test]
    fn test_bad_base64() {
        let err = SecretKey::from_base64("not base64 at all!").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::KeyInvalid));
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = SecretKey::derive(b"correct horse", b"saltsalt", TEST_LOG_N).unwrap();
        let b = SecretKey::derive(b"correct horse", b"saltsalt", TEST_LOG_N).unwrap();
        let c = SecretKey::derive(b"correct horse", b"saltSALT", TEST_LOG_N).unwrap();

        assert_eq!(a.expose(), b.expose());
        assert_ne!(a.expose(), c.expose());
    }

    #[test]
    fn test_derive_rejects_short_salt() {
        let err = SecretKey::derive(b"pw", b"short", TEST_LOG_N).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::KeyInvalid));
    }

    #[test]
    fn test_derive_rejects_out_of_range_cost() {
        for log_n in [0, MAX_SCRYPT_LOG_N + 1, 50, u8::MAX] {
            let err = SecretKey::derive(b"pw", b"saltsalt", log_n).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::ScryptFailure), "log_n {}", log_n);
            assert_eq!(err.category, ErrorCategory::User);
            assert_eq!(err.operation, Operation::Configure);
        }
    }

    #[test]
    fn test_debug_redacts() {
        let key = SecretKey::from_bytes(&[0x42u8; KEY_LEN]).unwrap();
        assert_eq!(format!("{:?}", key), "SecretKey(..)");
    }

    #[test]
    fn test_keyring_lookup() {
        let ring = Keyring::new(KeyId::new(2), SecretKey::from_bytes(&[2; KEY_LEN]).unwrap())
            .with_retired(KeyId::new(1), SecretKey::from_bytes(&[1; KEY_LEN]).unwrap())
            .unwrap();

        assert_eq!(ring.primary_id(), KeyId::new(2));
        assert_eq!(ring.primary().1.expose(), &[2; KEY_LEN]);
        assert_eq!(ring.get(KeyId::new(1)).unwrap().expose(), &[1; KEY_LEN]);
        assert!(ring.get(KeyId::new(3)).is_none());
        assert_eq!(ring.ids().collect::<Vec<_>>(), vec![KeyId::new(2), KeyId::new(1)]);
    }

    #[test]
    fn test_keyring_rejects_duplicate_id() {
        let err = Keyring::new(KeyId::new(1), SecretKey::from_bytes(&[1; KEY_LEN]).unwrap())
            .with_retired(KeyId::new(1), SecretKey::from_bytes(&[9; KEY_LEN]).unwrap())
            .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Config));
    }
}
