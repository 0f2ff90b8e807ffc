//! The ciphertext envelope and its binary layout
//!
//! The binary format is:
//! - key id: 4 bytes (big-endian u32)
//! - nonce: 24 bytes
//! - length: 8 bytes (big-endian signed int64)
//! - sealed box: variable length (includes 16-byte Poly1305 MAC)
//!
//! The text form is the armored binary form, see [`crate::armor`].

use std::fmt;
use std::mem::size_of;
use std::str::FromStr;

use crate::armor;
use crate::error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};
use crate::key::KeyId;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 24;

/// Length of the Poly1305 tag that every sealed box carries
pub const TAG_LEN: usize = 16;

const KEY_ID_LEN: usize = size_of::<u32>();

/// An encrypted password: which key sealed it, the nonce, and the sealed box.
///
/// Envelopes are immutable once built and carry everything needed to open
/// them apart from the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    key_id: KeyId,
    nonce: [u8; NONCE_LEN],
    sealed: Vec<u8>,
}

impl Envelope {
    pub(crate) fn new(key_id: KeyId, nonce: [u8; NONCE_LEN], sealed: Vec<u8>) -> Self {
        Self {
            key_id,
            nonce,
            sealed,
        }
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext followed by the authentication tag.
    pub fn sealed(&self) -> &[u8] {
        &self.sealed
    }

    /// Serialize to the binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let sealed_len = self.sealed.len() as i64;
        let mut output =
            Vec::with_capacity(KEY_ID_LEN + NONCE_LEN + size_of::<i64>() + self.sealed.len());
        output.extend_from_slice(&self.key_id.get().to_be_bytes());
        output.extend_from_slice(&self.nonce);
        output.extend_from_slice(&sealed_len.to_be_bytes());
        output.extend_from_slice(&self.sealed);
        output
    }

    /// Parse the binary layout, rejecting truncated, oversized or padded input.
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let mut pos = 0;

        if input.len() < pos + KEY_ID_LEN {
            return Err(format_error(
                ErrorKind::TruncatedInput,
                "input likely truncated while reading key id",
            ));
        }
        let key_id_bytes: [u8; KEY_ID_LEN] = input[pos..pos + KEY_ID_LEN]
            .try_into()
            .map_err(|_| format_error(ErrorKind::BinaryFormat, "failed to read key id"))?;
        let key_id = KeyId::new(u32::from_be_bytes(key_id_bytes));
        pos += KEY_ID_LEN;

        if input.len() < pos + NONCE_LEN {
            return Err(format_error(
                ErrorKind::TruncatedInput,
                "input likely truncated while reading nonce",
            ));
        }
        let nonce: [u8; NONCE_LEN] = input[pos..pos + NONCE_LEN]
            .try_into()
            .map_err(|_| format_error(ErrorKind::BinaryFormat, "failed to read nonce"))?;
        pos += NONCE_LEN;

        if input.len() < pos + size_of::<i64>() {
            return Err(format_error(
                ErrorKind::TruncatedInput,
                "input likely truncated while reading sealed box",
            ));
        }
        let length_bytes: [u8; 8] = input[pos..pos + size_of::<i64>()]
            .try_into()
            .map_err(|_| format_error(ErrorKind::BinaryFormat, "failed to read length"))?;
        let sealed_len = i64::from_be_bytes(length_bytes);
        pos += size_of::<i64>();

        if sealed_len < 0 {
            return Err(format_error(
                ErrorKind::BinaryFormat,
                "negative sealed box length (when interpreted as a big-endian i64)",
            ));
        }

        // *Valid* input can fail this check if the platform's isize is small.
        if sealed_len > isize::MAX as i64 {
            return Err(format_error(
                ErrorKind::BinaryFormat,
                "sealed box length exceeds this system's max isize",
            ));
        }

        let sealed_len = sealed_len as usize;

        if sealed_len > input.len() - pos {
            return Err(format_error(
                ErrorKind::TruncatedInput,
                "truncated or corrupt input; claimed length greater than available input",
            ));
        }

        if sealed_len < TAG_LEN {
            return Err(format_error(
                ErrorKind::BinaryFormat,
                "sealed box shorter than its authentication tag",
            ));
        }

        let sealed = input[pos..pos + sealed_len].to_vec();
        pos += sealed_len;

        if pos < input.len() {
            return Err(format_error(
                ErrorKind::TrailingData,
                "invalid input: unexpected data after sealed box",
            ));
        }

        Ok(Self {
            key_id,
            nonce,
            sealed,
        })
    }

    /// The armored text form, e.g. `pwcipher1:AAAAAQ...`.
    pub fn to_armored(&self) -> String {
        armor::wrap(&self.to_bytes())
    }

    /// Parse the armored text form.
    pub fn from_armored(armored: &str) -> Result<Self> {
        let bytes = armor::unwrap(armored)?;
        Self::from_bytes(&bytes)
    }
}

// Nonces and ciphertext are not secret, but there is no reason to spill
// them into logs either.
impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("key_id", &self.key_id)
            .field("sealed_len", &self.sealed.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_armored())
    }
}

impl FromStr for Envelope {
    type Err = PwcipherError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_armored(s)
    }
}

fn format_error(kind: ErrorKind, msg: &str) -> PwcipherError {
    PwcipherError::with_kind(Operation::Decrypt, ErrorCategory::User, kind, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LEN: usize = KEY_ID_LEN + NONCE_LEN + 8;

    fn sample() -> Envelope {
        Envelope::new(KeyId::new(7), [0x24; NONCE_LEN], vec![0xAB; TAG_LEN + 5])
    }

    #[test]
    fn test_layout() {
        let bytes = sample().to_bytes();

        assert_eq!(&bytes[..4], &[0, 0, 0, 7]);
        assert_eq!(&bytes[4..28], &[0x24; NONCE_LEN]);
        assert_eq!(&bytes[28..36], &21i64.to_be_bytes());
        assert_eq!(bytes.len(), HEADER_LEN + 21);

        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_armored_parse() {
        let text = sample().to_string();
        assert!(text.starts_with("pwcipher1:"));
        let parsed: Envelope = text.parse().unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_truncated_key_id() {
        let err = Envelope::from_bytes(&[0, 0]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("reading key id"));
    }

    #[test]
    fn test_truncated_nonce() {
        let err = Envelope::from_bytes(&[0u8; KEY_ID_LEN + 3]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("reading nonce"));
    }

    #[test]
    fn test_truncated_length() {
        let err = Envelope::from_bytes(&[0u8; KEY_ID_LEN + NONCE_LEN + 3]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.to_string().contains("reading sealed box"));
    }

    #[test]
    fn test_negative_length() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[KEY_ID_LEN + NONCE_LEN..].copy_from_slice(&(-1i64).to_be_bytes());

        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
        assert!(err.to_string().contains("negative sealed box length"));
    }

    #[test]
    fn test_length_exceeds_available() {
        let mut bytes = sample().to_bytes();
        bytes[KEY_ID_LEN + NONCE_LEN..HEADER_LEN].copy_from_slice(&1_000_000i64.to_be_bytes());

        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(
            err.to_string()
                .contains("claimed length greater than available input")
        );
    }

    #[test]
    fn test_sealed_box_shorter_than_tag() {
        let short = Envelope::new(KeyId::new(1), [0; NONCE_LEN], vec![0; TAG_LEN - 1]);
        let err = Envelope::from_bytes(&short.to_bytes()).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_trailing_data() {
        let mut bytes = sample().to_bytes();
        bytes.push(0xFF);

        let err = Envelope::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TrailingData));
    }

    #[test]
    fn test_debug_hides_payload() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("key_id"));
        assert!(!rendered.contains("171")); // 0xAB
    }
}
