//! Versioned text armoring for envelopes
//!
//! Provides base64url encoding with a version prefix. The armored format is:
//! - Free of whitespace (including newlines)
//! - Safe to embed in URLs
//! - Safe to pass unescaped in a POSIX shell

use crate::error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Magic prefix shared by all envelope versions
const MAGIC_PREFIX: &str = "pwcipher";

/// Version 1 magic marker
const V1_MAGIC: &str = "pwcipher1:";

/// Wrap bytes in armor, returning the armored string
///
/// Format: pwcipher1:{base64url-no-padding}
pub fn wrap(body: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(body);
    format!("{}{}", V1_MAGIC, encoded)
}

/// Unwrap an armored string, returning the original bytes
pub fn unwrap(armored: &str) -> Result<Vec<u8>> {
    if armored.len() < V1_MAGIC.len() {
        return Err(PwcipherError::with_kind(
            Operation::Decrypt,
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input size smaller than magic marker; likely truncated",
        ));
    }

    if let Some(encoded) = armored.strip_prefix(V1_MAGIC) {
        let body = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            PwcipherError::with_kind_and_source(
                Operation::Decrypt,
                ErrorCategory::User,
                ErrorKind::ArmoringDecode,
                format!("base64 decoding failed: {}", e),
                e,
            )
        })?;
        Ok(body)
    } else if armored.starts_with(MAGIC_PREFIX) {
        Err(PwcipherError::with_kind(
            Operation::Decrypt,
            ErrorCategory::User,
            ErrorKind::ArmoringFromFuture,
            "input claims to be a pwcipher envelope, but not a version we support",
        ))
    } else {
        Err(PwcipherError::with_kind(
            Operation::Decrypt,
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input unrecognized as a pwcipher envelope",
        ))
    }
}
