use std::error::Error as StdError;

use thiserror::Error;

/// The operation that was in progress when an error occurred.
///
/// This is the split callers usually care about: an error tagged
/// [`Operation::Encrypt`] is an encryption error, one tagged
/// [`Operation::Decrypt`] is a decryption error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Operation {
    /// Sealing plaintext into an envelope.
    Encrypt,
    /// Parsing, opening or verifying an envelope.
    Decrypt,
    /// Loading configuration, building keys or installing the process cipher.
    Configure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The caller provided invalid input, configuration or an envelope that
    /// cannot be opened.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The armored representation is malformed (prefix or unsupported version).
    ArmoringInvalid,
    /// Base64 decoding of the armored payload failed.
    ArmoringDecode,
    /// Input claimed to be a pwcipher envelope but used a future/unsupported version.
    ArmoringFromFuture,
    /// Length fields or binary layout of the envelope are invalid.
    BinaryFormat,
    /// Input data ended before the expected component could be read.
    TruncatedInput,
    /// Additional bytes were present after the sealed payload.
    TrailingData,
    /// Authentication failed due to a wrong key, tampering or corruption.
    AuthenticationFailed,
    /// The envelope names a key id that is not in the keyring.
    UnknownKeyId,
    /// Key material has the wrong length or encoding.
    KeyInvalid,
    /// No key (or no process-wide cipher) has been configured.
    KeyUnavailable,
    /// Plaintext exceeds the maximum accepted length.
    PlaintextTooLong,
    /// The randomness source could not produce a nonce.
    RandomnessFailure,
    /// Low-level scrypt key derivation failed.
    ScryptFailure,
    /// NaCl secretbox (XSalsa20Poly1305) failed to seal data.
    SecretboxFailure,
    /// Decrypted plaintext was requested as a string but is not UTF-8.
    InvalidUtf8,
    /// Configuration is missing, contradictory or malformed.
    Config,
    /// A process-wide cipher was already installed.
    AlreadyInstalled,
    /// Reading a key file failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct PwcipherError {
    /// Operation that failed, always provided.
    pub operation: Operation,
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl PwcipherError {
    /// Creates a new error with a required operation, category and display message.
    pub fn new(operation: Operation, category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            operation,
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(
        operation: Operation,
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        operation: Operation,
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            operation,
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// True if the failure happened while encrypting.
    pub fn is_encryption_error(&self) -> bool {
        self.operation == Operation::Encrypt
    }

    /// True if the failure happened while decrypting or parsing an envelope.
    pub fn is_decryption_error(&self) -> bool {
        self.operation == Operation::Decrypt
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let operation = self.operation;
        let category = self.category;
        let kind = self.kind;
        Self {
            operation,
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PwcipherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_split() {
        let enc = PwcipherError::new(Operation::Encrypt, ErrorCategory::Internal, "x");
        assert!(enc.is_encryption_error());
        assert!(!enc.is_decryption_error());

        let dec = PwcipherError::with_kind(
            Operation::Decrypt,
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "y",
        );
        assert!(dec.is_decryption_error());
        assert_eq!(dec.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_context_preserves_tags_and_chain() {
        let inner = PwcipherError::with_kind(
            Operation::Decrypt,
            ErrorCategory::User,
            ErrorKind::TruncatedInput,
            "input likely truncated while reading nonce",
        );
        let outer = inner.with_context("failed to open envelope");

        assert_eq!(outer.to_string(), "failed to open envelope");
        assert_eq!(outer.kind, Some(ErrorKind::TruncatedInput));
        assert_eq!(outer.operation, Operation::Decrypt);
        let source = outer.source_error().expect("source retained");
        assert!(source.to_string().contains("truncated while reading nonce"));
    }
}
