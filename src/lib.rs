//! pwcipher - authenticated password encryption under a configured key
//!
//! Passwords are sealed with NaCl secretbox (XSalsa20Poly1305) using a fresh
//! random nonce per call. The resulting [`Envelope`] records the key id and
//! nonce, so it can be opened later with nothing but the configured keyring.
//!
//! ```no_run
//! pwcipher::install_from_env()?;
//!
//! let envelope = pwcipher::encrypt("Hello123!")?;
//! assert_eq!(pwcipher::decrypt(&envelope)?, "Hello123!");
//! assert!(pwcipher::verify("Hello123!", &envelope));
//! assert!(!pwcipher::verify("wrong", &envelope));
//! # Ok::<(), pwcipher::PwcipherError>(())
//! ```

#![forbid(unsafe_code)]

pub mod armor;
pub mod cipher;
pub mod config;
pub mod envelope;
pub mod error;
pub mod global;
pub mod key;
pub mod nonce;

pub use cipher::{MAX_PLAINTEXT_LEN, PasswordCipher};
pub use crate::config::CipherConfig;
pub use envelope::Envelope;
pub use error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};
pub use global::{decrypt, encrypt, install, install_from_env, verify};
pub use key::{KeyId, Keyring, SecretKey};
pub use nonce::{NonceSource, OsNonceSource, SeededNonceSource};
