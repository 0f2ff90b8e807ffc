//! Loading the keyring from process configuration.
//!
//! All values are read from `PWCIPHER_*` environment variables. Exactly one
//! primary key source must be configured:
//!
//! - `PWCIPHER_KEY`: base64 encoded 32-byte key
//! - `PWCIPHER_KEY_FILE`: path to a file holding the base64 key
//! - `PWCIPHER_PASSPHRASE` with `PWCIPHER_SALT`: key derived with scrypt
//!
//! Old keys that must still open existing envelopes go in
//! `PWCIPHER_RETIRED_KEYS` as a comma separated `id:base64key` list.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use base64::{Engine, engine::general_purpose::STANDARD};
use config::Environment;
use serde::Deserialize;
use tracing::info;

use crate::error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};
use crate::key::{DEFAULT_SCRYPT_LOG_N, KeyId, Keyring, MAX_SCRYPT_LOG_N, SecretKey};

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "PWCIPHER";

/// Keyring configuration as read from the environment.
#[derive(Clone, Deserialize)]
pub struct CipherConfig {
    /// Base64 primary key.
    #[serde(default)]
    pub key: Option<String>,

    /// File containing the base64 primary key.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Passphrase to derive the primary key from.
    #[serde(default)]
    pub passphrase: Option<String>,

    /// Base64 scrypt salt, required with `passphrase`.
    #[serde(default)]
    pub salt: Option<String>,

    /// scrypt cost as log2(N).
    #[serde(default = "default_scrypt_log_n")]
    pub scrypt_log_n: u8,

    /// Id recorded in envelopes sealed with the primary key.
    #[serde(default = "default_key_id")]
    pub key_id: u32,

    /// `id:base64key` pairs, comma separated.
    #[serde(default)]
    pub retired_keys: Option<String>,
}

fn default_scrypt_log_n() -> u8 {
    DEFAULT_SCRYPT_LOG_N
}

fn default_key_id() -> u32 {
    KeyId::default().get()
}

impl CipherConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit set of variables, as if they
    /// were the environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(map)))
    }

    fn load(env: Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .map_err(|e| config_error_with_source("failed to read configuration", e))?;

        cfg.try_deserialize()
            .map_err(|e| config_error_with_source("failed to deserialise configuration", e))
    }

    /// Validate the configuration and build the keyring it describes.
    pub fn into_keyring(self) -> Result<Keyring> {
        if self.key_id == 0 {
            return Err(config_error("PWCIPHER_KEY_ID must be > 0"));
        }
        if self.scrypt_log_n == 0 || self.scrypt_log_n > MAX_SCRYPT_LOG_N {
            return Err(config_error(format!(
                "PWCIPHER_SCRYPT_LOG_N must be between 1 and {}, got {}",
                MAX_SCRYPT_LOG_N, self.scrypt_log_n
            )));
        }

        let key = non_empty(&self.key);
        let key_file = self.key_file.as_ref().filter(|p| !p.as_os_str().is_empty());
        // Whitespace is significant in a passphrase, so only "" counts as unset.
        let passphrase = self.passphrase.as_deref().filter(|p| !p.is_empty());
        let salt = non_empty(&self.salt);

        let sources = [key.is_some(), key_file.is_some(), passphrase.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if sources != 1 {
            return Err(config_error(format!(
                "exactly one of PWCIPHER_KEY, PWCIPHER_KEY_FILE or PWCIPHER_PASSPHRASE \
                 must be set, found {}",
                sources
            )));
        }
        if salt.is_some() && passphrase.is_none() {
            return Err(config_error(
                "PWCIPHER_SALT is only meaningful with PWCIPHER_PASSPHRASE",
            ));
        }

        let primary = if let Some(encoded) = key {
            SecretKey::from_base64(encoded)?
        } else if let Some(path) = key_file {
            let contents = zeroize::Zeroizing::new(fs::read_to_string(path).map_err(|e| {
                PwcipherError::with_kind_and_source(
                    Operation::Configure,
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to read key file {}", path.display()),
                    e,
                )
            })?);
            SecretKey::from_base64(&contents)
                .map_err(|e| e.with_context(format!("invalid key in {}", path.display())))?
        } else {
            let passphrase = passphrase.unwrap_or_default();
            if passphrase.trim().is_empty() {
                return Err(config_error(
                    "PWCIPHER_PASSPHRASE must not consist only of whitespace",
                ));
            }
            let salt = salt.ok_or_else(|| {
                config_error("PWCIPHER_SALT is required with PWCIPHER_PASSPHRASE")
            })?;
            let salt = STANDARD
                .decode(salt)
                .map_err(|e| config_error_with_source("PWCIPHER_SALT is not valid base64", e))?;
            SecretKey::derive(passphrase.as_bytes(), &salt, self.scrypt_log_n)?
        };

        let mut keyring = Keyring::new(KeyId::new(self.key_id), primary);
        if let Some(retired) = non_empty(&self.retired_keys) {
            for (id, key) in parse_retired(retired)? {
                keyring = keyring.with_retired(id, key)?;
            }
        }

        info!(
            primary_key_id = self.key_id,
            keys = keyring.len(),
            "keyring loaded from configuration"
        );
        Ok(keyring)
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("salt", &self.salt)
            .field("scrypt_log_n", &self.scrypt_log_n)
            .field("key_id", &self.key_id)
            .field(
                "retired_keys",
                &self.retired_keys.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn parse_retired(list: &str) -> Result<Vec<(KeyId, SecretKey)>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, key) = entry.split_once(':').ok_or_else(|| {
                config_error("PWCIPHER_RETIRED_KEYS entries must look like id:base64key")
            })?;
            let id: u32 = id.trim().parse().map_err(|e| {
                config_error_with_source(
                    format!("invalid retired key id {:?}", id.trim()),
                    e,
                )
            })?;
            let key = SecretKey::from_base64(key)
                .map_err(|e| e.with_context(format!("invalid retired key {}", id)))?;
            Ok((KeyId::new(id), key))
        })
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn config_error(msg: impl Into<String>) -> PwcipherError {
    PwcipherError::with_kind(
        Operation::Configure,
        ErrorCategory::User,
        ErrorKind::Config,
        msg,
    )
}

fn config_error_with_source(
    msg: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> PwcipherError {
    PwcipherError::with_kind_and_source(
        Operation::Configure,
        ErrorCategory::User,
        ErrorKind::Config,
        msg,
        source,
    )
}
