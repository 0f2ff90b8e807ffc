//! Nonce generation

use std::sync::Mutex;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

use crate::envelope::NONCE_LEN;
use crate::error::{ErrorCategory, ErrorKind, Operation, PwcipherError, Result};

/// Source of per-envelope nonces.
///
/// Implementations are shared between threads by [`crate::PasswordCipher`],
/// so they must be usable through `&self`.
pub trait NonceSource: Send + Sync {
    /// Fill `nonce` with fresh bytes. Must never hand out the same nonce twice.
    fn fill_nonce(&self, nonce: &mut [u8; NONCE_LEN]) -> Result<()>;
}

/// Draws nonces from the operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn fill_nonce(&self, nonce: &mut [u8; NONCE_LEN]) -> Result<()> {
        OsRng.try_fill_bytes(nonce).map_err(|e| {
            PwcipherError::with_kind_and_source(
                Operation::Encrypt,
                ErrorCategory::Internal,
                ErrorKind::RandomnessFailure,
                format!("failed to read nonce from OS random source: {}", e),
                e,
            )
        })
    }
}

/// Deterministic nonces from a seeded PRNG (for testing).
///
/// Each call still advances the generator, so nonces within one source are
/// distinct; two sources with the same seed produce the same sequence.
#[derive(Debug)]
pub struct SeededNonceSource {
    rng: Mutex<StdRng>,
}

impl SeededNonceSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl NonceSource for SeededNonceSource {
    fn fill_nonce(&self, nonce: &mut [u8; NONCE_LEN]) -> Result<()> {
        let mut rng = self.rng.lock().map_err(|_| {
            PwcipherError::with_kind(
                Operation::Encrypt,
                ErrorCategory::Internal,
                ErrorKind::RandomnessFailure,
                "seeded nonce source lock poisoned",
            )
        })?;
        rng.fill_bytes(nonce);
        Ok(())
    }
}
