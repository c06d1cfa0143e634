use ed25519_dalek::Signature;
use sha2::Sha256;

use super::keys::{PublicKey, SecretKey};

/// Namespace prepended to the path to form the PBKDF2 salt.
///
/// Embedding the path means one password yields unrelated keys on
/// different paths.
pub const SALT_PREFIX: &str = "latch/v1/path:";
/// PBKDF2-HMAC-SHA256 iteration count assumed by every client.
pub const PBKDF2_ROUNDS: u32 = 100_000;
/// Length of the stretched seed, which is also the Ed25519 seed length.
pub const SEED_SIZE: usize = 32;

/// Tunables for identity derivation.
///
/// Only the iteration count is exposed. Anything other than
/// [`DerivationParams::PROTOCOL`] produces keys no other client will
/// reproduce, so lowering it is only useful in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationParams {
    rounds: u32,
}

impl DerivationParams {
    pub const PROTOCOL: Self = Self {
        rounds: PBKDF2_ROUNDS,
    };

    pub fn with_rounds(rounds: u32) -> Self {
        Self {
            rounds: rounds.max(1),
        }
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

impl Default for DerivationParams {
    fn default() -> Self {
        Self::PROTOCOL
    }
}

/// Salt used when stretching the password for `path`.
pub fn salt_for(path: &str) -> String {
    format!("{SALT_PREFIX}{path}")
}

/// Signing identity for one (path, password) combination
///
/// Derived, never persisted. The same inputs always give the same keypair,
/// which is what lets the password stand in for an account.
#[derive(Debug, Clone)]
pub struct Identity {
    secret: SecretKey,
}

impl Identity {
    /// Derive the identity for `path` using the protocol parameters.
    pub fn derive(path: &str, password: &str) -> Self {
        Self::derive_with(path, password, DerivationParams::PROTOCOL)
    }

    /// Derive the identity for `path` with explicit parameters.
    ///
    /// This is deliberately expensive. Callers on an event loop should run
    /// it on a blocking worker.
    pub fn derive_with(path: &str, password: &str, params: DerivationParams) -> Self {
        let mut seed = [0u8; SEED_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            salt_for(path).as_bytes(),
            params.rounds,
            &mut seed,
        );
        let secret = SecretKey::from(seed);
        tracing::trace!(public_key = %secret.public(), "derived identity");
        Self { secret }
    }

    pub fn public(&self) -> PublicKey {
        self.secret.public()
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn sign(&self, msg: &[u8]) -> Signature {
        self.secret.sign(msg)
    }
}
