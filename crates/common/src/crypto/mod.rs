//! Cryptographic primitives for latch
//!
//! There are no accounts. Whoever knows the password for a path can
//! recompute the signing key that owns it:
//!
//! - **Identity derivation**: PBKDF2-HMAC-SHA256 stretches the password,
//!   salted with a namespaced string that embeds the path, into a 32 byte
//!   seed. The seed is used directly as an Ed25519 secret key.
//! - **Authentication**: every request to the gateway carries the public key
//!   and an Ed25519 signature over the request payload. The gateway stores
//!   the owning public key per path, never the password.
//!
//! The KDF, salt construction and iteration count are protocol constants.
//! Changing any of them changes every derived key, which makes every
//! already claimed path unreachable.

mod identity;
mod keys;

pub use ed25519_dalek::Signature;
pub use identity::{salt_for, DerivationParams, Identity, PBKDF2_ROUNDS, SALT_PREFIX, SEED_SIZE};
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
