/**
 * Cryptographic types and operations.
 *  - Ed25519 public and secret key wrappers
 *  - Deterministic identity derivation from a
 *    (path, password) pair
 */
pub mod crypto;
/**
 * What an owner publishes under a path: the private
 *  record, the editing draft that produces it, and
 *  the public view served to visitors.
 */
pub mod content;
/**
 * Signed request envelopes and the compact binary
 *  codec shared by requests and responses.
 */
pub mod envelope;
/**
 * Rules for which strings can be claimed as a path.
 */
pub mod path;

pub mod prelude {
    pub use crate::content::{
        derive_view, ContentKind, ContentRecord, Draft, PublishedView, RawUpload,
    };
    pub use crate::crypto::{DerivationParams, Identity, PublicKey, SecretKey, Signature};
    pub use crate::envelope::{Envelope, EnvelopeError, OpCode, Operation, Request};
    pub use crate::path::{validate_path, PathError};
}
