//! Thin wrapper around DAG-CBOR, the one binary encoding used for
//! envelopes, signed payloads and response bodies.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::EnvelopeError;

pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EnvelopeError> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| EnvelopeError::Encode(e.to_string()))
}

pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EnvelopeError> {
    serde_ipld_dagcbor::from_slice(bytes).map_err(|e| EnvelopeError::Decode(e.to_string()))
}
