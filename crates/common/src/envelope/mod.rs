//! Signed request envelopes
//!
//! Every request is the DAG-CBOR array
//!
//! ```text
//! [op, public_key, signature, payload]
//! ```
//!
//! where `payload` is itself the encoded tuple the signature covers:
//!
//! | op | code | payload |
//! |----|------|---------|
//! | Write | 1 | `(timestamp, path, ContentRecord, PublishedView)` |
//! | Read | 2 | `(timestamp, path)` |
//! | RotatePassword | 3 | `(timestamp, path, new_public_key)` |
//!
//! `timestamp` is seconds since the Unix epoch at send time. It only exists
//! so the gateway can reject replays outside its freshness window.

use serde_bytes::{ByteBuf, Bytes};

use crate::content::{ContentRecord, PublishedView};
use crate::crypto::{Identity, KeyError, PublicKey, Signature};
use crate::path::{validate_path, PathError};

pub mod codec;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("unknown operation code: {0}")]
    UnknownOp(u8),
    #[error("invalid public key: {0}")]
    Key(#[from] KeyError),
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature verification failed")]
    BadSignature,
    #[error("invalid path: {0}")]
    Path(#[from] PathError),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Operation codes as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Write = 1,
    Read = 2,
    RotatePassword = 3,
}

impl TryFrom<u8> for OpCode {
    type Error = EnvelopeError;
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(OpCode::Write),
            2 => Ok(OpCode::Read),
            3 => Ok(OpCode::RotatePassword),
            other => Err(EnvelopeError::UnknownOp(other)),
        }
    }
}

/// Operation-specific part of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Read,
    Write {
        record: ContentRecord,
        view: PublishedView,
    },
    RotatePassword {
        new_key: PublicKey,
    },
}

impl Operation {
    pub fn code(&self) -> OpCode {
        match self {
            Operation::Read => OpCode::Read,
            Operation::Write { .. } => OpCode::Write,
            Operation::RotatePassword { .. } => OpCode::RotatePassword,
        }
    }
}

/// The signed content of an envelope, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub timestamp: i64,
    pub path: String,
    pub operation: Operation,
}

impl Request {
    /// A request for `path` stamped with the current time.
    pub fn new(path: impl Into<String>, operation: Operation) -> Self {
        Self {
            timestamp: unix_now(),
            path: path.into(),
            operation,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>, EnvelopeError> {
        let path = self.path.as_str();
        match &self.operation {
            Operation::Read => codec::to_vec(&(self.timestamp, path)),
            Operation::Write { record, view } => {
                codec::to_vec(&(self.timestamp, path, record, view))
            }
            Operation::RotatePassword { new_key } => {
                let new_key = new_key.to_bytes();
                codec::to_vec(&(self.timestamp, path, Bytes::new(&new_key)))
            }
        }
    }

    fn decode_payload(op: OpCode, payload: &[u8]) -> Result<Self, EnvelopeError> {
        let (timestamp, path, operation) = match op {
            OpCode::Read => {
                let (timestamp, path): (i64, String) = codec::from_slice(payload)?;
                (timestamp, path, Operation::Read)
            }
            OpCode::Write => {
                let (timestamp, path, record, view): (i64, String, ContentRecord, PublishedView) =
                    codec::from_slice(payload)?;
                (timestamp, path, Operation::Write { record, view })
            }
            OpCode::RotatePassword => {
                let (timestamp, path, new_key): (i64, String, ByteBuf) =
                    codec::from_slice(payload)?;
                let new_key = PublicKey::try_from(new_key.as_slice())?;
                (timestamp, path, Operation::RotatePassword { new_key })
            }
        };
        Ok(Self {
            timestamp,
            path,
            operation,
        })
    }
}

/// A request as sent over the wire: `(op, public_key, signature, payload)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub op: OpCode,
    pub public_key: PublicKey,
    pub signature: Signature,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Encode and sign `request` with `identity`.
    pub fn sign(identity: &Identity, request: &Request) -> Result<Self, EnvelopeError> {
        let payload = request.encode_payload()?;
        let signature = identity.sign(&payload);
        Ok(Self {
            op: request.operation.code(),
            public_key: identity.public(),
            signature,
            payload,
        })
    }

    /// Ask for the owner's record of `path`.
    pub fn read(identity: &Identity, path: &str) -> Result<Self, EnvelopeError> {
        Self::sign(identity, &Request::new(path, Operation::Read))
    }

    /// Publish `record` and its derived `view` under `path`.
    pub fn write(
        identity: &Identity,
        path: &str,
        record: ContentRecord,
        view: PublishedView,
    ) -> Result<Self, EnvelopeError> {
        Self::sign(identity, &Request::new(path, Operation::Write { record, view }))
    }

    /// Hand ownership of `path` to `new_key`, signed by the current owner.
    pub fn rotate_password(
        identity: &Identity,
        path: &str,
        new_key: PublicKey,
    ) -> Result<Self, EnvelopeError> {
        Self::sign(
            identity,
            &Request::new(path, Operation::RotatePassword { new_key }),
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let public_key = self.public_key.to_bytes();
        let signature = self.signature.to_bytes();
        codec::to_vec(&(
            self.op as u8,
            Bytes::new(&public_key),
            Bytes::new(&signature),
            Bytes::new(&self.payload),
        ))
    }

    /// Parse the outer array. Does not check the signature; see [`Envelope::open`].
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let (op, public_key, signature, payload): (u8, ByteBuf, ByteBuf, ByteBuf) =
            codec::from_slice(bytes)?;
        let op = OpCode::try_from(op)?;
        let public_key = PublicKey::try_from(public_key.as_slice())?;
        let signature = Signature::from_slice(signature.as_slice())
            .map_err(|_| EnvelopeError::MalformedSignature)?;
        Ok(Self {
            op,
            public_key,
            signature,
            payload: payload.into_vec(),
        })
    }

    /// Verify the signature and decode the signed payload.
    pub fn open(&self) -> Result<Request, EnvelopeError> {
        self.public_key
            .verify(&self.payload, &self.signature)
            .map_err(|_| EnvelopeError::BadSignature)?;
        let request = Request::decode_payload(self.op, &self.payload)?;
        validate_path(&request.path)?;
        Ok(request)
    }
}

/// Encode a record as a read response body.
pub fn encode_record(record: &ContentRecord) -> Result<Vec<u8>, EnvelopeError> {
    codec::to_vec(record)
}

/// Decode a read response body.
pub fn decode_record(bytes: &[u8]) -> Result<ContentRecord, EnvelopeError> {
    codec::from_slice(bytes)
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::derive_view;
    use crate::crypto::DerivationParams;

    fn identity(password: &str) -> Identity {
        Identity::derive_with("abc", password, DerivationParams::with_rounds(16))
    }

    fn redirect() -> ContentRecord {
        ContentRecord::Redirect {
            redir: "https://example.com".into(),
        }
    }

    #[test]
    fn test_write_envelope_opens_to_request() {
        let owner = identity("");
        let record = redirect();
        let view = derive_view(&record, None);
        let envelope = Envelope::write(&owner, "abc", record.clone(), view.clone()).unwrap();
        assert_eq!(envelope.op, OpCode::Write);

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);

        let request = decoded.open().unwrap();
        assert_eq!(request.path, "abc");
        assert_eq!(request.operation, Operation::Write { record, view });
    }

    #[test]
    fn test_rotate_envelope_carries_new_key() {
        let owner = identity("");
        let next = identity("xyz");
        let envelope = Envelope::rotate_password(&owner, "abc", next.public()).unwrap();

        let request = Envelope::decode(&envelope.encode().unwrap())
            .unwrap()
            .open()
            .unwrap();
        assert_eq!(envelope.public_key, owner.public());
        assert_eq!(
            request.operation,
            Operation::RotatePassword {
                new_key: next.public()
            }
        );
    }

    #[test]
    fn test_read_timestamp_is_signed() {
        let owner = identity("");
        let request = Request {
            timestamp: 1_700_000_000,
            path: "abc".into(),
            operation: Operation::Read,
        };
        let envelope = Envelope::sign(&owner, &request).unwrap();
        assert_eq!(envelope.open().unwrap(), request);

        let mut replayed = envelope.clone();
        replayed.payload = codec::to_vec(&(1_800_000_000i64, "abc")).unwrap();
        assert!(matches!(
            replayed.open(),
            Err(EnvelopeError::BadSignature)
        ));
    }

    #[test]
    fn test_signature_from_other_key_rejected() {
        let owner = identity("");
        let mut envelope = Envelope::read(&owner, "abc").unwrap();
        envelope.public_key = identity("other").public();
        assert!(matches!(envelope.open(), Err(EnvelopeError::BadSignature)));
    }

    #[test]
    fn test_payload_must_match_op() {
        let owner = identity("");
        let mut envelope = Envelope::read(&owner, "abc").unwrap();
        envelope.op = OpCode::RotatePassword;
        assert!(matches!(envelope.open(), Err(EnvelopeError::Decode(_))));
    }

    #[test]
    fn test_signed_bad_path_rejected() {
        let owner = identity("");
        let envelope = Envelope::read(&owner, "not/a/path").unwrap();
        assert!(matches!(envelope.open(), Err(EnvelopeError::Path(_))));
    }

    #[test]
    fn test_unknown_op_rejected() {
        let bytes = codec::to_vec(&(
            9u8,
            Bytes::new(&[0u8; 32]),
            Bytes::new(&[0u8; 64]),
            Bytes::new(&[]),
        ))
        .unwrap();
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(EnvelopeError::UnknownOp(9))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            Envelope::decode(b"not cbor at all"),
            Err(EnvelopeError::Decode(_))
        ));
    }

    #[test]
    fn test_record_response_round_trip() {
        let record = ContentRecord::Markdown {
            markdown: "---\ntitle: t\n---\nbody".into(),
        };
        let bytes = encode_record(&record).unwrap();
        assert_eq!(decode_record(&bytes).unwrap(), record);
        assert_eq!(
            decode_record(&encode_record(&ContentRecord::Raw).unwrap()).unwrap(),
            ContentRecord::Raw
        );
    }
}
