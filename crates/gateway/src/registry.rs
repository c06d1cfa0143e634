use std::collections::HashMap;
use std::time::Duration;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use parking_lot::RwLock;

use common::content::{ContentRecord, PublishedView};
use common::crypto::PublicKey;
use common::envelope::{encode_record, Envelope, EnvelopeError, Operation};

/// Everything stored for a claimed path.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub owner: PublicKey,
    pub record: ContentRecord,
    pub view: PublishedView,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid request: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("request timestamp {timestamp} is outside the freshness window (now {now})")]
    Stale { timestamp: i64, now: i64 },
    #[error("path is not claimed")]
    NotFound,
    #[error("signer does not own this path")]
    NotOwner,
    #[error("failed to encode response: {0}")]
    Encode(String),
}

impl RegistryError {
    /// Status code the wire contract assigns to this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            RegistryError::Envelope(EnvelopeError::BadSignature) => StatusCode::UNAUTHORIZED,
            RegistryError::Envelope(_) | RegistryError::Stale { .. } => StatusCode::BAD_REQUEST,
            RegistryError::NotFound => StatusCode::NOT_FOUND,
            RegistryError::NotOwner => StatusCode::FORBIDDEN,
            RegistryError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("registry error: {}", self);
            return (status, "Unexpected error".to_string()).into_response();
        }
        (status, self.to_string()).into_response()
    }
}

/// In-memory table of claimed paths
///
/// Ownership is first-write-wins: the first signed write to an unclaimed
/// path makes the signer its owner. After that only the owner can read,
/// overwrite, or hand the path to a new key.
#[derive(Debug)]
pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
    freshness_window: Duration,
}

impl Registry {
    pub fn new(freshness_window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            freshness_window,
        }
    }

    /// Handle one encoded envelope, returning the response body.
    ///
    /// Writes replace the whole entry under a single lock, so a failed
    /// request never leaves a partial update behind.
    pub fn apply(&self, body: &[u8], now: i64) -> Result<Vec<u8>, RegistryError> {
        let envelope = Envelope::decode(body)?;
        let request = envelope.open()?;

        if now.abs_diff(request.timestamp) > self.freshness_window.as_secs() {
            return Err(RegistryError::Stale {
                timestamp: request.timestamp,
                now,
            });
        }

        let signer = envelope.public_key;
        let path = request.path;
        match request.operation {
            Operation::Read => {
                let entries = self.entries.read();
                let entry = entries.get(&path).ok_or(RegistryError::NotFound)?;
                if entry.owner != signer {
                    return Err(RegistryError::NotOwner);
                }
                encode_record(&entry.record).map_err(|e| RegistryError::Encode(e.to_string()))
            }
            Operation::Write { record, view } => {
                let mut entries = self.entries.write();
                match entries.get(&path) {
                    Some(entry) if entry.owner != signer => return Err(RegistryError::NotOwner),
                    Some(_) => tracing::info!(path = %path, kind = %record.kind(), "updated path"),
                    None => {
                        tracing::info!(path = %path, owner = %signer, kind = %record.kind(), "claimed path")
                    }
                }
                entries.insert(
                    path,
                    Entry {
                        owner: signer,
                        record,
                        view,
                    },
                );
                Ok(Vec::new())
            }
            Operation::RotatePassword { new_key } => {
                let mut entries = self.entries.write();
                let entry = entries.get_mut(&path).ok_or(RegistryError::NotFound)?;
                if entry.owner != signer {
                    return Err(RegistryError::NotOwner);
                }
                tracing::info!(path = %path, owner = %new_key, "rotated owner key");
                entry.owner = new_key;
                Ok(Vec::new())
            }
        }
    }

    /// The view served to visitors of `path`.
    pub fn view(&self, path: &str) -> Option<PublishedView> {
        self.entries.read().get(path).map(|entry| entry.view.clone())
    }

    pub fn get(&self, path: &str) -> Option<Entry> {
        self.entries.read().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use common::content::derive_view;
    use common::crypto::{DerivationParams, Identity};
    use common::envelope::{decode_record, unix_now, Request};

    use super::*;

    const WINDOW: Duration = Duration::from_secs(300);

    fn identity(password: &str) -> Identity {
        Identity::derive_with("abc", password, DerivationParams::with_rounds(16))
    }

    fn redirect(url: &str) -> ContentRecord {
        ContentRecord::Redirect { redir: url.into() }
    }

    fn write(registry: &Registry, who: &Identity, record: ContentRecord) -> Result<Vec<u8>, RegistryError> {
        let view = derive_view(&record, None);
        let envelope = Envelope::write(who, "abc", record, view).unwrap();
        registry.apply(&envelope.encode().unwrap(), unix_now())
    }

    fn read(registry: &Registry, who: &Identity) -> Result<Vec<u8>, RegistryError> {
        let envelope = Envelope::read(who, "abc").unwrap();
        registry.apply(&envelope.encode().unwrap(), unix_now())
    }

    #[test]
    fn test_unclaimed_read_is_not_found() {
        let registry = Registry::new(WINDOW);
        let err = read(&registry, &identity("")).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_first_write_claims_and_reads_back() {
        let registry = Registry::new(WINDOW);
        let owner = identity("");

        assert!(write(&registry, &owner, redirect("https://example.com"))
            .unwrap()
            .is_empty());
        let body = read(&registry, &owner).unwrap();
        assert_eq!(
            decode_record(&body).unwrap(),
            redirect("https://example.com")
        );
        assert_eq!(registry.get("abc").unwrap().owner, owner.public());
        assert_eq!(
            registry.view("abc"),
            Some(PublishedView::Redirect {
                url: "https://example.com".into()
            })
        );
    }

    #[test]
    fn test_non_owner_cannot_read_or_write() {
        let registry = Registry::new(WINDOW);
        let owner = identity("");
        let intruder = identity("xyz");
        write(&registry, &owner, redirect("https://example.com")).unwrap();

        let err = read(&registry, &intruder).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = write(&registry, &intruder, redirect("https://evil.example")).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            registry.get("abc").unwrap().record,
            redirect("https://example.com")
        );
    }

    #[test]
    fn test_rotate_moves_ownership() {
        let registry = Registry::new(WINDOW);
        let owner = identity("");
        let next = identity("xyz");
        write(&registry, &owner, redirect("https://example.com")).unwrap();

        let rotate = Envelope::rotate_password(&owner, "abc", next.public()).unwrap();
        registry
            .apply(&rotate.encode().unwrap(), unix_now())
            .unwrap();

        assert_eq!(
            read(&registry, &owner).unwrap_err().status(),
            StatusCode::FORBIDDEN
        );
        assert!(read(&registry, &next).is_ok());
    }

    #[test]
    fn test_rotate_requires_owner_and_claim() {
        let registry = Registry::new(WINDOW);
        let owner = identity("");
        let next = identity("xyz");

        let rotate = Envelope::rotate_password(&owner, "abc", next.public()).unwrap();
        let err = registry
            .apply(&rotate.encode().unwrap(), unix_now())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        write(&registry, &owner, redirect("https://example.com")).unwrap();
        let hijack = Envelope::rotate_password(&next, "abc", next.public()).unwrap();
        let err = registry
            .apply(&hijack.encode().unwrap(), unix_now())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(registry.get("abc").unwrap().owner, owner.public());
    }

    #[test]
    fn test_stale_request_rejected() {
        let registry = Registry::new(WINDOW);
        let owner = identity("");
        let request = Request {
            timestamp: unix_now() - 3600,
            path: "abc".into(),
            operation: Operation::Read,
        };
        let envelope = Envelope::sign(&owner, &request).unwrap();
        let err = registry
            .apply(&envelope.encode().unwrap(), unix_now())
            .unwrap_err();
        assert!(matches!(err, RegistryError::Stale { .. }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let registry = Registry::new(WINDOW);
        let owner = identity("");
        for timestamp in [i64::MIN, i64::MAX] {
            let request = Request {
                timestamp,
                path: "abc".into(),
                operation: Operation::Read,
            };
            let envelope = Envelope::sign(&owner, &request).unwrap();
            let err = registry
                .apply(&envelope.encode().unwrap(), unix_now())
                .unwrap_err();
            assert!(matches!(err, RegistryError::Stale { .. }));
        }
    }

    #[test]
    fn test_huge_window_accepts_old_requests() {
        let registry = Registry::new(Duration::from_secs(u64::MAX));
        let owner = identity("");
        write(&registry, &owner, redirect("https://example.com")).unwrap();
        let request = Request {
            timestamp: 0,
            path: "abc".into(),
            operation: Operation::Read,
        };
        let envelope = Envelope::sign(&owner, &request).unwrap();
        assert!(registry
            .apply(&envelope.encode().unwrap(), unix_now())
            .is_ok());
    }

    #[test]
    fn test_tampered_signature_unauthorized() {
        let registry = Registry::new(WINDOW);
        let owner = identity("");
        let mut envelope = Envelope::read(&owner, "abc").unwrap();
        envelope.public_key = identity("other").public();
        let err = registry
            .apply(&envelope.encode().unwrap(), unix_now())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_garbage_is_bad_request() {
        let registry = Registry::new(WINDOW);
        let err = registry.apply(b"\x00\x01", unix_now()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(registry.is_empty());
    }
}
