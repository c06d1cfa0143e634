use reqwest::StatusCode;

use common::path::PathError;

use crate::transport::TransportError;

/// Outcome of a request or controller operation that did not succeed
///
/// `Unclaimed` and `Unauthorized` are answers, not failures: the controller
/// folds them into its settled state. `Cancelled` means a newer request
/// superseded this one and should be ignored. `Transient` and `Fatal` are
/// the ones worth showing to a user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("path is not claimed yet")]
    Unclaimed,
    #[error("not authorized ({status}): {message}")]
    Unauthorized { status: StatusCode, message: String },
    #[error("request was superseded by a newer one")]
    Cancelled,
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("the current password does not own this path")]
    NotOwned,
    #[error("raw content has no upload attached")]
    MissingUpload,
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("sync controller has stopped")]
    Stopped,
}

impl SyncError {
    /// Whether this error should be reported to the user.
    pub fn is_reportable(&self) -> bool {
        matches!(self, SyncError::Transient(_) | SyncError::Fatal(_))
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::HttpStatus(StatusCode::NOT_FOUND, _) => SyncError::Unclaimed,
            TransportError::HttpStatus(status, message) if status.is_client_error() => {
                SyncError::Unauthorized { status, message }
            }
            TransportError::HttpStatus(status, message) => {
                SyncError::Transient(format!("HTTP status {status}: {message}"))
            }
            TransportError::Reqwest(e) => SyncError::Transient(e.to_string()),
            TransportError::Unreachable(message) => SyncError::Transient(message),
        }
    }
}
