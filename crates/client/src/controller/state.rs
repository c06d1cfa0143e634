use std::fmt;

use common::content::Draft;
use common::crypto::PublicKey;

/// What the last successful read said about the current identity and path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// The current identity may write and rotate.
    pub owned: bool,
    /// Some identity has claimed the path.
    pub claimed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No usable path, or nothing settled yet after a failure.
    #[default]
    Idle,
    DerivingIdentity,
    Debouncing,
    Fetching,
    Settled(Settlement),
}

impl SyncState {
    pub fn settlement(&self) -> Option<Settlement> {
        match self {
            SyncState::Settled(settlement) => Some(*settlement),
            _ => None,
        }
    }

    /// Whether writes and rotations are allowed from this state.
    pub fn is_owned(&self) -> bool {
        matches!(self, SyncState::Settled(Settlement { owned: true, .. }))
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => f.write_str("idle"),
            SyncState::DerivingIdentity => f.write_str("deriving identity"),
            SyncState::Debouncing => f.write_str("debouncing"),
            SyncState::Fetching => f.write_str("fetching"),
            SyncState::Settled(Settlement { owned, claimed }) => {
                write!(f, "settled (owned: {owned}, claimed: {claimed})")
            }
        }
    }
}

/// Everything an observer of the controller can see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub state: SyncState,
    pub path: String,
    /// Key derived for the current path and password, once derivation is done.
    pub public_key: Option<PublicKey>,
    pub draft: Draft,
}

/// Failures worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Transient(String),
    Fatal(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Transient(message) => write!(f, "temporary failure: {message}"),
            Notice::Fatal(message) => write!(f, "error: {message}"),
        }
    }
}
