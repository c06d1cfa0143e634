//! Client side of the latch protocol
//!
//! A [`SyncController`] turns a path and password into a signing identity,
//! reads what the gateway holds for the path and tells the caller whether
//! that identity may publish. Requests go through a single-flight
//! [`Coordinator`] over any [`Transport`]; [`HttpTransport`] talks to a
//! real gateway.

pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use controller::{
    Edit, Notice, Settlement, Snapshot, SyncConfig, SyncController, SyncHandle, SyncState,
};
pub use coordinator::{Coordinator, PendingRequest};
pub use error::SyncError;
pub use transport::{HttpTransport, Transport, TransportError};
