//! Reference gateway for latch
//!
//! Verifies signed envelopes, keeps the owner key, record and published view
//! per path in memory, and serves published views to visitors. It implements
//! the wire contract clients rely on; it does not persist anything.

pub mod config;
pub mod http_server;
pub mod registry;

pub use config::Config;
pub use http_server::{router, run, serve, GatewayState, HttpServerError};
pub use registry::{Entry, Registry, RegistryError};
