//! Shared test utilities for driving a sync controller against an
//! in-process gateway registry
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use client::{SyncConfig, SyncController, SyncHandle, Transport, TransportError};
use ::common::content::{derive_view, ContentRecord};
use ::common::crypto::{DerivationParams, Identity};
use ::common::envelope::{unix_now, Envelope, OpCode};
use gateway::Registry;

pub const DEBOUNCE: Duration = Duration::from_millis(20);

/// Transport that hands envelopes straight to a [`Registry`].
///
/// Records every call it receives, can pretend the network is down, and can
/// hold each request for a while before answering.
pub struct LocalTransport {
    pub registry: Arc<Registry>,
    calls: Mutex<Vec<(OpCode, String)>>,
    offline: AtomicBool,
    delay: Mutex<Duration>,
}

impl LocalTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(Registry::new(Duration::from_secs(300))),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Every (op, path) received so far, in order.
    pub fn calls(&self) -> Vec<(OpCode, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(op, _)| *op == OpCode::Read)
            .map(|(_, path)| path)
            .collect()
    }

    pub fn has_call(&self, op: OpCode) -> bool {
        self.calls().iter().any(|(code, _)| *code == op)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        if let Ok(envelope) = Envelope::decode(&body) {
            if let Ok(request) = envelope.open() {
                self.calls.lock().unwrap().push((envelope.op, request.path));
            }
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("connection refused".into()));
        }
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.registry
            .apply(&body, unix_now())
            .map_err(|e| TransportError::HttpStatus(e.status(), e.to_string()))
    }
}

pub fn sync_config() -> SyncConfig {
    SyncConfig {
        debounce: DEBOUNCE,
        derivation: DerivationParams::with_rounds(16),
    }
}

/// Start a controller already pointed at `path` with `password`.
pub fn controller(transport: &Arc<LocalTransport>, path: &str, password: &str) -> SyncHandle {
    let sync = SyncController::spawn(sync_config(), transport.clone());
    sync.set_path(path).unwrap();
    sync.set_password(password).unwrap();
    sync
}

/// Identity with the same parameters the test controllers use.
pub fn identity(path: &str, password: &str) -> Identity {
    Identity::derive_with(path, password, sync_config().derivation)
}

/// Claim `path` for `password` directly in the registry.
pub fn claim(transport: &LocalTransport, path: &str, password: &str, record: ContentRecord) {
    let owner = identity(path, password);
    let view = derive_view(&record, None);
    let envelope = Envelope::write(&owner, path, record, view).unwrap();
    transport
        .registry
        .apply(&envelope.encode().unwrap(), unix_now())
        .unwrap();
}

pub fn redirect(url: &str) -> ContentRecord {
    ContentRecord::Redirect { redir: url.into() }
}
