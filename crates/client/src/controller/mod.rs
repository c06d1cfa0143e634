//! Keeps a draft consistent with what the gateway holds for a path
//!
//! The controller is an actor: one task owns the inputs (path and password),
//! the derived identity, the draft and the sync state, and every caller talks
//! to it through a [`SyncHandle`]. Changing the path or password starts a
//! cycle:
//!
//! ```text
//! DerivingIdentity -> Debouncing -> Fetching -> Settled { owned, claimed }
//! ```
//!
//! Each change bumps an input epoch. Derivations, timers and responses carry
//! the epoch they were started for and are dropped when it is stale, so a
//! slow answer for an old path can never overwrite the state of a new one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Sleep;

use common::content::{ContentKind, Draft, RawUpload};
use common::crypto::{DerivationParams, Identity};
use common::envelope::{decode_record, Envelope};
use common::path::validate_path;

use crate::coordinator::{Coordinator, PendingRequest};
use crate::error::SyncError;
use crate::transport::Transport;

mod state;

pub use state::{Notice, Settlement, Snapshot, SyncState};

/// Quiet period after the last input change before the gateway is asked.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Notices beyond this many unread ones are dropped.
const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub debounce: Duration,
    pub derivation: DerivationParams,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            derivation: DerivationParams::PROTOCOL,
        }
    }
}

/// A change to the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Kind(ContentKind),
    Redirect(String),
    Markdown(String),
    Html(String),
}

type Reply = oneshot::Sender<Result<(), SyncError>>;

enum Command {
    SetPath(String),
    SetPassword(String),
    Edit(Edit),
    Attach(RawUpload),
    Refresh,
    Publish(Reply),
    RotatePassword { new_password: String, reply: Reply },
    AwaitSettle(oneshot::Sender<Result<Settlement, SyncError>>),
}

/// Cloneable handle to a running [`SyncController`].
///
/// The controller stops once every handle is dropped.
#[derive(Clone)]
pub struct SyncHandle {
    commands: flume::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
    notices: flume::Receiver<Notice>,
}

impl SyncHandle {
    fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands.send(command).map_err(|_| SyncError::Stopped)
    }

    pub fn set_path(&self, path: impl Into<String>) -> Result<(), SyncError> {
        self.send(Command::SetPath(path.into()))
    }

    pub fn set_password(&self, password: impl Into<String>) -> Result<(), SyncError> {
        self.send(Command::SetPassword(password.into()))
    }

    pub fn edit(&self, edit: Edit) -> Result<(), SyncError> {
        self.send(Command::Edit(edit))
    }

    /// Attach bytes to publish when the draft is in raw mode.
    pub fn attach(&self, upload: RawUpload) -> Result<(), SyncError> {
        self.send(Command::Attach(upload))
    }

    /// Read again with the current identity. Ignored while another request
    /// or derivation is outstanding.
    pub fn refresh(&self) -> Result<(), SyncError> {
        self.send(Command::Refresh)
    }

    /// Write the draft. Refused with [`SyncError::NotOwned`] unless the last
    /// read settled as owned, and with [`SyncError::MissingUpload`] for a raw
    /// draft that has nothing attached.
    pub async fn publish(&self) -> Result<(), SyncError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Publish(reply))?;
        response.await.unwrap_or(Err(SyncError::Stopped))
    }

    /// Hand the path to the identity derived from `new_password`.
    ///
    /// On success the controller switches to the new password and runs a
    /// fresh read cycle.
    pub async fn rotate_password(&self, new_password: impl Into<String>) -> Result<(), SyncError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::RotatePassword {
            new_password: new_password.into(),
            reply,
        })?;
        response.await.unwrap_or(Err(SyncError::Stopped))
    }

    /// Wait until the controller settles for the inputs set so far.
    ///
    /// Resolves immediately when already settled. Fails with the error that
    /// left the controller idle (an invalid path or a failed read).
    pub async fn settled(&self) -> Result<Settlement, SyncError> {
        let (waiter, response) = oneshot::channel();
        self.send(Command::AwaitSettle(waiter))?;
        response.await.unwrap_or(Err(SyncError::Stopped))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Transient and fatal failures, in order. Clones share one queue.
    pub fn notices(&self) -> flume::Receiver<Notice> {
        self.notices.clone()
    }
}

enum Purpose {
    Read,
    Write(Reply),
    Rotate { new_password: String, reply: Reply },
}

impl Purpose {
    fn supersede(self) {
        match self {
            Purpose::Read => {}
            Purpose::Write(reply) | Purpose::Rotate { reply, .. } => {
                let _ = reply.send(Err(SyncError::Cancelled));
            }
        }
    }
}

struct InFlight {
    epoch: u64,
    purpose: Purpose,
    response: PendingRequest,
}

struct PendingRotation {
    epoch: u64,
    new_password: String,
    reply: Reply,
    handle: JoinHandle<Identity>,
}

/// Resolve `slot`, or never if it is empty.
async fn next_of<F: Future + Unpin>(slot: Option<&mut F>) -> F::Output {
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

pub struct SyncController<T: Transport> {
    config: SyncConfig,
    coordinator: Coordinator<T>,
    commands: flume::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
    notices: flume::Sender<Notice>,

    path: String,
    password: String,
    epoch: u64,
    identity: Option<Identity>,
    draft: Draft,

    state: SyncState,
    last_settled: Option<Settlement>,
    last_error: Option<SyncError>,
    settle_waiters: Vec<oneshot::Sender<Result<Settlement, SyncError>>>,

    derivation: Option<JoinHandle<(u64, Identity)>>,
    debounce: Option<Pin<Box<Sleep>>>,
    in_flight: Option<InFlight>,
    rotation: Option<PendingRotation>,
}

impl<T: Transport> SyncController<T> {
    /// Start a controller on the current runtime.
    pub fn spawn(config: SyncConfig, transport: Arc<T>) -> SyncHandle {
        let (command_tx, command_rx) = flume::unbounded();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        let (notice_tx, notice_rx) = flume::bounded(NOTICE_CAPACITY);

        let controller = Self {
            config,
            coordinator: Coordinator::new(transport),
            commands: command_rx,
            snapshots: snapshot_tx,
            notices: notice_tx,
            path: String::new(),
            password: String::new(),
            epoch: 0,
            identity: None,
            draft: Draft::default(),
            state: SyncState::Idle,
            last_settled: None,
            last_error: None,
            settle_waiters: Vec::new(),
            derivation: None,
            debounce: None,
            in_flight: None,
            rotation: None,
        };
        tokio::spawn(controller.run());

        SyncHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            notices: notice_rx,
        }
    }

    async fn run(mut self) {
        tracing::info!("sync controller started");

        loop {
            tokio::select! {
                command = self.commands.recv_async() => {
                    let Ok(command) = command else {
                        // Last handle dropped
                        break;
                    };
                    self.handle_command(command);
                }
                joined = next_of(self.derivation.as_mut()) => {
                    self.derivation = None;
                    self.on_derived(joined);
                }
                () = next_of(self.debounce.as_mut()) => {
                    self.debounce = None;
                    self.fetch();
                }
                joined = next_of(self.rotation.as_mut().map(|r| &mut r.handle)) => {
                    if let Some(rotation) = self.rotation.take() {
                        self.on_rotation_derived(rotation, joined);
                    }
                }
                response = next_of(self.in_flight.as_mut().map(|f| &mut f.response)) => {
                    if let Some(in_flight) = self.in_flight.take() {
                        self.on_response(in_flight.epoch, in_flight.purpose, response);
                    }
                }
            }
        }

        self.coordinator.cancel();
        tracing::info!("sync controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetPath(path) => {
                if path != self.path {
                    self.path = path;
                    self.inputs_changed();
                }
            }
            Command::SetPassword(password) => {
                if password != self.password {
                    self.password = password;
                    self.inputs_changed();
                }
            }
            Command::Edit(edit) => {
                match edit {
                    Edit::Kind(kind) => self.draft.set_kind(kind),
                    Edit::Redirect(url) => self.draft.set_redirect(url),
                    Edit::Markdown(source) => self.draft.set_markdown(source),
                    Edit::Html(source) => self.draft.set_html(source),
                }
                self.publish_snapshot();
            }
            Command::Attach(upload) => {
                self.draft.attach(upload);
                self.publish_snapshot();
            }
            Command::Refresh => self.refresh(),
            Command::Publish(reply) => self.publish(reply),
            Command::RotatePassword {
                new_password,
                reply,
            } => self.start_rotation(new_password, reply),
            Command::AwaitSettle(waiter) => self.await_settle(waiter),
        }
    }

    /// Abandon everything tied to the previous inputs and start over.
    fn inputs_changed(&mut self) {
        self.epoch += 1;
        self.identity = None;
        self.last_settled = None;
        self.last_error = None;
        self.debounce = None;
        if let Some(derivation) = self.derivation.take() {
            derivation.abort();
        }
        if let Some(rotation) = self.rotation.take() {
            rotation.handle.abort();
            let _ = rotation.reply.send(Err(SyncError::Cancelled));
        }
        if matches!(
            self.in_flight,
            Some(InFlight {
                purpose: Purpose::Read,
                ..
            })
        ) {
            self.in_flight = None;
            self.coordinator.cancel();
        }

        if let Err(e) = validate_path(&self.path) {
            tracing::debug!(path = %self.path, error = %e, "path not usable");
            self.set_state(SyncState::Idle);
            self.fail_waiters(SyncError::InvalidPath(e));
            return;
        }

        let epoch = self.epoch;
        let path = self.path.clone();
        let password = self.password.clone();
        let params = self.config.derivation;
        self.derivation = Some(tokio::task::spawn_blocking(move || {
            (epoch, Identity::derive_with(&path, &password, params))
        }));
        self.set_state(SyncState::DerivingIdentity);
    }

    fn on_derived(&mut self, joined: Result<(u64, Identity), JoinError>) {
        match joined {
            Ok((epoch, identity)) if epoch == self.epoch => {
                tracing::debug!(public_key = %identity.public(), "identity derived");
                self.identity = Some(identity);
                self.debounce = Some(Box::pin(tokio::time::sleep(self.config.debounce)));
                self.set_state(SyncState::Debouncing);
            }
            Ok(_) => tracing::trace!("discarding identity for superseded inputs"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => self.report_failure(SyncError::Fatal(format!(
                "identity derivation failed: {e}"
            ))),
        }
    }

    /// Issue a read with the current identity.
    fn fetch(&mut self) {
        let Some(identity) = &self.identity else {
            return;
        };
        match Envelope::read(identity, &self.path) {
            Ok(envelope) => {
                tracing::debug!(path = %self.path, "fetching");
                let response = self.coordinator.issue(&envelope);
                self.begin(Purpose::Read, response);
                self.set_state(SyncState::Fetching);
            }
            Err(e) => self.report_failure(SyncError::Fatal(e.to_string())),
        }
    }

    fn refresh(&mut self) {
        if self.identity.is_none()
            || self.derivation.is_some()
            || self.in_flight.is_some()
            || self.rotation.is_some()
        {
            tracing::debug!(state = %self.state, "refresh ignored");
            return;
        }
        self.debounce = None;
        self.fetch();
    }

    fn publish(&mut self, reply: Reply) {
        let Some(identity) = self.identity.as_ref().filter(|_| self.state.is_owned()) else {
            let _ = reply.send(Err(SyncError::NotOwned));
            return;
        };
        // Raw records carry no bytes, so a read-back draft cannot republish them
        if self.draft.kind() == ContentKind::Raw && self.draft.upload().is_none() {
            let _ = reply.send(Err(SyncError::MissingUpload));
            return;
        }
        let record = self.draft.record();
        let view = self.draft.view();
        let kind = record.kind();
        match Envelope::write(identity, &self.path, record, view) {
            Ok(envelope) => {
                tracing::info!(path = %self.path, %kind, "publishing");
                let response = self.coordinator.issue(&envelope);
                self.begin(Purpose::Write(reply), response);
            }
            Err(e) => {
                let _ = reply.send(Err(SyncError::Fatal(e.to_string())));
            }
        }
    }

    fn start_rotation(&mut self, new_password: String, reply: Reply) {
        if self.identity.is_none() || !self.state.is_owned() {
            let _ = reply.send(Err(SyncError::NotOwned));
            return;
        }
        if let Some(previous) = self.rotation.take() {
            previous.handle.abort();
            let _ = previous.reply.send(Err(SyncError::Cancelled));
        }

        let path = self.path.clone();
        let password = new_password.clone();
        let params = self.config.derivation;
        let handle =
            tokio::task::spawn_blocking(move || Identity::derive_with(&path, &password, params));
        self.rotation = Some(PendingRotation {
            epoch: self.epoch,
            new_password,
            reply,
            handle,
        });
    }

    fn on_rotation_derived(
        &mut self,
        rotation: PendingRotation,
        joined: Result<Identity, JoinError>,
    ) {
        let PendingRotation {
            epoch,
            new_password,
            reply,
            ..
        } = rotation;
        if epoch != self.epoch {
            let _ = reply.send(Err(SyncError::Cancelled));
            return;
        }
        let new_identity = match joined {
            Ok(identity) => identity,
            Err(e) => {
                let error = SyncError::Fatal(format!("identity derivation failed: {e}"));
                self.notify(&error);
                let _ = reply.send(Err(error));
                return;
            }
        };
        let Some(identity) = &self.identity else {
            let _ = reply.send(Err(SyncError::NotOwned));
            return;
        };

        match Envelope::rotate_password(identity, &self.path, new_identity.public()) {
            Ok(envelope) => {
                tracing::info!(path = %self.path, new_key = %new_identity.public(), "rotating password");
                let response = self.coordinator.issue(&envelope);
                self.begin(
                    Purpose::Rotate {
                        new_password,
                        reply,
                    },
                    response,
                );
            }
            Err(e) => {
                let _ = reply.send(Err(SyncError::Fatal(e.to_string())));
            }
        }
    }

    /// Track a freshly issued request, superseding the previous one.
    fn begin(&mut self, purpose: Purpose, response: PendingRequest) {
        let next = InFlight {
            epoch: self.epoch,
            purpose,
            response,
        };
        if let Some(previous) = self.in_flight.replace(next) {
            previous.purpose.supersede();
        }
    }

    fn on_response(&mut self, epoch: u64, purpose: Purpose, response: Result<Vec<u8>, SyncError>) {
        let current = epoch == self.epoch;
        match purpose {
            Purpose::Read if current => self.on_read(response),
            Purpose::Read => tracing::trace!("discarding response for superseded inputs"),
            Purpose::Write(reply) => {
                let result = response.map(|_| ());
                if current {
                    match &result {
                        Ok(()) => self.settle(Settlement {
                            owned: true,
                            claimed: true,
                        }),
                        Err(e) if e.is_reportable() => self.notify(e),
                        Err(e) => tracing::debug!(error = %e, "write refused"),
                    }
                }
                let _ = reply.send(result);
            }
            Purpose::Rotate {
                new_password,
                reply,
            } => {
                let result = response.map(|_| ());
                if current {
                    match &result {
                        Ok(()) => {
                            tracing::info!(path = %self.path, "password rotated");
                            self.password = new_password;
                            self.inputs_changed();
                        }
                        Err(e) if e.is_reportable() => self.notify(e),
                        Err(e) => tracing::debug!(error = %e, "rotation refused"),
                    }
                }
                let _ = reply.send(result);
            }
        }
    }

    fn on_read(&mut self, response: Result<Vec<u8>, SyncError>) {
        match response {
            Ok(body) => match decode_record(&body) {
                Ok(record) => {
                    self.draft.load(record);
                    self.settle(Settlement {
                        owned: true,
                        claimed: true,
                    });
                }
                Err(e) => {
                    self.report_failure(SyncError::Fatal(format!("unreadable record: {e}")))
                }
            },
            Err(SyncError::Unclaimed) => self.settle(Settlement {
                owned: true,
                claimed: false,
            }),
            Err(SyncError::Unauthorized { status, message }) => {
                tracing::debug!(%status, %message, "read refused");
                self.settle(Settlement {
                    owned: false,
                    claimed: true,
                });
            }
            Err(SyncError::Cancelled) => tracing::trace!("read cancelled"),
            Err(e) => self.report_failure(e),
        }
    }

    fn settle(&mut self, settlement: Settlement) {
        self.last_settled = Some(settlement);
        self.last_error = None;
        self.set_state(SyncState::Settled(settlement));
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(Ok(settlement));
        }
    }

    /// Surface `error` and fall back to the last settled state, if any.
    fn report_failure(&mut self, error: SyncError) {
        tracing::warn!(path = %self.path, %error, "sync failed");
        self.notify(&error);
        self.last_error = Some(error.clone());
        let fallback = self
            .last_settled
            .map(SyncState::Settled)
            .unwrap_or(SyncState::Idle);
        self.set_state(fallback);
        self.fail_waiters(error);
    }

    fn await_settle(&mut self, waiter: oneshot::Sender<Result<Settlement, SyncError>>) {
        match self.state {
            SyncState::Settled(settlement) => {
                let _ = waiter.send(Ok(settlement));
            }
            SyncState::Idle => {
                let error = self.last_error.clone().or_else(|| {
                    validate_path(&self.path)
                        .err()
                        .map(SyncError::InvalidPath)
                });
                match error {
                    Some(error) => {
                        let _ = waiter.send(Err(error));
                    }
                    None => self.settle_waiters.push(waiter),
                }
            }
            _ => self.settle_waiters.push(waiter),
        }
    }

    fn fail_waiters(&mut self, error: SyncError) {
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    fn notify(&self, error: &SyncError) {
        let notice = match error {
            SyncError::Transient(message) => Notice::Transient(message.clone()),
            SyncError::Fatal(message) => Notice::Fatal(message.clone()),
            other => Notice::Fatal(other.to_string()),
        };
        if self.notices.try_send(notice).is_err() {
            tracing::trace!("notice queue full, dropping notice");
        }
    }

    fn set_state(&mut self, state: SyncState) {
        if state != self.state {
            tracing::debug!(from = %self.state, to = %state, "sync state");
        }
        self.state = state;
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(Snapshot {
            state: self.state,
            path: self.path.clone(),
            public_key: self.identity.as_ref().map(Identity::public),
            draft: self.draft.clone(),
        });
    }
}
