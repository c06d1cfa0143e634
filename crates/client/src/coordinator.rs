//! Single-flight request issuing
//!
//! The coordinator owns the cancellation token of the one request allowed to
//! be outstanding. Issuing a request fires the previous token first, so a
//! superseded request resolves to [`SyncError::Cancelled`] rather than racing
//! the new one.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use common::envelope::Envelope;

use crate::error::SyncError;
use crate::transport::Transport;

/// Response body of an issued request, or why there is none.
pub type PendingRequest = BoxFuture<'static, Result<Vec<u8>, SyncError>>;

pub struct Coordinator<T: Transport> {
    transport: Arc<T>,
    current: Option<oneshot::Sender<()>>,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            current: None,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Cancel whatever is outstanding and send `envelope`.
    ///
    /// The envelope is encoded eagerly; the network call starts when the
    /// returned future is first polled.
    pub fn issue(&mut self, envelope: &Envelope) -> PendingRequest {
        self.cancel();

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.current = Some(cancel_tx);

        let body = envelope.encode();
        let transport = self.transport.clone();
        let op = envelope.op;
        async move {
            let body = body.map_err(|e| SyncError::Fatal(e.to_string()))?;
            tokio::select! {
                biased;
                // Fires on an explicit cancel and when the token is dropped
                _ = cancel_rx => {
                    tracing::debug!(?op, "request cancelled");
                    Err(SyncError::Cancelled)
                }
                result = transport.post(body) => result.map_err(SyncError::from),
            }
        }
        .boxed()
    }

    /// Abandon the outstanding request, if any, without issuing another.
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            // Receiver is gone once the request finished
            let _ = token.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use common::crypto::{DerivationParams, Identity};

    use super::*;
    use crate::transport::TransportError;

    /// Answers every post with its call number after a fixed delay.
    struct SlowEcho {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowEcho {
        async fn post(&self, _body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(vec![n as u8])
        }
    }

    struct Refusing;

    #[async_trait]
    impl Transport for Refusing {
        async fn post(&self, _body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::Unreachable("connection refused".into()))
        }
    }

    fn read_envelope() -> Envelope {
        let identity = Identity::derive_with("abc", "", DerivationParams::with_rounds(1));
        Envelope::read(&identity, "abc").unwrap()
    }

    fn slow(delay: Duration) -> Arc<SlowEcho> {
        Arc::new(SlowEcho {
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_issue_resolves_with_body() {
        let mut coordinator = Coordinator::new(slow(Duration::from_secs(1)));
        let body = coordinator.issue(&read_envelope()).await.unwrap();
        assert_eq!(body, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_issue_cancels_first() {
        let transport = slow(Duration::from_secs(1));
        let mut coordinator = Coordinator::new(transport.clone());

        let mut first = coordinator.issue(&read_envelope());
        // Let the first request reach the transport
        assert!(futures::poll!(&mut first).is_pending());
        let second = coordinator.issue(&read_envelope());

        assert_eq!(first.await, Err(SyncError::Cancelled));
        assert_eq!(second.await.unwrap(), vec![1]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_reissue() {
        let mut coordinator = Coordinator::new(slow(Duration::from_secs(1)));
        let pending = coordinator.issue(&read_envelope());
        coordinator.cancel();
        assert_eq!(pending.await, Err(SyncError::Cancelled));

        // Cancelling with nothing outstanding is a no-op
        coordinator.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_completion_is_harmless() {
        let mut coordinator = Coordinator::new(slow(Duration::from_millis(10)));
        let body = coordinator.issue(&read_envelope()).await.unwrap();
        coordinator.cancel();
        assert_eq!(body, vec![0]);
    }

    #[tokio::test]
    async fn test_network_failure_is_transient() {
        let mut coordinator = Coordinator::new(Arc::new(Refusing));
        let result = coordinator.issue(&read_envelope()).await;
        assert!(matches!(result, Err(SyncError::Transient(_))));
    }
}
