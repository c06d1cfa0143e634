//! End-to-end: controller over HTTP against a running gateway

mod common;

use std::sync::Arc;
use std::time::Duration;

use ::common::content::{ContentKind, RawUpload};
use ::common::envelope::Envelope;
use reqwest::{redirect, StatusCode};
use tokio::sync::watch;
use url::Url;

use client::{
    Edit, HttpTransport, Settlement, SyncController, SyncError, Transport, TransportError,
};
use gateway::{GatewayState, Registry};

struct TestGateway {
    remote: Url,
    _shutdown: watch::Sender<()>,
}

impl TestGateway {
    async fn start() -> Self {
        let state = GatewayState::new(Arc::new(Registry::new(Duration::from_secs(300))));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let router = gateway::router(state, tracing::Level::DEBUG);
        tokio::spawn(async move {
            gateway::serve(listener, router, shutdown_rx).await.unwrap();
        });

        Self {
            remote: Url::parse(&format!("http://{}/", addr)).unwrap(),
            _shutdown: shutdown_tx,
        }
    }

    fn transport(&self) -> Arc<HttpTransport> {
        Arc::new(HttpTransport::new(&self.remote, Duration::from_secs(5)).unwrap())
    }
}

#[tokio::test]
async fn test_unclaimed_read_is_404() {
    let gw = TestGateway::start().await;
    let transport = gw.transport();
    let envelope = Envelope::read(&common::identity("abc", ""), "abc").unwrap();

    let result = transport.post(envelope.encode().unwrap()).await;
    assert!(matches!(
        result,
        Err(TransportError::HttpStatus(StatusCode::NOT_FOUND, _))
    ));
}

#[tokio::test]
async fn test_publish_and_visit_over_http() {
    let gw = TestGateway::start().await;
    let sync = SyncController::spawn(common::sync_config(), gw.transport());
    sync.set_path("notes").unwrap();
    assert_eq!(
        sync.settled().await.unwrap(),
        Settlement {
            owned: true,
            claimed: false
        }
    );

    sync.edit(Edit::Kind(ContentKind::Markdown)).unwrap();
    sync.edit(Edit::Markdown("---\ntitle: Notes\n---\n# Today".into()))
        .unwrap();
    sync.publish().await.unwrap();

    let visitor = reqwest::Client::new();
    let page = visitor
        .get(gw.remote.join("notes").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    let body = page.text().await.unwrap();
    assert!(body.contains("<title>Notes</title>"));
    assert!(body.contains("<h1>Today</h1>"));

    // Another password sees a claimed path it does not own
    let intruder = SyncController::spawn(common::sync_config(), gw.transport());
    intruder.set_path("notes").unwrap();
    intruder.set_password("guess").unwrap();
    assert_eq!(
        intruder.settled().await.unwrap(),
        Settlement {
            owned: false,
            claimed: true
        }
    );
}

#[tokio::test]
async fn test_publish_raw_upload_over_http() {
    let gw = TestGateway::start().await;
    let sync = SyncController::spawn(common::sync_config(), gw.transport());
    sync.set_path("logo.png").unwrap();
    sync.settled().await.unwrap();

    sync.edit(Edit::Kind(ContentKind::Raw)).unwrap();
    sync.attach(RawUpload::guess("logo.png", vec![0x89, 0x50, 0x4e, 0x47]))
        .unwrap();
    sync.publish().await.unwrap();

    let visitor = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()
        .unwrap();
    let response = visitor
        .get(gw.remote.join("logo.png").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(
        response.bytes().await.unwrap().as_ref(),
        &[0x89, 0x50, 0x4e, 0x47]
    );
}

#[tokio::test]
async fn test_unreachable_gateway_is_transient() {
    // Grab a free port, then close it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = Url::parse(&format!("http://{}/", addr)).unwrap();
    let transport = Arc::new(HttpTransport::new(&remote, Duration::from_secs(5)).unwrap());
    let sync = SyncController::spawn(common::sync_config(), transport);
    let notices = sync.notices();
    sync.set_path("abc").unwrap();

    assert!(matches!(sync.settled().await, Err(SyncError::Transient(_))));
    assert!(notices.recv_async().await.is_ok());
}
