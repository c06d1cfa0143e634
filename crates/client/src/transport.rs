use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use url::Url;

/// Content type of envelopes and response bodies.
pub const CBOR_CONTENT_TYPE: &str = "application/cbor";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
}

/// Delivers an encoded envelope to the gateway and returns the response body.
///
/// Implementations only move bytes; the single-flight discipline lives in
/// [`crate::coordinator::Coordinator`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError>;
}

/// Transport over the gateway's single POST endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    pub remote: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(remote: &Url, timeout: Duration) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static(CBOR_CONTENT_TYPE));
        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    /// Get the base URL for requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let response = self.client.post(self.remote.clone()).body(body).send().await?;

        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(TransportError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }
}
