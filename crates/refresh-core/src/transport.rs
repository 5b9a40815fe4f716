//! Byte-stream source used for both metadata and archive requests.
//!
//! The pipeline only needs "GET this URL, tell me the declared size, hand
//! me the body chunk by chunk", so HTTP specifics stay behind [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("request to {url} failed: {details}")]
    Request { url: String, details: String },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("response stream from {url} broke: {details}")]
    Stream { url: String, details: String },
}

pub struct TransportResponse {
    /// Declared body size, when the server sent one.
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Vec<u8>, TransportError>>,
}

impl TransportResponse {
    /// Drain the body into memory.
    ///
    /// # Errors
    /// Returns the first stream error encountered.
    pub async fn collect_body(mut self) -> Result<Vec<u8>, TransportError> {
        let mut data = Vec::with_capacity(
            self.content_length
                .and_then(|len| usize::try_from(len).ok())
                .unwrap_or_default(),
        );
        while let Some(chunk) = self.body.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for std::sync::Arc<T>
where
    T: Transport + ?Sized,
{
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        (**self).get(url).await
    }
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client with the crate user agent and an optional overall
    /// request timeout.
    ///
    /// # Errors
    /// Returns an error when the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("refresh/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|error| TransportError::Client(error.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| TransportError::Request {
                url: url.to_string(),
                details: error.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_length = response.content_length();
        let stream_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|error| TransportError::Stream {
                        url: stream_url.clone(),
                        details: error.to_string(),
                    })
            })
            .boxed();

        Ok(TransportResponse {
            content_length,
            body,
        })
    }
}

/// Join a configured host with a request path. Bare hostnames get `https`.
pub(crate) fn endpoint(host: &str, path: &str) -> String {
    let base = host.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.contains("://") {
        format!("{base}/{path}")
    } else {
        format!("https://{base}/{path}")
    }
}
