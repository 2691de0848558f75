use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use url::Url;

use crate::error::{Error, Result};
use crate::provider::endpoint_url;
use crate::types::{ChatRequest, HealthStatus};

/// Path of the streaming chat endpoint, relative to the endpoint base.
pub const CHAT_MESSAGE_PATH: &str = "api/v1/chat/message";

/// Path of the backend health check, relative to the endpoint base.
pub const HEALTH_PATH: &str = "health";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An ordered stream of raw body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opens a streamed chat response.
///
/// Implementations return [`Error::ConnectionFailed`] when the request cannot be
/// sent or the backend answers with a non-success status, and report read
/// failures inside the returned stream.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Submits `request` to the backend at `endpoint_base` and returns its body.
    async fn open(&self, endpoint_base: &Url, request: &ChatRequest) -> Result<ByteStream>;

    /// Queries the backend health endpoint.
    async fn health(&self, endpoint_base: &Url) -> Result<HealthStatus> {
        _ = endpoint_base;
        Err(Error::configuration(
            "health checks are not supported by this transport",
        ))
    }
}

/// HTTP transport for the AION backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    connect_timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport with the default connect timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    /// Create a new transport with a custom connect timeout.
    ///
    /// Only establishing the connection is bounded; a response may stream for
    /// as long as the backend keeps producing text.
    pub fn with_timeout(connect_timeout: Option<Duration>) -> Result<Self> {
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            connect_timeout,
        })
    }

    /// Returns the configured connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/plain, */*"));
        headers
    }

    fn map_send_error(e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::connection_failed(format!("Request timed out: {}", e), None, Some(Box::new(e)))
        } else if e.is_connect() {
            Error::connection_failed(format!("Connection error: {}", e), None, Some(Box::new(e)))
        } else {
            Error::connection_failed(format!("Request failed: {}", e), None, Some(Box::new(e)))
        }
    }

    /// Convert a non-success response into a connection failure.
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body = body.trim();
        let message = if body.is_empty() {
            format!("backend returned {}", status)
        } else {
            format!("backend returned {}: {}", status, body)
        };
        Error::connection_failed(message, Some(status.as_u16()), None)
    }

    /// Query the backend health endpoint.
    pub async fn check_health(&self, endpoint_base: &Url) -> Result<HealthStatus> {
        let url = endpoint_url(endpoint_base, HEALTH_PATH)?;
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<HealthStatus>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse health response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self, endpoint_base: &Url, request: &ChatRequest) -> Result<ByteStream> {
        let url = endpoint_url(endpoint_base, CHAT_MESSAGE_PATH)?;
        tracing::debug!(
            url = %url,
            model = %request.model,
            provider = %request.provider,
            messages = request.messages.len(),
            "opening chat stream"
        );

        let response = self
            .client
            .post(url)
            .headers(Self::default_headers())
            .json(request)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            let err = Self::process_error_response(response).await;
            tracing::warn!("chat request rejected: {err}");
            return Err(err);
        }
        tracing::debug!(status = %response.status(), "chat stream opened");

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::stream_interrupted(format!("Error in HTTP stream: {}", e), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }

    async fn health(&self, endpoint_base: &Url) -> Result<HealthStatus> {
        self.check_health(endpoint_base).await
    }
}
