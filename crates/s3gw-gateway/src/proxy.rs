//! Relay of authorized requests to the storage backend.
//!
//! Bodies are streamed in both directions; nothing is buffered beyond what
//! the connections hold in flight.

use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use reqwest::{Body, Client};

use crate::config::ServerSettings;
use crate::error::{GatewayError, GatewayResult};
use crate::headers::{
    filter_headers_for_backend, filter_headers_for_client, ClientAddress, HEADER_REQUEST_ID,
};

/// Error type of relayed bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body relayed back to the client.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// HTTP client forwarding requests to the backend.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    backend_url: String,
    timeout: Duration,
}

impl ProxyClient {
    /// Create a proxy client for the configured backend.
    pub fn new(settings: &ServerSettings) -> GatewayResult<Self> {
        // Bounds connecting only; long transfers must not be cut off.
        let client = Client::builder()
            .connect_timeout(settings.backend_timeout)
            .pool_max_idle_per_host(100)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::proxy(format!("failed to create client: {e}")))?;

        Ok(Self {
            client,
            backend_url: settings.backend_url.trim_end_matches('/').to_string(),
            timeout: settings.backend_timeout,
        })
    }

    /// Forward a request. Returns once the backend's response head arrived.
    ///
    /// Without a request body, waiting for the head is bounded by the backend
    /// timeout. The response body is read as the caller polls it.
    pub async fn forward(&self, request: ProxyRequest) -> GatewayResult<ProxyResponse> {
        let url = format!("{}{}", self.backend_url, request.path);

        let mut headers = filter_headers_for_backend(&request.headers, &request.client);
        if let Ok(value) = HeaderValue::from_str(&request.request_id) {
            headers.insert(HEADER_REQUEST_ID.clone(), value);
        }

        let builder = self.client.request(request.method, &url).headers(headers);
        let sent = match request.body {
            // The response head follows the upload, whose length is unbounded.
            Some(body) => builder.body(body).send().await,
            None => tokio::time::timeout(self.timeout, builder.send())
                .await
                .map_err(|_| {
                    GatewayError::proxy(format!("backend did not respond within {:?}", self.timeout))
                })?,
        };
        let response =
            sent.map_err(|e| GatewayError::proxy(format!("backend request failed: {e}")))?;

        let response = http::Response::<Body>::from(response);
        let status = response.status();
        let headers = filter_headers_for_client(response.headers());
        let body = response
            .into_body()
            .map_err(|e| -> BoxError { Box::new(e) })
            .boxed_unsync();

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }

    /// Backend base URL.
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Connect timeout, and response-head timeout of requests without a body.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Request to be forwarded.
#[derive(Debug)]
pub struct ProxyRequest {
    /// HTTP method.
    pub method: Method,
    /// Path including query string.
    pub path: String,
    /// Headers as received from the client.
    pub headers: HeaderMap,
    /// Request body; `None` sends none.
    pub body: Option<Body>,
    /// Resolved client addresses.
    pub client: ClientAddress,
    /// Request ID.
    pub request_id: String,
}

impl ProxyRequest {
    /// Create a proxy request without headers or body.
    pub fn new(method: Method, path: impl Into<String>, client: ClientAddress) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            client,
            request_id: crate::headers::new_request_id(),
        }
    }

    /// Set the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Stream a client request body through to the backend.
    #[must_use]
    pub fn with_incoming(self, body: hyper::body::Incoming) -> Self {
        self.with_body(Body::wrap_stream(body.into_data_stream()))
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Backend response with a streaming body.
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers, hop-by-hop headers removed.
    pub headers: HeaderMap,
    /// Response body, read from the backend as the client consumes it.
    pub body: ResponseBody,
}

impl std::fmt::Debug for ProxyResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl ProxyResponse {
    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
