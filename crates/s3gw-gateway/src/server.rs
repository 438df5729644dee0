//! Gateway HTTP server.

use std::convert::Infallible;
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body as _, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn, Instrument};

use crate::authorizer::RequestAuthorizer;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::headers::{new_request_id, ClientAddress, HEADER_REQUEST_ID};
use crate::health::HealthChecker;
use crate::proxy::{ProxyClient, ProxyRequest, ResponseBody};
use crate::shutdown::ShutdownSignal;

/// Path prefix of the gateway's own endpoints. Bucket names cannot start with `_`.
pub const INTERNAL_PREFIX: &str = "/_s3gw/";

/// How long open connections may drain after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type GatewayResponse = Response<ResponseBody>;

/// Shared per-request state.
#[derive(Debug)]
struct GatewayState {
    authorizer: RequestAuthorizer,
    proxy: ProxyClient,
    health: Arc<HealthChecker>,
    write_timeout: Duration,
}

/// Gateway server.
pub struct GatewayServer {
    config: Arc<GatewayConfig>,
    state: Arc<GatewayState>,
    tls: Option<TlsAcceptor>,
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer")
            .field("state", &self.state)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

impl GatewayServer {
    /// Create a server forwarding authorized requests to the configured backend.
    pub fn new(
        config: GatewayConfig,
        authorizer: RequestAuthorizer,
        health: Arc<HealthChecker>,
    ) -> GatewayResult<Self> {
        let tls = match (&config.server.tls_cert, &config.server.tls_key) {
            (Some(cert), Some(key)) => Some(TlsAcceptor::from(Arc::new(load_tls_config(cert, key)?))),
            _ => None,
        };

        let state = Arc::new(GatewayState {
            authorizer,
            proxy: ProxyClient::new(&config.server)?,
            health,
            write_timeout: config.server.write_timeout,
        });

        Ok(Self {
            config: Arc::new(config),
            state,
            tls,
        })
    }

    /// Health checker shared with the internal endpoints.
    pub fn health(&self) -> Arc<HealthChecker> {
        Arc::clone(&self.state.health)
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> GatewayResult<TcpListener> {
        let ip: IpAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| GatewayError::config(format!("invalid listen address: {e}")))?;
        let addr = SocketAddr::new(ip, self.config.server.listen_port);

        TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::server(format!("failed to bind {addr}: {e}")))
    }

    /// Bind and serve until `shutdown` triggers.
    pub async fn run(self, shutdown: ShutdownSignal) -> GatewayResult<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` triggers, then
    /// drain open connections.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> GatewayResult<()> {
        let local = listener.local_addr()?;
        info!(
            address = %local,
            tls = self.tls.is_some(),
            backend = %self.config.server.backend_url,
            "s3gw listening"
        );
        self.state.health.set_ready(true);

        let read_timeout = self.config.server.read_timeout;
        let mut connections = JoinSet::new();

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                () = shutdown.recv() => break,
            };

            let state = Arc::clone(&self.state);
            let tls = self.tls.clone();
            let shutdown = shutdown.clone();

            connections.spawn(async move {
                match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(stream) => serve_connection(stream, peer, state, read_timeout, shutdown).await,
                        Err(e) => debug!(peer = %peer, error = %e, "TLS handshake failed"),
                    },
                    None => serve_connection(stream, peer, state, read_timeout, shutdown).await,
                }
            });
        }

        self.state.health.set_ready(false);
        info!(open = connections.len(), "Draining connections");
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Connections still open after drain timeout, aborting");
            connections.abort_all();
        }

        Ok(())
    }
}

async fn serve_connection<IO>(
    stream: IO,
    peer: SocketAddr,
    state: Arc<GatewayState>,
    read_timeout: Duration,
    shutdown: ShutdownSignal,
) where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(handle_request(req, state, peer).await) }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "Connection error");
    }
}

/// Handle one request: internal endpoint, or authorize and forward.
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<GatewayState>,
    peer: SocketAddr,
) -> GatewayResponse {
    let start = Instant::now();
    let request_id = new_request_id();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if path.starts_with(INTERNAL_PREFIX) {
        return handle_internal_endpoint(&path, &state.health);
    }

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        peer = %peer,
    );

    async move {
        let (decision, mut response) = process(req, &state, peer, &request_id).await;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(HEADER_REQUEST_ID.clone(), value);
        }

        let elapsed = start.elapsed();
        s3gw_telemetry::record_decision(decision);
        s3gw_telemetry::record_request_duration(decision, elapsed);
        info!(
            status = response.status().as_u16(),
            decision,
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}

/// Authorize and stream the request to the backend. Returns the decision
/// label and the response.
///
/// Authorization is bounded by the write timeout. The backend exchange is
/// bounded by the proxy client.
async fn process(
    req: Request<Incoming>,
    state: &GatewayState,
    peer: SocketAddr,
    request_id: &str,
) -> (&'static str, GatewayResponse) {
    let (parts, body) = req.into_parts();
    let client = ClientAddress::resolve(&parts.headers, peer.ip());

    let authorization = tokio::time::timeout(
        state.write_timeout,
        state
            .authorizer
            .authorize(&parts.method, &parts.uri, &parts.headers, &client),
    )
    .await;
    match authorization {
        Ok(Ok(_)) => {}
        Ok(Err(denial)) => {
            info!(reason = %denial, "Access denied");
            let mut response = text_response(denial.status(), denial.body());
            client.apply(response.headers_mut());
            return ("denied", response);
        }
        Err(_) => {
            warn!(timeout = ?state.write_timeout, "Authorization timed out");
            return (
                "error",
                text_response(StatusCode::GATEWAY_TIMEOUT, "Gateway timeout"),
            );
        }
    }

    let path = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    let mut forward = ProxyRequest::new(parts.method, path, client.clone())
        .with_headers(parts.headers)
        .with_request_id(request_id);
    if !body.is_end_stream() {
        forward = forward.with_incoming(body);
    }

    let mut response = match state.proxy.forward(forward).await {
        Ok(backend) => {
            let mut response = Response::new(backend.body);
            *response.status_mut() = backend.status;
            *response.headers_mut() = backend.headers;
            response
        }
        Err(e) => {
            error!(error = %e, "Forwarding failed");
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
            text_response(status, "Bad gateway")
        }
    };
    client.apply(response.headers_mut());
    ("allowed", response)
}

/// Handle internal gateway endpoints.
fn handle_internal_endpoint(path: &str, health: &HealthChecker) -> GatewayResponse {
    match path.strip_prefix(INTERNAL_PREFIX).unwrap_or_default() {
        "health" => {
            let response = health.liveness();
            let status = if response.status.is_operational() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            json_response(status, &response)
        }
        "ready" => {
            let response = health.readiness();
            let status = if response.status.is_ready() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            json_response(status, &response)
        }
        "metrics" => match s3gw_telemetry::render_metrics() {
            Some(text) => {
                let mut response = Response::new(full(text));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            None => text_response(StatusCode::NOT_FOUND, "Metrics disabled"),
        },
        "version" => json_response(
            StatusCode::OK,
            &serde_json::json!({
                "name": "s3gw",
                "version": crate::VERSION,
            }),
        ),
        _ => text_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

/// Create a JSON response.
fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> GatewayResponse {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(full(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Create a plain-text response.
fn text_response(status: StatusCode, body: &'static str) -> GatewayResponse {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// Complete in-memory body.
fn full(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build a TLS server configuration from PEM files.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> GatewayResult<ServerConfig> {
    // Another component may already have installed a provider.
    let _ = tokio_rustls::rustls::crypto::aws_lc_rs::default_provider().install_default();

    let open = |path: &Path| {
        File::open(path)
            .map(BufReader::new)
            .map_err(|e| GatewayError::tls(format!("cannot open {}: {e}", path.display())))
    };

    let certs = rustls_pemfile::certs(&mut open(cert_path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::tls(format!("invalid certificate file: {e}")))?;
    if certs.is_empty() {
        return Err(GatewayError::tls(format!(
            "no certificates in {}",
            cert_path.display()
        )));
    }

    let key = rustls_pemfile::private_key(&mut open(key_path)?)
        .map_err(|e| GatewayError::tls(format!("invalid key file: {e}")))?
        .ok_or_else(|| GatewayError::tls(format!("no private key in {}", key_path.display())))?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| GatewayError::tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresher::RefreshState;
    use s3gw_authz::{KeySnapshot, PolicySnapshot};

    fn health() -> HealthChecker {
        HealthChecker::new(
            Arc::new(PolicySnapshot::default()),
            Arc::new(KeySnapshot::default()),
            Arc::new(RefreshState::default()),
        )
    }

    #[test]
    fn test_text_response() {
        let response = text_response(StatusCode::FORBIDDEN, "Access denied");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_json_response() {
        let response = json_response(StatusCode::OK, &serde_json::json!({"key": "value"}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_internal_endpoints() {
        let health = health();
        assert_eq!(
            handle_internal_endpoint("/_s3gw/health", &health).status(),
            StatusCode::OK
        );
        assert_eq!(
            handle_internal_endpoint("/_s3gw/ready", &health).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            handle_internal_endpoint("/_s3gw/version", &health).status(),
            StatusCode::OK
        );
        assert_eq!(
            handle_internal_endpoint("/_s3gw/unknown", &health).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_missing_tls_files() {
        let err = load_tls_config(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"))
            .unwrap_err();
        assert_eq!(err.category(), "tls");
    }

    #[test]
    fn test_empty_certificate_file() {
        let cert = tempfile::NamedTempFile::new().unwrap();
        let key = tempfile::NamedTempFile::new().unwrap();
        let err = load_tls_config(cert.path(), key.path()).unwrap_err();
        assert!(err.to_string().contains("no certificates"));
    }
}
