//! End-to-end tests: client -> gateway -> stub storage backend over loopback.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use s3gw_authz::{Policy, PolicyItem, ResourcePattern, ServicePolicies, StaticPolicySource};
use s3gw_gateway::authorizer::{ACCESS_DENIED_BODY, NO_AUTH_HEADER_BODY};
use s3gw_gateway::config::ServerSettings;
use s3gw_gateway::{
    Gateway, GatewayConfig, GatewayResult, NoGroups, ShutdownSignal, Sources,
    StaticGroupResolver, StaticIdentitySource,
};

const ALICE_V2: &str = "AWS AKALICE:c2lnbmF0dXJl";
const BOB_V4: &str = "AWS4-HMAC-SHA256 Credential=AKBOB/20240101/us-east-1/s3/aws4_request, \
                      SignedHeaders=host, Signature=0";

/// Stub backend echoing what it received.
async fn start_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| async move {
                    let seen_xff = req
                        .headers()
                        .get("x-forwarded-for")
                        .cloned()
                        .unwrap_or_else(|| HeaderValue::from_static(""));
                    let seen_request_id = req.headers().contains_key("x-request-id");
                    let line = format!("{} {}", req.method(), req.uri());
                    let body = req.into_body().collect().await.unwrap().to_bytes();

                    let mut response =
                        Response::new(Full::new(Bytes::from(format!("{line} {}", body.len()))));
                    response.headers_mut().insert("x-backend-xff", seen_xff);
                    response.headers_mut().insert(
                        "x-backend-request-id",
                        HeaderValue::from_static(if seen_request_id { "yes" } else { "no" }),
                    );
                    Ok::<_, Infallible>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

fn policies() -> ServicePolicies {
    let mut data = Policy {
        id: 10,
        name: "data-bucket".into(),
        ..Policy::default()
    };
    data.resources
        .insert("path".into(), ResourcePattern::new(["/data"]).recursive());
    data.policy_items
        .push(PolicyItem::new().users(["alice"]).allow("read").allow("write"));
    data.policy_items
        .push(PolicyItem::new().groups(["readers"]).allow("read"));

    ServicePolicies {
        service_name: "s3".into(),
        policy_version: Some(3),
        policies: vec![data],
        ..ServicePolicies::default()
    }
}

fn sources(policy_source: Arc<StaticPolicySource>) -> Sources {
    let keys: HashMap<String, String> = [("AKALICE", "alice"), ("AKBOB", "bob")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let owners: HashMap<String, String> = [("data".to_string(), "admin".to_string())].into();

    Sources {
        policies: policy_source,
        identity: Arc::new(StaticIdentitySource::new(keys, owners)),
        groups: Arc::new(StaticGroupResolver::new().with_user("carol", ["readers"])),
        tags: None,
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownSignal,
    handle: JoinHandle<GatewayResult<()>>,
    client: reqwest::Client,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

async fn start_gateway(server: ServerSettings) -> Running {
    let config = GatewayConfig {
        server,
        ..GatewayConfig::default()
    };
    let gateway = Gateway::with_sources(
        config,
        sources(Arc::new(StaticPolicySource::new(policies()))),
    )
    .unwrap();
    let health = gateway.health();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(gateway.serve(listener, shutdown.clone()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !health.is_ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    Running {
        addr,
        shutdown,
        handle,
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
    }
}

async fn start_with_backend() -> Running {
    let backend = start_backend().await;
    start_gateway(ServerSettings {
        backend_url: format!("http://{backend}"),
        ..ServerSettings::default()
    })
    .await
}

#[tokio::test]
async fn test_missing_authorization_header_is_rejected() {
    let gw = start_with_backend().await;

    let response = gw.client.get(gw.url("/data/obj")).send().await.unwrap();
    assert_eq!(response.status(), 403);
    assert_eq!(response.headers()["x-forwarded-for"], "127.0.0.1");
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), NO_AUTH_HEADER_BODY);

    gw.stop().await;
}

#[tokio::test]
async fn test_allowed_read_is_forwarded() {
    let gw = start_with_backend().await;

    let response = gw
        .client
        .get(gw.url("/data/reports/q1.csv?versionId=2"))
        .header("authorization", ALICE_V2)
        .header("x-forwarded-for", "203.0.113.9")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-backend-xff"], "203.0.113.9,127.0.0.1");
    assert_eq!(response.headers()["x-backend-request-id"], "yes");
    assert_eq!(response.headers()["x-forwarded-for"], "203.0.113.9,127.0.0.1");
    assert_eq!(
        response.text().await.unwrap(),
        "GET /data/reports/q1.csv?versionId=2 0"
    );

    gw.stop().await;
}

#[tokio::test]
async fn test_write_body_is_relayed() {
    let gw = start_with_backend().await;

    let response = gw
        .client
        .put(gw.url("/data/new-object"))
        .header("authorization", ALICE_V2)
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "PUT /data/new-object 5");

    gw.stop().await;
}

#[tokio::test]
async fn test_denied_principal_gets_plain_403() {
    let gw = start_with_backend().await;

    let response = gw
        .client
        .put(gw.url("/data/obj"))
        .header("authorization", BOB_V4)
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    assert!(!response.headers().contains_key("x-backend-xff"));
    assert_eq!(response.text().await.unwrap(), ACCESS_DENIED_BODY);

    let response = gw
        .client
        .get(gw.url("/data/obj"))
        .header("authorization", "AWS AKUNKNOWN:sig")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    gw.stop().await;
}

#[tokio::test]
async fn test_internal_endpoints() {
    let gw = start_with_backend().await;

    let ready = gw.client.get(gw.url("/_s3gw/ready")).send().await.unwrap();
    assert_eq!(ready.status(), 200);
    let body: serde_json::Value = ready.json().await.unwrap();
    assert_eq!(body["status"], "ready");

    let health = gw.client.get(gw.url("/_s3gw/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let version = gw.client.get(gw.url("/_s3gw/version")).send().await.unwrap();
    let body: serde_json::Value = version.json().await.unwrap();
    assert_eq!(body["version"], s3gw_gateway::VERSION);

    gw.stop().await;
}

#[tokio::test]
async fn test_large_upload_is_streamed() {
    let gw = start_with_backend().await;
    let payload = vec![b'x'; 1 << 20];

    let response = gw
        .client
        .put(gw.url("/data/big"))
        .header("authorization", ALICE_V2)
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "PUT /data/big 1048576");

    gw.stop().await;
}

/// Sends a request line verbatim; HTTP client libraries resolve dot segments
/// before they reach the wire.
async fn raw_get(addr: SocketAddr, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {target} HTTP/1.1\r\nHost: s3.local\r\nAuthorization: {ALICE_V2}\r\n\
         Connection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn test_dot_segments_are_denied_on_the_wire() {
    let gw = start_with_backend().await;

    for target in [
        "/data/../secret/x",
        "/data/%2e%2e/secret/x",
        "/data/%2E%2E/secret/x",
        "/data/./../secret/x",
        "/data//secret/x",
    ] {
        let response = raw_get(gw.addr, target).await;
        assert!(response.starts_with("HTTP/1.1 403"), "{target}: {response}");
        assert!(!response.contains("x-backend-xff"), "{target} reached the backend");
        assert!(response.ends_with(ACCESS_DENIED_BODY), "{target}: {response}");
    }

    let response = raw_get(gw.addr, "/data/x").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("GET /data/x 0"), "{response}");

    gw.stop().await;
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway() {
    let gw = start_gateway(ServerSettings {
        backend_url: "http://127.0.0.1:1".into(),
        backend_timeout: Duration::from_secs(2),
        ..ServerSettings::default()
    })
    .await;

    let response = gw
        .client
        .get(gw.url("/data/obj"))
        .header("authorization", ALICE_V2)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    gw.stop().await;
}

#[tokio::test]
async fn test_failed_initial_load_prevents_serving() {
    let source = Arc::new(StaticPolicySource::new(policies()));
    source.fail();
    let mut sources = sources(source);
    sources.groups = Arc::new(NoGroups);

    let gateway = Gateway::with_sources(GatewayConfig::default(), sources).unwrap();
    let health = gateway.health();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let err = gateway
        .serve(listener, ShutdownSignal::new())
        .await
        .unwrap_err();
    assert_eq!(err.category(), "startup");
    assert!(!health.is_ready());
}
