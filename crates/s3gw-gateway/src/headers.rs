//! Header handling for the gateway.
//!
//! Resolves the client address from the forwarded-for chain and decides which
//! headers are relayed between client and backend.

use std::net::IpAddr;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

/// Header name for the forwarded-for chain.
pub static HEADER_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Header name for request ID.
pub static HEADER_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Hop-by-hop headers (HTTP/1.1) that are never relayed.
pub static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Addresses associated with one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress {
    /// Directly connected peer.
    pub remote_ip: String,
    /// Original client: the first forwarded-for entry, or the peer.
    pub client_ip: String,
    /// Forwarded-for chain with the peer appended.
    pub forwarded: Vec<String>,
}

impl ClientAddress {
    /// Resolve addresses from the request headers and the peer address.
    pub fn resolve(headers: &HeaderMap, remote: IpAddr) -> Self {
        let remote_ip = remote.to_string();

        let mut forwarded: Vec<String> = headers
            .get_all(&HEADER_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect();

        let client_ip = forwarded.first().cloned().unwrap_or_else(|| remote_ip.clone());
        forwarded.push(remote_ip.clone());

        Self {
            remote_ip,
            client_ip,
            forwarded,
        }
    }

    /// Value of the rewritten forwarded-for header.
    pub fn forwarded_header(&self) -> String {
        self.forwarded.join(",")
    }

    /// Set the rewritten forwarded-for header on `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.forwarded_header()) {
            headers.insert(HEADER_FORWARDED_FOR.clone(), value);
        }
    }
}

/// Generate a request ID.
pub fn new_request_id() -> String {
    Uuid::now_v7().to_string()
}

/// Check if a header is hop-by-hop.
pub fn is_hop_by_hop_header(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Headers relayed to the backend.
///
/// Everything end-to-end is kept, including `Authorization` and `Host`, so the
/// backend can still verify the request signature. `Content-Length` is kept so
/// streamed uploads are not sent chunked. The forwarded-for chain is replaced.
pub fn filter_headers_for_backend(headers: &HeaderMap, client: &ClientAddress) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len() + 1);

    for (name, value) in headers {
        let name_str = name.as_str();
        if is_hop_by_hop_header(name_str) || *name == HEADER_FORWARDED_FOR {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }

    client.apply(&mut filtered);
    filtered
}

/// Headers relayed back to the client.
pub fn filter_headers_for_client(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop_header(name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}
