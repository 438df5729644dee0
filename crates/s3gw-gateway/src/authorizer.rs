//! Per-request authorization pipeline.
//!
//! Credentials are resolved to a principal, the request path to a location
//! and owner, the method to an access type; the resulting [`AccessRequest`]
//! is evaluated against the current policy snapshot.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use http::{HeaderMap, Method, Uri};
use s3gw_authz::{AccessRequest, Decision, KeySnapshot, PolicySnapshot};
use tracing::{debug, info, warn, Level};

use crate::access::{classify, multipart_step, MultipartStep};
use crate::credentials::extract_access_key;
use crate::groups::GroupResolver;
use crate::headers::ClientAddress;
use crate::owner_cache::BucketOwnerCache;
use crate::resource::ResourcePath;
use crate::tags::{format_tags, TagSource};

/// Body of the denial sent when no `Authorization` header is present.
pub const NO_AUTH_HEADER_BODY: &str = "No 'Authorization' header found. Access denied";

/// Body of every other denial.
pub const ACCESS_DENIED_BODY: &str = "Access denied";

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No `Authorization` header.
    NoAuthorizationHeader,
    /// Header present but no known access key in it.
    UnknownAccessKey,
    /// Method outside the access-type table.
    UnsupportedMethod(Method),
    /// Path with dot or empty segments.
    NonCanonicalPath,
    /// The policy snapshot denied the access.
    Policy(Decision),
}

impl Denial {
    /// HTTP status sent to the client.
    pub fn status(&self) -> http::StatusCode {
        http::StatusCode::FORBIDDEN
    }

    /// Response body sent to the client. Never carries internal reasons.
    pub fn body(&self) -> &'static str {
        match self {
            Self::NoAuthorizationHeader => NO_AUTH_HEADER_BODY,
            _ => ACCESS_DENIED_BODY,
        }
    }

    /// Short internal reason for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoAuthorizationHeader => "no authorization header",
            Self::UnknownAccessKey => "access key not found",
            Self::UnsupportedMethod(_) => "unsupported method",
            Self::NonCanonicalPath => "non-canonical path",
            Self::Policy(decision) => decision.reason,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMethod(method) => write!(f, "unsupported method {method}"),
            other => f.write_str(other.reason()),
        }
    }
}

/// A request that passed authorization.
#[derive(Debug, Clone)]
pub struct Authorized {
    /// Facts the decision was made on.
    pub request: AccessRequest,
    /// Deciding policy.
    pub decision: Decision,
    /// Multipart upload step, informational only.
    pub multipart: Option<MultipartStep>,
}

/// Runs the authorization pipeline over the currently published snapshots.
#[derive(Clone)]
pub struct RequestAuthorizer {
    policies: Arc<PolicySnapshot>,
    keys: Arc<KeySnapshot>,
    owners: Arc<BucketOwnerCache>,
    groups: Arc<dyn GroupResolver>,
    tags: Option<Arc<dyn TagSource>>,
}

impl fmt::Debug for RequestAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAuthorizer")
            .field("owners", &self.owners)
            .field("tags", &self.tags.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestAuthorizer {
    /// Create an authorizer reading the given snapshot holders.
    pub fn new(
        policies: Arc<PolicySnapshot>,
        keys: Arc<KeySnapshot>,
        owners: Arc<BucketOwnerCache>,
        groups: Arc<dyn GroupResolver>,
    ) -> Self {
        Self {
            policies,
            keys,
            owners,
            groups,
            tags: None,
        }
    }

    /// Log bucket tags of allowed requests at debug level.
    #[must_use]
    pub fn with_tags(mut self, tags: Arc<dyn TagSource>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Decide whether the request may be forwarded.
    ///
    /// `client` is the already resolved address set of the request.
    pub async fn authorize(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        client: &ClientAddress,
    ) -> Result<Authorized, Denial> {
        let Some(header) = headers.get(http::header::AUTHORIZATION) else {
            debug!("Request without authorization header");
            return Err(Denial::NoAuthorizationHeader);
        };

        let access_key = header
            .to_str()
            .ok()
            .and_then(extract_access_key)
            .ok_or(Denial::UnknownAccessKey)?;

        // One snapshot per request; a concurrent refresh cannot change it.
        let user = {
            let keys = self.keys.snapshot();
            keys.principal(access_key)
                .map(String::from)
                .ok_or(Denial::UnknownAccessKey)?
        };

        let query = uri.query();
        let access_type = classify(method, query)
            .ok_or_else(|| Denial::UnsupportedMethod(method.clone()))?;
        let multipart = multipart_step(method, query);

        if !ResourcePath::is_canonical(uri.path()) {
            debug!(path = uri.path(), "Request path is not canonical");
            return Err(Denial::NonCanonicalPath);
        }
        let resource = ResourcePath::parse(uri.path());
        let owner = self.resolve_owner(&resource).await;
        let groups = self.groups.groups(&user).await;

        let request = AccessRequest::builder(user)
            .groups(groups)
            .resource(owner, resource.location())
            .access_type(access_type)
            .access_time(Utc::now())
            .client_ip(client.client_ip.clone())
            .remote_ip(client.remote_ip.clone())
            .forwarded_addresses(client.forwarded.clone())
            .action(method.as_str())
            .build();

        let decision = self.policies.snapshot().evaluate_detailed(&request);

        info!(
            user = %request.user,
            groups = ?request.groups,
            owner = %request.resource.owner,
            location = %request.resource.location,
            access_type = %request.access_type,
            client_ip = %request.client_ip,
            multipart = ?multipart,
            policy_id = ?decision.policy_id,
            decision = if decision.allowed { "allowed" } else { "denied" },
            reason = decision.reason,
            "Authorization decision"
        );

        if decision.allowed && resource.has_container() && tracing::enabled!(Level::DEBUG) {
            self.log_tags(&resource.container).await;
        }

        if decision.allowed {
            Ok(Authorized {
                request,
                decision,
                multipart,
            })
        } else {
            Err(Denial::Policy(decision))
        }
    }

    /// Owner of the addressed bucket; empty when there is none or the lookup fails.
    async fn resolve_owner(&self, resource: &ResourcePath) -> String {
        if !resource.has_container() {
            return String::new();
        }
        match self.owners.get_owner(&resource.container).await {
            Ok(owner) => owner,
            Err(e) => {
                warn!(bucket = %resource.container, error = %e, "Bucket owner lookup failed");
                String::new()
            }
        }
    }

    async fn log_tags(&self, bucket: &str) {
        let Some(source) = &self.tags else {
            return;
        };
        match source.bucket_tags(bucket).await {
            Ok(tags) => debug!(bucket, tags = %format_tags(&tags), "Bucket tags"),
            Err(e) => warn!(bucket, error = %e, "Bucket tag lookup failed"),
        }
    }
}
