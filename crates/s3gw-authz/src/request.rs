//! Per-request fact bundle handed to the policy engine.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Permission category being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Read object or bucket data.
    Read,
    /// Create, overwrite or delete data.
    Write,
    /// Read an access control list.
    ReadAcp,
    /// Write an access control list.
    WriteAcp,
}

impl AccessType {
    /// Name as it appears in policy `accesses` entries.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadAcp => "read_acp",
            Self::WriteAcp => "write_acp",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The object-storage target of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResource {
    /// Owner of the container. Empty when unresolved.
    pub owner: String,
    /// Normalized `/container[/key]` location.
    pub location: String,
}

impl AccessResource {
    /// Create a resource.
    pub fn new(owner: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            location: location.into(),
        }
    }
}

/// Immutable facts about one request.
///
/// Built once by the request pipeline and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Authenticated principal.
    pub user: String,
    /// Groups of the principal.
    pub groups: Vec<String>,
    /// Target resource.
    pub resource: AccessResource,
    /// Permission being checked.
    pub access_type: AccessType,
    /// When the request arrived.
    pub access_time: DateTime<Utc>,
    /// Original client address, as text.
    pub client_ip: String,
    /// Address of the directly connected peer.
    pub remote_ip: String,
    /// Forwarded-for chain, including the direct peer.
    pub forwarded_addresses: Vec<String>,
    /// HTTP method.
    pub action: String,
}

impl AccessRequest {
    /// Start building a request for `user`.
    pub fn builder(user: impl Into<String>) -> AccessRequestBuilder {
        AccessRequestBuilder::new(user)
    }

    /// Whether the principal is listed in `groups`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Parse the client address.
    pub fn client_addr(&self) -> Option<IpAddr> {
        self.client_ip.trim().parse().ok()
    }
}

/// Builder for [`AccessRequest`].
#[derive(Debug, Clone)]
pub struct AccessRequestBuilder {
    user: String,
    groups: Vec<String>,
    resource: AccessResource,
    access_type: AccessType,
    access_time: Option<DateTime<Utc>>,
    client_ip: String,
    remote_ip: String,
    forwarded_addresses: Vec<String>,
    action: String,
}

impl AccessRequestBuilder {
    fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            groups: Vec::new(),
            resource: AccessResource::default(),
            access_type: AccessType::Read,
            access_time: None,
            client_ip: String::new(),
            remote_ip: String::new(),
            forwarded_addresses: Vec::new(),
            action: String::new(),
        }
    }

    /// Set the groups.
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Set the resource.
    pub fn resource(mut self, owner: impl Into<String>, location: impl Into<String>) -> Self {
        self.resource = AccessResource::new(owner, location);
        self
    }

    /// Set the access type.
    pub fn access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }

    /// Set the arrival time. Defaults to now.
    pub fn access_time(mut self, time: DateTime<Utc>) -> Self {
        self.access_time = Some(time);
        self
    }

    /// Set the client address. The remote address defaults to the same value.
    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    /// Set the direct peer address.
    pub fn remote_ip(mut self, ip: impl Into<String>) -> Self {
        self.remote_ip = ip.into();
        self
    }

    /// Set the forwarded-for chain.
    pub fn forwarded_addresses(mut self, chain: Vec<String>) -> Self {
        self.forwarded_addresses = chain;
        self
    }

    /// Set the HTTP method.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Build the request.
    pub fn build(self) -> AccessRequest {
        let remote_ip = if self.remote_ip.is_empty() {
            self.client_ip.clone()
        } else {
            self.remote_ip
        };
        AccessRequest {
            user: self.user,
            groups: self.groups,
            resource: self.resource,
            access_type: self.access_type,
            access_time: self.access_time.unwrap_or_else(Utc::now),
            client_ip: self.client_ip,
            remote_ip,
            forwarded_addresses: self.forwarded_addresses,
            action: self.action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_type_names() {
        assert_eq!(AccessType::Read.as_str(), "read");
        assert_eq!(AccessType::WriteAcp.to_string(), "write_acp");
        let json = serde_json::to_string(&AccessType::ReadAcp).unwrap();
        assert_eq!(json, "\"read_acp\"");
    }

    #[test]
    fn test_builder_defaults_remote_to_client() {
        let request = AccessRequest::builder("alice")
            .groups(["dev"])
            .resource("alice", "/data")
            .access_type(AccessType::Write)
            .client_ip("10.0.0.1")
            .action("PUT")
            .build();

        assert_eq!(request.remote_ip, "10.0.0.1");
        assert!(request.in_group("dev"));
        assert!(!request.in_group("ops"));
        assert_eq!(request.client_addr(), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_unparsable_client_address() {
        let request = AccessRequest::builder("alice").client_ip("nope").build();
        assert_eq!(request.client_addr(), None);
    }
}
