//! s3gw - policy-enforcing gateway in front of S3-compatible object storage
//!
//! Every client request is mapped to an access request (principal, groups,
//! bucket owner, resource location, access type) and evaluated against the
//! published policy snapshot before it is forwarded to the storage backend.
//!
//! # Architecture
//!
//! ```text
//!   client ──► GatewayServer ──► RequestAuthorizer ──► PolicyStore snapshot
//!                  │                   │
//!                  │                   ├── KeyStore snapshot (access key → user)
//!                  │                   ├── BucketOwnerCache ──► storage admin API
//!                  │                   └── GroupResolver
//!                  ▼
//!             ProxyClient ──► storage backend
//!
//!   BackgroundRefresher ──► policy admin + storage admin ──► publish snapshots
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! $ s3gw --config /etc/s3gw/s3gw.toml
//!
//! $ S3GW_LISTEN_PORT=8080 \
//!   S3GW_BACKEND_URL=http://localhost:7480 \
//!   s3gw
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod access;
pub mod admin;
pub mod authorizer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod groups;
pub mod headers;
pub mod health;
pub mod owner_cache;
pub mod proxy;
pub mod refresher;
pub mod resource;
pub mod server;
pub mod shutdown;
pub mod signing;
pub mod tags;

pub use admin::{AdminClient, IdentitySource, StaticIdentitySource};
pub use authorizer::{Authorized, Denial, RequestAuthorizer};
pub use config::{GatewayConfig, GatewayConfigBuilder, GroupSource};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, Sources};
pub use groups::{GroupResolver, NoGroups, StaticGroupResolver, SystemGroupResolver};
pub use headers::ClientAddress;
pub use health::{HealthChecker, HealthStatus, ReadinessStatus};
pub use owner_cache::BucketOwnerCache;
pub use proxy::{ProxyClient, ProxyRequest, ProxyResponse};
pub use refresher::{BackgroundRefresher, RefreshState, RefreshStatus};
pub use server::GatewayServer;
pub use shutdown::ShutdownSignal;
pub use tags::{S3TagClient, StaticTagSource, Tag, TagSource};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
