//! s3gw Authorization - Policy Evaluation Engine
//!
//! This crate answers one question for the s3gw gateway: is this principal
//! allowed this kind of access to this object-storage location?
//!
//! # Overview
//!
//! - Decode policy downloads from the policy server ([`model`])
//! - Match resource patterns with glob and recursive semantics ([`matcher`])
//! - Evaluate allow and deny items with user, group and condition clauses
//!   ([`evaluator`], [`condition`])
//! - Hold policy and key data as immutable, atomically replaceable snapshots
//!   ([`store`], [`keys`], [`snapshot`])
//!
//! # Architecture
//!
//! ```text
//!                      ┌────────────────────────────┐
//!                      │   Policy server            │
//!                      └──────────┬─────────────────┘
//!                                 │ download (PolicySource)
//!                      ┌──────────▼─────────────────┐
//!                      │   PolicyStore::from_service│
//!                      │   (filter, sort, score)    │
//!                      └──────────┬─────────────────┘
//!                                 │ publish
//!                      ┌──────────▼─────────────────┐
//!      AccessRequest   │   PolicySnapshot           │
//!          │           │   (ArcSwap)                │
//!          ▼           └──────────┬─────────────────┘
//!     ┌────────────┐              │ first resource-matched policy
//!     │  Gateway   │──────────────▼
//!     │  pipeline  │   Decision (allow/deny)
//!     └────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use s3gw_authz::{
//!     AccessRequest, AccessType, Policy, PolicyItem, PolicyStore, ResourcePattern,
//!     ServicePolicies,
//! };
//!
//! let mut policy = Policy { id: 1, name: "data".into(), ..Policy::default() };
//! policy
//!     .resources
//!     .insert("path".into(), ResourcePattern::new(["/data"]).recursive());
//! policy.policy_items.push(PolicyItem::new().users(["alice"]).allow("read"));
//!
//! let store = PolicyStore::from_service(ServicePolicies {
//!     service_name: "s3".into(),
//!     policies: vec![policy],
//!     ..ServicePolicies::default()
//! });
//!
//! let request = AccessRequest::builder("alice")
//!     .resource("alice", "/data/report.csv")
//!     .access_type(AccessType::Read)
//!     .client_ip("10.0.0.1")
//!     .build();
//! assert!(store.evaluate(&request));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod condition;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod keys;
pub mod matcher;
pub mod model;
pub mod request;
pub mod score;
pub mod snapshot;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use condition::ConditionEvaluator;
pub use config::PolicyClientConfig;
pub use error::{AuthzError, AuthzResult};
pub use evaluator::{AccessEvaluator, Verdict};
pub use keys::KeyStore;
pub use matcher::PolicyMatcher;
pub use model::{
    Access, Condition, Policy, PolicyItem, PolicyType, ResourcePattern, ServiceDefinition,
    ServicePolicies,
};
pub use request::{AccessRequest, AccessResource, AccessType};
pub use snapshot::{KeySnapshot, PolicySnapshot, Published};
pub use source::{PolicySource, RangerPolicyClient, StaticPolicySource};
pub use store::{Decision, PolicyStore};
