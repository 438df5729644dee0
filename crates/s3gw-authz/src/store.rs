//! Immutable policy snapshot.

use serde::Serialize;
use tracing::{debug, trace};

use crate::evaluator::{AccessEvaluator, Verdict};
use crate::matcher::PolicyMatcher;
use crate::model::{Policy, ServicePolicies};
use crate::request::AccessRequest;
use crate::score::item_score;

/// Result of evaluating a request against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether access is granted.
    pub allowed: bool,
    /// Policy that decided, if any matched the resource.
    pub policy_id: Option<i64>,
    /// Name of the deciding policy.
    pub policy_name: Option<String>,
    /// Short reason for logs. Never sent to clients.
    pub reason: &'static str,
}

impl Decision {
    fn no_match() -> Self {
        Self {
            allowed: false,
            policy_id: None,
            policy_name: None,
            reason: "no policy matched resource",
        }
    }

    fn from_verdict(policy: &Policy, verdict: Verdict) -> Self {
        Self {
            allowed: verdict.is_allowed(),
            policy_id: Some(policy.id),
            policy_name: Some(policy.name.clone()),
            reason: verdict.reason(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredPolicy {
    policy: Policy,
    allow_scores: Vec<i32>,
    deny_scores: Vec<i32>,
}

/// The complete, ordered policy set of one service.
///
/// A store is built once from a download and never mutated. Replacing the
/// policy set means building a new store and publishing it.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    service_name: String,
    policy_version: Option<i64>,
    policy_update_time: Option<i64>,
    policies: Vec<StoredPolicy>,
}

impl PolicyStore {
    /// Create an empty store for `service_name`. Denies everything.
    pub fn empty(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Build a store from a policy download.
    ///
    /// Disabled policies and non-access policy types are dropped, and the rest
    /// are ordered by ascending id.
    pub fn from_service(service: ServicePolicies) -> Self {
        let total = service.policies.len();
        let access_types = service.service_def.access_types.len();

        let mut policies: Vec<StoredPolicy> = service
            .policies
            .into_iter()
            .filter(Policy::is_evaluable)
            .map(|policy| StoredPolicy {
                allow_scores: policy
                    .policy_items
                    .iter()
                    .map(|item| item_score(item, access_types))
                    .collect(),
                deny_scores: policy
                    .deny_policy_items
                    .iter()
                    .map(|item| item_score(item, access_types))
                    .collect(),
                policy,
            })
            .collect();
        policies.sort_by_key(|stored| stored.policy.id);

        debug!(
            service = %service.service_name,
            version = ?service.policy_version,
            loaded = policies.len(),
            skipped = total - policies.len(),
            "Built policy snapshot"
        );

        Self {
            service_name: service.service_name,
            policy_version: service.policy_version,
            policy_update_time: service.policy_update_time,
            policies,
        }
    }

    /// Whether `request` is allowed.
    pub fn evaluate(&self, request: &AccessRequest) -> bool {
        self.evaluate_detailed(request).allowed
    }

    /// Evaluate and report which policy decided.
    ///
    /// The first policy, by ascending id, whose resources match the request
    /// location decides; later policies are not consulted.
    pub fn evaluate_detailed(&self, request: &AccessRequest) -> Decision {
        let location = request.resource.location.as_str();
        for stored in &self.policies {
            let policy = &stored.policy;
            if !PolicyMatcher::policy_matches(policy, location) {
                continue;
            }
            let verdict = AccessEvaluator::evaluate(policy, request);
            trace!(
                policy_id = policy.id,
                policy = %policy.name,
                ?verdict,
                "Resource-matched policy decided"
            );
            return Decision::from_verdict(policy, verdict);
        }
        Decision::no_match()
    }

    /// Service the policies belong to.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Version of the downloaded policy set.
    pub fn policy_version(&self) -> Option<i64> {
        self.policy_version
    }

    /// Update time of the downloaded policy set, in epoch milliseconds.
    pub fn policy_update_time(&self) -> Option<i64> {
        self.policy_update_time
    }

    /// Number of evaluable policies.
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Policy ids in evaluation order.
    pub fn policy_ids(&self) -> Vec<i64> {
        self.policies.iter().map(|s| s.policy.id).collect()
    }

    /// Priority scores of a policy's allow and deny items.
    pub fn item_scores(&self, policy_id: i64) -> Option<(&[i32], &[i32])> {
        self.policies
            .iter()
            .find(|s| s.policy.id == policy_id)
            .map(|s| (s.allow_scores.as_slice(), s.deny_scores.as_slice()))
    }
}
