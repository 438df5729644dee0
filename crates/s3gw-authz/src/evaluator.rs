//! Allow/deny evaluation of a single resource-matched policy.
//!
//! Evaluation runs in two passes. The allow pass grants access when an allow
//! item names the principal, lists the access type as allowed and has its
//! conditions satisfied. The deny pass then runs over every deny item; a
//! deny item that names the principal, lists the access type and has its
//! conditions satisfied revokes the grant. Without a grant from the allow pass
//! the answer is always no.

use tracing::trace;

use crate::condition::ConditionEvaluator;
use crate::model::{Policy, PolicyItem, GROUP_PUBLIC, USER_CURRENT, USER_OWNER};
use crate::request::AccessRequest;

/// Outcome of evaluating one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// An allow item granted access and no deny item revoked it.
    Allowed,
    /// No allow item granted access.
    NoMatchingAllow,
    /// A deny item revoked the grant.
    Denied,
}

impl Verdict {
    /// Whether access is granted.
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Short reason used in decision logs.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Allowed => "allowed by policy item",
            Self::NoMatchingAllow => "no allow item matched",
            Self::Denied => "denied by deny item",
        }
    }
}

/// Decides access for a policy that already matched the request's resource.
pub struct AccessEvaluator;

impl AccessEvaluator {
    /// Decide whether `request` is allowed by `policy`.
    pub fn decide(policy: &Policy, request: &AccessRequest) -> bool {
        Self::evaluate(policy, request).is_allowed()
    }

    /// Decide and report which pass settled the outcome.
    pub fn evaluate(policy: &Policy, request: &AccessRequest) -> Verdict {
        let access = request.access_type.as_str();

        let granted = policy.policy_items.iter().any(|item| {
            let applies = Self::item_applies(item, request, access);
            trace!(policy_id = policy.id, applies, "allow item");
            applies
        });
        if !granted {
            return Verdict::NoMatchingAllow;
        }

        let revoked = policy.deny_policy_items.iter().any(|item| {
            let applies = Self::item_applies(item, request, access);
            trace!(policy_id = policy.id, applies, "deny item");
            applies
        });
        if revoked {
            Verdict::Denied
        } else {
            Verdict::Allowed
        }
    }

    /// Whether `item` names the principal, lists `access` as allowed and has
    /// its conditions satisfied.
    fn item_applies(item: &PolicyItem, request: &AccessRequest, access: &str) -> bool {
        Self::principal_matches(item, request)
            && item.permits(access)
            && ConditionEvaluator::satisfied(&item.conditions, request)
    }

    /// Whether the item's user or group clause covers the request's principal.
    pub fn principal_matches(item: &PolicyItem, request: &AccessRequest) -> bool {
        item.users.iter().any(|user| user_matches(user, request))
            || item.groups.iter().any(|group| group_matches(group, request))
    }
}

fn user_matches(entry: &str, request: &AccessRequest) -> bool {
    match entry {
        USER_CURRENT => !request.user.is_empty(),
        USER_OWNER => is_owner(request),
        name => name == request.user,
    }
}

fn group_matches(entry: &str, request: &AccessRequest) -> bool {
    match entry {
        GROUP_PUBLIC => true,
        USER_OWNER => is_owner(request),
        name => request.in_group(name),
    }
}

fn is_owner(request: &AccessRequest) -> bool {
    !request.resource.owner.is_empty() && request.resource.owner == request.user
}
