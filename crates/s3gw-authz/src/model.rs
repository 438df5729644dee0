//! Policy data model.
//!
//! These types mirror the JSON document served by the policy-distribution
//! endpoint. Field names are camelCase on the wire and every field is optional,
//! so partially populated documents still decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Users-list token that matches when the principal owns the resource.
pub const USER_OWNER: &str = "{OWNER}";

/// Users-list token that matches any authenticated principal.
pub const USER_CURRENT: &str = "{USER}";

/// Group every principal implicitly belongs to.
pub const GROUP_PUBLIC: &str = "public";

/// Kind of a policy, as encoded in `policyType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    /// Access-control policy. The only kind the engine evaluates.
    Access,
    /// Data-masking policy.
    DataMask,
    /// Row-filter policy.
    RowFilter,
    /// Any value this engine does not recognize.
    Unknown(i32),
}

impl From<i32> for PolicyType {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Access,
            1 => Self::DataMask,
            2 => Self::RowFilter,
            other => Self::Unknown(other),
        }
    }
}

/// The full policy download for one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicePolicies {
    /// Service name.
    pub service_name: String,
    /// Service identifier.
    pub service_id: i64,
    /// Monotonic version of the policy set.
    pub policy_version: Option<i64>,
    /// Last update time in epoch milliseconds.
    pub policy_update_time: Option<i64>,
    /// Policies of the service.
    pub policies: Vec<Policy>,
    /// Service definition.
    pub service_def: ServiceDefinition,
}

/// A named, versioned rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    /// Policy identifier. Policies are evaluated in ascending order of this value.
    pub id: i64,
    /// Globally unique identifier.
    pub guid: String,
    /// Disabled policies never take part in evaluation.
    pub is_enabled: bool,
    /// Policy revision.
    pub version: i64,
    /// Owning service.
    pub service: String,
    /// Human readable name.
    pub name: String,
    /// Raw policy type, see [`PolicyType`].
    pub policy_type: i32,
    /// Free-form description.
    pub description: String,
    /// Whether access through this policy is audited.
    pub is_audit_enabled: bool,
    /// Resource dimension name to pattern.
    pub resources: BTreeMap<String, ResourcePattern>,
    /// Allow clauses.
    pub policy_items: Vec<PolicyItem>,
    /// Deny clauses.
    pub deny_policy_items: Vec<PolicyItem>,
    /// Exceptions to allow clauses. Not evaluated.
    pub allow_exceptions: Vec<PolicyItem>,
    /// Exceptions to deny clauses. Not evaluated.
    pub deny_exceptions: Vec<PolicyItem>,
    /// Data-mask clauses. Not evaluated.
    pub data_mask_policy_items: Vec<PolicyItem>,
    /// Row-filter clauses. Not evaluated.
    pub row_filter_policy_items: Vec<PolicyItem>,
    /// Labels attached to the policy.
    pub policy_labels: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            id: 0,
            guid: String::new(),
            is_enabled: true,
            version: 0,
            service: String::new(),
            name: String::new(),
            policy_type: 0,
            description: String::new(),
            is_audit_enabled: false,
            resources: BTreeMap::new(),
            policy_items: Vec::new(),
            deny_policy_items: Vec::new(),
            allow_exceptions: Vec::new(),
            deny_exceptions: Vec::new(),
            data_mask_policy_items: Vec::new(),
            row_filter_policy_items: Vec::new(),
            policy_labels: Vec::new(),
        }
    }
}

impl Policy {
    /// Decoded policy type.
    pub fn kind(&self) -> PolicyType {
        PolicyType::from(self.policy_type)
    }

    /// Whether the engine should consider this policy at all.
    pub fn is_evaluable(&self) -> bool {
        self.is_enabled && self.kind() == PolicyType::Access
    }
}

/// Patterns for one resource dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourcePattern {
    /// Glob patterns.
    pub values: Vec<String>,
    /// Exclude flag. Carried but not consulted during matching.
    pub is_excludes: bool,
    /// Recursive flag: the pattern also covers everything below it.
    pub is_recursive: bool,
}

impl ResourcePattern {
    /// Create a pattern set from values.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            is_excludes: false,
            is_recursive: false,
        }
    }

    /// Mark the pattern as recursive.
    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.is_recursive = true;
        self
    }

    /// Mark the pattern as excluding.
    #[must_use]
    pub fn excludes(mut self) -> Self {
        self.is_excludes = true;
        self
    }
}

/// One rule clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyItem {
    /// Access types covered by the clause.
    pub accesses: Vec<Access>,
    /// Users the clause applies to.
    pub users: Vec<String>,
    /// Groups the clause applies to.
    pub groups: Vec<String>,
    /// Conditions gating the clause.
    pub conditions: Vec<Condition>,
    /// Whether the users may administer the policy.
    pub delegate_admin: bool,
}

impl PolicyItem {
    /// Create an empty clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add users.
    #[must_use]
    pub fn users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }

    /// Add groups.
    #[must_use]
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Add an allowed access type.
    #[must_use]
    pub fn allow(mut self, access_type: impl Into<String>) -> Self {
        self.accesses.push(Access::allowed(access_type));
        self
    }

    /// Add a condition.
    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether the clause lists `access_type` with the allowed flag set.
    pub fn permits(&self, access_type: &str) -> bool {
        self.accesses
            .iter()
            .any(|a| a.is_allowed && a.access_type == access_type)
    }
}

/// Access type entry of a clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Access {
    /// Access type name (`read`, `write`, `read_acp`, `write_acp`).
    #[serde(rename = "type")]
    pub access_type: String,
    /// Whether the access is granted (or, in a deny clause, denied).
    pub is_allowed: bool,
}

impl Access {
    /// An allowed access entry.
    pub fn allowed(access_type: impl Into<String>) -> Self {
        Self {
            access_type: access_type.into(),
            is_allowed: true,
        }
    }
}

/// A typed predicate with its values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    /// Condition kind, e.g. `ipaddress-in-range`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific values.
    pub values: Vec<String>,
}

impl Condition {
    /// Create a condition.
    pub fn new<I, S>(kind: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Subset of the service definition the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDefinition {
    /// Definition identifier.
    pub id: i64,
    /// Service type name.
    pub name: String,
    /// Definition revision.
    pub version: i64,
    /// Resource dimensions of the service.
    pub resources: Vec<ServiceResource>,
    /// Access types of the service.
    pub access_types: Vec<AccessTypeDef>,
    /// Condition kinds declared by the service.
    pub policy_conditions: Vec<PolicyConditionDef>,
}

/// Resource dimension declared by a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceResource {
    /// Item identifier.
    pub item_id: i64,
    /// Dimension name, e.g. `path`.
    pub name: String,
    /// Hierarchy level.
    pub level: i32,
    /// Whether recursive patterns are allowed.
    pub recursive_supported: bool,
    /// Whether exclude patterns are allowed.
    pub excludes_supported: bool,
}

/// Access type declared by a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessTypeDef {
    /// Item identifier.
    pub item_id: i64,
    /// Access type name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Access types implied by this one.
    pub implied_grants: Vec<String>,
}

/// Condition kind declared by a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConditionDef {
    /// Item identifier.
    pub item_id: i64,
    /// Condition kind name.
    pub name: String,
    /// Evaluator class name on the policy server.
    pub evaluator: String,
    /// Display label.
    pub label: String,
}
