//! Condition predicates attached to policy items.

use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use tracing::{debug, warn};

use crate::error::{AuthzError, AuthzResult};
use crate::model::Condition;
use crate::request::AccessRequest;

/// Condition kind checking the client address against CIDR ranges.
pub const IP_IN_RANGE: &str = "ipaddress-in-range";

/// Evaluates condition predicates against a request.
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Check whether a single condition holds for `request`.
    ///
    /// Unknown kinds and unparsable client addresses are errors. Callers treat
    /// an error as the condition not holding.
    pub fn holds(condition: &Condition, request: &AccessRequest) -> AuthzResult<bool> {
        match condition.kind.as_str() {
            IP_IN_RANGE => Self::ip_in_range(&condition.values, &request.client_ip),
            other => Err(AuthzError::UnsupportedCondition(other.to_string())),
        }
    }

    /// Check a condition list. Empty lists are satisfied; otherwise at least
    /// one condition has to hold.
    pub fn satisfied(conditions: &[Condition], request: &AccessRequest) -> bool {
        if conditions.is_empty() {
            return true;
        }
        conditions
            .iter()
            .any(|condition| match Self::holds(condition, request) {
                Ok(holds) => holds,
                Err(e) => {
                    debug!(
                        condition = %condition.kind,
                        error = %e,
                        "Condition evaluation failed; treating as not satisfied"
                    );
                    false
                }
            })
    }

    fn ip_in_range(ranges: &[String], client_ip: &str) -> AuthzResult<bool> {
        let addr: IpAddr = client_ip
            .trim()
            .parse()
            .map_err(|_| AuthzError::InvalidAddress(client_ip.to_string()))?;

        for range in ranges {
            match IpNetwork::from_str(range.trim()) {
                Ok(network) => {
                    if network.contains(addr) {
                        return Ok(true);
                    }
                }
                Err(e) => {
                    warn!(range = %range, error = %e, "Skipping malformed CIDR in condition");
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from(ip: &str) -> AccessRequest {
        AccessRequest::builder("alice").client_ip(ip).build()
    }

    #[test]
    fn test_ip_in_range() {
        let condition = Condition::new(IP_IN_RANGE, ["10.0.0.0/8", "192.168.1.0/24"]);
        assert!(ConditionEvaluator::holds(&condition, &request_from("10.1.2.3")).unwrap());
        assert!(ConditionEvaluator::holds(&condition, &request_from("192.168.1.7")).unwrap());
        assert!(!ConditionEvaluator::holds(&condition, &request_from("172.16.0.1")).unwrap());
    }

    #[test]
    fn test_ipv6_range() {
        let condition = Condition::new(IP_IN_RANGE, ["fd00::/8"]);
        assert!(ConditionEvaluator::holds(&condition, &request_from("fd00::1")).unwrap());
    }

    #[test]
    fn test_malformed_cidr_is_skipped() {
        let condition = Condition::new(IP_IN_RANGE, ["not-a-cidr", "10.0.0.0/8"]);
        assert!(ConditionEvaluator::holds(&condition, &request_from("10.0.0.5")).unwrap());

        let only_bad = Condition::new(IP_IN_RANGE, ["garbage"]);
        assert!(!ConditionEvaluator::holds(&only_bad, &request_from("10.0.0.5")).unwrap());
    }

    #[test]
    fn test_unparsable_client_ip() {
        let condition = Condition::new(IP_IN_RANGE, ["10.0.0.0/8"]);
        let err = ConditionEvaluator::holds(&condition, &request_from("unknown")).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidAddress(_)));
    }

    #[test]
    fn test_unknown_kind() {
        let condition = Condition::new("time-of-day", ["09:00-17:00"]);
        let err = ConditionEvaluator::holds(&condition, &request_from("10.0.0.1")).unwrap_err();
        assert!(matches!(err, AuthzError::UnsupportedCondition(kind) if kind == "time-of-day"));
    }

    #[test]
    fn test_list_semantics() {
        let request = request_from("10.0.0.1");
        assert!(ConditionEvaluator::satisfied(&[], &request));

        let unknown = Condition::new("time-of-day", ["any"]);
        let matching = Condition::new(IP_IN_RANGE, ["10.0.0.0/24"]);
        let missing = Condition::new(IP_IN_RANGE, ["192.168.0.0/16"]);

        assert!(!ConditionEvaluator::satisfied(&[unknown.clone()], &request));
        assert!(ConditionEvaluator::satisfied(&[unknown, matching.clone()], &request));
        assert!(!ConditionEvaluator::satisfied(&[missing.clone()], &request));
        assert!(ConditionEvaluator::satisfied(&[missing, matching], &request));
    }
}
