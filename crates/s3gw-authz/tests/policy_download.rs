//! Integration tests against a realistic policy download document.

use s3gw_authz::{
    AccessRequest, AccessType, PolicySnapshot, PolicySource, PolicyStore, ServicePolicies,
    StaticPolicySource,
};

const DOWNLOAD: &str = r#"{
    "serviceName": "s3",
    "serviceId": 3,
    "policyVersion": 27,
    "policyUpdateTime": 1704067200000,
    "policies": [
        {
            "id": 10,
            "guid": "b1f6b6c2",
            "isEnabled": true,
            "version": 2,
            "service": "s3",
            "name": "data-bucket",
            "policyType": 0,
            "resources": {
                "path": {"values": ["/data"], "isExcludes": false, "isRecursive": true}
            },
            "policyItems": [
                {
                    "accesses": [{"type": "read", "isAllowed": true}],
                    "users": ["reader"],
                    "groups": [],
                    "conditions": [],
                    "delegateAdmin": false
                },
                {
                    "accesses": [
                        {"type": "read", "isAllowed": true},
                        {"type": "write", "isAllowed": true}
                    ],
                    "users": ["writer"],
                    "groups": ["etl"],
                    "conditions": [],
                    "delegateAdmin": false
                },
                {
                    "accesses": [{"type": "read", "isAllowed": true}],
                    "users": ["remote"],
                    "conditions": [{"type": "ipaddress-in-range", "values": ["10.20.0.0/16"]}]
                }
            ],
            "denyPolicyItems": [
                {
                    "accesses": [{"type": "write", "isAllowed": true}],
                    "users": [],
                    "groups": ["contractors"],
                    "conditions": []
                }
            ],
            "allowExceptions": [],
            "denyExceptions": [],
            "dataMaskPolicyItems": [],
            "rowFilterPolicyItems": []
        },
        {
            "id": 4,
            "name": "disabled-catch-all",
            "isEnabled": false,
            "resources": {"path": {"values": ["*"], "isRecursive": false}},
            "policyItems": [{"accesses": [{"type": "read", "isAllowed": true}], "groups": ["public"]}]
        },
        {
            "id": 20,
            "name": "home-buckets",
            "isEnabled": true,
            "resources": {"path": {"values": ["/home-*"], "isRecursive": true}},
            "policyItems": [
                {
                    "accesses": [
                        {"type": "read", "isAllowed": true},
                        {"type": "write", "isAllowed": true},
                        {"type": "read_acp", "isAllowed": true},
                        {"type": "write_acp", "isAllowed": true}
                    ],
                    "users": ["{OWNER}"]
                }
            ]
        }
    ],
    "serviceDef": {
        "name": "s3",
        "resources": [{"itemId": 1, "name": "path", "level": 10, "recursiveSupported": true}],
        "accessTypes": [
            {"itemId": 1, "name": "read", "label": "Read"},
            {"itemId": 2, "name": "write", "label": "Write"},
            {"itemId": 3, "name": "read_acp", "label": "Read ACL"},
            {"itemId": 4, "name": "write_acp", "label": "Write ACL"}
        ]
    }
}"#;

fn store() -> PolicyStore {
    let service: ServicePolicies = serde_json::from_str(DOWNLOAD).unwrap();
    PolicyStore::from_service(service)
}

fn request(user: &str, groups: &[&str], owner: &str, location: &str, access: AccessType) -> AccessRequest {
    AccessRequest::builder(user)
        .groups(groups.iter().copied())
        .resource(owner, location)
        .access_type(access)
        .client_ip("10.20.1.1")
        .action("GET")
        .build()
}

#[test]
fn test_snapshot_metadata() {
    let store = store();
    assert_eq!(store.service_name(), "s3");
    assert_eq!(store.policy_version(), Some(27));
    assert_eq!(store.policy_update_time(), Some(1_704_067_200_000));
    assert_eq!(store.policy_ids(), vec![10, 20]);
}

#[test]
fn test_acl_read_requires_read_acp() {
    let store = store();
    assert!(store.evaluate(&request("reader", &[], "", "/data", AccessType::Read)));
    assert!(!store.evaluate(&request("reader", &[], "", "/data", AccessType::ReadAcp)));
}

#[test]
fn test_write_grant_and_group_deny() {
    let store = store();
    assert!(store.evaluate(&request("writer", &[], "", "/data/file", AccessType::Write)));
    assert!(store.evaluate(&request("bot", &["etl"], "", "/data/file", AccessType::Write)));

    let decision = store.evaluate_detailed(&request(
        "writer",
        &["contractors"],
        "",
        "/data/file",
        AccessType::Write,
    ));
    assert!(!decision.allowed);
    assert_eq!(decision.policy_name.as_deref(), Some("data-bucket"));
    assert_eq!(decision.reason, "denied by deny item");
}

#[test]
fn test_ip_condition() {
    let store = store();
    assert!(store.evaluate(&request("remote", &[], "", "/data/x", AccessType::Read)));

    let outside = AccessRequest::builder("remote")
        .resource("", "/data/x")
        .access_type(AccessType::Read)
        .client_ip("172.16.0.9")
        .build();
    assert!(!store.evaluate(&outside));
}

#[test]
fn test_disabled_policy_does_not_grant() {
    let store = store();
    assert!(!store.evaluate(&request("stranger", &[], "", "/other", AccessType::Read)));
}

#[test]
fn test_owner_token() {
    let store = store();
    assert!(store.evaluate(&request("alice", &[], "alice", "/home-alice/notes", AccessType::WriteAcp)));
    assert!(!store.evaluate(&request("bob", &[], "alice", "/home-alice/notes", AccessType::Read)));
}

#[test]
fn test_failed_refresh_keeps_last_good_snapshot() {
    tokio_test::block_on(async {
        let service: ServicePolicies = serde_json::from_str(DOWNLOAD).unwrap();
        let source = StaticPolicySource::new(service);
        let published = PolicySnapshot::new(PolicyStore::from_service(source.fetch().await.unwrap()));

        let sample = request("reader", &[], "", "/data/a", AccessType::Read);
        let before = published.snapshot().evaluate(&sample);

        source.fail();
        match source.fetch().await {
            Ok(policies) => published.publish(PolicyStore::from_service(policies)),
            Err(e) => assert!(e.is_retryable()),
        }

        assert_eq!(published.snapshot().evaluate(&sample), before);
        assert_eq!(published.snapshot().policy_version(), Some(27));
    });
}
