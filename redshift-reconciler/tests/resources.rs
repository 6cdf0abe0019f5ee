mod common;

use common::{Harness, cluster_config};
use redshift_api::fault::codes;
use redshift_api::resources::ScheduledActionTarget;
use redshift_api::{ApiFault, ArnContext, FaultKind, MemoryRedshift, RedshiftApi, Tags};
use redshift_reconciler::finder::all_pages;
use redshift_reconciler::reconciler::authentication_profile::AuthenticationProfileConfig;
use redshift_reconciler::reconciler::cluster_snapshot::ClusterSnapshotConfig;
use redshift_reconciler::reconciler::endpoint_access::EndpointAccessConfig;
use redshift_reconciler::reconciler::endpoint_authorization::EndpointAuthorizationConfig;
use redshift_reconciler::reconciler::event_subscription::EventSubscriptionConfig;
use redshift_reconciler::reconciler::hsm_client_certificate::HsmClientCertificateConfig;
use redshift_reconciler::reconciler::hsm_configuration::HsmConfigurationConfig;
use redshift_reconciler::reconciler::scheduled_action::ScheduledActionConfig;
use redshift_reconciler::reconciler::subnet_group::SubnetGroupConfig;
use redshift_reconciler::reconciler::usage_limit::UsageLimitConfig;
use redshift_reconciler::reconciler::{
    AuthenticationProfileReconciler, ClusterReconciler, ClusterSnapshotReconciler,
    EndpointAccessReconciler, EndpointAuthorizationReconciler, EventSubscriptionReconciler,
    HsmClientCertificateReconciler, HsmConfigurationReconciler, ScheduledActionReconciler,
    SubnetGroupReconciler, UsageLimitReconciler,
};
use redshift_reconciler::{Error, Reconciler};

fn subnet_group(subnets: &[&str]) -> SubnetGroupConfig {
    SubnetGroupConfig {
        name: "private".to_string(),
        description: "Private subnets".to_string(),
        subnet_ids: subnets.iter().map(|s| s.to_string()).collect(),
        tags: Tags::new(),
    }
}

#[tokio::test]
async fn test_subnet_group_sends_full_subnet_set_once() {
    let h = Harness::new();
    let groups = h.reconciler(SubnetGroupReconciler::new);
    let old = subnet_group(&["subnet-a", "subnet-b"]);
    groups.create(&old).await.unwrap();

    let new = subnet_group(&["subnet-b", "subnet-c"]);
    let state = groups.update("private", &old, &new).await.unwrap();

    assert_eq!(h.sim.call_count("ModifyClusterSubnetGroup").await, 1);
    let mut subnets = state.subnet_ids;
    subnets.sort();
    assert_eq!(subnets, vec!["subnet-b".to_string(), "subnet-c".to_string()]);

    groups.update("private", &new, &new).await.unwrap();
    assert_eq!(h.sim.call_count("ModifyClusterSubnetGroup").await, 1);
}

#[tokio::test]
async fn test_subnet_group_requires_subnets() {
    let h = Harness::new();
    let groups = h.reconciler(SubnetGroupReconciler::new);

    let err = groups.create(&subnet_group(&[])).await.unwrap_err();

    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert_eq!(h.sim.call_count("CreateClusterSubnetGroup").await, 0);
}

#[tokio::test]
async fn test_subnet_group_delete_is_idempotent() {
    let h = Harness::new();
    let groups = h.reconciler(SubnetGroupReconciler::new);
    let config = subnet_group(&["subnet-a"]);
    groups.create(&config).await.unwrap();

    groups.delete("private", &config).await.unwrap();
    groups.delete("private", &config).await.unwrap();

    assert_eq!(groups.read("private").await.unwrap(), None);
}

#[tokio::test]
async fn test_default_tags_apply_and_ignored_prefixes_stay_hidden() {
    let sim = MemoryRedshift::new(ArnContext::default());
    let mut h = Harness::with_sim(sim);
    let ctx = (*h.ctx)
        .clone()
        .with_default_tags(Tags::from([("team".to_string(), "data".to_string())]))
        .with_ignore_tag_prefixes(vec!["billing:".to_string()]);
    h.ctx = std::sync::Arc::new(ctx);
    let groups = h.reconciler(SubnetGroupReconciler::new);
    let config = subnet_group(&["subnet-a"]);
    let applied = groups.create(&config).await.unwrap();

    let arn = h.ctx.arn.subnet_group("private");
    h.sim
        .create_tags(&arn, Tags::from([("billing:code".to_string(), "42".to_string())]))
        .await
        .unwrap();

    assert_eq!(applied.state.tags["team"], "data");
    let state = groups.read("private").await.unwrap().unwrap();
    assert_eq!(
        state.tags,
        Tags::from([("team".to_string(), "data".to_string())])
    );
    assert_eq!(h.sim.tags_of(&arn).await.len(), 2);
}

#[tokio::test]
async fn test_usage_limit_uses_remote_identifier() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let limits = h.reconciler(UsageLimitReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();

    let old = UsageLimitConfig {
        cluster_identifier: "analytics".to_string(),
        feature_type: "concurrency-scaling".to_string(),
        limit_type: "time".to_string(),
        amount: 60,
        period: None,
        breach_action: None,
        tags: Tags::new(),
    };
    let applied = limits.create(&old).await.unwrap();
    assert_eq!(applied.id, applied.state.usage_limit_id);
    assert_eq!(applied.state.period, "monthly");

    let new = UsageLimitConfig {
        amount: 120,
        ..old.clone()
    };
    let state = limits.update(&applied.id, &old, &new).await.unwrap();
    assert_eq!(state.amount, 120);
    assert_eq!(h.sim.call_count("ModifyUsageLimit").await, 1);

    let moved = UsageLimitConfig {
        feature_type: "spectrum".to_string(),
        ..new.clone()
    };
    let err = limits.update(&applied.id, &new, &moved).await.unwrap_err();
    assert!(matches!(err, Error::ForceNew { attribute: "feature_type", .. }));

    limits.delete(&applied.id, &new).await.unwrap();
    limits.delete(&applied.id, &new).await.unwrap();
    assert_eq!(limits.read(&applied.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_usage_limit_create_waits_out_lagging_read() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let limits = h.reconciler(UsageLimitReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();
    h.sim
        .inject_fault(
            "DescribeUsageLimits",
            ApiFault::not_found(codes::USAGE_LIMIT_NOT_FOUND, "lagging replica"),
            2,
        )
        .await;

    let applied = limits
        .create(&UsageLimitConfig {
            cluster_identifier: "analytics".to_string(),
            feature_type: "spectrum".to_string(),
            limit_type: "data-scanned".to_string(),
            amount: 10,
            period: Some("weekly".to_string()),
            breach_action: Some("disable".to_string()),
            tags: Tags::new(),
        })
        .await
        .unwrap();

    assert_eq!(applied.state.period, "weekly");
    assert_eq!(h.sim.call_count("CreateUsageLimit").await, 1);
    assert_eq!(h.sim.call_count("DescribeUsageLimits").await, 3);
}

#[tokio::test]
async fn test_subnet_group_create_waits_out_lagging_read() {
    let h = Harness::new();
    let groups = h.reconciler(SubnetGroupReconciler::new);
    h.sim
        .inject_fault(
            "DescribeClusterSubnetGroups",
            ApiFault::not_found(codes::CLUSTER_SUBNET_GROUP_NOT_FOUND, "lagging replica"),
            1,
        )
        .await;

    let applied = groups.create(&subnet_group(&["subnet-a"])).await.unwrap();

    assert_eq!(applied.id, "private");
    assert_eq!(h.sim.call_count("CreateClusterSubnetGroup").await, 1);
}

#[tokio::test]
async fn test_endpoint_access_provisions_and_deletes() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let groups = h.reconciler(SubnetGroupReconciler::new);
    let endpoints = h.reconciler(EndpointAccessReconciler::new);
    groups.create(&subnet_group(&["subnet-a"])).await.unwrap();
    clusters.create(&cluster_config("analytics")).await.unwrap();

    let old = EndpointAccessConfig {
        endpoint_name: "bi-tools".to_string(),
        cluster_identifier: "analytics".to_string(),
        subnet_group_name: "private".to_string(),
        resource_owner: None,
        vpc_security_group_ids: vec!["sg-1".to_string()],
    };
    let applied = endpoints.create(&old).await.unwrap();
    assert_eq!(applied.id, "bi-tools");
    assert_eq!(applied.state.port, Some(5439));
    assert_eq!(applied.state.resource_owner, "123456789012");

    let new = EndpointAccessConfig {
        vpc_security_group_ids: vec!["sg-1".to_string(), "sg-2".to_string()],
        ..old.clone()
    };
    let state = endpoints.update("bi-tools", &old, &new).await.unwrap();
    assert_eq!(state.vpc_security_group_ids.len(), 2);
    assert_eq!(h.sim.call_count("ModifyEndpointAccess").await, 1);

    endpoints.delete("bi-tools", &new).await.unwrap();
    assert_eq!(endpoints.read("bi-tools").await.unwrap(), None);
    endpoints.delete("bi-tools", &new).await.unwrap();
}

#[tokio::test]
async fn test_cluster_snapshot_waits_available() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let snapshots = h.reconciler(ClusterSnapshotReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();

    let old = ClusterSnapshotConfig {
        snapshot_identifier: "before-upgrade".to_string(),
        cluster_identifier: "analytics".to_string(),
        manual_snapshot_retention_period: None,
        tags: Tags::new(),
    };
    let applied = snapshots.create(&old).await.unwrap();
    assert_eq!(applied.state.manual_snapshot_retention_period, -1);
    assert_eq!(
        applied.state.arn,
        h.ctx.arn.snapshot("analytics", "before-upgrade")
    );

    let new = ClusterSnapshotConfig {
        manual_snapshot_retention_period: Some(7),
        ..old.clone()
    };
    let state = snapshots.update("before-upgrade", &old, &new).await.unwrap();
    assert_eq!(state.manual_snapshot_retention_period, 7);

    snapshots.delete("before-upgrade", &new).await.unwrap();
    snapshots.delete("before-upgrade", &new).await.unwrap();
}

#[tokio::test]
async fn test_hsm_certificate_only_updates_tags() {
    let h = Harness::new();
    let certificates = h.reconciler(HsmClientCertificateReconciler::new);
    let old = HsmClientCertificateConfig {
        identifier: "hsm-client".to_string(),
        tags: Tags::new(),
    };
    let applied = certificates.create(&old).await.unwrap();
    assert!(applied.state.public_key.starts_with("-----BEGIN CERTIFICATE-----"));

    let new = HsmClientCertificateConfig {
        tags: Tags::from([("owner".to_string(), "security".to_string())]),
        ..old.clone()
    };
    let state = certificates.update("hsm-client", &old, &new).await.unwrap();
    assert_eq!(state.tags, new.tags);

    let renamed = HsmClientCertificateConfig {
        identifier: "other".to_string(),
        ..new.clone()
    };
    let err = certificates
        .update("hsm-client", &new, &renamed)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ForceNew { attribute: "identifier", .. }));
}

#[tokio::test]
async fn test_scheduled_action_retries_role_propagation() {
    let h = Harness::new();
    h.sim
        .inject_fault(
            "CreateScheduledAction",
            ApiFault::new(
                FaultKind::RolePropagation,
                codes::INVALID_SCHEDULED_ACTION,
                "The IAM role cannot be assumed by the scheduler.",
            ),
            2,
        )
        .await;
    let actions = h.reconciler(ScheduledActionReconciler::new);
    let old = ScheduledActionConfig {
        name: "nightly-pause".to_string(),
        target_action: ScheduledActionTarget::PauseCluster {
            cluster_identifier: "analytics".to_string(),
        },
        schedule: "cron(0 22 * * ? *)".to_string(),
        iam_role: "arn:aws:iam::123456789012:role/scheduler".to_string(),
        description: None,
        enable: true,
        start_time: None,
        end_time: None,
    };

    let applied = actions.create(&old).await.unwrap();
    assert_eq!(h.sim.call_count("CreateScheduledAction").await, 3);
    assert!(applied.state.enable);

    let new = ScheduledActionConfig {
        enable: false,
        ..old.clone()
    };
    let state = actions.update("nightly-pause", &old, &new).await.unwrap();
    assert!(!state.enable);

    actions.update("nightly-pause", &new, &new).await.unwrap();
    assert_eq!(h.sim.call_count("ModifyScheduledAction").await, 1);
}

#[tokio::test]
async fn test_lookups_walk_every_page() {
    let h = Harness::with_sim(MemoryRedshift::new(ArnContext::default()).with_page_size(1));
    let clusters = h.reconciler(ClusterReconciler::new);
    for id in ["alpha", "beta", "gamma"] {
        clusters.create(&cluster_config(id)).await.unwrap();
    }

    let client = h.client();
    let client = client.as_ref();
    let all = all_pages(move |marker| client.describe_clusters(None, marker))
        .await
        .unwrap();

    let ids: Vec<_> = all.iter().map(|c| c.cluster_identifier.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
    assert!(clusters.read("gamma").await.unwrap().is_some());
}

fn event_subscription() -> EventSubscriptionConfig {
    EventSubscriptionConfig {
        name: "ops-alerts".to_string(),
        sns_topic_arn: "arn:aws:sns:us-west-2:123456789012:ops".to_string(),
        source_type: Some("cluster".to_string()),
        source_ids: vec!["analytics".to_string()],
        event_categories: vec!["monitoring".to_string()],
        severity: Some("ERROR".to_string()),
        enabled: true,
        tags: Tags::new(),
    }
}

#[tokio::test]
async fn test_event_subscription_waits_active_and_modifies_once() {
    let h = Harness::new();
    let subscriptions = h.reconciler(EventSubscriptionReconciler::new);
    let old = event_subscription();

    let applied = subscriptions.create(&old).await.unwrap();
    assert_eq!(applied.id, "ops-alerts");
    assert_eq!(applied.state.status, "active");
    assert_eq!(applied.state.customer_aws_id, "123456789012");
    assert_eq!(applied.state.arn, h.ctx.arn.event_subscription("ops-alerts"));
    assert!(h.sim.call_count("DescribeEventSubscriptions").await >= 2);

    let new = EventSubscriptionConfig {
        severity: Some("INFO".to_string()),
        tags: Tags::from([("team".to_string(), "ops".to_string())]),
        ..old.clone()
    };
    let state = subscriptions.update("ops-alerts", &old, &new).await.unwrap();
    assert_eq!(state.severity.as_deref(), Some("INFO"));
    assert_eq!(state.tags, new.tags);
    assert_eq!(h.sim.call_count("ModifyEventSubscription").await, 1);
    assert_eq!(h.sim.call_count("CreateTags").await, 1);

    subscriptions.delete("ops-alerts", &new).await.unwrap();
    assert_eq!(subscriptions.read("ops-alerts").await.unwrap(), None);
    subscriptions.delete("ops-alerts", &new).await.unwrap();
}

#[tokio::test]
async fn test_event_subscription_create_fails_on_lost_topic_access() {
    let h = Harness::with_sim(MemoryRedshift::new(ArnContext::default()).with_settle_polls(1_000));
    let subscriptions = h.reconciler(EventSubscriptionReconciler::new);

    let revoke_topic = async {
        while h.sim.call_count("CreateEventSubscription").await == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        h.sim
            .set_event_subscription_status("ops-alerts", "no-permission")
            .await;
    };
    let subscription = event_subscription();
    let (created, ()) = tokio::join!(subscriptions.create(&subscription), revoke_topic);

    let err = created.unwrap_err();
    assert!(
        matches!(&err, Error::WaitFailure { state, .. } if state == "no-permission"),
        "{err}"
    );
}

#[tokio::test]
async fn test_hsm_configuration_waits_out_lagging_read() {
    let h = Harness::new();
    h.sim
        .inject_fault(
            "DescribeHsmConfigurations",
            ApiFault::not_found(codes::HSM_CONFIGURATION_NOT_FOUND, "lagging replica"),
            1,
        )
        .await;
    let configurations = h.reconciler(HsmConfigurationReconciler::new);
    let old = HsmConfigurationConfig {
        identifier: "hsm-prod".to_string(),
        description: "Production HSM".to_string(),
        hsm_ip_address: "10.0.0.50".to_string(),
        hsm_partition_name: "partition-1".to_string(),
        hsm_partition_password: "s3cret-partition".to_string(),
        hsm_server_public_certificate: "-----BEGIN CERTIFICATE-----".to_string(),
        tags: Tags::new(),
    };
    assert!(!format!("{:?}", old).contains("s3cret-partition"));

    let applied = configurations.create(&old).await.unwrap();
    assert_eq!(applied.id, "hsm-prod");
    assert_eq!(applied.state.hsm_partition_name, "partition-1");
    assert_eq!(h.sim.call_count("CreateHsmConfiguration").await, 1);
    assert_eq!(h.sim.call_count("DescribeHsmConfigurations").await, 2);

    let new = HsmConfigurationConfig {
        tags: Tags::from([("owner".to_string(), "security".to_string())]),
        ..old.clone()
    };
    let state = configurations.update("hsm-prod", &old, &new).await.unwrap();
    assert_eq!(state.tags, new.tags);

    let rotated = HsmConfigurationConfig {
        hsm_partition_password: "rotated".to_string(),
        ..new.clone()
    };
    let err = configurations
        .update("hsm-prod", &new, &rotated)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ForceNew {
            attribute: "hsm_partition_password",
            ..
        }
    ));

    configurations.delete("hsm-prod", &new).await.unwrap();
    assert_eq!(configurations.read("hsm-prod").await.unwrap(), None);
}

#[tokio::test]
async fn test_authentication_profile_skips_equivalent_content() {
    let h = Harness::new();
    let profiles = h.reconciler(AuthenticationProfileReconciler::new);
    let old = AuthenticationProfileConfig {
        name: "sso".to_string(),
        content: r#"{"AllowDBUserOverride":"1","App_ID":"example"}"#.to_string(),
    };
    let applied = profiles.create(&old).await.unwrap();
    assert_eq!(applied.id, "sso");
    assert_eq!(applied.state.content, old.content);

    let reformatted = AuthenticationProfileConfig {
        content: "{ \"App_ID\": \"example\", \"AllowDBUserOverride\": \"1\" }".to_string(),
        ..old.clone()
    };
    profiles.update("sso", &old, &reformatted).await.unwrap();
    assert_eq!(h.sim.call_count("ModifyAuthenticationProfile").await, 0);

    let changed = AuthenticationProfileConfig {
        content: r#"{"AllowDBUserOverride":"0","App_ID":"example"}"#.to_string(),
        ..old.clone()
    };
    let state = profiles.update("sso", &reformatted, &changed).await.unwrap();
    assert_eq!(state.content, changed.content);
    assert_eq!(h.sim.call_count("ModifyAuthenticationProfile").await, 1);

    profiles.delete("sso", &changed).await.unwrap();
    profiles.delete("sso", &changed).await.unwrap();
    assert_eq!(profiles.read("sso").await.unwrap(), None);
}

#[tokio::test]
async fn test_authentication_profile_rejects_invalid_json_locally() {
    let h = Harness::new();
    let profiles = h.reconciler(AuthenticationProfileReconciler::new);

    let err = profiles
        .create(&AuthenticationProfileConfig {
            name: "sso".to_string(),
            content: "{not json".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert_eq!(h.sim.call_count("CreateAuthenticationProfile").await, 0);
}

const GRANTEE: &str = "210987654321";

fn endpoint_authorization(vpcs: &[&str]) -> EndpointAuthorizationConfig {
    EndpointAuthorizationConfig {
        account: GRANTEE.to_string(),
        cluster_identifier: "analytics".to_string(),
        vpc_ids: vpcs.iter().map(|v| v.to_string()).collect(),
        force_delete: false,
    }
}

#[tokio::test]
async fn test_endpoint_authorization_swaps_vpcs_by_difference() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let authorizations = h.reconciler(EndpointAuthorizationReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();

    let old = endpoint_authorization(&["vpc-1", "vpc-2"]);
    let applied = authorizations.create(&old).await.unwrap();
    assert_eq!(applied.id, "210987654321:analytics");
    assert_eq!(applied.state.status, "Authorized");
    assert_eq!(applied.state.grantor, "123456789012");
    assert!(!applied.state.allowed_all_vpcs);

    let new = endpoint_authorization(&["vpc-2", "vpc-3"]);
    let state = authorizations
        .update(&applied.id, &old, &new)
        .await
        .unwrap();
    let mut vpcs = state.vpc_ids.clone();
    vpcs.sort();
    assert_eq!(vpcs, vec!["vpc-2", "vpc-3"]);
    assert_eq!(h.sim.call_count("RevokeEndpointAccess").await, 1);
    assert_eq!(h.sim.call_count("AuthorizeEndpointAccess").await, 2);

    let err = authorizations
        .update(&applied.id, &new, &endpoint_authorization(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ForceNew { attribute: "vpc_ids", .. }));
}

#[tokio::test]
async fn test_endpoint_authorization_delete_needs_force_for_grantee_endpoints() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let groups = h.reconciler(SubnetGroupReconciler::new);
    let endpoints = h.reconciler(EndpointAccessReconciler::new);
    let authorizations = h.reconciler(EndpointAuthorizationReconciler::new);
    groups.create(&subnet_group(&["subnet-a"])).await.unwrap();
    clusters.create(&cluster_config("analytics")).await.unwrap();
    let config = endpoint_authorization(&[]);
    let applied = authorizations.create(&config).await.unwrap();
    assert!(applied.state.allowed_all_vpcs);

    endpoints
        .create(&EndpointAccessConfig {
            endpoint_name: "partner-bi".to_string(),
            cluster_identifier: "analytics".to_string(),
            subnet_group_name: "private".to_string(),
            resource_owner: Some(GRANTEE.to_string()),
            vpc_security_group_ids: Vec::new(),
        })
        .await
        .unwrap();
    let state = authorizations.read(&applied.id).await.unwrap().unwrap();
    assert_eq!(state.endpoint_count, 1);

    let err = authorizations
        .delete(&applied.id, &config)
        .await
        .unwrap_err();
    assert_eq!(err.fault_kind(), Some(FaultKind::InvalidState));

    let forced = EndpointAuthorizationConfig {
        force_delete: true,
        ..config
    };
    authorizations.delete(&applied.id, &forced).await.unwrap();
    assert_eq!(authorizations.read(&applied.id).await.unwrap(), None);
    assert_eq!(endpoints.read("partner-bi").await.unwrap(), None);
    authorizations.delete(&applied.id, &forced).await.unwrap();
}
