mod common;

use common::{Harness, cluster_config};
use redshift_api::cluster::{DeleteClusterInput, ModifyClusterInput};
use redshift_api::fault::codes;
use redshift_api::resources::CreateClusterSnapshotInput;
use redshift_api::{ApiFault, FaultKind, MemoryRedshift, ArnContext, RedshiftApi, Tags};
use redshift_reconciler::reconciler::ClusterReconciler;
use redshift_reconciler::reconciler::cluster::{ClusterConfig, Logging, SnapshotCopy};
use redshift_reconciler::{Error, Reconciler};

#[tokio::test]
async fn test_create_projects_computed_attributes() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);

    let applied = clusters.create(&cluster_config("analytics")).await.unwrap();

    assert_eq!(applied.id, "analytics");
    let state = applied.state;
    assert_eq!(state.cluster_status, "available");
    assert_eq!(state.cluster_type, "multi-node");
    assert_eq!(state.number_of_nodes, 2);
    assert_eq!(state.port, Some(5439));
    let dns_name = state.dns_name.clone().unwrap();
    assert_eq!(state.endpoint, Some(format!("{}:5439", dns_name)));
    assert_eq!(state.arn, h.ctx.arn.cluster("analytics"));
    assert!(!state.availability_zone_relocation_enabled);
    assert!(!state.multi_az);
    assert!(state.logging.is_none());
}

#[tokio::test]
async fn test_create_requires_master_password() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let config = ClusterConfig {
        master_password: None,
        ..cluster_config("analytics")
    };

    let err = clusters.create(&config).await.unwrap_err();

    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert_eq!(h.sim.call_count("CreateCluster").await, 0);
}

#[tokio::test]
async fn test_create_retries_role_propagation() {
    let h = Harness::new();
    h.sim
        .inject_fault(
            "CreateCluster",
            ApiFault::new(
                FaultKind::RolePropagation,
                codes::INVALID_PARAMETER_VALUE,
                "The IAM role is not yet trusted.",
            ),
            1,
        )
        .await;
    let clusters = h.reconciler(ClusterReconciler::new);

    let applied = clusters.create(&cluster_config("analytics")).await.unwrap();

    assert_eq!(applied.state.cluster_status, "available");
    assert_eq!(h.sim.call_count("CreateCluster").await, 2);
}

#[tokio::test]
async fn test_create_surfaces_other_faults_unchanged() {
    let h = Harness::new();
    h.sim
        .inject_fault(
            "CreateCluster",
            ApiFault::new(FaultKind::QuotaExceeded, "ClusterQuotaExceeded", "Too many clusters."),
            1,
        )
        .await;
    let clusters = h.reconciler(ClusterReconciler::new);

    let err = clusters.create(&cluster_config("analytics")).await.unwrap_err();

    match err {
        Error::Api { fault, action, .. } => {
            assert_eq!(action, "creating");
            assert_eq!(fault.code, "ClusterQuotaExceeded");
            assert_eq!(fault.message, "Too many clusters.");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.sim.call_count("CreateCluster").await, 1);
}

#[tokio::test]
async fn test_update_sends_only_changed_fields() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = ClusterConfig {
        preferred_maintenance_window: Some("sun:01:00-sun:01:30".to_string()),
        iam_roles: vec!["arn:aws:iam::123456789012:role/loader".to_string()],
        ..cluster_config("analytics")
    };
    clusters.create(&old).await.unwrap();

    let new = ClusterConfig {
        preferred_maintenance_window: Some("mon:02:00-mon:02:30".to_string()),
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    assert_eq!(
        state.preferred_maintenance_window.as_deref(),
        Some("mon:02:00-mon:02:30")
    );
    let expected = ModifyClusterInput {
        preferred_maintenance_window: Some("mon:02:00-mon:02:30".to_string()),
        ..ModifyClusterInput::new("analytics")
    };
    assert_eq!(h.sim.modify_cluster_requests().await, vec![expected]);
    assert_eq!(h.sim.call_count("ModifyClusterIamRoles").await, 0);
    assert_eq!(h.sim.call_count("CreateTags").await, 0);
}

#[tokio::test]
async fn test_update_without_changes_issues_no_calls() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let config = cluster_config("analytics");
    clusters.create(&config).await.unwrap();

    clusters.update("analytics", &config, &config).await.unwrap();

    let mutations: Vec<_> = h
        .sim
        .calls()
        .await
        .into_iter()
        .filter(|c| !c.operation.starts_with("Describe") && c.operation != "CreateCluster")
        .collect();
    assert!(mutations.is_empty(), "unexpected calls: {:?}", mutations);
}

#[tokio::test]
async fn test_update_iam_roles_uses_set_difference() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let role = |name: &str| format!("arn:aws:iam::123456789012:role/{}", name);
    let old = ClusterConfig {
        iam_roles: vec![role("x"), role("y")],
        ..cluster_config("analytics")
    };
    clusters.create(&old).await.unwrap();

    let new = ClusterConfig {
        iam_roles: vec![role("y"), role("z")],
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    let requests = h.sim.iam_role_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].add_iam_roles, vec![role("z")]);
    assert_eq!(requests[0].remove_iam_roles, vec![role("x")]);
    let mut roles = state.iam_roles;
    roles.sort();
    assert_eq!(roles, vec![role("y"), role("z")]);
    assert!(h.sim.modify_cluster_requests().await.is_empty());
}

#[tokio::test]
async fn test_update_tags_only_touches_changed_keys() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = ClusterConfig {
        tags: Tags::from([
            ("team".to_string(), "data".to_string()),
            ("stage".to_string(), "dev".to_string()),
        ]),
        ..cluster_config("analytics")
    };
    clusters.create(&old).await.unwrap();

    let new = ClusterConfig {
        tags: Tags::from([
            ("team".to_string(), "data".to_string()),
            ("owner".to_string(), "ops".to_string()),
        ]),
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    assert_eq!(state.tags, new.tags);
    assert_eq!(h.sim.call_count("CreateTags").await, 1);
    assert_eq!(h.sim.call_count("DeleteTags").await, 1);
    assert!(h.sim.modify_cluster_requests().await.is_empty());
}

#[tokio::test]
async fn test_update_rejects_replacement_attribute() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = cluster_config("analytics");
    clusters.create(&old).await.unwrap();

    let new = ClusterConfig {
        port: Some(5440),
        ..old.clone()
    };
    let err = clusters.update("analytics", &old, &new).await.unwrap_err();

    assert!(matches!(err, Error::ForceNew { attribute: "port", .. }));
    assert!(h.sim.modify_cluster_requests().await.is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let config = cluster_config("analytics");
    clusters.create(&config).await.unwrap();

    clusters.delete("analytics", &config).await.unwrap();
    clusters.delete("analytics", &config).await.unwrap();

    assert!(!h.sim.has_cluster("analytics").await);
    assert_eq!(clusters.read("analytics").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_retries_busy_cluster() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let config = cluster_config("analytics");
    clusters.create(&config).await.unwrap();
    h.sim
        .inject_fault(
            "DeleteCluster",
            ApiFault::invalid_state(codes::INVALID_CLUSTER_STATE, "There is an operation running."),
            2,
        )
        .await;

    clusters.delete("analytics", &config).await.unwrap();

    assert_eq!(h.sim.call_count("DeleteCluster").await, 3);
    assert!(!h.sim.has_cluster("analytics").await);
}

#[tokio::test]
async fn test_delete_requires_final_snapshot_identifier() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let config = ClusterConfig {
        skip_final_snapshot: false,
        ..cluster_config("analytics")
    };
    clusters.create(&config).await.unwrap();

    let err = clusters.delete("analytics", &config).await.unwrap_err();

    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert_eq!(h.sim.call_count("DeleteCluster").await, 0);
}

#[tokio::test]
async fn test_read_after_out_of_band_delete() {
    let h = Harness::with_sim(MemoryRedshift::new(ArnContext::default()).with_settle_polls(0));
    let clusters = h.reconciler(ClusterReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();

    h.sim
        .delete_cluster(DeleteClusterInput {
            cluster_identifier: "analytics".to_string(),
            skip_final_cluster_snapshot: true,
            final_cluster_snapshot_identifier: None,
        })
        .await
        .unwrap();

    assert_eq!(clusters.read("analytics").await.unwrap(), None);
}

#[tokio::test]
async fn test_import_defaults_to_skipping_final_snapshot() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();

    let imported = clusters.import("analytics").await.unwrap();
    let config = ClusterConfig::from_imported(&imported.state);

    assert_eq!(imported.id, "analytics");
    assert!(config.skip_final_snapshot);
    assert_eq!(config.number_of_nodes, 2);
    clusters.delete(&imported.id, &config).await.unwrap();
}

#[tokio::test]
async fn test_import_of_unknown_cluster_is_not_found() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);

    let err = clusters.import("missing").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_aqua_change_reboots_when_applied_immediately() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = cluster_config("analytics");
    clusters.create(&old).await.unwrap();
    h.sim
        .inject_fault(
            "RebootCluster",
            ApiFault::invalid_state(codes::INVALID_CLUSTER_STATE, "There is an operation running."),
            1,
        )
        .await;

    let new = ClusterConfig {
        aqua_configuration_status: Some("enabled".to_string()),
        apply_immediately: true,
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    assert_eq!(state.aqua_configuration_status.as_deref(), Some("enabled"));
    assert_eq!(h.sim.call_count("ModifyAquaConfiguration").await, 1);
    assert_eq!(h.sim.call_count("RebootCluster").await, 2);
    assert!(h.sim.modify_cluster_requests().await.is_empty());
    let cluster = h
        .sim
        .describe_clusters(Some("analytics"), None)
        .await
        .unwrap()
        .items
        .remove(0);
    assert_eq!(cluster.cluster_status, "available");
    assert_eq!(cluster.aqua_configuration.unwrap().aqua_status, "enabled");
}

#[tokio::test]
async fn test_aqua_change_waits_for_next_reboot_by_default() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = cluster_config("analytics");
    clusters.create(&old).await.unwrap();

    let new = ClusterConfig {
        aqua_configuration_status: Some("enabled".to_string()),
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    assert_eq!(state.aqua_configuration_status.as_deref(), Some("enabled"));
    assert_eq!(h.sim.call_count("ModifyAquaConfiguration").await, 1);
    assert_eq!(h.sim.call_count("RebootCluster").await, 0);
    let cluster = h
        .sim
        .describe_clusters(Some("analytics"), None)
        .await
        .unwrap()
        .items
        .remove(0);
    assert_eq!(cluster.aqua_configuration.unwrap().aqua_status, "applying");
}

#[tokio::test]
async fn test_update_sends_secret_kms_key_for_managed_password() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = ClusterConfig {
        master_password: None,
        manage_master_password: true,
        ..cluster_config("analytics")
    };
    let created = clusters.create(&old).await.unwrap();
    assert!(created.state.master_password_secret_arn.is_some());

    let new = ClusterConfig {
        master_password_secret_kms_key_id: Some("alias/redshift-secrets".to_string()),
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    let expected = ModifyClusterInput {
        master_password_secret_kms_key_id: Some("alias/redshift-secrets".to_string()),
        ..ModifyClusterInput::new("analytics")
    };
    assert_eq!(h.sim.modify_cluster_requests().await, vec![expected]);
    assert_eq!(
        state.master_password_secret_kms_key_id.as_deref(),
        Some("alias/redshift-secrets")
    );
}

#[tokio::test]
async fn test_snapshot_copy_toggles_to_change_settings() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let plain = cluster_config("analytics");
    clusters.create(&plain).await.unwrap();

    let copy = SnapshotCopy {
        destination_region: "us-east-1".to_string(),
        retention_period: Some(7),
        grant_name: None,
    };
    let enabled = ClusterConfig {
        snapshot_copy: Some(copy.clone()),
        ..plain.clone()
    };
    let state = clusters.update("analytics", &plain, &enabled).await.unwrap();
    assert_eq!(state.snapshot_copy, Some(copy.clone()));
    assert_eq!(h.sim.call_count("EnableSnapshotCopy").await, 1);
    assert_eq!(h.sim.call_count("DisableSnapshotCopy").await, 0);

    // An active copy rejects a second enable; the update disables and re-enables it.
    let longer = ClusterConfig {
        snapshot_copy: Some(SnapshotCopy {
            retention_period: Some(14),
            ..copy
        }),
        ..plain.clone()
    };
    let state = clusters.update("analytics", &enabled, &longer).await.unwrap();
    assert_eq!(state.snapshot_copy.unwrap().retention_period, Some(14));
    assert_eq!(h.sim.call_count("EnableSnapshotCopy").await, 3);
    assert_eq!(h.sim.call_count("DisableSnapshotCopy").await, 1);

    let state = clusters.update("analytics", &longer, &plain).await.unwrap();
    assert_eq!(state.snapshot_copy, None);
    assert_eq!(h.sim.call_count("DisableSnapshotCopy").await, 2);
    assert!(h.sim.modify_cluster_requests().await.is_empty());
}

#[tokio::test]
async fn test_logging_is_enabled_and_disabled() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let plain = cluster_config("analytics");
    clusters.create(&plain).await.unwrap();

    let logged = ClusterConfig {
        logging: Some(Logging {
            bucket_name: Some("audit-logs".to_string()),
            s3_key_prefix: Some("redshift/".to_string()),
            ..Default::default()
        }),
        ..plain.clone()
    };
    let state = clusters.update("analytics", &plain, &logged).await.unwrap();

    let logging = state.logging.unwrap();
    assert_eq!(logging.bucket_name.as_deref(), Some("audit-logs"));
    assert_eq!(logging.s3_key_prefix.as_deref(), Some("redshift/"));
    assert_eq!(h.sim.call_count("EnableLogging").await, 1);

    let state = clusters.update("analytics", &logged, &plain).await.unwrap();
    assert_eq!(state.logging, None);
    assert_eq!(h.sim.call_count("DisableLogging").await, 1);
    assert!(h.sim.modify_cluster_requests().await.is_empty());
}

#[tokio::test]
async fn test_disabling_multi_az_restores_relocation_setting() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = ClusterConfig {
        multi_az: Some(true),
        availability_zone_relocation_enabled: Some(false),
        ..cluster_config("analytics")
    };
    let created = clusters.create(&old).await.unwrap();
    assert!(created.state.multi_az);

    let new = ClusterConfig {
        multi_az: Some(false),
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    let disable = ModifyClusterInput {
        multi_az: Some(false),
        ..ModifyClusterInput::new("analytics")
    };
    let realign = ModifyClusterInput {
        availability_zone_relocation: Some(false),
        ..ModifyClusterInput::new("analytics")
    };
    assert_eq!(h.sim.modify_cluster_requests().await, vec![disable, realign]);
    assert!(!state.multi_az);
    assert!(!state.availability_zone_relocation_enabled);
}

#[tokio::test]
async fn test_availability_zone_moves_in_its_own_request() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let old = ClusterConfig {
        availability_zone: Some("us-west-2a".to_string()),
        ..cluster_config("analytics")
    };
    clusters.create(&old).await.unwrap();

    let new = ClusterConfig {
        availability_zone: Some("us-west-2b".to_string()),
        preferred_maintenance_window: Some("mon:02:00-mon:02:30".to_string()),
        ..old.clone()
    };
    let state = clusters.update("analytics", &old, &new).await.unwrap();

    let settings = ModifyClusterInput {
        preferred_maintenance_window: Some("mon:02:00-mon:02:30".to_string()),
        ..ModifyClusterInput::new("analytics")
    };
    let relocate = ModifyClusterInput {
        availability_zone: Some("us-west-2b".to_string()),
        ..ModifyClusterInput::new("analytics")
    };
    assert_eq!(h.sim.modify_cluster_requests().await, vec![settings, relocate]);
    assert_eq!(state.availability_zone.as_deref(), Some("us-west-2b"));
}

#[tokio::test]
async fn test_create_restores_from_snapshot_and_tags_afterwards() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    clusters.create(&cluster_config("source")).await.unwrap();
    h.sim
        .create_cluster_snapshot(CreateClusterSnapshotInput {
            snapshot_identifier: "nightly".to_string(),
            cluster_identifier: "source".to_string(),
            manual_snapshot_retention_period: None,
            tags: Tags::new(),
        })
        .await
        .unwrap();

    let config = ClusterConfig {
        master_username: None,
        master_password: None,
        snapshot_identifier: Some("nightly".to_string()),
        tags: Tags::from([("team".to_string(), "data".to_string())]),
        ..cluster_config("restored")
    };
    let applied = clusters.create(&config).await.unwrap();

    assert_eq!(applied.id, "restored");
    assert_eq!(applied.state.cluster_status, "available");
    assert_eq!(applied.state.tags, config.tags);
    assert_eq!(h.sim.call_count("RestoreFromClusterSnapshot").await, 1);
    assert_eq!(h.sim.call_count("CreateCluster").await, 1);
    assert_eq!(h.sim.call_count("CreateTags").await, 1);

    let new = ClusterConfig {
        snapshot_identifier: Some("weekly".to_string()),
        ..config.clone()
    };
    let err = clusters.update("restored", &config, &new).await.unwrap_err();
    assert!(matches!(err, Error::ForceNew { attribute: "snapshot_identifier", .. }));
}

#[tokio::test]
async fn test_restore_from_missing_snapshot_is_not_found() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let config = ClusterConfig {
        snapshot_identifier: Some("missing".to_string()),
        ..cluster_config("restored")
    };

    let err = clusters.create(&config).await.unwrap_err();

    assert_eq!(err.fault_kind(), Some(FaultKind::NotFound));
    assert!(!h.sim.has_cluster("restored").await);
}

#[tokio::test]
async fn test_read_rejects_unknown_relocation_status() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();
    h.sim.set_relocation_status("analytics", "bogus").await;

    let err = clusters.read("analytics").await.unwrap_err();

    match err {
        Error::UnexpectedValue {
            attribute, value, ..
        } => {
            assert_eq!(attribute, "availability_zone_relocation_status");
            assert_eq!(value, "bogus");
        }
        other => panic!("unexpected error: {other}"),
    }
}
