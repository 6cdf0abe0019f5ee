mod common;

use std::collections::BTreeMap;

use common::{Harness, cluster_config};
use redshift_api::{FaultKind, Tags};
use redshift_reconciler::reconciler::integration::IntegrationConfig;
use redshift_reconciler::reconciler::{ClusterReconciler, IntegrationReconciler};
use redshift_reconciler::{Error, Reconciler};

const SOURCE: &str = "arn:aws:rds:us-west-2:123456789012:cluster:orders-db";

async fn integration_into_cluster(h: &Harness) -> IntegrationConfig {
    let cluster = h
        .reconciler(ClusterReconciler::new)
        .create(&cluster_config("analytics"))
        .await
        .unwrap();
    IntegrationConfig {
        name: "orders-to-analytics".to_string(),
        source_arn: SOURCE.to_string(),
        target_arn: cluster.state.cluster_namespace_arn.unwrap(),
        description: None,
        kms_key_id: None,
        additional_encryption_context: BTreeMap::new(),
        tags: Tags::new(),
    }
}

#[tokio::test]
async fn test_create_waits_until_active() {
    let h = Harness::new();
    let integrations = h.reconciler(IntegrationReconciler::new);
    let config = integration_into_cluster(&h).await;

    let applied = integrations.create(&config).await.unwrap();

    assert!(
        applied
            .id
            .starts_with("arn:aws:redshift:us-west-2:123456789012:integration:")
    );
    assert_eq!(applied.state.arn, applied.id);
    assert_eq!(applied.state.status, "active");
    assert_eq!(applied.state.target_arn, config.target_arn);
    assert!(applied.state.create_time.is_some());
    assert!(h.sim.call_count("DescribeIntegrations").await >= 2);
}

#[tokio::test]
async fn test_update_waits_out_modification_and_tags_by_arn() {
    let h = Harness::new();
    let integrations = h.reconciler(IntegrationReconciler::new);
    let old = integration_into_cluster(&h).await;
    let applied = integrations.create(&old).await.unwrap();

    let new = IntegrationConfig {
        description: Some("Orders replica".to_string()),
        tags: Tags::from([("team".to_string(), "data".to_string())]),
        ..old.clone()
    };
    let describes_before = h.sim.call_count("DescribeIntegrations").await;
    let state = integrations.update(&applied.id, &old, &new).await.unwrap();

    assert_eq!(state.status, "active");
    assert_eq!(state.description.as_deref(), Some("Orders replica"));
    assert_eq!(state.tags, new.tags);
    assert_eq!(h.sim.call_count("ModifyIntegration").await, 1);
    assert_eq!(h.sim.tags_of(&applied.id).await, new.tags);
    // One describe sees `modifying`, the next `active`, the last refreshes.
    assert!(h.sim.call_count("DescribeIntegrations").await - describes_before >= 3);
}

#[tokio::test]
async fn test_encryption_change_requires_replacement() {
    let h = Harness::new();
    let integrations = h.reconciler(IntegrationReconciler::new);
    let old = integration_into_cluster(&h).await;
    let applied = integrations.create(&old).await.unwrap();

    let new = IntegrationConfig {
        kms_key_id: Some("alias/orders".to_string()),
        ..old.clone()
    };
    let err = integrations
        .update(&applied.id, &old, &new)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ForceNew { attribute: "kms_key_id", .. }));
    assert_eq!(h.sim.call_count("ModifyIntegration").await, 0);
}

#[tokio::test]
async fn test_delete_waits_until_gone() {
    let h = Harness::new();
    let integrations = h.reconciler(IntegrationReconciler::new);
    let config = integration_into_cluster(&h).await;
    let applied = integrations.create(&config).await.unwrap();

    integrations.delete(&applied.id, &config).await.unwrap();
    assert_eq!(integrations.read(&applied.id).await.unwrap(), None);

    integrations.delete(&applied.id, &config).await.unwrap();
    assert_eq!(h.sim.call_count("DeleteIntegration").await, 2);
}

#[tokio::test]
async fn test_unknown_target_surfaces_fault() {
    let h = Harness::new();
    let integrations = h.reconciler(IntegrationReconciler::new);

    let err = integrations
        .create(&IntegrationConfig {
            name: "orders-to-nowhere".to_string(),
            source_arn: SOURCE.to_string(),
            target_arn: h.ctx.arn.redshift("namespace", "missing"),
            description: None,
            kms_key_id: None,
            additional_encryption_context: BTreeMap::new(),
            tags: Tags::new(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api { .. }));
    assert_eq!(err.fault_kind(), Some(FaultKind::NotFound));
}
