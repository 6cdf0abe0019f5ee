mod common;

use common::{Harness, cluster_config};
use redshift_api::FaultKind;
use redshift_api::fault::codes;
use redshift_reconciler::reconciler::snapshot_schedule::SnapshotScheduleConfig;
use redshift_reconciler::reconciler::snapshot_schedule_association::SnapshotScheduleAssociationConfig;
use redshift_reconciler::reconciler::{
    ClusterReconciler, SnapshotScheduleAssociationReconciler, SnapshotScheduleReconciler,
};
use redshift_reconciler::{Error, Reconciler};

fn schedule_config(force_destroy: bool) -> SnapshotScheduleConfig {
    SnapshotScheduleConfig {
        identifier: "nightly".to_string(),
        definitions: vec!["rate(12 hours)".to_string()],
        force_destroy,
        ..Default::default()
    }
}

/// Two clusters attached to the `nightly` schedule.
async fn attached_schedule(h: &Harness, force_destroy: bool) -> SnapshotScheduleConfig {
    let clusters = h.reconciler(ClusterReconciler::new);
    let schedules = h.reconciler(SnapshotScheduleReconciler::new);
    let associations = h.reconciler(SnapshotScheduleAssociationReconciler::new);

    let config = schedule_config(force_destroy);
    schedules.create(&config).await.unwrap();
    for cluster in ["alpha", "beta"] {
        clusters.create(&cluster_config(cluster)).await.unwrap();
        let applied = associations
            .create(&SnapshotScheduleAssociationConfig {
                cluster_identifier: cluster.to_string(),
                schedule_identifier: "nightly".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(applied.id, format!("{}/nightly", cluster));
        assert_eq!(applied.state.schedule_association_state, "ACTIVE");
    }
    config
}

#[tokio::test]
async fn test_association_lifecycle() {
    let h = Harness::new();
    attached_schedule(&h, false).await;
    let associations = h.reconciler(SnapshotScheduleAssociationReconciler::new);
    let config = SnapshotScheduleAssociationConfig {
        cluster_identifier: "alpha".to_string(),
        schedule_identifier: "nightly".to_string(),
    };

    let state = associations.read("alpha/nightly").await.unwrap().unwrap();
    assert_eq!(state.cluster_identifier, "alpha");
    assert_eq!(state.schedule_identifier, "nightly");

    associations.delete("alpha/nightly", &config).await.unwrap();
    associations.delete("alpha/nightly", &config).await.unwrap();
    assert_eq!(associations.read("alpha/nightly").await.unwrap(), None);
    assert!(associations.read("beta/nightly").await.unwrap().is_some());
}

#[tokio::test]
async fn test_force_destroy_detaches_every_cluster_first() {
    let h = Harness::new();
    let config = attached_schedule(&h, true).await;
    let schedules = h.reconciler(SnapshotScheduleReconciler::new);

    let state = schedules.read("nightly").await.unwrap().unwrap();
    let mut attached = state.associated_clusters;
    attached.sort();
    assert_eq!(attached, vec!["alpha".to_string(), "beta".to_string()]);

    schedules.delete("nightly", &config).await.unwrap();

    // Two associations plus two disassociations.
    assert_eq!(h.sim.call_count("ModifyClusterSnapshotSchedule").await, 4);
    assert_eq!(h.sim.call_count("DeleteSnapshotSchedule").await, 1);
    assert_eq!(schedules.read("nightly").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_without_force_surfaces_dependency_fault() {
    let h = Harness::new();
    let config = attached_schedule(&h, false).await;
    let schedules = h.reconciler(SnapshotScheduleReconciler::new);

    let err = schedules.delete("nightly", &config).await.unwrap_err();

    match err {
        Error::Api { fault, .. } => {
            assert_eq!(fault.kind, FaultKind::InvalidState);
            assert_eq!(fault.code, codes::INVALID_CLUSTER_SNAPSHOT_SCHEDULE_STATE);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(schedules.read("nightly").await.unwrap().is_some());
}

#[tokio::test]
async fn test_definitions_update_ignores_order() {
    let h = Harness::new();
    let schedules = h.reconciler(SnapshotScheduleReconciler::new);
    let old = SnapshotScheduleConfig {
        definitions: vec!["rate(12 hours)".to_string(), "cron(0 3 * * ? *)".to_string()],
        ..schedule_config(false)
    };
    schedules.create(&old).await.unwrap();

    let reordered = SnapshotScheduleConfig {
        definitions: vec!["cron(0 3 * * ? *)".to_string(), "rate(12 hours)".to_string()],
        ..old.clone()
    };
    schedules.update("nightly", &old, &reordered).await.unwrap();
    assert_eq!(h.sim.call_count("ModifySnapshotSchedule").await, 0);

    let changed = SnapshotScheduleConfig {
        definitions: vec!["rate(6 hours)".to_string()],
        ..old.clone()
    };
    let state = schedules.update("nightly", &old, &changed).await.unwrap();
    assert_eq!(h.sim.call_count("ModifySnapshotSchedule").await, 1);
    assert_eq!(state.definitions, vec!["rate(6 hours)".to_string()]);
}

#[tokio::test]
async fn test_description_change_requires_replacement() {
    let h = Harness::new();
    let schedules = h.reconciler(SnapshotScheduleReconciler::new);
    let old = schedule_config(false);
    schedules.create(&old).await.unwrap();

    let new = SnapshotScheduleConfig {
        description: Some("twice a day".to_string()),
        ..old.clone()
    };
    let err = schedules.update("nightly", &old, &new).await.unwrap_err();

    assert!(matches!(err, Error::ForceNew { attribute: "description", .. }));
}
