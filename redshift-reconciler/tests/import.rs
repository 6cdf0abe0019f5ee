mod common;

use common::{Harness, cluster_config};
use redshift_reconciler::reconciler::partner::PartnerConfig;
use redshift_reconciler::reconciler::{
    ClusterReconciler, DataShareAuthorizationReconciler, PartnerReconciler,
    SnapshotScheduleAssociationReconciler,
};
use redshift_reconciler::{Error, Reconciler, ResourceKind};

#[tokio::test]
async fn test_association_import_requires_both_parts() {
    let h = Harness::new();
    let associations = h.reconciler(SnapshotScheduleAssociationReconciler::new);

    for raw in ["analytics", "analytics/", "/nightly", "a/b/c"] {
        let err = associations.import(raw).await.unwrap_err();
        assert!(
            matches!(
                err,
                Error::MalformedIdentifier {
                    kind: ResourceKind::SnapshotScheduleAssociation,
                    ..
                }
            ),
            "{raw:?} was accepted"
        );
    }
    assert!(h.sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_partner_import_rejects_short_identifier() {
    let h = Harness::new();
    let partners = h.reconciler(PartnerReconciler::new);

    let err = partners.import("123456789012:analytics:dev").await.unwrap_err();

    assert!(matches!(err, Error::MalformedIdentifier { .. }));
    assert!(h.sim.calls().await.is_empty());
}

#[tokio::test]
async fn test_data_share_import_rejects_missing_consumer() {
    let h = Harness::new();
    let authorizations = h.reconciler(DataShareAuthorizationReconciler::new);

    let err = authorizations
        .import("arn:aws:redshift:us-west-2:123456789012:datashare:ns/sales")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedIdentifier { .. }));
}

#[tokio::test]
async fn test_partner_round_trip_through_import() {
    let h = Harness::new();
    let clusters = h.reconciler(ClusterReconciler::new);
    let partners = h.reconciler(PartnerReconciler::new);
    clusters.create(&cluster_config("analytics")).await.unwrap();

    let config = PartnerConfig {
        account_id: String::new(),
        cluster_identifier: "analytics".to_string(),
        database_name: "dev".to_string(),
        partner_name: "Fivetran".to_string(),
    };
    let created = partners.create(&config).await.unwrap();
    assert_eq!(created.id, "123456789012:analytics:dev:Fivetran");

    let imported = partners.import(&created.id).await.unwrap();
    assert_eq!(imported.state, created.state);
    assert_eq!(imported.state.status, "Active");

    partners.delete(&created.id, &config).await.unwrap();
    partners.delete(&created.id, &config).await.unwrap();
    assert_eq!(partners.read(&created.id).await.unwrap(), None);
}
