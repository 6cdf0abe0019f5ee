mod common;

use common::Harness;
use redshift_api::FaultKind;
use redshift_reconciler::reconciler::data_share_authorization::DataShareAuthorizationConfig;
use redshift_reconciler::reconciler::data_share_consumer_association::DataShareConsumerAssociationConfig;
use redshift_reconciler::reconciler::{
    DataShareAuthorizationReconciler, DataShareConsumerAssociationReconciler,
};
use redshift_reconciler::{Error, Reconciler};

const CONSUMER: &str = "210987654321";
/// Account of the simulator, consuming its own shares in the tests below.
const OWN_ACCOUNT: &str = "123456789012";

#[tokio::test]
async fn test_create_waits_out_stale_reads() {
    let h = Harness::new();
    let arn = h.sim.seed_data_share("producer-ns", "sales").await;
    h.sim.serve_stale_data_share_reads(2).await;
    let authorizations = h.reconciler(DataShareAuthorizationReconciler::new);

    let applied = authorizations
        .create(&DataShareAuthorizationConfig {
            data_share_arn: arn.clone(),
            consumer_identifier: CONSUMER.to_string(),
            allow_writes: None,
        })
        .await
        .unwrap();

    assert_eq!(applied.id, format!("{},{}", arn, CONSUMER));
    assert_eq!(applied.state.data_share_arn, arn);
    assert_eq!(applied.state.status, "AUTHORIZED");
    assert!(h.sim.call_count("DescribeDataShares").await >= 3);
}

#[tokio::test]
async fn test_stale_read_is_not_mistaken_for_the_share() {
    let h = Harness::new();
    let arn = h.sim.seed_data_share("producer-ns", "sales").await;
    let authorizations = h.reconciler(DataShareAuthorizationReconciler::new);
    let config = DataShareAuthorizationConfig {
        data_share_arn: arn.clone(),
        consumer_identifier: CONSUMER.to_string(),
        allow_writes: None,
    };
    let applied = authorizations.create(&config).await.unwrap();

    h.sim.serve_stale_data_share_reads(1).await;
    assert_eq!(authorizations.read(&applied.id).await.unwrap(), None);

    let state = authorizations.read(&applied.id).await.unwrap().unwrap();
    assert_eq!(state.data_share_arn, arn);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = Harness::new();
    let arn = h.sim.seed_data_share("producer-ns", "sales").await;
    let authorizations = h.reconciler(DataShareAuthorizationReconciler::new);
    let config = DataShareAuthorizationConfig {
        data_share_arn: arn,
        consumer_identifier: CONSUMER.to_string(),
        allow_writes: Some(false),
    };
    let applied = authorizations.create(&config).await.unwrap();

    authorizations.delete(&applied.id, &config).await.unwrap();
    authorizations.delete(&applied.id, &config).await.unwrap();

    assert_eq!(authorizations.read(&applied.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_second_authorization_fails_loudly() {
    let h = Harness::new();
    let arn = h.sim.seed_data_share("producer-ns", "sales").await;
    let authorizations = h.reconciler(DataShareAuthorizationReconciler::new);
    let config = DataShareAuthorizationConfig {
        data_share_arn: arn,
        consumer_identifier: CONSUMER.to_string(),
        allow_writes: None,
    };
    authorizations.create(&config).await.unwrap();

    let err = authorizations.create(&config).await.unwrap_err();

    assert!(matches!(err, Error::Api { .. }));
}

/// Seed a share and authorize the simulator's own account to consume it.
async fn authorized_share(h: &Harness) -> String {
    let arn = h.sim.seed_data_share("producer-ns", "sales").await;
    h.reconciler(DataShareAuthorizationReconciler::new)
        .create(&DataShareAuthorizationConfig {
            data_share_arn: arn.clone(),
            consumer_identifier: OWN_ACCOUNT.to_string(),
            allow_writes: None,
        })
        .await
        .unwrap();
    arn
}

fn consumer_association(arn: &str) -> DataShareConsumerAssociationConfig {
    DataShareConsumerAssociationConfig {
        data_share_arn: arn.to_string(),
        associate_entire_account: None,
        consumer_arn: None,
        consumer_region: None,
        allow_writes: None,
    }
}

#[tokio::test]
async fn test_entire_account_association_activates_authorization() {
    let h = Harness::new();
    let arn = authorized_share(&h).await;
    h.sim.serve_stale_data_share_reads(1).await;
    let associations = h.reconciler(DataShareConsumerAssociationReconciler::new);
    let config = DataShareConsumerAssociationConfig {
        associate_entire_account: Some(true),
        ..consumer_association(&arn)
    };

    let applied = associations.create(&config).await.unwrap();
    assert_eq!(applied.id, format!("{},true,,", arn));
    assert!(applied.state.associate_entire_account);
    assert_eq!(applied.state.status, "ACTIVE");
    assert_eq!(applied.state.consumer_region, None);

    let authorizations = h.reconciler(DataShareAuthorizationReconciler::new);
    let authorization_id = format!("{},{}", arn, OWN_ACCOUNT);
    let authorization = authorizations.read(&authorization_id).await.unwrap().unwrap();
    assert_eq!(authorization.status, "ACTIVE");

    associations.delete(&applied.id, &config).await.unwrap();
    assert_eq!(associations.read(&applied.id).await.unwrap(), None);
    let authorization = authorizations.read(&authorization_id).await.unwrap().unwrap();
    assert_eq!(authorization.status, "AUTHORIZED");
    associations.delete(&applied.id, &config).await.unwrap();
}

#[tokio::test]
async fn test_region_association_round_trips_through_import() {
    let h = Harness::new();
    let arn = authorized_share(&h).await;
    let associations = h.reconciler(DataShareConsumerAssociationReconciler::new);
    let config = DataShareConsumerAssociationConfig {
        consumer_region: Some("eu-west-1".to_string()),
        ..consumer_association(&arn)
    };

    let applied = associations.create(&config).await.unwrap();
    assert_eq!(applied.id, format!("{},false,,eu-west-1", arn));
    assert_eq!(applied.state.consumer_region.as_deref(), Some("eu-west-1"));

    let imported = associations.import(&applied.id).await.unwrap();
    assert_eq!(imported.state, applied.state);

    associations.delete(&applied.id, &config).await.unwrap();
    assert_eq!(associations.read(&applied.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_association_requires_authorization() {
    let h = Harness::new();
    let arn = h.sim.seed_data_share("producer-ns", "sales").await;
    let associations = h.reconciler(DataShareConsumerAssociationReconciler::new);

    let err = associations
        .create(&DataShareConsumerAssociationConfig {
            associate_entire_account: Some(true),
            ..consumer_association(&arn)
        })
        .await
        .unwrap_err();

    assert_eq!(err.fault_kind(), Some(FaultKind::InvalidState));
}

#[tokio::test]
async fn test_association_rejects_two_consumers_before_calling() {
    let h = Harness::new();
    let arn = authorized_share(&h).await;
    let associations = h.reconciler(DataShareConsumerAssociationReconciler::new);

    let err = associations
        .create(&DataShareConsumerAssociationConfig {
            associate_entire_account: Some(true),
            consumer_region: Some("eu-west-1".to_string()),
            ..consumer_association(&arn)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidConfig { .. }));
    assert_eq!(h.sim.call_count("AssociateDataShareConsumer").await, 0);
}
