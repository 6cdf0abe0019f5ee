use redshift_api::cluster::{CreateClusterInput, ModifyClusterInput, status};
use redshift_api::fault::codes;
use redshift_api::resources::AuthorizeDataShareInput;
use redshift_api::{ApiFault, ArnContext, FaultKind, MemoryRedshift, RedshiftApi, Tags};

fn create_input(id: &str) -> CreateClusterInput {
    CreateClusterInput {
        cluster_identifier: id.to_string(),
        cluster_type: "single-node".to_string(),
        node_type: "ra3.xlplus".to_string(),
        master_username: "admin".to_string(),
        master_user_password: Some("Sup3rSecret".to_string()),
        ..Default::default()
    }
}

async fn status_of(sim: &MemoryRedshift, id: &str) -> String {
    let page = sim.describe_clusters(Some(id), None).await.unwrap();
    page.items[0].cluster_status.clone()
}

#[tokio::test]
async fn test_cluster_settles_after_configured_polls() {
    let sim = MemoryRedshift::new(ArnContext::default()).with_settle_polls(2);
    sim.create_cluster(create_input("analytics")).await.unwrap();

    assert_eq!(status_of(&sim, "analytics").await, status::CREATING);
    assert_eq!(status_of(&sim, "analytics").await, status::CREATING);
    assert_eq!(status_of(&sim, "analytics").await, status::AVAILABLE);
}

#[tokio::test]
async fn test_busy_cluster_rejects_modification() {
    let sim = MemoryRedshift::new(ArnContext::default());
    sim.create_cluster(create_input("analytics")).await.unwrap();

    let fault = sim
        .modify_cluster(ModifyClusterInput::new("analytics"))
        .await
        .unwrap_err();

    assert_eq!(fault.kind, FaultKind::InvalidState);
    assert_eq!(fault.code, codes::INVALID_CLUSTER_STATE);
}

#[tokio::test]
async fn test_duplicate_create_is_already_exists() {
    let sim = MemoryRedshift::new(ArnContext::default());
    sim.create_cluster(create_input("analytics")).await.unwrap();

    let fault = sim.create_cluster(create_input("analytics")).await.unwrap_err();

    assert!(fault.is(FaultKind::AlreadyExists));
}

#[tokio::test]
async fn test_injected_faults_are_consumed_in_order() {
    let sim = MemoryRedshift::new(ArnContext::default());
    sim.inject_fault(
        "CreateCluster",
        ApiFault::new(FaultKind::Unavailable, "ServiceUnavailable", "try again"),
        1,
    )
    .await;

    let fault = sim.create_cluster(create_input("analytics")).await.unwrap_err();
    assert_eq!(fault.kind, FaultKind::Unavailable);
    sim.create_cluster(create_input("analytics")).await.unwrap();

    assert_eq!(sim.call_count("CreateCluster").await, 2);
    let calls = sim.calls().await;
    assert_eq!(calls[0].operation, "CreateCluster");
    assert_eq!(calls[0].target, "analytics");
}

#[tokio::test]
async fn test_system_tags_are_rejected() {
    let sim = MemoryRedshift::new(ArnContext::default());
    let input = CreateClusterInput {
        tags: Tags::from([("aws:cloudformation:stack".to_string(), "x".to_string())]),
        ..create_input("analytics")
    };

    let fault = sim.create_cluster(input).await.unwrap_err();

    assert_eq!(fault.kind, FaultKind::InvalidParameter);
    assert!(!sim.has_cluster("analytics").await);
}

#[tokio::test]
async fn test_stale_data_share_reads_return_another_share() {
    let sim = MemoryRedshift::new(ArnContext::default());
    let arn = sim.seed_data_share("producer-ns", "sales").await;
    sim.authorize_data_share(AuthorizeDataShareInput {
        data_share_arn: arn.clone(),
        consumer_identifier: "210987654321".to_string(),
        allow_writes: None,
    })
    .await
    .unwrap();
    sim.serve_stale_data_share_reads(1).await;

    let stale = sim.describe_data_shares(Some(&arn), None).await.unwrap();
    assert_ne!(stale.items[0].data_share_arn, arn);

    let fresh = sim.describe_data_shares(Some(&arn), None).await.unwrap();
    assert_eq!(fresh.items[0].data_share_arn, arn);
    assert_eq!(fresh.items[0].associations.len(), 1);
}

#[tokio::test]
async fn test_describe_pages_through_markers() {
    let sim = MemoryRedshift::new(ArnContext::default()).with_page_size(2);
    for id in ["a", "b", "c"] {
        sim.create_cluster(create_input(id)).await.unwrap();
    }

    let first = sim.describe_clusters(None, None).await.unwrap();
    assert_eq!(first.items.len(), 2);
    let second = sim.describe_clusters(None, first.marker.clone()).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert!(second.marker.is_none());
}
