//! Data share consumer association reconciler.
//!
//! The consumer side of a data share authorization: associates a share
//! with the whole consumer account, one namespace or one region.
//! Identified locally as
//! `data_share_arn,associate_entire_account,consumer_arn,consumer_region`
//! with the unused consumer parts left empty.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::RedshiftApi;
use redshift_api::resources::{
    AssociateDataShareConsumerInput, DataShare, DataShareAssociation,
    DisassociateDataShareConsumerInput, data_share_status,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
};
use crate::config::ProviderContext;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::identity::DATA_SHARE_CONSUMER_ASSOCIATION;
use crate::kind::ResourceKind;

const KIND: ResourceKind = ResourceKind::DataShareConsumerAssociation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShareConsumerAssociationConfig {
    pub data_share_arn: String,
    #[serde(default)]
    pub associate_entire_account: Option<bool>,
    #[serde(default)]
    pub consumer_arn: Option<String>,
    #[serde(default)]
    pub consumer_region: Option<String>,
    #[serde(default)]
    pub allow_writes: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataShareConsumerAssociationState {
    pub data_share_arn: String,
    pub associate_entire_account: bool,
    pub consumer_arn: Option<String>,
    pub consumer_region: Option<String>,
    pub producer_arn: String,
    pub status: String,
    pub allow_writes: bool,
}

/// The one consumer an association addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Consumer {
    EntireAccount,
    Namespace(String),
    Region(String),
}

impl Consumer {
    fn from_config(config: &DataShareConsumerAssociationConfig) -> Result<Self> {
        match (
            config.associate_entire_account.unwrap_or(false),
            &config.consumer_arn,
            &config.consumer_region,
        ) {
            (true, None, None) => Ok(Consumer::EntireAccount),
            (false, Some(arn), None) => Ok(Consumer::Namespace(arn.clone())),
            (false, None, Some(region)) => Ok(Consumer::Region(region.clone())),
            _ => Err(Error::invalid_config(
                KIND,
                &config.data_share_arn,
                "exactly one of associate_entire_account, consumer_arn and consumer_region must be set",
            )),
        }
    }

    /// Identifier parts after the data share ARN.
    fn parts(&self) -> [&str; 3] {
        match self {
            Consumer::EntireAccount => ["true", "", ""],
            Consumer::Namespace(arn) => ["false", arn.as_str(), ""],
            Consumer::Region(region) => ["false", "", region.as_str()],
        }
    }

    fn matches(&self, account: &str, association: &DataShareAssociation) -> bool {
        match self {
            Consumer::EntireAccount => {
                association.consumer_identifier == account
                    && association.consumer_region.is_none()
                    && association.status == data_share_status::ACTIVE
            }
            Consumer::Namespace(arn) => association.consumer_identifier == *arn,
            Consumer::Region(region) => {
                association.consumer_identifier == account
                    && association.consumer_region.as_deref() == Some(region.as_str())
            }
        }
    }
}

fn parse(id: &str) -> Result<(String, Consumer)> {
    let malformed = |reason: &str| Error::MalformedIdentifier {
        kind: KIND,
        id: id.to_string(),
        reason: reason.to_string(),
    };
    let parts = DATA_SHARE_CONSUMER_ASSOCIATION.parse(id)?;
    let [arn, entire_account, consumer_arn, consumer_region] =
        <[String; 4]>::try_from(parts).map_err(|_| malformed("expected four parts"))?;
    let consumer = match (entire_account.as_str(), consumer_arn, consumer_region) {
        ("true", a, r) if a.is_empty() && r.is_empty() => Consumer::EntireAccount,
        ("false", a, r) if r.is_empty() && !a.is_empty() => Consumer::Namespace(a),
        ("false", a, r) if a.is_empty() && !r.is_empty() => Consumer::Region(r),
        ("true" | "false", _, _) => {
            return Err(malformed("exactly one consumer must be identified"));
        }
        _ => return Err(malformed("associate_entire_account must be true or false")),
    };
    Ok((arn, consumer))
}

pub struct DataShareConsumerAssociationReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl DataShareConsumerAssociationReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(
        &self,
        id: &str,
        arn: &str,
        consumer: &Consumer,
    ) -> Result<DataShareConsumerAssociationState> {
        let finder = Finder::new(KIND, id, "DescribeDataShares");
        let share = finder
            .find(
                move |marker| self.client.describe_data_shares(Some(arn), marker),
                |s: &DataShare| s.data_share_arn == arn,
            )
            .await?;
        let account = self.ctx.arn.account_id.as_str();
        let association = share
            .associations
            .into_iter()
            .find(|a| consumer.matches(account, a))
            .ok_or_else(|| finder.not_found("consumer is not associated".to_string()))?;
        Ok(DataShareConsumerAssociationState {
            data_share_arn: share.data_share_arn,
            associate_entire_account: *consumer == Consumer::EntireAccount,
            consumer_arn: match consumer {
                Consumer::Namespace(arn) => Some(arn.clone()),
                _ => None,
            },
            consumer_region: association.consumer_region,
            producer_arn: share.producer_arn,
            status: association.status,
            allow_writes: association.allow_writes,
        })
    }
}

#[async_trait]
impl Reconciler for DataShareConsumerAssociationReconciler {
    type Config = DataShareConsumerAssociationConfig;
    type State = DataShareConsumerAssociationState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &DataShareConsumerAssociationConfig,
    ) -> Result<Applied<DataShareConsumerAssociationState>> {
        let consumer = Consumer::from_config(config)?;
        let arn = config.data_share_arn.as_str();
        let [entire_account, consumer_arn, consumer_region] = consumer.parts();
        let id = DATA_SHARE_CONSUMER_ASSOCIATION.compose(&[
            arn,
            entire_account,
            consumer_arn,
            consumer_region,
        ])?;
        info!("Creating {} {}", KIND, id);

        self.client
            .associate_data_share_consumer(AssociateDataShareConsumerInput {
                data_share_arn: arn.to_string(),
                associate_entire_account: config.associate_entire_account,
                consumer_arn: config.consumer_arn.clone(),
                consumer_region: config.consumer_region.clone(),
                allow_writes: config.allow_writes,
            })
            .await
            .map_err(|f| Error::api(KIND, &id, "creating", f))?;

        let (key, consumer) = (id.as_str(), &consumer);
        let state = read_after_create(&self.ctx, KIND, key, move || {
            self.find_state(key, arn, consumer)
        })
        .await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<DataShareConsumerAssociationState>> {
        let (arn, consumer) = parse(id)?;
        absent_on_not_found(KIND, id, self.find_state(id, &arn, &consumer).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &DataShareConsumerAssociationConfig,
        new: &DataShareConsumerAssociationConfig,
    ) -> Result<DataShareConsumerAssociationState> {
        ensure_in_place(
            KIND,
            id,
            &[
                ("data_share_arn", old.data_share_arn != new.data_share_arn),
                (
                    "associate_entire_account",
                    old.associate_entire_account != new.associate_entire_account,
                ),
                ("consumer_arn", old.consumer_arn != new.consumer_arn),
                ("consumer_region", old.consumer_region != new.consumer_region),
                ("allow_writes", old.allow_writes != new.allow_writes),
            ],
        )?;
        let (arn, consumer) = parse(id)?;
        self.find_state(id, &arn, &consumer).await
    }

    async fn delete(&self, id: &str, _config: &DataShareConsumerAssociationConfig) -> Result<()> {
        let (arn, consumer) = parse(id)?;
        info!("Deleting {} {}", KIND, id);
        let (consumer_arn, consumer_region) = match consumer {
            Consumer::EntireAccount => (None, None),
            Consumer::Namespace(arn) => (Some(arn), None),
            Consumer::Region(region) => (None, Some(region)),
        };
        let result = self
            .client
            .disassociate_data_share_consumer(DisassociateDataShareConsumerInput {
                data_share_arn: arn,
                disassociate_entire_account: Some(consumer_arn.is_none() && consumer_region.is_none()),
                consumer_arn,
                consumer_region,
            })
            .await
            .map(|_| ())
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<DataShareConsumerAssociationState>> {
        let (arn, consumer) = parse(raw_id)?;
        let state = self.find_state(raw_id, &arn, &consumer).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARE: &str = "arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales";

    #[test]
    fn test_parse_each_consumer_form() {
        let (arn, consumer) = parse(&format!("{},true,,", SHARE)).unwrap();
        assert_eq!(arn, SHARE);
        assert_eq!(consumer, Consumer::EntireAccount);

        let namespace = "arn:aws:redshift:us-west-2:123456789012:namespace:consumer-ns";
        let (_, consumer) = parse(&format!("{},false,{},", SHARE, namespace)).unwrap();
        assert_eq!(consumer, Consumer::Namespace(namespace.to_string()));

        let (_, consumer) = parse(&format!("{},false,,eu-west-1", SHARE)).unwrap();
        assert_eq!(consumer, Consumer::Region("eu-west-1".to_string()));
    }

    #[test]
    fn test_parse_rejects_ambiguous_consumer() {
        for id in [
            format!("{},false,,", SHARE),
            format!("{},true,,eu-west-1", SHARE),
            format!("{},yes,,", SHARE),
        ] {
            let err = parse(&id).unwrap_err();
            assert!(
                matches!(err, Error::MalformedIdentifier { .. }),
                "{id} should be malformed"
            );
        }
    }

    #[test]
    fn test_config_needs_exactly_one_consumer() {
        let config = DataShareConsumerAssociationConfig {
            data_share_arn: SHARE.to_string(),
            associate_entire_account: Some(true),
            consumer_arn: None,
            consumer_region: Some("eu-west-1".to_string()),
            allow_writes: None,
        };
        let err = Consumer::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
