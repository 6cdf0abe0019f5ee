//! Data share authorization reconciler.
//!
//! Identified locally as `data_share_arn,consumer_identifier`. Reads right
//! after an authorization may still describe another data share; those are
//! treated as not yet visible.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::resources::{AuthorizeDataShareInput, DataShare, data_share_status};
use redshift_api::{FaultKind, RedshiftApi};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Applied, Reconciler, absent_on_not_found, ensure_in_place};
use crate::config::ProviderContext;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::identity::DATA_SHARE_AUTHORIZATION;
use crate::kind::ResourceKind;
use crate::waiter::{StateWaiter, Stateful};

const KIND: ResourceKind = ResourceKind::DataShareAuthorization;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShareAuthorizationConfig {
    pub data_share_arn: String,
    pub consumer_identifier: String,
    #[serde(default)]
    pub allow_writes: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataShareAuthorizationState {
    pub data_share_arn: String,
    pub consumer_identifier: String,
    pub producer_arn: String,
    pub status: String,
    pub allow_writes: bool,
    pub allow_publicly_accessible_consumers: bool,
}

impl Stateful for DataShareAuthorizationState {
    fn state(&self) -> &str {
        &self.status
    }
}

fn parse(id: &str) -> Result<(String, String)> {
    let parts = DATA_SHARE_AUTHORIZATION.parse(id)?;
    match <[String; 2]>::try_from(parts) {
        Ok([arn, consumer]) => Ok((arn, consumer)),
        Err(_) => Err(Error::MalformedIdentifier {
            kind: KIND,
            id: id.to_string(),
            reason: "expected data_share_arn,consumer_identifier".to_string(),
        }),
    }
}

pub struct DataShareAuthorizationReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl DataShareAuthorizationReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find_state(
        &self,
        id: &str,
        arn: &str,
        consumer: &str,
    ) -> Result<DataShareAuthorizationState> {
        let finder = Finder::new(KIND, id, "DescribeDataShares");
        let share = finder
            .find(
                move |marker| self.client.describe_data_shares(Some(arn), marker),
                |s: &DataShare| s.data_share_arn == arn,
            )
            .await?;
        let association = share
            .associations
            .into_iter()
            .find(|a| a.consumer_identifier == consumer && a.consumer_region.is_none())
            .ok_or_else(|| finder.not_found("consumer is not authorized".to_string()))?;
        Ok(DataShareAuthorizationState {
            data_share_arn: share.data_share_arn,
            consumer_identifier: association.consumer_identifier,
            producer_arn: share.producer_arn,
            status: association.status,
            allow_writes: association.allow_writes,
            allow_publicly_accessible_consumers: share.allow_publicly_accessible_consumers,
        })
    }
}

#[async_trait]
impl Reconciler for DataShareAuthorizationReconciler {
    type Config = DataShareAuthorizationConfig;
    type State = DataShareAuthorizationState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &DataShareAuthorizationConfig,
    ) -> Result<Applied<DataShareAuthorizationState>> {
        let arn = config.data_share_arn.as_str();
        let consumer = config.consumer_identifier.as_str();
        let id = DATA_SHARE_AUTHORIZATION.compose(&[arn, consumer])?;
        info!("Creating {} {}", KIND, id);

        self.client
            .authorize_data_share(AuthorizeDataShareInput {
                data_share_arn: arn.to_string(),
                consumer_identifier: consumer.to_string(),
                allow_writes: config.allow_writes,
            })
            .await
            .map_err(|f| Error::api(KIND, &id, "creating", f))?;

        let key = id.as_str();
        let state = StateWaiter::new(KIND, key, self.ctx.poll())
            .pending(&[data_share_status::PENDING_AUTHORIZATION])
            .target(&[data_share_status::AUTHORIZED, data_share_status::ACTIVE])
            .failure(&[data_share_status::REJECTED, data_share_status::DEAUTHORIZED])
            .timeout(self.ctx.timeouts().eventual_consistency)
            .until_state(move || self.find_state(key, arn, consumer))
            .await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<DataShareAuthorizationState>> {
        let (arn, consumer) = parse(id)?;
        absent_on_not_found(KIND, id, self.find_state(id, &arn, &consumer).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &DataShareAuthorizationConfig,
        new: &DataShareAuthorizationConfig,
    ) -> Result<DataShareAuthorizationState> {
        ensure_in_place(
            KIND,
            id,
            &[
                ("data_share_arn", old.data_share_arn != new.data_share_arn),
                (
                    "consumer_identifier",
                    old.consumer_identifier != new.consumer_identifier,
                ),
                ("allow_writes", old.allow_writes != new.allow_writes),
            ],
        )?;
        let (arn, consumer) = parse(id)?;
        self.find_state(id, &arn, &consumer).await
    }

    async fn delete(&self, id: &str, _config: &DataShareAuthorizationConfig) -> Result<()> {
        let (arn, consumer) = parse(id)?;
        info!("Deleting {} {}", KIND, id);
        match self.client.deauthorize_data_share(&arn, &consumer).await {
            Ok(_) => Ok(()),
            Err(fault) if fault.is(FaultKind::NotFound) => {
                info!("{} ({}) already deleted", KIND, id);
                Ok(())
            }
            Err(fault) => Err(Error::api(KIND, id, "deleting", fault)),
        }
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<DataShareAuthorizationState>> {
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

    #[test]
    fn test_parse_keeps_arn_intact() {
        let (arn, consumer) = parse(
            "arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales,arn:aws:redshift:us-west-2:210987654321:namespace:ns-2",
        )
        .unwrap();
        assert_eq!(arn, "arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales");
        assert_eq!(
            consumer,
            "arn:aws:redshift:us-west-2:210987654321:namespace:ns-2"
        );
    }

    #[test]
    fn test_parse_rejects_missing_consumer() {
        let err = parse("arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales").unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
    }
}
