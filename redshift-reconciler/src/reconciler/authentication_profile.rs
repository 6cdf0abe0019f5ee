//! Authentication profile reconciler.
//!
//! The profile content is a JSON document. Content that only differs in
//! formatting or key order is treated as unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use redshift_api::RedshiftApi;
use redshift_api::resources::AuthenticationProfile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    Applied, Reconciler, absent_on_not_found, ensure_in_place, ignore_not_found, read_after_create,
};
use crate::config::ProviderContext;
use crate::error::{Error, Result};
use crate::finder::Finder;
use crate::kind::ResourceKind;

const KIND: ResourceKind = ResourceKind::AuthenticationProfile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationProfileConfig {
    pub name: String,
    /// JSON object.
    pub content: String,
}

impl AuthenticationProfileConfig {
    fn document(&self) -> Result<Value> {
        match serde_json::from_str::<Value>(&self.content) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(_) => Err(Error::invalid_config(
                KIND,
                &self.name,
                "content must be a JSON object",
            )),
            Err(e) => Err(Error::invalid_config(
                KIND,
                &self.name,
                format!("content is not valid JSON: {}", e),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationProfileState {
    pub name: String,
    pub content: String,
}

impl From<AuthenticationProfile> for AuthenticationProfileState {
    fn from(profile: AuthenticationProfile) -> Self {
        Self {
            name: profile.authentication_profile_name,
            content: profile.authentication_profile_content,
        }
    }
}

pub struct AuthenticationProfileReconciler {
    client: Arc<dyn RedshiftApi>,
    ctx: Arc<ProviderContext>,
}

impl AuthenticationProfileReconciler {
    pub fn new(client: Arc<dyn RedshiftApi>, ctx: Arc<ProviderContext>) -> Self {
        Self { client, ctx }
    }

    async fn find(&self, name: &str) -> Result<AuthenticationProfileState> {
        let finder = Finder::new(KIND, name, "DescribeAuthenticationProfiles");
        let profiles = self
            .client
            .describe_authentication_profiles(Some(name))
            .await
            .map_err(|f| finder.fault(f))?;
        let profile = finder.single(profiles)?;
        if profile.authentication_profile_name != name {
            return Err(finder.not_found("returned record has a different key".to_string()));
        }
        Ok(profile.into())
    }
}

#[async_trait]
impl Reconciler for AuthenticationProfileReconciler {
    type Config = AuthenticationProfileConfig;
    type State = AuthenticationProfileState;

    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn create(
        &self,
        config: &AuthenticationProfileConfig,
    ) -> Result<Applied<AuthenticationProfileState>> {
        config.document()?;
        info!("Creating {} {}", KIND, config.name);
        let profile = self
            .client
            .create_authentication_profile(AuthenticationProfile {
                authentication_profile_name: config.name.clone(),
                authentication_profile_content: config.content.clone(),
            })
            .await
            .map_err(|f| Error::api(KIND, &config.name, "creating", f))?;

        let id = profile.authentication_profile_name;
        let key = id.as_str();
        let state = read_after_create(&self.ctx, KIND, key, move || self.find(key)).await?;
        Ok(Applied { id, state })
    }

    async fn read(&self, id: &str) -> Result<Option<AuthenticationProfileState>> {
        absent_on_not_found(KIND, id, self.find(id).await)
    }

    async fn update(
        &self,
        id: &str,
        old: &AuthenticationProfileConfig,
        new: &AuthenticationProfileConfig,
    ) -> Result<AuthenticationProfileState> {
        ensure_in_place(KIND, id, &[("name", old.name != new.name)])?;

        let desired = new.document()?;
        let equivalent = old.document().is_ok_and(|current| current == desired);
        if !equivalent {
            info!("Modifying {} {}", KIND, id);
            self.client
                .modify_authentication_profile(AuthenticationProfile {
                    authentication_profile_name: id.to_string(),
                    authentication_profile_content: new.content.clone(),
                })
                .await
                .map_err(|f| Error::api(KIND, id, "modifying", f))?;
        }
        self.find(id).await
    }

    async fn delete(&self, id: &str, _config: &AuthenticationProfileConfig) -> Result<()> {
        info!("Deleting {} {}", KIND, id);
        let result = self
            .client
            .delete_authentication_profile(id)
            .await
            .map_err(|f| Error::api(KIND, id, "deleting", f));
        ignore_not_found(KIND, id, result)
    }

    async fn import(&self, raw_id: &str) -> Result<Applied<AuthenticationProfileState>> {
        let state = self.find(raw_id).await?;
        Ok(Applied {
            id: raw_id.to_string(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(content: &str) -> AuthenticationProfileConfig {
        AuthenticationProfileConfig {
            name: "sso".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_document_ignores_formatting_and_key_order() {
        let a = config(r#"{"AllowDBUserOverride":"1","App_ID":"example"}"#);
        let b = config("{\n  \"App_ID\": \"example\",\n  \"AllowDBUserOverride\": \"1\"\n}");
        assert_eq!(a.document().unwrap(), b.document().unwrap());
    }

    #[test]
    fn test_document_rejects_non_objects() {
        for content in ["[1, 2]", "not json", ""] {
            let err = config(content).document().unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfig { .. }),
                "{content:?} should be rejected"
            );
        }
    }
}
