//! Tag merging, filtering and diffing.

use redshift_api::{RedshiftApi, Tags};
use tracing::debug;

use crate::error::{Error, Result};
use crate::kind::ResourceKind;

const SYSTEM_PREFIX: &str = "aws:";

/// Merge provider defaults with resource tags. Resource tags win.
pub fn merge(defaults: &Tags, resource: &Tags) -> Tags {
    let mut merged = defaults.clone();
    merged.extend(resource.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Drop service-reserved keys and keys under any ignored prefix.
pub fn ignore_system(tags: &Tags, ignore_prefixes: &[String]) -> Tags {
    tags.iter()
        .filter(|(key, _)| !key.to_ascii_lowercase().starts_with(SYSTEM_PREFIX))
        .filter(|(key, _)| !ignore_prefixes.iter().any(|p| key.starts_with(p.as_str())))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Tag changes between two tag sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// New keys and keys whose value changed.
    pub to_set: Tags,
    /// Keys present only in the old set.
    pub to_unset: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_set.is_empty() && self.to_unset.is_empty()
    }
}

pub fn diff(old: &Tags, new: &Tags) -> TagDiff {
    let to_set = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let to_unset = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .cloned()
        .collect();
    TagDiff { to_set, to_unset }
}

/// Apply `changes` to the resource with `arn`. Empty sides issue no call.
pub async fn apply(
    client: &dyn RedshiftApi,
    kind: ResourceKind,
    id: &str,
    arn: &str,
    changes: TagDiff,
) -> Result<()> {
    if !changes.to_unset.is_empty() {
        debug!("Removing tags {:?} from {} {}", changes.to_unset, kind, id);
        client
            .delete_tags(arn, changes.to_unset)
            .await
            .map_err(|f| Error::api(kind, id, "untagging", f))?;
    }
    if !changes.to_set.is_empty() {
        debug!("Setting {} tags on {} {}", changes.to_set.len(), kind, id);
        client
            .create_tags(arn, changes.to_set)
            .await
            .map_err(|f| Error::api(kind, id, "tagging", f))?;
    }
    Ok(())
}
