//! Single-record lookups over paginated describe calls.

use std::future::Future;

use redshift_api::{ApiFault, FaultKind, Page};
use tracing::debug;

use crate::error::{Error, Result};
use crate::kind::ResourceKind;

/// Walk every page of a describe call.
pub async fn all_pages<T, F, Fut>(mut fetch: F) -> redshift_api::Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = redshift_api::Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut marker = None;
    loop {
        let page = fetch(marker.take()).await?;
        items.extend(page.items);
        match page.marker {
            Some(next) => marker = Some(next),
            None => return Ok(items),
        }
    }
}

/// A lookup of one record of `kind` addressed by `id`.
#[derive(Debug, Clone, Copy)]
pub struct Finder<'a> {
    kind: ResourceKind,
    id: &'a str,
    operation: &'static str,
}

impl<'a> Finder<'a> {
    pub fn new(kind: ResourceKind, id: &'a str, operation: &'static str) -> Self {
        Self {
            kind,
            id,
            operation,
        }
    }

    /// Exhaust every page of `fetch`, then require exactly one record whose
    /// natural key satisfies `key_matches`.
    ///
    /// A single record with a different key is what a lagging replica
    /// returns right after a create; it is reported as not found so the
    /// caller can retry, never returned as a match.
    pub async fn find<T, F, Fut>(&self, fetch: F, key_matches: impl Fn(&T) -> bool) -> Result<T>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = redshift_api::Result<Page<T>>>,
    {
        let items = all_pages(fetch).await.map_err(|f| self.fault(f))?;
        let record = self.single(items)?;
        if !key_matches(&record) {
            debug!(
                "{} returned a different {} than {}",
                self.operation, self.kind, self.id
            );
            return Err(self.not_found("returned record has a different key".to_string()));
        }
        Ok(record)
    }

    /// Cardinality check on a complete result set.
    pub fn single<T>(&self, mut items: Vec<T>) -> Result<T> {
        match items.len() {
            0 => Err(self.not_found("empty result".to_string())),
            1 => Ok(items.remove(0)),
            count => Err(Error::TooManyResults {
                kind: self.kind,
                id: self.id.to_string(),
                count,
            }),
        }
    }

    /// Map a describe fault. A not-found fault becomes [`Error::NotFound`].
    pub fn fault(&self, fault: ApiFault) -> Error {
        match fault.kind {
            FaultKind::NotFound => self.not_found(fault.to_string()),
            _ => Error::api(self.kind, self.id, "reading", fault),
        }
    }

    pub fn not_found(&self, detail: String) -> Error {
        Error::NotFound {
            kind: self.kind,
            id: self.id.to_string(),
            query: format!("{}({}): {}", self.operation, self.id, detail),
        }
    }
}
