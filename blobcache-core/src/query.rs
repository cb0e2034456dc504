//! List-query construction and result normalisation.
//!
//! A [`ListFilter`] is what the caller asks for; [`ListFilter::build`]
//! validates the combination and produces the [`QuerySpec`] the HTTP client
//! serialises. The same spec re-applies the label semantics to returned
//! rows and the sort helpers normalise ordering, so identical queries give
//! identical output regardless of server-side ordering.

use crate::client::CacheClient;
use crate::error::{Error, Result};
use crate::models::{Blob, Scope, Tag};

/// Optional filters for a blob listing. Everything absent means "all blobs
/// visible to the caller across the user, group and public scopes".
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub tag: Option<String>,
    pub scope: Option<Scope>,
    pub label: Option<String>,
    pub wildcard: bool,
    /// Request elevated visibility. Forwarded to the server as-is; the
    /// server decides whether the caller's credential allows it.
    pub admin: bool,
}

impl ListFilter {
    /// Validates the filter combination and fixes it into a [`QuerySpec`].
    pub fn build(self) -> Result<QuerySpec> {
        if self.wildcard && self.label.is_none() {
            return Err(Error::InvalidFilterCombination(
                "a wildcard filter requires a label".into(),
            ));
        }
        Ok(QuerySpec {
            tag: self.tag,
            scope: self.scope,
            label: self.label,
            wildcard: self.wildcard,
            admin: self.admin,
        })
    }
}

/// A validated list query, ready to serialise.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    tag: Option<String>,
    scope: Option<Scope>,
    label: Option<String>,
    wildcard: bool,
    admin: bool,
}

impl QuerySpec {
    /// Wire query pairs; only present filters are serialised.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(tag) = &self.tag {
            params.push(("tag", tag.clone()));
        }
        if let Some(scope) = self.scope {
            params.push(("scope", scope.to_string()));
        }
        if let Some(label) = &self.label {
            params.push(("label", label.clone()));
            if self.wildcard {
                params.push(("wild", "true".into()));
            }
        }
        if self.admin {
            params.push(("admin", "true".into()));
        }
        params
    }

    /// Whether a returned blob satisfies this query. Applied to every list
    /// result so output does not depend on the server's filter behaviour.
    pub fn matches(&self, blob: &Blob) -> bool {
        if let Some(tag) = &self.tag {
            if blob.tag_name.as_deref() != Some(tag.as_str()) {
                return false;
            }
        }
        if let Some(scope) = self.scope {
            if blob.scope != scope {
                return false;
            }
        }
        if let Some(label) = &self.label {
            match &blob.label {
                Some(candidate) => {
                    if !label_matches(label, candidate, self.wildcard) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// Label matching: exact, or with `wildcard` the exact label plus any label
/// one or more path levels below it. `"ci"` matches `"ci"` and
/// `"ci/nightly"` but never `"cinema"`.
pub fn label_matches(filter: &str, candidate: &str, wildcard: bool) -> bool {
    if candidate == filter {
        return true;
    }
    wildcard
        && candidate
            .strip_prefix(filter)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Stable display order for blob listings: ascending numeric id.
pub fn sort_blobs(blobs: &mut [Blob]) {
    blobs.sort_by_key(|b| b.id);
}

/// Stable display order for tag listings: ascending lexical name.
pub fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(|a, b| a.name.cmp(&b.name));
}

/// The full list operation: validate the filter, fetch, drop rows the spec
/// does not match and sort by ascending id.
pub async fn list_blobs<C>(client: &C, filter: ListFilter) -> Result<Vec<Blob>>
where
    C: CacheClient + ?Sized,
{
    let spec = filter.build()?;
    let mut blobs = client.list_blobs(&spec).await?;
    blobs.retain(|b| spec.matches(b));
    sort_blobs(&mut blobs);
    tracing::debug!(count = blobs.len(), "blob listing normalised");
    Ok(blobs)
}

/// Fetches all tags, sorted by name.
pub async fn list_tags<C>(client: &C) -> Result<Vec<Tag>>
where
    C: CacheClient + ?Sized,
{
    let mut tags = client.list_tags().await?;
    sort_tags(&mut tags);
    Ok(tags)
}
