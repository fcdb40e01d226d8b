// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Read-only queries over a synchronized snapshot
//!
//! All lookups are served from memory. Only `get_by_name` reports absence as an
//! error. `get_by_name_and_owner` answers `Ok(None)` for a resource owned by
//! someone else, so callers cannot probe for names they do not own.

use std::sync::Arc;

use tracing::trace;

use super::snapshot::Snapshot;
use crate::error::{CacheError, Result};
use crate::kubernetes::{LabelSelector, ObjectKey, Requirement, Resource};

#[derive(Clone)]
pub struct Query {
    snapshot: Arc<Snapshot>,
    owner_label: String,
}

impl Query {
    pub fn new(snapshot: Arc<Snapshot>, owner_label: &str) -> Self {
        Self {
            snapshot,
            owner_label: owner_label.to_string(),
        }
    }

    pub fn owner_label(&self) -> &str {
        &self.owner_label
    }

    /// Every resource in the namespace
    pub fn list_all(&self) -> Result<Vec<Arc<Resource>>> {
        let items = self
            .snapshot
            .list(&LabelSelector::everything())
            .map_err(|e| CacheError::List {
                namespace: self.snapshot.namespace().to_string(),
                reason: e.to_string(),
            })?;
        Ok(sorted(items))
    }

    /// Resources whose owner label equals `owner_id`; an empty owner lists all
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Arc<Resource>>> {
        if owner_id.is_empty() {
            return self.list_all();
        }

        let requirement =
            Requirement::equals(&self.owner_label, owner_id).map_err(|source| {
                CacheError::Selector {
                    owner_id: owner_id.to_string(),
                    source,
                }
            })?;
        let selector = LabelSelector::everything().with(requirement);
        trace!(selector = %selector, "Listing by owner");

        let items = self
            .snapshot
            .list(&selector)
            .map_err(|e| CacheError::ListByOwner {
                owner_id: owner_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(sorted(items))
    }

    /// Exact lookup by name; absence is a `NotFound` error
    pub fn get_by_name(&self, name: &str) -> Result<Arc<Resource>> {
        let key = ObjectKey::new(self.snapshot.namespace(), name);
        self.snapshot
            .get(&key)
            .map_err(|e| CacheError::List {
                namespace: key.namespace.clone(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| CacheError::NotFound {
                namespace: key.namespace,
                name: key.name,
            })
    }

    /// Lookup by name, visible only if the owner label matches `owner_id`
    ///
    /// Errors from `get_by_name` (including `NotFound`) pass through unchanged.
    /// A resource owned by someone else yields `Ok(None)`, not `NotFound`.
    /// A missing owner label compares as "".
    pub fn get_by_name_and_owner(&self, name: &str, owner_id: &str) -> Result<Option<Arc<Resource>>> {
        let res = self.get_by_name(name)?;
        if res.owner(&self.owner_label) != owner_id {
            trace!(name = %name, "Resource not visible to owner");
            return Ok(None);
        }
        Ok(Some(res))
    }
}

fn sorted(mut items: Vec<Arc<Resource>>) -> Vec<Arc<Resource>> {
    items.sort_by(|a, b| a.name.cmp(&b.name));
    items
}
