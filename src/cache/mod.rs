// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Namespace-scoped watch cache
//!
//! A `Cache` pairs a [`Snapshot`] (the feed-driven index) with a [`Query`]
//! layer over it. Build one with [`CacheBuilder`], spawn the feed with
//! [`Cache::run`], then wait for readiness with [`Cache::spawn_sync_gate`] or
//! [`Cache::await_sync`].

mod builder;
mod feed;
mod gate;
mod query;
mod snapshot;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use builder::CacheBuilder;
pub use feed::{FeedError, FeedEvent, ResourceFeed};
pub use query::Query;
pub use snapshot::{IndexPoisoned, Snapshot, SyncPhase};

use crate::error::Result;
use crate::kubernetes::Resource;
use crate::progress::ProgressHandle;

#[derive(Clone)]
pub struct Cache {
    snapshot: Arc<Snapshot>,
    query: Query,
    progress: ProgressHandle,
}

impl Cache {
    /// Spawn the feed loop; it runs until `cancel` fires
    pub fn run(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let snapshot = Arc::clone(&self.snapshot);
        tokio::spawn(async move { snapshot.start(cancel).await })
    }

    /// Run the feed loop on the current task
    pub async fn start(&self, cancel: CancellationToken) {
        self.snapshot.start(cancel).await
    }

    pub async fn await_sync(&self, cancel: &CancellationToken) -> bool {
        self.snapshot.await_sync(cancel).await
    }

    /// Report the initial sync outcome on `done`, exactly once
    pub async fn synchronize(&self, cancel: &CancellationToken, done: oneshot::Sender<bool>) {
        gate::synchronize(&self.snapshot, cancel, done).await
    }

    pub fn spawn_sync_gate(&self, cancel: CancellationToken) -> oneshot::Receiver<bool> {
        gate::spawn_sync_gate(Arc::clone(&self.snapshot), cancel)
    }

    pub fn list_all(&self) -> Result<Vec<Arc<Resource>>> {
        self.query.list_all()
    }

    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Arc<Resource>>> {
        self.query.list_by_owner(owner_id)
    }

    pub fn get_by_name(&self, name: &str) -> Result<Arc<Resource>> {
        self.query.get_by_name(name)
    }

    pub fn get_by_name_and_owner(&self, name: &str, owner_id: &str) -> Result<Option<Arc<Resource>>> {
        self.query.get_by_name_and_owner(name, owner_id)
    }

    pub fn namespace(&self) -> &str {
        self.snapshot.namespace()
    }

    pub fn owner_label(&self) -> &str {
        self.query.owner_label()
    }

    pub fn has_synced(&self) -> bool {
        self.snapshot.has_synced()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}
