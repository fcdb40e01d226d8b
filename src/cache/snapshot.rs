// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Continuously synchronized snapshot of one resource type in one namespace
//!
//! The feed loop is the only writer. Every index value is an `Arc<Resource>`
//! that is replaced wholesale, so readers holding a value never see it change
//! underneath them and never observe a partially applied event.
//!
//! Enumerations (`Init` .. `InitDone`) are buffered and swapped in under a
//! single write lock, so a relist after a watch desync is atomic for readers
//! and drops resources that were deleted while the watch was down.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::feed::{FeedEvent, ResourceFeed};
use crate::kubernetes::{LabelSelector, ObjectKey, Resource};
use crate::progress::ProgressHandle;

/// Where the snapshot is in its initial synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Waiting for the first enumeration to complete
    Pending,
    /// The first enumeration was applied; terminal
    Synced,
    /// The feed stopped before the first enumeration completed; a restart
    /// goes back to `Pending`
    Abandoned,
}

/// The index could not be read
#[derive(Debug, Error)]
#[error("resource index is poisoned")]
pub struct IndexPoisoned;

type Index = HashMap<ObjectKey, Arc<Resource>>;

/// Enumeration in progress
struct Relist {
    items: Index,
    started: Instant,
}

pub struct Snapshot {
    namespace: String,
    feed: Arc<dyn ResourceFeed>,
    items: RwLock<Index>,
    phase: watch::Sender<SyncPhase>,
    progress: ProgressHandle,
}

impl Snapshot {
    pub fn new(namespace: &str, feed: Arc<dyn ResourceFeed>, progress: ProgressHandle) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Pending);
        Self {
            namespace: namespace.to_string(),
            feed,
            items: RwLock::new(HashMap::new()),
            phase,
            progress,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Consume the feed until `cancel` fires or the feed ends
    ///
    /// Feed errors are logged and skipped; reconnecting is the feed's job.
    pub async fn start(&self, cancel: CancellationToken) {
        info!(namespace = %self.namespace, "Starting resource feed");
        self.phase.send_if_modified(|phase| {
            if *phase == SyncPhase::Abandoned {
                *phase = SyncPhase::Pending;
                true
            } else {
                false
            }
        });
        let mut events = self.feed.events();
        let mut relist: Option<Relist> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(namespace = %self.namespace, "Cancelled, stopping resource feed");
                    break;
                }
                next = events.next() => match next {
                    Some(Ok(event)) => self.apply(event, &mut relist),
                    Some(Err(e)) => {
                        warn!(
                            namespace = %self.namespace,
                            error = %e,
                            "Resource feed error, waiting for the watch to recover"
                        );
                        self.progress.feed_error(&self.namespace, &e.to_string());
                    }
                    None => {
                        warn!(namespace = %self.namespace, "Resource feed ended");
                        break;
                    }
                },
            }
        }

        // Nothing will complete a pending sync any more
        self.phase.send_if_modified(|phase| {
            if *phase == SyncPhase::Pending {
                *phase = SyncPhase::Abandoned;
                true
            } else {
                false
            }
        });
        self.progress.stopped(&self.namespace);
    }

    /// Block until the first enumeration is applied
    ///
    /// Returns false if `cancel` fires first or the feed stopped before the
    /// sync could complete. A snapshot that already synced returns true even
    /// with a cancelled token.
    pub async fn await_sync(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.phase.subscribe();
        tokio::select! {
            biased;
            phase = rx.wait_for(|p| *p != SyncPhase::Pending) => match phase {
                Ok(phase) => *phase == SyncPhase::Synced,
                Err(_) => false,
            },
            _ = cancel.cancelled() => false,
        }
    }

    pub fn has_synced(&self) -> bool {
        *self.phase.borrow() == SyncPhase::Synced
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All resources matching `selector`, in no particular order
    pub fn list(&self, selector: &LabelSelector) -> Result<Vec<Arc<Resource>>, IndexPoisoned> {
        let items = self.items.read().map_err(|_| IndexPoisoned)?;
        Ok(items
            .values()
            .filter(|res| selector.matches(&res.labels))
            .cloned()
            .collect())
    }

    pub fn get(&self, key: &ObjectKey) -> Result<Option<Arc<Resource>>, IndexPoisoned> {
        let items = self.items.read().map_err(|_| IndexPoisoned)?;
        Ok(items.get(key).cloned())
    }

    /// Apply one feed event; each call takes the write lock at most once
    fn apply(&self, event: FeedEvent, relist: &mut Option<Relist>) {
        self.progress.event_applied();
        match event {
            FeedEvent::Init => {
                debug!(namespace = %self.namespace, "Enumeration started");
                self.progress.listing(&self.namespace);
                *relist = Some(Relist {
                    items: HashMap::new(),
                    started: Instant::now(),
                });
            }
            FeedEvent::InitApply(res) => {
                if !self.in_scope(&res) {
                    return;
                }
                match relist.as_mut() {
                    Some(buffer) => {
                        buffer.items.insert(res.key(), Arc::new(res));
                    }
                    // Enumeration without Init; treat it as a plain upsert
                    None => self.upsert(res),
                }
            }
            FeedEvent::InitDone => {
                let Some(buffer) = relist.take() else {
                    debug!(namespace = %self.namespace, "InitDone without Init, marking synced");
                    self.mark_synced(self.len(), 0);
                    return;
                };
                let count = buffer.items.len();
                {
                    let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
                    *items = buffer.items;
                }
                self.mark_synced(count, buffer.started.elapsed().as_millis() as u64);
            }
            FeedEvent::Apply(res) => {
                if self.in_scope(&res) {
                    self.upsert(res);
                }
            }
            FeedEvent::Delete(res) => {
                if !self.in_scope(&res) {
                    return;
                }
                let key = res.key();
                trace!(namespace = %self.namespace, key = %key, "Delete");
                let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
                items.remove(&key);
            }
        }
    }

    fn upsert(&self, res: Resource) {
        let key = res.key();
        trace!(namespace = %self.namespace, key = %key, "Upsert");
        let value = Arc::new(res);
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(key, value);
    }

    fn in_scope(&self, res: &Resource) -> bool {
        if res.namespace == self.namespace {
            return true;
        }
        debug!(
            namespace = %self.namespace,
            resource_namespace = %res.namespace,
            name = %res.name,
            "Ignoring resource from another namespace"
        );
        false
    }

    fn mark_synced(&self, resources: usize, elapsed_ms: u64) {
        let first = self.phase.send_if_modified(|phase| {
            if *phase != SyncPhase::Synced {
                *phase = SyncPhase::Synced;
                true
            } else {
                false
            }
        });
        if first {
            info!(
                namespace = %self.namespace,
                resources = resources,
                elapsed_ms = elapsed_ms,
                "Initial sync complete"
            );
        } else {
            debug!(namespace = %self.namespace, resources = resources, "Relist applied");
        }
        self.progress.synced(&self.namespace, resources, elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::channel_feed;
    use crate::kubernetes::resource::test_resource;
    use crate::progress::create_progress_handle;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn snapshot_with(feed: crate::cache::testing::ChannelFeed) -> Arc<Snapshot> {
        Arc::new(Snapshot::new("ns1", Arc::new(feed), create_progress_handle()))
    }

    fn idle_snapshot() -> Snapshot {
        let (feed, _handle) = channel_feed();
        Snapshot::new("ns1", Arc::new(feed), create_progress_handle())
    }

    fn names(snapshot: &Snapshot) -> Vec<String> {
        let mut names: Vec<String> = snapshot
            .list(&LabelSelector::everything())
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names
    }

    fn versioned(name: &str, generation: u32) -> Resource {
        let mut res = test_resource("ns1", name, &[("gen", &generation.to_string())]);
        res.resource_version = Some(generation.to_string());
        res
    }

    /// Tiny deterministic generator so event sequences are reproducible
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    #[test]
    fn test_apply_and_delete() {
        let snapshot = idle_snapshot();
        let mut relist = None;

        snapshot.apply(FeedEvent::Apply(test_resource("ns1", "a", &[])), &mut relist);
        snapshot.apply(FeedEvent::Apply(test_resource("ns1", "b", &[])), &mut relist);
        assert_eq!(names(&snapshot), vec!["a", "b"]);

        snapshot.apply(FeedEvent::Delete(test_resource("ns1", "a", &[])), &mut relist);
        assert_eq!(names(&snapshot), vec!["b"]);

        // Deleting something unknown is a no-op
        snapshot.apply(FeedEvent::Delete(test_resource("ns1", "zzz", &[])), &mut relist);
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_update_replaces_value() {
        let snapshot = idle_snapshot();
        let mut relist = None;

        snapshot.apply(FeedEvent::Apply(versioned("a", 1)), &mut relist);
        let old = snapshot.get(&ObjectKey::new("ns1", "a")).unwrap().unwrap();
        snapshot.apply(FeedEvent::Apply(versioned("a", 2)), &mut relist);
        let new = snapshot.get(&ObjectKey::new("ns1", "a")).unwrap().unwrap();

        // A reader holding the old value keeps a consistent copy
        assert_eq!(old.resource_version.as_deref(), Some("1"));
        assert_eq!(new.resource_version.as_deref(), Some("2"));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_event_sequence_matches_model() {
        let snapshot = idle_snapshot();
        let mut relist = None;
        let mut model: BTreeMap<String, u32> = BTreeMap::new();
        let mut rng = Lcg(7);

        for generation in 0..2000u32 {
            let name = format!("r{}", rng.next() % 25);
            if rng.next() % 3 == 0 {
                model.remove(&name);
                snapshot.apply(FeedEvent::Delete(versioned(&name, generation)), &mut relist);
            } else {
                model.insert(name.clone(), generation);
                snapshot.apply(FeedEvent::Apply(versioned(&name, generation)), &mut relist);
            }
        }

        let mut actual: BTreeMap<String, u32> = BTreeMap::new();
        for res in snapshot.list(&LabelSelector::everything()).unwrap() {
            let generation = res.resource_version.as_deref().unwrap().parse().unwrap();
            actual.insert(res.name.clone(), generation);
        }
        assert_eq!(actual, model);
    }

    #[test]
    fn test_enumeration_marks_synced() {
        let snapshot = idle_snapshot();
        let mut relist = None;
        assert_eq!(snapshot.phase(), SyncPhase::Pending);

        snapshot.apply(FeedEvent::Init, &mut relist);
        snapshot.apply(FeedEvent::InitApply(test_resource("ns1", "a", &[])), &mut relist);
        // Buffered until InitDone
        assert!(snapshot.is_empty());
        assert!(!snapshot.has_synced());

        snapshot.apply(FeedEvent::InitDone, &mut relist);
        assert!(snapshot.has_synced());
        assert_eq!(names(&snapshot), vec!["a"]);
    }

    #[test]
    fn test_relist_replaces_index_atomically() {
        let snapshot = idle_snapshot();
        let mut relist = None;

        snapshot.apply(FeedEvent::Init, &mut relist);
        snapshot.apply(FeedEvent::InitApply(test_resource("ns1", "a", &[])), &mut relist);
        snapshot.apply(FeedEvent::InitApply(test_resource("ns1", "b", &[])), &mut relist);
        snapshot.apply(FeedEvent::InitDone, &mut relist);

        // Watch desync: relist without "a"
        snapshot.apply(FeedEvent::Init, &mut relist);
        snapshot.apply(FeedEvent::InitApply(test_resource("ns1", "b", &[])), &mut relist);
        // Old state is still served mid-relist
        assert_eq!(names(&snapshot), vec!["a", "b"]);
        snapshot.apply(FeedEvent::InitApply(test_resource("ns1", "c", &[])), &mut relist);
        snapshot.apply(FeedEvent::InitDone, &mut relist);

        assert_eq!(names(&snapshot), vec!["b", "c"]);
        assert!(snapshot.has_synced());
    }

    #[test]
    fn test_other_namespace_ignored() {
        let snapshot = idle_snapshot();
        let mut relist = None;
        snapshot.apply(FeedEvent::Apply(test_resource("ns2", "a", &[])), &mut relist);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_values() {
        let snapshot = Arc::new(idle_snapshot());
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = Arc::clone(&snapshot);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut reads = 0usize;
                    while !done.load(std::sync::atomic::Ordering::SeqCst) {
                        for res in snapshot.list(&LabelSelector::everything()).unwrap() {
                            assert_eq!(res.label("gen"), res.resource_version.as_deref());
                            reads += 1;
                        }
                        if let Some(res) = snapshot.get(&ObjectKey::new("ns1", "r1")).unwrap() {
                            assert_eq!(res.label("gen"), res.resource_version.as_deref());
                        }
                    }
                    reads
                })
            })
            .collect();

        let mut relist = None;
        for generation in 0..5000u32 {
            let name = format!("r{}", generation % 8);
            if generation % 7 == 0 {
                snapshot.apply(FeedEvent::Delete(versioned(&name, generation)), &mut relist);
            } else {
                snapshot.apply(FeedEvent::Apply(versioned(&name, generation)), &mut relist);
            }
        }
        done.store(true, std::sync::atomic::Ordering::SeqCst);

        for reader in readers {
            reader.join().expect("reader thread panicked");
        }
    }

    #[tokio::test]
    async fn test_start_applies_feed_and_syncs() {
        let (feed, handle) = channel_feed();
        let snapshot = snapshot_with(feed);
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let snapshot = Arc::clone(&snapshot);
            let cancel = cancel.clone();
            async move { snapshot.start(cancel).await }
        });

        handle.list(vec![test_resource("ns1", "a", &[])]);
        assert!(snapshot.await_sync(&CancellationToken::new()).await);
        assert_eq!(names(&snapshot), vec!["a"]);

        handle.fail("connection reset by peer");
        handle.send(FeedEvent::Apply(test_resource("ns1", "b", &[])));

        // Feed errors don't stop the loop
        tokio::time::timeout(Duration::from_secs(5), async {
            while snapshot.len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("update after feed error was not applied");

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(snapshot.phase(), SyncPhase::Synced);
        // Frozen but still readable
        assert_eq!(names(&snapshot), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_await_sync_returns_false_on_cancel() {
        let (feed, handle) = channel_feed();
        let snapshot = snapshot_with(feed);
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let snapshot = Arc::clone(&snapshot);
            let cancel = cancel.clone();
            async move { snapshot.start(cancel).await }
        });

        // Enumeration starts but never finishes
        handle.send(FeedEvent::Init);
        handle.send(FeedEvent::InitApply(test_resource("ns1", "a", &[])));

        let waiter = tokio::spawn({
            let snapshot = Arc::clone(&snapshot);
            let cancel = cancel.clone();
            async move { snapshot.await_sync(&cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let synced = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("await_sync hung after cancellation")
            .unwrap();
        assert!(!synced);
        task.await.unwrap();
        assert_eq!(snapshot.phase(), SyncPhase::Abandoned);
    }

    #[tokio::test]
    async fn test_await_sync_false_when_feed_ends() {
        let (feed, handle) = channel_feed();
        let snapshot = snapshot_with(feed);

        handle.send(FeedEvent::Init);
        drop(handle);

        snapshot.start(CancellationToken::new()).await;
        assert!(!snapshot.await_sync(&CancellationToken::new()).await);
        assert_eq!(snapshot.phase(), SyncPhase::Abandoned);
    }

    #[tokio::test]
    async fn test_restart_after_cancel_syncs() {
        let (feed, _first) = channel_feed();
        let second = feed.reconnect();
        let snapshot = snapshot_with(feed);

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        snapshot.start(cancelled).await;
        assert_eq!(snapshot.phase(), SyncPhase::Abandoned);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let snapshot = Arc::clone(&snapshot);
            let cancel = cancel.clone();
            async move { snapshot.start(cancel).await }
        });

        // The restart puts the phase back to Pending
        tokio::time::timeout(Duration::from_secs(5), async {
            while snapshot.phase() == SyncPhase::Abandoned {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("restart did not reset the sync phase");

        second.list(vec![test_resource("ns1", "a", &[])]);
        let synced = tokio::time::timeout(Duration::from_secs(5), snapshot.await_sync(&cancel))
            .await
            .expect("restarted feed never synced");
        assert!(synced);
        assert!(snapshot.has_synced());
        assert_eq!(names(&snapshot), vec!["a"]);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(snapshot.phase(), SyncPhase::Synced);
    }

    #[test]
    fn test_len_survives_poisoned_index() {
        let snapshot = Arc::new(idle_snapshot());
        let mut relist = None;
        snapshot.apply(FeedEvent::Apply(test_resource("ns1", "a", &[])), &mut relist);

        let poisoner = Arc::clone(&snapshot);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.items.write().unwrap();
            panic!("poison the index");
        })
        .join();

        assert!(snapshot.items.is_poisoned());
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_await_sync_after_sync_ignores_cancelled_token() {
        let snapshot = idle_snapshot();
        let mut relist = None;
        snapshot.apply(FeedEvent::Init, &mut relist);
        snapshot.apply(FeedEvent::InitDone, &mut relist);

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(snapshot.await_sync(&cancel).await);
    }
}
