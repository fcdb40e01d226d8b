// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! One-shot readiness signal for the initial sync

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::snapshot::Snapshot;

/// Wait for the snapshot's initial sync and report the outcome on `done`
///
/// Exactly one value is sent: `true` once synced, `false` if `cancel` fired or
/// the feed stopped first.
pub async fn synchronize(snapshot: &Snapshot, cancel: &CancellationToken, done: oneshot::Sender<bool>) {
    let synced = snapshot.await_sync(cancel).await;
    if synced {
        info!(namespace = %snapshot.namespace(), "Cache synchronized");
    } else {
        warn!(namespace = %snapshot.namespace(), "Could not sync resource cache");
    }
    // Receiver may have given up waiting
    let _ = done.send(synced);
}

/// Run `synchronize` on its own task and hand back the receiving end
pub fn spawn_sync_gate(snapshot: Arc<Snapshot>, cancel: CancellationToken) -> oneshot::Receiver<bool> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        synchronize(&snapshot, &cancel, tx).await;
    });
    rx
}
