// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for the cache feed
//!
//! The snapshot reports lifecycle changes here so a front end can show what
//! the cache is doing while it waits for the initial sync.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Feed lifecycle update
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    /// A full enumeration of the namespace started
    Listing { namespace: String },
    /// An enumeration was applied to the index
    Synced {
        namespace: String,
        resources: usize,
        elapsed_ms: u64,
    },
    /// The feed reported a transient error
    FeedError { namespace: String, message: String },
    /// The feed loop exited
    Stopped { namespace: String },
}

pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
    /// Events applied since the reporter was created
    applied: AtomicUsize,
    /// Transient feed errors seen
    errors: AtomicUsize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            sender,
            applied: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn listing(&self, namespace: &str) {
        let _ = self.sender.send(ProgressUpdate::Listing {
            namespace: namespace.to_string(),
        });
    }

    pub fn synced(&self, namespace: &str, resources: usize, elapsed_ms: u64) {
        let _ = self.sender.send(ProgressUpdate::Synced {
            namespace: namespace.to_string(),
            resources,
            elapsed_ms,
        });
    }

    pub fn feed_error(&self, namespace: &str, message: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::FeedError {
            namespace: namespace.to_string(),
            message: message.to_string(),
        });
    }

    pub fn stopped(&self, namespace: &str) {
        let _ = self.sender.send(ProgressUpdate::Stopped {
            namespace: namespace.to_string(),
        });
    }

    /// Count one applied feed event (no broadcast, this is the hot path)
    pub fn event_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    /// (events applied, feed errors)
    pub fn counters(&self) -> (usize, usize) {
        (
            self.applied.load(Ordering::Relaxed),
            self.errors.load(Ordering::SeqCst),
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

/// Create a new progress reporter handle
pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reporter_new() {
        let reporter = ProgressReporter::default();
        assert_eq!(reporter.counters(), (0, 0));
    }

    #[test]
    fn test_counters() {
        let reporter = ProgressReporter::new();
        reporter.event_applied();
        reporter.event_applied();
        reporter.feed_error("ns1", "connection reset");
        assert_eq!(reporter.counters(), (2, 1));
    }

    #[test]
    fn test_subscribe_receives_updates() {
        let reporter = create_progress_handle();
        let mut receiver = reporter.subscribe();

        reporter.listing("ns1");
        reporter.synced("ns1", 12, 40);
        reporter.feed_error("ns1", "410 Gone");
        reporter.stopped("ns1");

        let updates: Vec<_> = std::iter::from_fn(|| receiver.try_recv().ok()).collect();
        assert_eq!(updates.len(), 4);
        assert!(matches!(updates[0], ProgressUpdate::Listing { .. }));
        match &updates[1] {
            ProgressUpdate::Synced {
                namespace,
                resources,
                ..
            } => {
                assert_eq!(namespace, "ns1");
                assert_eq!(*resources, 12);
            }
            other => panic!("Expected Synced update, got {:?}", other),
        }
        assert!(matches!(updates[2], ProgressUpdate::FeedError { .. }));
        assert!(matches!(updates[3], ProgressUpdate::Stopped { .. }));
    }

    #[test]
    fn test_send_without_subscribers() {
        // Broadcasting with no receivers must not panic
        let reporter = ProgressReporter::new();
        reporter.listing("ns1");
        reporter.stopped("ns1");
    }
}
