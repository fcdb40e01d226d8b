// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Change feed consumed by the snapshot
//!
//! A feed is a list followed by a watch: `Init`, any number of `InitApply`,
//! `InitDone`, then incremental `Apply`/`Delete` events. The same
//! enumeration sequence is replayed whenever the underlying watch has to relist.

use futures::stream::BoxStream;
use thiserror::Error;

use crate::kubernetes::Resource;

/// One change delivered by a feed
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A full enumeration is starting
    Init,
    /// A resource that is part of the current enumeration
    InitApply(Resource),
    /// The enumeration is complete; buffered resources replace the index
    InitDone,
    /// A resource was created or modified
    Apply(Resource),
    /// A resource was removed
    Delete(Resource),
}

/// Transient feed failures; the feed is expected to recover on its own
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("watch failed: {0}")]
    Watch(String),
    #[error("could not decode resource metadata: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of list+watch events for one resource type in one namespace
pub trait ResourceFeed: Send + Sync {
    /// Open the event stream. Errors are yielded in-band and do not end it.
    fn events(&self) -> BoxStream<'static, Result<FeedEvent, FeedError>>;
}
