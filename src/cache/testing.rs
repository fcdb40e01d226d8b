// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory feed for driving a snapshot from tests

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::feed::{FeedError, FeedEvent, ResourceFeed};
use crate::kubernetes::Resource;

type Receiver = mpsc::UnboundedReceiver<Result<FeedEvent, FeedError>>;

/// Feed whose events are pushed by the test through a channel
///
/// Each `events()` call takes the next queued channel, like a watcher
/// reconnecting; once they run out the stream is empty.
pub struct ChannelFeed {
    receivers: Mutex<VecDeque<Receiver>>,
}

/// Test side of a `ChannelFeed`
#[derive(Clone)]
pub struct FeedHandle {
    sender: mpsc::UnboundedSender<Result<FeedEvent, FeedError>>,
}

pub fn channel_feed() -> (ChannelFeed, FeedHandle) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ChannelFeed {
            receivers: Mutex::new(VecDeque::from([receiver])),
        },
        FeedHandle { sender },
    )
}

impl ChannelFeed {
    /// Queue a channel for the next `events()` call
    pub fn reconnect(&self) -> FeedHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.receivers.lock().unwrap().push_back(receiver);
        FeedHandle { sender }
    }
}

impl ResourceFeed for ChannelFeed {
    fn events(&self) -> BoxStream<'static, Result<FeedEvent, FeedError>> {
        match self.receivers.lock().unwrap().pop_front() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => stream::empty().boxed(),
        }
    }
}

impl FeedHandle {
    pub fn send(&self, event: FeedEvent) {
        let _ = self.sender.send(Ok(event));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.sender.send(Err(FeedError::Watch(message.to_string())));
    }

    /// Deliver a complete initial enumeration
    pub fn list(&self, resources: Vec<Resource>) {
        self.send(FeedEvent::Init);
        for res in resources {
            self.send(FeedEvent::InitApply(res));
        }
        self.send(FeedEvent::InitDone);
    }
}
