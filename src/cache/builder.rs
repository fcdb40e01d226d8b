// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Assembles a `Cache` from configuration and a credential strategy

use std::sync::Arc;

use tracing::info;

use super::Cache;
use super::feed::ResourceFeed;
use super::query::Query;
use super::snapshot::Snapshot;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::kubernetes::client::{KubeFeed, api_resource, default_strategies, resolve_client};
use crate::kubernetes::CredentialStrategy;
use crate::progress::{ProgressHandle, create_progress_handle};

pub struct CacheBuilder {
    config: CacheConfig,
    namespace: String,
    credentials: Vec<CredentialStrategy>,
    progress: Option<ProgressHandle>,
}

impl CacheBuilder {
    /// Defaults to in-cluster credentials, falling back to `~/.kube/config`
    pub fn new(config: CacheConfig, namespace: &str) -> Self {
        Self {
            config,
            namespace: namespace.to_string(),
            credentials: default_strategies(None),
            progress: None,
        }
    }

    /// Credential sources to try, in order
    pub fn credentials(mut self, strategies: Vec<CredentialStrategy>) -> Self {
        self.credentials = strategies;
        self
    }

    /// Report feed progress to an existing handle
    pub fn progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Connect to the cluster and wire a watch feed for the configured type
    ///
    /// Credential and client failures are fatal; feed failures after this
    /// point are retried by the watch itself.
    pub async fn build(self) -> Result<Cache> {
        self.validate()?;
        let client = resolve_client(&self.credentials).await?;
        let resource = api_resource(&self.config);
        info!(
            namespace = %self.namespace,
            api_version = %resource.api_version,
            plural = %resource.plural,
            "Creating resource cache"
        );
        let feed = Arc::new(KubeFeed::new(client, &self.namespace, &resource));
        self.build_with_feed(feed)
    }

    /// Assemble a cache over an arbitrary feed
    pub fn build_with_feed(self, feed: Arc<dyn ResourceFeed>) -> Result<Cache> {
        self.validate()?;
        let progress = self.progress.unwrap_or_else(create_progress_handle);
        let snapshot = Arc::new(Snapshot::new(&self.namespace, feed, Arc::clone(&progress)));
        let query = Query::new(Arc::clone(&snapshot), &self.config.owner_label);
        Ok(Cache {
            snapshot,
            query,
            progress,
        })
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.namespace.trim().is_empty() {
            return Err(CacheError::Config("namespace must not be empty".to_string()));
        }
        Ok(())
    }
}
