// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes client resolution and the watch-backed resource feed

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use kube::api::{ApiResource, DynamicObject};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Config};
use tracing::{debug, info};

use super::Resource;
use crate::cache::{FeedError, FeedEvent, ResourceFeed};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Timeout for connecting to K8s API
///
/// The read timeout stays at kube's default, which outlasts a watch request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to take cluster credentials from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStrategy {
    /// Service account token and CA mounted into the pod
    InCluster,
    /// A kubeconfig file, using its current context
    Kubeconfig(PathBuf),
}

impl CredentialStrategy {
    async fn load(&self) -> std::result::Result<Config, String> {
        match self {
            CredentialStrategy::InCluster => Config::incluster().map_err(|e| e.to_string()),
            CredentialStrategy::Kubeconfig(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| e.to_string())?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| e.to_string())
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            CredentialStrategy::InCluster => "in-cluster".to_string(),
            CredentialStrategy::Kubeconfig(path) => format!("kubeconfig {}", path.display()),
        }
    }
}

/// `~/.kube/config`, if a home directory is known
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

/// In-cluster credentials first, then the kubeconfig at `kubeconfig` or the default path
pub fn default_strategies(kubeconfig: Option<PathBuf>) -> Vec<CredentialStrategy> {
    let mut strategies = vec![CredentialStrategy::InCluster];
    if let Some(path) = kubeconfig.or_else(default_kubeconfig_path) {
        strategies.push(CredentialStrategy::Kubeconfig(path));
    }
    strategies
}

/// Build a client from the first strategy that yields a usable config
pub async fn resolve_client(strategies: &[CredentialStrategy]) -> Result<Client> {
    let mut attempts = Vec::new();

    for strategy in strategies {
        match strategy.load().await {
            Ok(mut config) => {
                config.connect_timeout = Some(CONNECT_TIMEOUT);
                info!(
                    credentials = %strategy.describe(),
                    cluster = %config.cluster_url,
                    "Resolved Kubernetes credentials"
                );
                return Client::try_from(config).map_err(CacheError::Client);
            }
            Err(e) => {
                info!(
                    credentials = %strategy.describe(),
                    error = %e,
                    "Cannot set up Kubernetes config, trying next source"
                );
                attempts.push(format!("{}: {}", strategy.describe(), e));
            }
        }
    }

    if attempts.is_empty() {
        attempts.push("no credential sources configured".to_string());
    }
    Err(CacheError::Credentials { attempts })
}

/// Type coordinates for the configured custom resource
pub fn api_resource(config: &CacheConfig) -> ApiResource {
    // Build apiVersion string (e.g., "v1", "amalthea.dev/v1alpha1")
    let api_version = if config.group.is_empty() {
        config.version.clone()
    } else {
        format!("{}/{}", config.group, config.version)
    };

    ApiResource {
        group: config.group.clone(),
        version: config.version.clone(),
        api_version,
        kind: config.kind.clone().unwrap_or_default(),
        plural: config.plural.clone(),
    }
}

/// List+watch feed for one resource type in one namespace
///
/// Reconnects and relists are handled by `kube::runtime::watcher` with its
/// default backoff.
pub struct KubeFeed {
    api: Api<DynamicObject>,
    namespace: String,
    plural: String,
}

impl KubeFeed {
    pub fn new(client: Client, namespace: &str, resource: &ApiResource) -> Self {
        Self {
            api: Api::namespaced_with(client, namespace, resource),
            namespace: namespace.to_string(),
            plural: resource.plural.clone(),
        }
    }
}

impl ResourceFeed for KubeFeed {
    fn events(&self) -> BoxStream<'static, std::result::Result<FeedEvent, FeedError>> {
        debug!(namespace = %self.namespace, resource = %self.plural, "Opening watch");
        watcher(self.api.clone(), watcher::Config::default())
            .default_backoff()
            .map(|event| match event {
                Ok(event) => convert_event(event),
                Err(e) => Err(FeedError::Watch(e.to_string())),
            })
            .boxed()
    }
}

fn convert_event(
    event: watcher::Event<DynamicObject>,
) -> std::result::Result<FeedEvent, FeedError> {
    Ok(match event {
        watcher::Event::Init => FeedEvent::Init,
        watcher::Event::InitApply(obj) => FeedEvent::InitApply(Resource::try_from(obj)?),
        watcher::Event::InitDone => FeedEvent::InitDone,
        watcher::Event::Apply(obj) => FeedEvent::Apply(Resource::try_from(obj)?),
        watcher::Event::Delete(obj) => FeedEvent::Delete(Resource::try_from(obj)?),
    })
}
