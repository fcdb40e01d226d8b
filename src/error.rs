// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types returned by the cache
//!
//! Construction errors (`Config`, `Credentials`, `Client`) are fatal. Query
//! errors carry the namespace, owner or name they were raised for.

use thiserror::Error;

use crate::kubernetes::SelectorError;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache configuration: {0}")]
    Config(String),

    #[error("could not resolve Kubernetes credentials: {}", attempts.join("; "))]
    Credentials { attempts: Vec<String> },

    #[error("cannot set up Kubernetes client: {0}")]
    Client(#[source] kube::Error),

    #[error("could not set up selector when looking for resources for owner {owner_id}: {source}")]
    Selector {
        owner_id: String,
        #[source]
        source: SelectorError,
    },

    #[error("could not list resources for namespace {namespace}: {reason}")]
    List { namespace: String, reason: String },

    #[error("could not list resources for owner {owner_id}: {reason}")]
    ListByOwner { owner_id: String, reason: String },

    #[error("resource {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
}

impl CacheError {
    /// True for exact-key lookups that found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}
