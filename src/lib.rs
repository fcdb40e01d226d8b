// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory watch cache for Kubernetes custom resources in one namespace
//!
//! ```ignore
//! let cache = CacheBuilder::new(config, "renku").build().await?;
//! let cancel = CancellationToken::new();
//! cache.run(cancel.clone());
//! if cache.spawn_sync_gate(cancel.clone()).await? {
//!     let servers = cache.list_by_owner("alice")?;
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod kubernetes;
pub mod progress;

pub use cache::{Cache, CacheBuilder};
pub use config::CacheConfig;
pub use error::CacheError;
pub use kubernetes::{CredentialStrategy, Resource};
