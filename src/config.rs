// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cache configuration
//!
//! Identifies the custom resource type to cache and the label that records
//! its owner. Can be read from a JSON file; the CLI overlays its own flags.
//! All crwatch data is stored under ~/.crwatch/:
//! - ~/.crwatch/config.json - resource type configuration
//! - ~/.crwatch/log/ - log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Get the base crwatch directory (~/.crwatch/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".crwatch"))
        .context("Could not determine home directory")
}

/// Resource type coordinates and ownership label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// API group, e.g. "amalthea.dev"
    #[serde(default)]
    pub group: String,
    /// API version, e.g. "v1alpha1"
    #[serde(default)]
    pub version: String,
    /// Plural resource name, e.g. "jupyterservers"
    #[serde(default)]
    pub plural: String,
    /// Kind, only used to label cached objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Label key holding the owner of each resource
    #[serde(default)]
    pub owner_label: String,
}

impl CacheConfig {
    /// Load config from a file, or return default if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: CacheConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(CacheConfig::default())
        }
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Get the config file path (~/.crwatch/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Every coordinate and the owner label must be set
    ///
    /// `group` may be empty for core API resources.
    pub fn validate(&self) -> std::result::Result<(), CacheError> {
        let missing: Vec<&str> = [
            ("version", &self.version),
            ("plural", &self.plural),
            ("ownerLabel", &self.owner_label),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Config(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }
}
