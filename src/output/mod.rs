// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Rendering of query results

mod json;
mod table;
mod yaml;

use std::sync::Arc;

pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use crate::cli::OutputFormat;
use crwatch::Resource;

/// Resources returned by a query, ready to be printed
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub owner_label: String,
    pub resources: Vec<Arc<Resource>>,
}

impl QueryResult {
    pub fn new(owner_label: &str, resources: Vec<Arc<Resource>>) -> Self {
        Self {
            owner_label: owner_label.to_string(),
            resources,
        }
    }

    pub fn format(&self, format: &OutputFormat, no_headers: bool) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self, no_headers),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    /// Serializable view of the resources, with spec and status untouched
    fn documents(&self) -> Vec<&Resource> {
        self.resources.iter().map(|r| r.as_ref()).collect()
    }
}
