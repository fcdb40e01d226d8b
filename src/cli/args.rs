// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "crwatch")]
#[command(author, version, about = "Watch and query a namespace of Kubernetes custom resources")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Namespace to cache
    #[arg(short, long, env = "CRWATCH_NAMESPACE", default_value = "default", global = true)]
    pub namespace: String,

    /// Config file with the resource type (defaults to ~/.crwatch/config.json)
    #[arg(long, env = "CRWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// API group of the custom resource
    #[arg(long, env = "CRWATCH_GROUP", global = true)]
    pub group: Option<String>,

    /// API version of the custom resource
    #[arg(long = "api-version", env = "CRWATCH_VERSION", global = true)]
    pub api_version: Option<String>,

    /// Plural name of the custom resource
    #[arg(long, env = "CRWATCH_PLURAL", global = true)]
    pub plural: Option<String>,

    /// Kind of the custom resource
    #[arg(long, env = "CRWATCH_KIND", global = true)]
    pub kind: Option<String>,

    /// Label key that records the owner of a resource
    #[arg(long, env = "CRWATCH_OWNER_LABEL", global = true)]
    pub owner_label: Option<String>,

    /// Where to take cluster credentials from
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub credentials: CredentialSource,

    /// Kubeconfig file (defaults to ~/.kube/config)
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Give up on the initial sync after this many seconds
    #[arg(long, default_value = "60", global = true)]
    pub sync_timeout: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Omit column headers in output
    #[arg(long, global = true)]
    pub no_headers: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List cached resources, optionally only those of one owner
    List {
        /// Owner to filter by (empty lists everything)
        #[arg(long, default_value = "")]
        owner: String,
    },

    /// Get one resource by name
    Get {
        /// Resource name
        name: String,

        /// Only show the resource if it belongs to this owner
        #[arg(long)]
        owner: Option<String>,
    },

    /// Keep the cache running and log its size until interrupted
    Watch {
        /// Seconds between size reports
        #[arg(long, default_value = "30")]
        interval: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CredentialSource {
    /// In-cluster service account, then kubeconfig
    #[default]
    Auto,
    /// In-cluster service account only
    InCluster,
    /// Kubeconfig file only
    Kubeconfig,
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}
