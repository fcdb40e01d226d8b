// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod output;

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use cli::{Args, Command, CredentialSource};
use crwatch::kubernetes::client::{default_kubeconfig_path, default_strategies};
use crwatch::progress::{ProgressUpdate, create_spinner};
use crwatch::{Cache, CacheBuilder, CacheConfig, CredentialStrategy, config};
use output::QueryResult;

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool, to_stderr: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping 5 files
    let log_path = log_dir.join("crwatch.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, _guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(_guard);

    let filter = if verbose { "crwatch=debug" } else { "crwatch=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);
    let stderr_layer = to_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

/// Config file values overlaid with command line flags
fn resolve_config(args: &Args) -> Result<CacheConfig> {
    let mut config = match &args.config {
        Some(path) => CacheConfig::load_from(path)?,
        None => CacheConfig::load()?,
    };

    if let Some(group) = &args.group {
        config.group = group.clone();
    }
    if let Some(version) = &args.api_version {
        config.version = version.clone();
    }
    if let Some(plural) = &args.plural {
        config.plural = plural.clone();
    }
    if let Some(kind) = &args.kind {
        config.kind = Some(kind.clone());
    }
    if let Some(label) = &args.owner_label {
        config.owner_label = label.clone();
    }

    Ok(config)
}

fn credential_strategies(args: &Args) -> Result<Vec<CredentialStrategy>> {
    Ok(match args.credentials {
        CredentialSource::Auto => default_strategies(args.kubeconfig.clone()),
        CredentialSource::InCluster => vec![CredentialStrategy::InCluster],
        CredentialSource::Kubeconfig => {
            let path = args
                .kubeconfig
                .clone()
                .or_else(default_kubeconfig_path)
                .context("No kubeconfig path given and no home directory")?;
            vec![CredentialStrategy::Kubeconfig(path)]
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let args = Args::parse();
    // Watch is long-running, so its logs also go to stderr
    let to_stderr = args.verbose || matches!(args.command, Command::Watch { .. });
    init_logging(args.verbose, to_stderr);

    let config = resolve_config(&args)?;
    let cache = CacheBuilder::new(config, &args.namespace)
        .credentials(credential_strategies(&args)?)
        .build()
        .await
        .context("Failed to create resource cache")?;

    let cancel = CancellationToken::new();
    let feed = cache.run(cancel.clone());

    let result = match &args.command {
        Command::Watch { interval } => watch(&cache, &cancel, *interval, args.sync_timeout).await,
        command => wait_for_sync(&cache, &cancel, args.sync_timeout)
            .await
            .and_then(|()| query(&cache, command, &args)),
    };

    cancel.cancel();
    if let Err(e) = feed.await {
        warn!(error = %e, "Feed task failed");
    }
    result
}

/// Wait for the initial sync with a spinner, failing after `timeout_secs`
async fn wait_for_sync(cache: &Cache, cancel: &CancellationToken, timeout_secs: u64) -> Result<()> {
    let spinner = create_spinner(&format!("Syncing namespace {}...", cache.namespace()));
    let mut progress_rx = cache.progress().subscribe();

    // The sync gate gets its own token so a timeout doesn't stop the feed
    let gate_cancel = cancel.child_token();
    let mut ready = cache.spawn_sync_gate(gate_cancel.clone());
    let deadline = tokio::time::sleep(Duration::from_secs(timeout_secs));
    tokio::pin!(deadline);

    let synced = loop {
        tokio::select! {
            biased;
            outcome = &mut ready => break outcome.unwrap_or(false),
            _ = &mut deadline, if !gate_cancel.is_cancelled() => gate_cancel.cancel(),
            progress = progress_rx.recv() => match progress {
                Ok(ProgressUpdate::Listing { namespace }) => {
                    spinner.set_message(format!("Listing resources in {}...", namespace));
                }
                Ok(ProgressUpdate::FeedError { message, .. }) => {
                    spinner.set_message(format!("Retrying after error: {}", message));
                }
                _ => {}
            },
        }
    };

    spinner.finish_and_clear();
    if synced {
        Ok(())
    } else {
        Err(anyhow!(
            "Could not sync resource cache for namespace '{}' within {}s",
            cache.namespace(),
            timeout_secs
        ))
    }
}

fn query(cache: &Cache, command: &Command, args: &Args) -> Result<()> {
    let resources = match command {
        Command::List { owner } => cache.list_by_owner(owner)?,
        Command::Get { name, owner: None } => vec![cache.get_by_name(name)?],
        Command::Get {
            name,
            owner: Some(owner),
        } => cache
            .get_by_name_and_owner(name, owner)?
            .into_iter()
            .collect(),
        Command::Watch { .. } => return Ok(()),
    };

    let result = QueryResult::new(cache.owner_label(), resources);
    println!("{}", result.format(&args.output, args.no_headers));
    Ok(())
}

/// Keep the feed running, reporting the cache size until Ctrl-C
async fn watch(cache: &Cache, cancel: &CancellationToken, interval: u64, timeout_secs: u64) -> Result<()> {
    let gate_cancel = cancel.child_token();
    let ready = cache.spawn_sync_gate(gate_cancel.clone());
    let gate_timeout = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        gate_cancel.cancel();
    });
    if !ready.await.unwrap_or(false) {
        // The feed keeps retrying; queries would see a partial cache meanwhile
        warn!(namespace = %cache.namespace(), "Initial sync did not complete, continuing");
    }
    gate_timeout.abort();

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                let (applied, errors) = cache.progress().counters();
                info!(
                    namespace = %cache.namespace(),
                    resources = cache.len(),
                    synced = cache.has_synced(),
                    events = applied,
                    feed_errors = errors,
                    "Cache status"
                );
            }
        }
    }
}
