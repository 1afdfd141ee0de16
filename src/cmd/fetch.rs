// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! `fetch` and `inspect` command implementations.

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;

use crate::cli::fetch::InspectArgs;
use crate::config::Config;
use crate::error::Result;
use crate::source::settings::FetchSettings;
use crate::source::{self, SourceContext, inspect};

/// Main handler for the fetch command.
///
/// Prints the outcome as JSON on stdout.
///
/// # Errors
///
/// Returns an error if the `[source]` section is invalid or the fetch fails.
pub async fn run_fetch_command(config: &Config) -> Result<()> {
    let settings =
        FetchSettings::from_config(&config.source).context("invalid [source] configuration")?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, interrupting git...");
            ctrl_c_token.cancel();
        }
    });

    let ctx = SourceContext::new()
        .with_cancel_token(cancel_token)
        .with_dry_run(config.global.dry);

    let outcome = source::get_source_with(&settings, &ctx)
        .await
        .with_context(|| format!("failed to fetch {}", settings.repository_url()))?;

    for warning in &outcome.warnings {
        tracing::warn!("{warning}");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?
    );
    Ok(())
}

/// Prints the observed state of a working copy as JSON.
///
/// # Errors
///
/// Returns an error if no path was given on the command line or in the config.
pub fn run_inspect_command(args: &InspectArgs, config: &Config) -> Result<()> {
    let path = args.path.as_ref().unwrap_or(&config.source.path);
    if path.as_os_str().is_empty() {
        bail!("no path given: pass --path or set source.path");
    }

    let observed = inspect::inspect(path);
    println!(
        "{}",
        serde_json::to_string_pretty(&observed).context("failed to serialize state")?
    );
    Ok(())
}
