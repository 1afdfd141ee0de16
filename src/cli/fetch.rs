// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! `fetch` and `inspect` command arguments.
//!
//! Every flag falls back to the matching `INPUT_*` variable, so the binary
//! can run as a drop-in step in an actions runner:
//!
//! ```text
//! --repository      INPUT_REPOSITORY       source.repository
//! --ref             INPUT_REF              source.ref
//! --fetch-depth     INPUT_FETCH-DEPTH      source.fetch_depth
//! --sparse-checkout INPUT_SPARSE-CHECKOUT  source.sparse_checkout (one per line)
//! ```

use clap::Args;
use clap::builder::BoolishValueParser;
use std::path::PathBuf;

use crate::config::loader::ConfigLoader;
use crate::error::Result;
use crate::source::settings::SubmoduleMode;

/// Arguments for the `fetch` command.
#[derive(Debug, Clone, Default, Args)]
pub struct FetchArgs {
    /// Repository as `owner/name`.
    #[arg(long, env = "INPUT_REPOSITORY", value_name = "OWNER/NAME")]
    pub repository: Option<String>,

    /// Branch, tag or `refs/...` name; empty for the default branch.
    #[arg(long = "ref", env = "INPUT_REF", value_name = "REF")]
    pub reference: Option<String>,

    /// Full commit id to check out.
    #[arg(long, env = "INPUT_COMMIT", value_name = "SHA")]
    pub commit: Option<String>,

    /// Working copy directory.
    #[arg(long, env = "INPUT_PATH", value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Access token for HTTPS authentication.
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Discards local changes before switching revisions.
    #[arg(long, env = "INPUT_CLEAN", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub clean: Option<bool>,

    /// Downloads Git LFS objects.
    #[arg(long, env = "INPUT_LFS", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub lfs: Option<bool>,

    /// `true`, `false` or `recursive`.
    #[arg(long, env = "INPUT_SUBMODULES", value_name = "MODE")]
    pub submodules: Option<SubmoduleMode>,

    /// Leaves the authorization header in the local git config.
    #[arg(long, env = "INPUT_PERSIST-CREDENTIALS", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub persist_credentials: Option<bool>,

    /// Commits of history to fetch; 0 fetches everything.
    #[arg(long, env = "INPUT_FETCH-DEPTH", value_name = "N")]
    pub fetch_depth: Option<u32>,

    /// Fetches tags even for shallow fetches.
    #[arg(long, env = "INPUT_FETCH-TAGS", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub fetch_tags: Option<bool>,

    /// Passes `--progress` to git.
    #[arg(long, env = "INPUT_SHOW-PROGRESS", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub show_progress: Option<bool>,

    /// Partial clone filter, e.g. `blob:none`.
    #[arg(long, env = "INPUT_FILTER", value_name = "SPEC")]
    pub filter: Option<String>,

    /// Sparse checkout pattern. Can be specified multiple times.
    #[arg(
        long,
        env = "INPUT_SPARSE-CHECKOUT",
        value_name = "PATTERN",
        value_delimiter = '\n',
        action = clap::ArgAction::Append
    )]
    pub sparse_checkout: Vec<String>,

    /// Uses cone mode for the sparse checkout.
    #[arg(long, env = "INPUT_SPARSE-CHECKOUT-CONE-MODE", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub sparse_checkout_cone_mode: Option<bool>,

    /// Adds the path to git's `safe.directory` for every invocation.
    #[arg(long, env = "INPUT_SET-SAFE-DIRECTORY", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub set_safe_directory: Option<bool>,

    /// Base URL of the git server.
    #[arg(long, env = "INPUT_GITHUB-SERVER-URL", value_name = "URL")]
    pub server_url: Option<String>,

    /// Time limit for each git invocation, in seconds.
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl FetchArgs {
    /// Applies the given flags as `[source]` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override cannot be set.
    pub fn apply(&self, loader: ConfigLoader) -> Result<ConfigLoader> {
        let mut loader = loader
            .set_some("source.repository", self.repository.clone())?
            .set_some("source.ref", self.reference.clone())?
            .set_some("source.commit", self.commit.clone())?
            .set_some(
                "source.path",
                self.path.as_ref().map(|p| p.display().to_string()),
            )?
            .set_some("source.token", self.token.clone())?
            .set_some("source.clean", self.clean)?
            .set_some("source.lfs", self.lfs)?
            .set_some(
                "source.submodules",
                self.submodules.map(|mode| match mode {
                    SubmoduleMode::None => "false",
                    SubmoduleMode::Shallow => "true",
                    SubmoduleMode::Recursive => "recursive",
                }),
            )?
            .set_some("source.persist_credentials", self.persist_credentials)?
            .set_some("source.fetch_depth", self.fetch_depth.map(i64::from))?
            .set_some("source.fetch_tags", self.fetch_tags)?
            .set_some("source.show_progress", self.show_progress)?
            .set_some("source.filter", self.filter.clone())?
            .set_some(
                "source.sparse_checkout_cone_mode",
                self.sparse_checkout_cone_mode,
            )?
            .set_some("source.set_safe_directory", self.set_safe_directory)?
            .set_some("source.server_url", self.server_url.clone())?
            .set_some(
                "source.timeout_secs",
                self.timeout_secs
                    .map(|secs| i64::try_from(secs).unwrap_or(i64::MAX)),
            )?;

        if !self.sparse_checkout.is_empty() {
            loader = loader.set("source.sparse_checkout", self.sparse_checkout.clone())?;
        }
        Ok(loader)
    }
}

/// Arguments for the `inspect` command.
#[derive(Debug, Clone, Default, Args)]
pub struct InspectArgs {
    /// Working copy directory; defaults to `source.path`.
    #[arg(long, env = "INPUT_PATH", value_name = "DIR")]
    pub path: Option<PathBuf>,
}
