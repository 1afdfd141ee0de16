// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration sections.
//!
//! ```text
//! Config: GlobalConfig [global], SourceConfig [source]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::logging::LogLevel;
use crate::source::settings::SubmoduleMode;

/// Global settings (`[global]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Inspect, resolve and decide without changing the working copy.
    pub dry: bool,
    /// Log level for console output (0-6).
    pub output_log_level: LogLevel,
    /// Log level for file output (0-6).
    pub file_log_level: LogLevel,
    /// Path to log file. Empty disables file logging.
    pub log_file: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            dry: false,
            output_log_level: LogLevel::INFO,
            file_log_level: LogLevel::TRACE,
            log_file: PathBuf::new(),
        }
    }
}

/// What to fetch and where (`[source]`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// `owner/name`.
    pub repository: String,
    /// Branch, tag or `refs/...` name. Empty means the default branch.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Full commit id to check out.
    pub commit: String,
    /// Working copy directory.
    pub path: PathBuf,
    /// Access token for HTTPS authentication.
    #[serde(skip_serializing)]
    pub token: String,
    pub clean: bool,
    pub lfs: bool,
    /// `false`, `true` or `"recursive"`.
    #[serde(serialize_with = "serialize_submodules")]
    pub submodules: SubmoduleMode,
    pub persist_credentials: bool,
    /// Commits of history; 0 fetches everything.
    pub fetch_depth: u32,
    pub fetch_tags: bool,
    pub show_progress: bool,
    /// Partial clone filter, e.g. `blob:none`.
    pub filter: String,
    pub sparse_checkout: Vec<String>,
    pub sparse_checkout_cone_mode: bool,
    pub set_safe_directory: bool,
    pub server_url: String,
    /// Per git invocation; 0 disables the limit.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            reference: String::new(),
            commit: String::new(),
            path: PathBuf::new(),
            token: String::new(),
            clean: true,
            lfs: false,
            submodules: SubmoduleMode::None,
            persist_credentials: true,
            fetch_depth: 1,
            fetch_tags: false,
            show_progress: true,
            filter: String::new(),
            sparse_checkout: Vec::new(),
            sparse_checkout_cone_mode: true,
            set_safe_directory: true,
            server_url: String::new(),
            timeout_secs: 0,
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("repository", &self.repository)
            .field("reference", &self.reference)
            .field("commit", &self.commit)
            .field("path", &self.path)
            .field("token", &if self.token.is_empty() { "" } else { "[hidden]" })
            .field("fetch_depth", &self.fetch_depth)
            .finish_non_exhaustive()
    }
}

// Written back as the boolean/string form the deserializer accepts.
fn serialize_submodules<S>(mode: &SubmoduleMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match mode {
        SubmoduleMode::None => serializer.serialize_bool(false),
        SubmoduleMode::Shallow => serializer.serialize_bool(true),
        SubmoduleMode::Recursive => serializer.serialize_str("recursive"),
    }
}
