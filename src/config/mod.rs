// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Layered configuration for source-fetch.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! Priority (low → high)
//! 1. defaults
//! 2. source-fetch.toml (cwd, optional)
//! 3. --config (repeatable)
//! 4. SOURCE_FETCH_* env vars
//! 5. CLI overrides
//! ```
//!
//! # Environment Variable Mapping
//!
//! ```text
//! SOURCE_FETCH_GLOBAL__DRY=true          → global.dry = true
//! SOURCE_FETCH_SOURCE__FETCH_DEPTH=0     → source.fetch_depth = 0
//! SOURCE_FETCH_SOURCE__SPARSE_CHECKOUT=a,b → source.sparse_checkout = ["a", "b"]
//! ```

pub mod loader;
pub mod types;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::source::settings::SubmoduleMode;

use loader::ConfigLoader;
use types::{GlobalConfig, SourceConfig};

/// Name of the optional configuration file in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "source-fetch.toml";

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Global options.
    pub global: GlobalConfig,
    /// Repository, revision and checkout options.
    pub source: SourceConfig,
}

impl Config {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use source_fetch::config::Config;
    ///
    /// let config = Config::builder()
    ///     .add_toml_file_optional("source-fetch.toml")
    ///     .with_env_prefix("SOURCE_FETCH")
    ///     .build()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn builder() -> ConfigLoader {
        ConfigLoader::new()
    }

    /// Load configuration from a single TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// does not match the `Config` structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().add_toml_file(path).build()
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid TOML or does not match the
    /// `Config` structure.
    pub fn parse(content: &str) -> Result<Self> {
        Self::builder().add_toml_str(content).build()
    }

    /// Format configuration options for display, `key = value` aligned.
    ///
    /// The token is shown as `[hidden]`.
    #[must_use]
    pub fn format_options(&self) -> Vec<String> {
        let mut options = BTreeMap::new();
        self.format_global_options(&mut options);
        self.format_source_options(&mut options);

        let max_key_len = options.keys().map(String::len).max().unwrap_or(0);

        options
            .into_iter()
            .map(|(key, value)| format!("{key:<max_key_len$} = {value}"))
            .collect()
    }

    fn format_global_options(&self, options: &mut BTreeMap<String, String>) {
        options.insert("global.dry".into(), self.global.dry.to_string());
        options.insert(
            "global.output_log_level".into(),
            self.global.output_log_level.as_u8().to_string(),
        );
        options.insert(
            "global.file_log_level".into(),
            self.global.file_log_level.as_u8().to_string(),
        );
        options.insert(
            "global.log_file".into(),
            self.global.log_file.display().to_string(),
        );
    }

    fn format_source_options(&self, options: &mut BTreeMap<String, String>) {
        let source = &self.source;
        options.insert("source.repository".into(), source.repository.clone());
        options.insert("source.ref".into(), source.reference.clone());
        if !source.commit.is_empty() {
            options.insert("source.commit".into(), source.commit.clone());
        }
        options.insert("source.path".into(), source.path.display().to_string());
        if !source.token.is_empty() {
            options.insert("source.token".into(), "[hidden]".into());
        }
        options.insert("source.clean".into(), source.clean.to_string());
        options.insert("source.lfs".into(), source.lfs.to_string());
        options.insert(
            "source.submodules".into(),
            match source.submodules {
                SubmoduleMode::None => "false".into(),
                SubmoduleMode::Shallow => "true".into(),
                SubmoduleMode::Recursive => "recursive".into(),
            },
        );
        options.insert(
            "source.persist_credentials".into(),
            source.persist_credentials.to_string(),
        );
        options.insert("source.fetch_depth".into(), source.fetch_depth.to_string());
        options.insert("source.fetch_tags".into(), source.fetch_tags.to_string());
        options.insert(
            "source.show_progress".into(),
            source.show_progress.to_string(),
        );
        if !source.filter.is_empty() {
            options.insert("source.filter".into(), source.filter.clone());
        }
        if !source.sparse_checkout.is_empty() {
            options.insert(
                "source.sparse_checkout".into(),
                source.sparse_checkout.join(", "),
            );
            options.insert(
                "source.sparse_checkout_cone_mode".into(),
                source.sparse_checkout_cone_mode.to_string(),
            );
        }
        options.insert(
            "source.set_safe_directory".into(),
            source.set_safe_directory.to_string(),
        );
        if !source.server_url.is_empty() {
            options.insert("source.server_url".into(), source.server_url.clone());
        }
        if source.timeout_secs > 0 {
            options.insert(
                "source.timeout_secs".into(),
                source.timeout_secs.to_string(),
            );
        }
    }
}
