// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Immutable per-invocation fetch settings.
//!
//! ```text
//! FetchSettings::builder()        (library callers)
//! FetchSettings::from_config()    (CLI / layered config)
//!        |
//!        v
//! repository_url()    {server_url}/{owner}/{name}
//! effective_filter()  filter, or blob:none for sparse checkouts
//! auth_config_key()   http.{server_url}/.extraheader
//! basic_credential()  base64("x-access-token:{token}")
//! ```

use base64::Engine as _;
use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::types::SourceConfig;
use crate::error::{ConfigError, SourceResult};

/// Default server when none is configured.
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Which submodules to check out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmoduleMode {
    /// Leave submodules alone (deinitialize on reset).
    #[default]
    None,
    /// Top-level submodules only.
    Shallow,
    /// Submodules of submodules as well.
    Recursive,
}

impl SubmoduleMode {
    /// Returns true unless submodules are disabled.
    #[must_use]
    pub const fn enabled(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns true for nested submodule checkout.
    #[must_use]
    pub const fn recursive(self) -> bool {
        matches!(self, Self::Recursive)
    }
}

impl std::str::FromStr for SubmoduleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "none" => Ok(Self::None),
            "true" | "shallow" => Ok(Self::Shallow),
            "recursive" => Ok(Self::Recursive),
            other => Err(format!(
                "expected true, false or recursive, got '{other}'"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for SubmoduleMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ModeVisitor;

        impl serde::de::Visitor<'_> for ModeVisitor {
            type Value = SubmoduleMode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean or \"recursive\"")
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(if v {
                    SubmoduleMode::Shallow
                } else {
                    SubmoduleMode::None
                })
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ModeVisitor)
    }
}

/// Everything one fetch needs to know. Built once, never mutated.
#[derive(Clone, Builder)]
pub struct FetchSettings {
    #[builder(setters(name = with_repository_owner), into)]
    repository_owner: String,
    #[builder(setters(name = with_repository_name), into)]
    repository_name: String,
    /// Branch, tag, `refs/...` name, or empty for the default branch.
    #[builder(setters(name = with_reference), into, default)]
    reference: String,
    /// Explicit commit; wins over `reference` as the checkout target.
    #[builder(setters(name = with_commit), into, default)]
    commit: String,
    #[builder(setters(name = with_repository_path), into)]
    repository_path: PathBuf,
    #[builder(setters(name = with_auth_token), into, default)]
    auth_token: String,
    #[builder(setters(name = with_clean), default = true)]
    clean: bool,
    #[builder(setters(name = with_lfs), default = false)]
    lfs: bool,
    #[builder(setters(name = with_submodules), default)]
    submodules: SubmoduleMode,
    #[builder(setters(name = with_persist_credentials), default = true)]
    persist_credentials: bool,
    /// Commits of history to fetch; 0 means all.
    #[builder(setters(name = with_fetch_depth), default = 1)]
    fetch_depth: u32,
    #[builder(setters(name = with_fetch_tags), default = false)]
    fetch_tags: bool,
    #[builder(setters(name = with_show_progress), default = true)]
    show_progress: bool,
    #[builder(setters(name = with_filter), into)]
    filter: Option<String>,
    #[builder(setters(name = with_sparse_checkout), default)]
    sparse_checkout: Vec<String>,
    #[builder(setters(name = with_sparse_checkout_cone_mode), default = true)]
    sparse_checkout_cone_mode: bool,
    #[builder(setters(name = with_set_safe_directory), default = true)]
    set_safe_directory: bool,
    #[builder(setters(name = with_server_url), into, default = DEFAULT_SERVER_URL.to_string())]
    server_url: String,
    /// Limit for each git invocation.
    #[builder(setters(name = with_timeout))]
    timeout: Option<Duration>,
}

impl fmt::Debug for FetchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.auth_token.is_empty() {
            ""
        } else {
            "[hidden]"
        };
        f.debug_struct("FetchSettings")
            .field("repository_owner", &self.repository_owner)
            .field("repository_name", &self.repository_name)
            .field("reference", &self.reference)
            .field("commit", &self.commit)
            .field("repository_path", &self.repository_path)
            .field("auth_token", &token)
            .field("clean", &self.clean)
            .field("lfs", &self.lfs)
            .field("submodules", &self.submodules)
            .field("persist_credentials", &self.persist_credentials)
            .field("fetch_depth", &self.fetch_depth)
            .field("fetch_tags", &self.fetch_tags)
            .field("show_progress", &self.show_progress)
            .field("filter", &self.filter)
            .field("sparse_checkout", &self.sparse_checkout)
            .field("sparse_checkout_cone_mode", &self.sparse_checkout_cone_mode)
            .field("set_safe_directory", &self.set_safe_directory)
            .field("server_url", &self.server_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        section: "source".to_string(),
        key: key.to_string(),
        message: message.into(),
    }
}

/// Returns true for a full SHA-1 or SHA-256 object id.
#[must_use]
pub fn is_object_id(value: &str) -> bool {
    matches!(value.len(), 40 | 64) && value.bytes().all(|b| b.is_ascii_hexdigit())
}

impl FetchSettings {
    /// Builds settings from the `[source]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the repository is not `owner/name`, the
    /// path is empty, or the commit is not a full object id.
    pub fn from_config(config: &SourceConfig) -> SourceResult<Self> {
        let repository = config.repository.trim();
        if repository.is_empty() {
            return Err(ConfigError::MissingKey {
                section: "source".to_string(),
                key: "repository".to_string(),
            }
            .into());
        }
        let (owner, name) = repository
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
            .ok_or_else(|| {
                invalid(
                    "repository",
                    format!("expected 'owner/name', got '{repository}'"),
                )
            })?;

        if config.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingKey {
                section: "source".to_string(),
                key: "path".to_string(),
            }
            .into());
        }

        let commit = config.commit.trim();
        if !commit.is_empty() && !is_object_id(commit) {
            return Err(invalid(
                "commit",
                format!("expected a full commit id, got '{commit}'"),
            )
            .into());
        }

        let filter = Some(config.filter.trim())
            .filter(|f| !f.is_empty())
            .map(ToString::to_string);
        let server_url = Some(config.server_url.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVER_URL);

        Ok(Self::builder()
            .with_repository_owner(owner)
            .with_repository_name(name)
            .with_reference(config.reference.trim())
            .with_commit(commit)
            .with_repository_path(config.path.clone())
            .with_auth_token(config.token.clone())
            .with_clean(config.clean)
            .with_lfs(config.lfs)
            .with_submodules(config.submodules)
            .with_persist_credentials(config.persist_credentials)
            .with_fetch_depth(config.fetch_depth)
            .with_fetch_tags(config.fetch_tags)
            .with_show_progress(config.show_progress)
            .maybe_with_filter(filter)
            .with_sparse_checkout(
                config
                    .sparse_checkout
                    .iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
            )
            .with_sparse_checkout_cone_mode(config.sparse_checkout_cone_mode)
            .with_set_safe_directory(config.set_safe_directory)
            .with_server_url(server_url)
            .maybe_with_timeout(
                (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
            )
            .build())
    }

    #[must_use]
    pub fn repository_owner(&self) -> &str {
        &self.repository_owner
    }

    #[must_use]
    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    #[must_use]
    pub fn commit(&self) -> &str {
        &self.commit
    }

    #[must_use]
    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    #[must_use]
    pub const fn clean(&self) -> bool {
        self.clean
    }

    #[must_use]
    pub const fn lfs(&self) -> bool {
        self.lfs
    }

    #[must_use]
    pub const fn submodules(&self) -> SubmoduleMode {
        self.submodules
    }

    #[must_use]
    pub const fn persist_credentials(&self) -> bool {
        self.persist_credentials
    }

    #[must_use]
    pub const fn fetch_depth(&self) -> u32 {
        self.fetch_depth
    }

    #[must_use]
    pub const fn fetch_tags(&self) -> bool {
        self.fetch_tags
    }

    #[must_use]
    pub const fn show_progress(&self) -> bool {
        self.show_progress
    }

    #[must_use]
    pub fn sparse_checkout(&self) -> &[String] {
        &self.sparse_checkout
    }

    #[must_use]
    pub const fn sparse_checkout_cone_mode(&self) -> bool {
        self.sparse_checkout_cone_mode
    }

    #[must_use]
    pub const fn set_safe_directory(&self) -> bool {
        self.set_safe_directory
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Server URL without a trailing slash.
    #[must_use]
    pub fn server_url(&self) -> &str {
        let trimmed = self.server_url.trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_SERVER_URL
        } else {
            trimmed
        }
    }

    /// URL of the repository to fetch.
    #[must_use]
    pub fn repository_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.server_url(),
            self.repository_owner,
            self.repository_name
        )
    }

    /// Returns true if a sparse checkout was requested.
    #[must_use]
    pub const fn is_sparse(&self) -> bool {
        !self.sparse_checkout.is_empty()
    }

    /// Partial-clone filter to use; sparse checkouts default to `blob:none`.
    #[must_use]
    pub fn effective_filter(&self) -> Option<String> {
        match &self.filter {
            Some(filter) if !filter.is_empty() => Some(filter.clone()),
            _ if self.is_sparse() => Some("blob:none".to_string()),
            _ => None,
        }
    }

    /// Config key holding the authorization header.
    #[must_use]
    pub fn auth_config_key(&self) -> String {
        format!("http.{}/.extraheader", self.server_url())
    }

    /// Base64 `x-access-token:<token>` credential.
    #[must_use]
    pub fn basic_credential(&self) -> String {
        base64::engine::general_purpose::STANDARD
            .encode(format!("x-access-token:{}", self.auth_token))
    }
}
