// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scoped authentication for git network operations.
//!
//! ```text
//! open_global()       temp HOME with a copy of ~/.gitconfig + extraheader
//!   ls-remote, submodule update
//! close_global()      HOME restored, temp dir removed
//!
//! configure_local()   .git/config extraheader (placeholder swapped on disk)
//!   fetch, lfs pull
//! release()           --unset-all (+ submodules), then scan every config
//!                     file under .git; a remaining secret is CredentialLeak
//! persist()           keep the header, mirror it into submodules
//! ```
//!
//! The secret never appears in a process argument: git is always given a
//! placeholder, which is then replaced by editing the config file.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::settings::FetchSettings;
use crate::error::{FsError, GitError, SourceError, SourceResult};
use crate::git::cmd::GitCommandManager;
use crate::utility::fs::find_git_config_files;

/// Value written through git before the real header is swapped in.
const PLACEHOLDER: &str = "AUTHORIZATION: basic ***";

static HOST_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9+.-]*://([^/:]+)").ok());

/// Owns the credential configuration of one invocation.
pub struct CredentialScopeManager {
    key: String,
    credential: String,
    header: String,
    enabled: bool,
    server_url: String,
    git_dir: PathBuf,
    global_home: Option<TempDir>,
    /// Local config holds the header and has not been released or persisted.
    armed: bool,
}

impl std::fmt::Debug for CredentialScopeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialScopeManager")
            .field("key", &self.key)
            .field("git_dir", &self.git_dir)
            .field("global", &self.global_home.is_some())
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl CredentialScopeManager {
    #[must_use]
    pub fn new(settings: &FetchSettings) -> Self {
        let credential = settings.basic_credential();
        Self {
            key: settings.auth_config_key(),
            header: format!("AUTHORIZATION: basic {credential}"),
            credential,
            enabled: !settings.auth_token().is_empty(),
            server_url: settings.server_url().to_string(),
            git_dir: settings.repository_path().join(".git"),
            global_home: None,
            armed: false,
        }
    }

    /// Returns false when there is no token and every operation is a no-op.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Points git at a temporary HOME whose `.gitconfig` carries the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary config cannot be written.
    pub async fn open_global(&mut self, git: &mut GitCommandManager) -> SourceResult<()> {
        if !self.is_enabled() || self.global_home.is_some() {
            return Ok(());
        }

        let home = TempDir::with_prefix("source-fetch-home-")
            .map_err(|e| FsError::io(std::env::temp_dir(), e))?;
        let config_path = home.path().join(".gitconfig");
        // git writes --global values to $XDG_CONFIG_HOME/git/config when
        // ~/.gitconfig is missing, so the file must exist in the temp HOME.
        match std::env::var_os("HOME").map(|h| Path::new(&h).join(".gitconfig")) {
            Some(existing) if existing.is_file() => {
                tokio::fs::copy(&existing, &config_path)
                    .await
                    .map_err(|e| FsError::io(&existing, e))?;
            }
            _ => tokio::fs::write(&config_path, "")
                .await
                .map_err(|e| FsError::io(&config_path, e))?,
        }

        git.set_env_var("HOME", home.path().display().to_string());
        self.global_home = Some(home);

        git.config(&self.key, PLACEHOLDER, true).await?;
        replace_placeholder(&config_path, &self.header).await?;

        if let Some(host) = ssh_host(&self.server_url) {
            let key = format!("url.{}/.insteadOf", self.server_url);
            git.config(&key, &format!("git@{host}:"), true).await?;
        }

        debug!(home = %config_path.display(), "opened global credential scope");
        Ok(())
    }

    /// Restores HOME and removes the temporary directory.
    pub fn close_global(&mut self, git: &mut GitCommandManager) {
        if let Some(home) = self.global_home.take() {
            git.remove_env_var("HOME");
            let path = home.path().to_path_buf();
            if let Err(e) = home.close() {
                warn!(path = %path.display(), error = %e, "failed to remove temporary HOME");
            }
            debug!("closed global credential scope");
        }
    }

    /// Writes the header into the working copy's local config.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails or the placeholder cannot be replaced.
    pub async fn configure_local(&mut self, git: &GitCommandManager) -> SourceResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        git.config(&self.key, PLACEHOLDER, false).await?;
        self.armed = true;
        replace_placeholder(&self.git_dir.join("config"), &self.header).await?;
        debug!(key = %self.key, "configured local credential");
        Ok(())
    }

    /// Returns true if the local config already carries the current header.
    #[must_use]
    pub fn is_configured_locally(&self) -> bool {
        std::fs::read_to_string(self.git_dir.join("config"))
            .is_ok_and(|content| content.contains(&self.header))
    }

    /// Mirrors the header into every initialized submodule.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails or a placeholder cannot be replaced.
    pub async fn configure_submodules(&self, git: &GitCommandManager) -> SourceResult<()> {
        if !self.is_enabled() || !self.git_dir.join("modules").is_dir() {
            return Ok(());
        }
        let command = format!("git config --local '{}' '{PLACEHOLDER}'", self.key);
        git.submodule_foreach(&command, true).await?;

        for path in find_git_config_files(&self.git_dir) {
            let content = read_config(&path).await?;
            if content.contains(PLACEHOLDER) {
                replace_placeholder(&path, &self.header).await?;
            }
        }
        Ok(())
    }

    /// Keeps the local header after a successful fetch.
    pub fn persist(&mut self) {
        if self.armed {
            info!(key = %self.key, "persisting credentials in the working copy");
        }
        self.armed = false;
    }

    /// Removes the header from the working copy and its submodules, then
    /// verifies that no config file still holds it.
    ///
    /// # Errors
    ///
    /// Returns `GitError::CredentialLeak` if the secret is still present.
    pub async fn release(&mut self, git: &GitCommandManager) -> SourceResult<()> {
        if !self.is_enabled() || !self.git_dir.is_dir() {
            self.armed = false;
            return Ok(());
        }
        if !self.armed && !self.any_header_present() {
            return Ok(());
        }

        if git.config_exists(&self.key, false).await?
            && !git.try_config_unset(&self.key, false).await?
        {
            warn!(key = %self.key, "failed to unset local credential");
        }

        if self.git_dir.join("modules").is_dir() {
            let command = format!(
                "git config --local --name-only --get-regexp '{pattern}' \
                 && git config --local --unset-all '{key}' || :",
                pattern = regex::escape(&self.key),
                key = self.key
            );
            if let Err(e) = git.submodule_foreach(&command, true).await {
                warn!(error = %e, "failed to remove submodule credentials");
            }
        }

        self.verify_removed()?;
        self.armed = false;
        debug!(key = %self.key, "released local credential");
        Ok(())
    }

    fn verify_removed(&self) -> SourceResult<()> {
        for path in find_git_config_files(&self.git_dir) {
            let content = std::fs::read_to_string(&path).map_err(|e| FsError::io(&path, e))?;
            if self.leaks_into(&content) {
                return Err(GitError::CredentialLeak {
                    path: path.display().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Any extraheader written by this tool, including one from an older token.
    fn any_header_present(&self) -> bool {
        find_git_config_files(&self.git_dir).iter().any(|path| {
            std::fs::read_to_string(path)
                .is_ok_and(|content| content.contains("AUTHORIZATION: basic"))
        })
    }

    fn leaks_into(&self, content: &str) -> bool {
        content.contains(&self.credential) || content.contains(PLACEHOLDER)
    }

    /// Drops every config line that carries the secret.
    fn scrub(&self) {
        for path in find_git_config_files(&self.git_dir) {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            if !self.leaks_into(&content) {
                continue;
            }
            let kept: Vec<&str> = content
                .lines()
                .filter(|line| !self.leaks_into(line))
                .collect();
            let mut scrubbed = kept.join("\n");
            scrubbed.push('\n');
            if let Err(e) = std::fs::write(&path, scrubbed) {
                warn!(path = %path.display(), error = %e, "failed to scrub credential");
            }
        }
    }
}

impl Drop for CredentialScopeManager {
    fn drop(&mut self) {
        if self.armed {
            warn!(git_dir = %self.git_dir.display(), "credential scope abandoned, scrubbing");
            self.scrub();
        }
    }
}

/// Host of an `https://host/...` URL, for the SSH-to-HTTPS rewrite.
fn ssh_host(server_url: &str) -> Option<String> {
    HOST_PATTERN
        .as_ref()?
        .captures(server_url)?
        .get(1)
        .map(|host| host.as_str().to_string())
}

async fn read_config(path: &Path) -> SourceResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FsError::io(path, e).into())
}

async fn replace_placeholder(path: &Path, header: &str) -> SourceResult<()> {
    let content = read_config(path).await?;
    if !content.contains(PLACEHOLDER) {
        return Err(SourceError::other(format!(
            "unable to replace auth placeholder in {}",
            path.display()
        )));
    }
    tokio::fs::write(path, content.replace(PLACEHOLDER, header))
        .await
        .map_err(|e| FsError::io(path, e))?;
    Ok(())
}
