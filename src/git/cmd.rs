// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Git command operations using a [`GitRunner`].
//!
//! ```text
//! GitCommandManager --> GitInvocation --> GitRunner --> git
//!   -c safe.directory=<path>   (optional)
//!   GIT_LFS_SKIP_SMUDGE=1      (LFS content is pulled separately)
//!   HOME=<temp>                (while a global credential scope is open)
//! ```
//!
//! Only the operations fetching needs are exposed; every network and
//! working-copy mutation goes through here.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::backend::{GitInvocation, GitOutput, GitRunner};
use crate::error::{GitError, SourceResult};

/// Minimum git version for fetching.
pub const MINIMUM_GIT_VERSION: GitVersion = GitVersion::new(2, 18, 0);

/// Minimum git version for sparse checkout.
pub const MINIMUM_GIT_SPARSE_CHECKOUT_VERSION: GitVersion = GitVersion::new(2, 28, 0);

static VERSION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\.([0-9]+)(?:\.([0-9]+))?").ok());

/// A parsed `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl GitVersion {
    /// Creates a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses the first version number in `text` (`git version 2.43.0`).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let captures = VERSION_PATTERN.as_ref()?.captures(text)?;
        let part = |i: usize| {
            captures
                .get(i)
                .map_or(Some(0), |m| m.as_str().parse::<u32>().ok())
        };
        Some(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How much history a fetch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDepth {
    /// No depth limit on a copy that has full history.
    Full,
    /// Convert a shallow copy into a full one.
    Unshallow,
    /// Shallow fetch of this many commits.
    Depth(u32),
}

/// Options for [`GitCommandManager::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// History to fetch.
    pub depth: FetchDepth,
    /// Partial-clone filter (`blob:none`).
    pub filter: Option<String>,
    /// Fetch tags along with the refspecs.
    pub fetch_tags: bool,
    /// Pass `--progress`.
    pub show_progress: bool,
}

/// One line of `git ls-remote` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Object id the ref points at.
    pub oid: String,
    /// Full ref name (`refs/heads/main`, `refs/tags/v1^{}`).
    pub name: String,
}

/// Refspec that fetches every tag.
pub const TAGS_REFSPEC: &str = "+refs/tags/*:refs/tags/*";

/// Typed wrapper around the git commands used to fetch sources.
#[derive(Clone)]
pub struct GitCommandManager {
    runner: Arc<dyn GitRunner>,
    working_dir: PathBuf,
    env: BTreeMap<String, String>,
    token: CancellationToken,
    safe_directory: bool,
    timeout: Option<Duration>,
}

impl fmt::Debug for GitCommandManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitCommandManager")
            .field("working_dir", &self.working_dir)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("safe_directory", &self.safe_directory)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GitCommandManager {
    /// Creates a manager operating on `working_dir`.
    pub fn new(
        runner: Arc<dyn GitRunner>,
        working_dir: impl Into<PathBuf>,
        token: CancellationToken,
    ) -> Self {
        let mut env = BTreeMap::new();
        env.insert("GIT_LFS_SKIP_SMUDGE".to_string(), "1".to_string());
        Self {
            runner,
            working_dir: working_dir.into(),
            env,
            token,
            safe_directory: false,
            timeout: None,
        }
    }

    /// Adds `-c safe.directory=<working dir>` to every invocation.
    #[must_use]
    pub const fn with_safe_directory(mut self, enabled: bool) -> Self {
        self.safe_directory = enabled;
        self
    }

    /// Limits each invocation to `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Returns the environment overrides passed to git.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Sets an environment variable for subsequent invocations.
    pub fn set_env_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Removes an environment variable override.
    pub fn remove_env_var(&mut self, key: &str) {
        self.env.remove(key);
    }

    fn invocation(&self, cwd: &Path, args: &[&str]) -> GitInvocation {
        let mut full = Vec::with_capacity(args.len() + 2);
        if self.safe_directory {
            full.push("-c".to_string());
            full.push(format!("safe.directory={}", self.working_dir.display()));
        }
        full.extend(args.iter().map(ToString::to_string));
        GitInvocation::new(cwd, full)
            .envs(&self.env)
            .timeout(self.timeout)
    }

    async fn exec(&self, args: &[&str]) -> SourceResult<GitOutput> {
        let invocation = self.invocation(&self.working_dir, args);
        self.runner.run(&invocation, &self.token).await
    }

    async fn exec_allow_failure(&self, args: &[&str]) -> SourceResult<GitOutput> {
        let invocation = self.invocation(&self.working_dir, args).allow_failure();
        self.runner.run(&invocation, &self.token).await
    }

    /// Runs a config command; global scope does not need a working copy.
    async fn exec_config(
        &self,
        global: bool,
        args: &[&str],
        allow_failure: bool,
    ) -> SourceResult<GitOutput> {
        let (scope, cwd) = if global {
            ("--global", self.probe_dir())
        } else {
            ("--local", self.working_dir.clone())
        };
        let mut full = vec!["config", scope];
        full.extend(args);
        let mut invocation = self.invocation(&cwd, &full);
        if allow_failure {
            invocation = invocation.allow_failure();
        }
        self.runner.run(&invocation, &self.token).await
    }

    /// Directory for commands that do not need a working copy.
    fn probe_dir(&self) -> PathBuf {
        if self.working_dir.is_dir() {
            self.working_dir.clone()
        } else {
            std::env::temp_dir()
        }
    }

    // --- Version ---

    /// Returns the installed git version.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run or its output cannot be parsed.
    pub async fn version(&self) -> SourceResult<GitVersion> {
        let invocation = self.invocation(&self.probe_dir(), &["--version"]);
        let output = self.runner.run(&invocation, &self.token).await?;
        GitVersion::parse(&output.stdout).ok_or_else(|| {
            GitError::CommandFailed {
                command: "git --version".to_string(),
                message: format!("unable to parse version from '{}'", output.stdout),
            }
            .into()
        })
    }

    /// Fails unless the installed git is at least `minimum`.
    ///
    /// # Errors
    ///
    /// Returns `GitError::UnsupportedVersion` for an older git.
    pub async fn ensure_version(&self, minimum: GitVersion) -> SourceResult<GitVersion> {
        let found = self.version().await?;
        if found < minimum {
            return Err(GitError::UnsupportedVersion {
                found: found.to_string(),
                required: minimum.to_string(),
            }
            .into());
        }
        debug!(version = %found, "git version");
        Ok(found)
    }

    // --- Repository setup ---

    /// Runs `git init` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn init(&self) -> SourceResult<()> {
        self.exec(&["init", "--quiet"]).await?;
        Ok(())
    }

    /// Adds a remote.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn remote_add(&self, name: &str, url: &str) -> SourceResult<()> {
        self.exec(&["remote", "add", name, url]).await?;
        Ok(())
    }

    /// Sets a config value in the local (or global) scope.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn config(&self, key: &str, value: &str, global: bool) -> SourceResult<()> {
        self.exec_config(global, &[key, value], false).await?;
        Ok(())
    }

    /// Returns whether a config key is set.
    ///
    /// # Errors
    ///
    /// Returns an error only if git cannot be run.
    pub async fn config_exists(&self, key: &str, global: bool) -> SourceResult<bool> {
        let pattern = regex::escape(key);
        let output = self
            .exec_config(global, &["--name-only", "--get-regexp", &pattern], true)
            .await?;
        Ok(output.success())
    }

    /// Removes every value of a config key; returns false if nothing was removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if git cannot be run.
    pub async fn try_config_unset(&self, key: &str, global: bool) -> SourceResult<bool> {
        let output = self
            .exec_config(global, &["--unset-all", key], true)
            .await?;
        Ok(output.success())
    }

    /// Disables automatic garbage collection for this working copy.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn disable_auto_gc(&self) -> SourceResult<()> {
        self.config("gc.auto", "0", false).await
    }

    // --- Network ---

    /// Fetches `refspecs` from `origin`.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the fetch fails.
    pub async fn fetch(&self, refspecs: &[String], options: &FetchOptions) -> SourceResult<()> {
        let mut args: Vec<String> = ["-c", "protocol.version=2", "fetch"]
            .iter()
            .map(ToString::to_string)
            .collect();
        if !options.fetch_tags && !refspecs.iter().any(|r| r == TAGS_REFSPEC) {
            args.push("--no-tags".to_string());
        }
        args.push("--prune".to_string());
        args.push("--no-recurse-submodules".to_string());
        if options.show_progress {
            args.push("--progress".to_string());
        }
        if let Some(filter) = &options.filter {
            args.push(format!("--filter={filter}"));
        }
        match options.depth {
            FetchDepth::Full => {}
            FetchDepth::Unshallow => args.push("--unshallow".to_string()),
            FetchDepth::Depth(depth) => args.push(format!("--depth={depth}")),
        }
        args.push("origin".to_string());
        args.extend(refspecs.iter().cloned());

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.exec(&args).await?;
        Ok(())
    }

    /// Lists refs on the remote matching `patterns` (all refs when empty).
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the remote cannot be queried.
    pub async fn ls_remote(&self, url: &str, patterns: &[&str]) -> SourceResult<Vec<RemoteRef>> {
        let mut args = vec!["ls-remote", "--quiet", url];
        args.extend(patterns);
        let invocation = self.invocation(&self.probe_dir(), &args);
        let output = self.runner.run(&invocation, &self.token).await?;
        Ok(parse_ls_remote(&output.stdout))
    }

    /// Returns the remote's default branch (`refs/heads/main`), if it advertises one.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the remote cannot be queried.
    pub async fn default_branch(&self, url: &str) -> SourceResult<Option<String>> {
        let args = ["ls-remote", "--quiet", "--symref", url, "HEAD"];
        let invocation = self.invocation(&self.probe_dir(), &args);
        let output = self.runner.run(&invocation, &self.token).await?;
        Ok(output.stdout.lines().find_map(|line| {
            let rest = line.strip_prefix("ref:")?;
            let (target, name) = rest.trim().split_once('\t')?;
            (name.trim() == "HEAD").then(|| target.trim().to_string())
        }))
    }

    // --- Working copy ---

    /// Resolves `rev` to a commit id, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only if git cannot be run.
    pub async fn rev_parse(&self, rev: &str) -> SourceResult<Option<String>> {
        let spec = format!("{rev}^{{commit}}");
        let output = self
            .exec_allow_failure(&["rev-parse", "--verify", "--quiet", &spec])
            .await?;
        Ok((output.success() && !output.stdout.is_empty()).then_some(output.stdout))
    }

    /// Checks out `target`; with `branch`, (re)creates that branch at `target`.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the checkout fails.
    pub async fn checkout(
        &self,
        target: &str,
        branch: Option<&str>,
        show_progress: bool,
    ) -> SourceResult<()> {
        let mut args = vec!["-c", "advice.detachedHead=false", "checkout"];
        if show_progress {
            args.push("--progress");
        }
        args.push("--force");
        if let Some(branch) = branch {
            args.extend(["-B", branch]);
        }
        args.push(target);
        self.exec(&args).await?;
        Ok(())
    }

    /// Discards tracked modifications.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn reset_hard(&self) -> SourceResult<()> {
        self.exec(&["reset", "--hard", "HEAD"]).await?;
        Ok(())
    }

    /// Removes untracked and ignored files, including nested repositories.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn clean(&self) -> SourceResult<()> {
        self.exec(&["clean", "-ffdx"]).await?;
        Ok(())
    }

    /// Restricts the working copy to `patterns`.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn sparse_checkout(&self, patterns: &[String], cone: bool) -> SourceResult<()> {
        let mode = if cone { "--cone" } else { "--no-cone" };
        self.exec(&["sparse-checkout", "init", mode]).await?;
        let mut args = vec!["sparse-checkout", "set"];
        args.extend(patterns.iter().map(String::as_str));
        self.exec(&args).await?;
        Ok(())
    }

    /// Turns sparse checkout off.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn sparse_checkout_disable(&self) -> SourceResult<()> {
        self.exec(&["sparse-checkout", "disable"]).await?;
        self.try_config_unset("extensions.worktreeConfig", false)
            .await?;
        Ok(())
    }

    // --- Submodules ---

    /// Synchronizes submodule URLs from `.gitmodules`.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn submodule_sync(&self, recursive: bool) -> SourceResult<()> {
        let mut args = vec!["submodule", "sync"];
        if recursive {
            args.push("--recursive");
        }
        self.exec(&args).await?;
        Ok(())
    }

    /// Initializes and updates submodules.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn submodule_update(&self, depth: Option<u32>, recursive: bool) -> SourceResult<()> {
        let depth = depth.map(|d| format!("--depth={d}"));
        let mut args = vec![
            "-c",
            "protocol.version=2",
            "submodule",
            "update",
            "--init",
            "--force",
        ];
        if let Some(depth) = &depth {
            args.push(depth);
        }
        if recursive {
            args.push("--recursive");
        }
        self.exec(&args).await?;
        Ok(())
    }

    /// Runs a shell command in every submodule.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails in any submodule.
    pub async fn submodule_foreach(&self, command: &str, recursive: bool) -> SourceResult<String> {
        let mut args = vec!["submodule", "foreach"];
        if recursive {
            args.push("--recursive");
        }
        args.push(command);
        Ok(self.exec(&args).await?.stdout)
    }

    /// Deinitializes every submodule and removes its working tree.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn submodule_deinit_all(&self) -> SourceResult<()> {
        self.exec(&["submodule", "deinit", "--all", "--force"])
            .await?;
        Ok(())
    }

    // --- LFS ---

    /// Installs LFS hooks and filters for this working copy.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if git-lfs is missing or the command fails.
    pub async fn lfs_install(&self) -> SourceResult<()> {
        self.exec(&["lfs", "install", "--local"]).await?;
        Ok(())
    }

    /// Downloads and checks out LFS content for HEAD.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the command fails.
    pub async fn lfs_pull(&self) -> SourceResult<()> {
        let invocation = self
            .invocation(&self.working_dir, &["lfs", "pull", "origin"])
            .envs(&BTreeMap::from([(
                "GIT_LFS_SKIP_SMUDGE".to_string(),
                "0".to_string(),
            )]));
        self.runner.run(&invocation, &self.token).await?;
        Ok(())
    }
}

/// Parses `<oid>\t<ref>` lines, skipping anything else.
#[must_use]
pub fn parse_ls_remote(stdout: &str) -> Vec<RemoteRef> {
    stdout
        .lines()
        .filter_map(|line| {
            let (oid, name) = line.split_once('\t')?;
            let oid = oid.trim();
            if oid.is_empty() || !oid.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            Some(RemoteRef {
                oid: oid.to_string(),
                name: name.trim().to_string(),
            })
        })
        .collect()
}
