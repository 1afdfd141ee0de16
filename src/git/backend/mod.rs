// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Git backend abstraction layer.
//!
//! ```text
//! GitQuery (read)    --> GixBackend   (pure Rust gix, no subprocess)
//! GitRunner (write)  --> ShellBackend (git CLI via ProcessBuilder)
//! ```
//!
//! `GitRunner` is object safe so tests can substitute a scripted runner.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::core::process::builder::{ProcessBuilder, ProcessFlags, StreamFlags};
use crate::error::{GitError, GixError, SourceResult};

// --- Query Trait (Read-only operations) ---

/// Read-only git query operations.
///
/// Implementors inspect repository state without modification. A path is
/// only treated as a repository if it is the root of a non-bare working
/// copy; parent directories are never searched.
pub trait GitQuery {
    /// Check if path is the root of a git working copy.
    fn is_git_repo(path: &Path) -> bool;

    /// Open the working copy at `path`.
    ///
    /// # Errors
    ///
    /// Returns `GitError::NotARepository` if the path is missing, is not a
    /// repository, is bare, or cannot be read.
    fn open(path: &Path) -> SourceResult<gix::Repository>;

    /// Get current branch name (None if HEAD is detached).
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the repository cannot be opened or HEAD cannot be read.
    fn current_branch(path: &Path) -> SourceResult<Option<String>>;

    /// Get the commit HEAD points at (None if HEAD is unborn).
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the repository cannot be opened.
    fn head_commit(path: &Path) -> SourceResult<Option<String>>;

    /// Get the configured fetch URL of a remote.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the repository cannot be opened.
    fn remote_url(path: &Path, remote: &str) -> SourceResult<Option<String>>;

    /// Check for modifications to tracked files (staged or unstaged).
    ///
    /// Untracked files are not considered.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the status check fails.
    fn has_tracked_changes(path: &Path) -> SourceResult<bool>;

    /// Check whether an object exists in the local object database.
    fn has_object(path: &Path, oid: &str) -> bool;

    /// Get the repository's git directory (usually `<path>/.git`).
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the repository cannot be opened.
    fn git_dir(path: &Path) -> SourceResult<PathBuf>;

    /// Read a boolean config value from the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns a `GitError` if the repository cannot be opened.
    fn config_bool(path: &Path, key: &str) -> SourceResult<Option<bool>>;
}

// --- GixBackend Implementation (Pure Rust) ---

/// Pure Rust git backend using gix.
pub struct GixBackend;

impl GixBackend {
    fn not_a_repository(path: &Path, reason: impl Into<String>) -> GitError {
        GitError::NotARepository {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

impl GitQuery for GixBackend {
    fn is_git_repo(path: &Path) -> bool {
        Self::open(path).is_ok()
    }

    fn open(path: &Path) -> SourceResult<gix::Repository> {
        if !path.join(".git").exists() {
            return Err(Self::not_a_repository(path, "no .git entry").into());
        }
        let repo = gix::open(path).map_err(|e| {
            Self::not_a_repository(path, GixError::Open(Box::new(e)).to_string())
        })?;
        if repo.workdir().is_none() {
            return Err(Self::not_a_repository(path, GixError::BareRepository.to_string()).into());
        }
        Ok(repo)
    }

    fn current_branch(path: &Path) -> SourceResult<Option<String>> {
        let repo = Self::open(path)?;
        let head = repo.head_name().map_err(|e| GitError::CommandFailed {
            command: "head".to_string(),
            message: e.to_string(),
        })?;
        Ok(head.map(|name| name.shorten().to_string()))
    }

    fn head_commit(path: &Path) -> SourceResult<Option<String>> {
        let repo = Self::open(path)?;
        Ok(repo.head_id().ok().map(|id| id.to_string()))
    }

    fn remote_url(path: &Path, remote: &str) -> SourceResult<Option<String>> {
        let repo = Self::open(path)?;
        let key = format!("remote.{remote}.url");
        let url = repo
            .config_snapshot()
            .string(key.as_str())
            .map(|value| value.to_string());
        Ok(url)
    }

    fn has_tracked_changes(path: &Path) -> SourceResult<bool> {
        use gix::status::UntrackedFiles;

        let repo = Self::open(path)?;
        let has_changes = repo
            .status(gix::progress::Discard)
            .map_err(|e| GitError::Gix(GixError::Status(e.to_string())))?
            .untracked_files(UntrackedFiles::None)
            .into_iter(None)
            .map_err(|e| GitError::Gix(GixError::Status(e.to_string())))?
            .next()
            .is_some();

        Ok(has_changes)
    }

    fn has_object(path: &Path, oid: &str) -> bool {
        let Ok(id) = gix::ObjectId::from_hex(oid.as_bytes()) else {
            return false;
        };
        Self::open(path).is_ok_and(|repo| repo.has_object(id))
    }

    fn git_dir(path: &Path) -> SourceResult<PathBuf> {
        Ok(Self::open(path)?.git_dir().to_path_buf())
    }

    fn config_bool(path: &Path, key: &str) -> SourceResult<Option<bool>> {
        let repo = Self::open(path)?;
        Ok(repo.config_snapshot().boolean(key))
    }
}

// --- Runner Trait (subprocess operations) ---

/// A single git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitInvocation {
    args: Vec<String>,
    cwd: PathBuf,
    env: BTreeMap<String, String>,
    allow_failure: bool,
    timeout: Option<Duration>,
}

impl GitInvocation {
    /// Creates an invocation of `git <args>` in `cwd`.
    pub fn new<I, S>(cwd: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            ..Self::default()
        }
    }

    /// Adds environment variables on top of the inherited environment.
    #[must_use]
    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Returns a non-zero exit as output instead of an error.
    #[must_use]
    pub const fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    /// Sets an optional timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the git arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the working directory.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Returns the environment overrides.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns whether a non-zero exit is tolerated.
    #[must_use]
    pub const fn is_failure_allowed(&self) -> bool {
        self.allow_failure
    }

    /// Returns the command line for messages (`git fetch ...`).
    #[must_use]
    pub fn display(&self) -> String {
        format!("git {}", self.args.join(" "))
    }
}

/// Captured result of a git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured stdout, trimmed.
    pub stdout: String,
    /// Captured stderr, trimmed.
    pub stderr: String,
}

impl GitOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns true if the invocation exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes git subprocesses.
///
/// Implementations must report a non-zero exit as `GitError::CommandFailed`
/// unless the invocation allows failure, and a cancelled invocation as
/// `GitError::Interrupted`.
pub trait GitRunner: Send + Sync {
    /// Runs one git invocation.
    fn run<'a>(
        &'a self,
        invocation: &'a GitInvocation,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, SourceResult<GitOutput>>;
}

// --- ShellBackend Implementation (Git CLI) ---

/// Shell-based git backend using the git CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellBackend;

impl ShellBackend {
    async fn run_git(
        invocation: &GitInvocation,
        token: &CancellationToken,
    ) -> SourceResult<GitOutput> {
        let command = invocation.display();
        let output = ProcessBuilder::which("git")?
            .name("git")
            .args(invocation.args())
            .cwd(invocation.cwd())
            .env("GCM_INTERACTIVE", "never")
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(invocation.env().clone())
            .stdout_flags(StreamFlags::FORWARD_TO_LOG | StreamFlags::KEEP_IN_STRING)
            .stderr_flags(StreamFlags::FORWARD_TO_LOG | StreamFlags::KEEP_IN_STRING)
            .flags(ProcessFlags::ALLOW_FAILURE)
            .maybe_timeout(invocation.timeout)
            .run_with_cancellation(token.clone())
            .await?;

        if output.is_interrupted() {
            return Err(GitError::Interrupted { command }.into());
        }

        let output = GitOutput {
            exit_code: output.exit_code(),
            stdout: output.stdout().trim().to_string(),
            stderr: output.stderr().trim().to_string(),
        };

        if !output.success() && !invocation.is_failure_allowed() {
            return Err(GitError::CommandFailed {
                command,
                message: output.stderr,
            }
            .into());
        }
        Ok(output)
    }
}

impl GitRunner for ShellBackend {
    fn run<'a>(
        &'a self,
        invocation: &'a GitInvocation,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, SourceResult<GitOutput>> {
        Box::pin(Self::run_git(invocation, token))
    }
}
