// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Git query operations using gix backend.
//!
//! ```text
//! query.rs --> GixBackend --> .git/ (no subprocess)
//! ```

use crate::error::SourceResult;
use std::path::{Path, PathBuf};

use super::backend::{GitQuery, GixBackend};

#[must_use]
pub fn is_git_repo(path: &Path) -> bool {
    GixBackend::is_git_repo(path)
}

/// Open the working copy rooted at `path`.
///
/// # Errors
///
/// Returns `GitError::NotARepository` when `path` is not a readable, non-bare working copy.
pub fn open(path: &Path) -> SourceResult<gix::Repository> {
    GixBackend::open(path)
}

/// Get current branch name (None if HEAD is detached).
///
/// # Errors
///
/// Returns a `GitError` if the repository cannot be opened or HEAD cannot be read.
pub fn current_branch(path: &Path) -> SourceResult<Option<String>> {
    GixBackend::current_branch(path)
}

/// Get the commit HEAD points at (None if unborn).
///
/// # Errors
///
/// Returns a `GitError` if the repository cannot be opened.
pub fn head_commit(path: &Path) -> SourceResult<Option<String>> {
    GixBackend::head_commit(path)
}

/// Get the fetch URL of `remote`.
///
/// # Errors
///
/// Returns a `GitError` if the repository cannot be opened.
pub fn remote_url(path: &Path, remote: &str) -> SourceResult<Option<String>> {
    GixBackend::remote_url(path, remote)
}

/// Check for modifications to tracked files. Untracked files are ignored.
///
/// # Errors
///
/// Returns a `GitError` if the status check fails.
pub fn has_tracked_changes(path: &Path) -> SourceResult<bool> {
    GixBackend::has_tracked_changes(path)
}

#[must_use]
pub fn has_object(path: &Path, oid: &str) -> bool {
    GixBackend::has_object(path, oid)
}

/// Get the git directory of the working copy.
///
/// # Errors
///
/// Returns a `GitError` if the repository cannot be opened.
pub fn git_dir(path: &Path) -> SourceResult<PathBuf> {
    GixBackend::git_dir(path)
}

/// Read a boolean config value.
///
/// # Errors
///
/// Returns a `GitError` if the repository cannot be opened.
pub fn config_bool(path: &Path, key: &str) -> SourceResult<Option<bool>> {
    GixBackend::config_bool(path, key)
}
