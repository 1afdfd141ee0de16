// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Read-only inspection of the on-disk working copy.
//!
//! ```text
//! inspect(path)
//!   gix::open (no parent search)  -- fails --> NotARepository { reason }
//!   remote.origin.url, HEAD, branch, tracked changes      (gix)
//!   core.sparseCheckout(Cone), info/sparse-checkout        (gix + fs)
//!   .git/shallow, .git/modules, .git/source-fetch.json     (fs)
//!   --> Present(WorkingCopyState)
//! ```
//!
//! Inspection never mutates anything and never fails: anything that cannot
//! be read is reported as "not a repository" or conservatively as dirty.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::stamp::{self, SparseProfile, StampState};
use crate::git::query;

/// Observed sparse-checkout configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SparseState {
    pub active: bool,
    pub cone: bool,
    pub patterns: Vec<String>,
}

impl SparseState {
    /// Returns whether the checkout on disk has exactly the `desired` shape.
    ///
    /// Cone-mode files are compared by directory, so the parent entries git
    /// adds for nested directories do not count as drift.
    #[must_use]
    pub fn matches(&self, desired: Option<&SparseProfile>) -> bool {
        let Some(desired) = desired else {
            return !self.active;
        };
        if !self.active || self.cone != desired.cone {
            return false;
        }
        if desired.cone {
            cone_directories(&self.patterns)
                == normalized(&desired.patterns, |p| p.trim_matches('/'))
        } else {
            normalized(&self.patterns, str::trim) == normalized(&desired.patterns, str::trim)
        }
    }
}

fn normalized<'a>(patterns: &'a [String], clean: impl Fn(&'a str) -> &'a str) -> Vec<&'a str> {
    let mut out: Vec<&str> = patterns
        .iter()
        .map(|p| clean(p))
        .filter(|p| !p.is_empty())
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Directories a cone-mode file includes recursively.
///
/// ```text
/// /*            root files
/// !/*/          no other top-level directory
/// /src/         parent of a nested entry...
/// !/src/*/      ...only when followed by this exclusion
/// /src/app/     included
/// ```
fn cone_directories(lines: &[String]) -> Vec<&str> {
    let parents: Vec<&str> = lines
        .iter()
        .filter_map(|l| l.strip_prefix('!'))
        .filter_map(|l| l.strip_suffix("/*/"))
        .map(|l| l.trim_start_matches('/'))
        .collect();
    let mut dirs: Vec<&str> = lines
        .iter()
        .filter(|l| !l.starts_with('!') && l.as_str() != "/*")
        .map(|l| l.trim_matches('/'))
        .filter(|l| !l.is_empty() && !parents.contains(l))
        .collect();
    dirs.sort_unstable();
    dirs.dedup();
    dirs
}

/// Snapshot of a working copy, recomputed on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingCopyState {
    pub git_dir: PathBuf,
    pub remote_url: Option<String>,
    pub head_commit: Option<String>,
    pub head_branch: Option<String>,
    /// Tracked files differ from HEAD. Untracked files do not count.
    pub dirty: bool,
    pub shallow: bool,
    pub sparse: SparseState,
    pub submodules_initialized: bool,
    pub stamp: StampState,
}

/// Result of inspecting a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observed {
    NotARepository { reason: String },
    Present(Box<WorkingCopyState>),
}

impl Observed {
    #[must_use]
    pub fn state(&self) -> Option<&WorkingCopyState> {
        match self {
            Self::Present(state) => Some(state),
            Self::NotARepository { .. } => None,
        }
    }
}

/// Inspects the working copy at `path`.
#[must_use]
pub fn inspect(path: &Path) -> Observed {
    let git_dir = match query::open(path).and_then(|_| query::git_dir(path)) {
        Ok(git_dir) => git_dir,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no usable working copy");
            return Observed::NotARepository {
                reason: e.to_string(),
            };
        }
    };

    let remote_url = query::remote_url(path, "origin").unwrap_or_default();
    let head_commit = query::head_commit(path).unwrap_or_default();
    let head_branch = query::current_branch(path).unwrap_or_default();
    let dirty = query::has_tracked_changes(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "status failed, treating as dirty");
        true
    });

    let sparse = SparseState {
        active: query::config_bool(path, "core.sparseCheckout")
            .ok()
            .flatten()
            .unwrap_or(false),
        cone: query::config_bool(path, "core.sparseCheckoutCone")
            .ok()
            .flatten()
            .unwrap_or(false),
        patterns: read_sparse_patterns(&git_dir),
    };

    let state = WorkingCopyState {
        remote_url,
        head_commit,
        head_branch,
        dirty,
        shallow: git_dir.join("shallow").is_file(),
        sparse,
        submodules_initialized: has_entries(&git_dir.join("modules")),
        stamp: stamp::read(&git_dir),
        git_dir,
    };

    debug!(
        path = %path.display(),
        head = ?state.head_commit,
        branch = ?state.head_branch,
        dirty = state.dirty,
        shallow = state.shallow,
        sparse = state.sparse.active,
        "inspected working copy"
    );
    Observed::Present(Box::new(state))
}

fn read_sparse_patterns(git_dir: &Path) -> Vec<String> {
    std::fs::read_to_string(git_dir.join("info").join("sparse-checkout"))
        .map(|content| {
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}
