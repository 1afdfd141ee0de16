// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Checkout stamp: what the last invocation produced in a working copy.
//!
//! ```text
//! .git/source-fetch.json
//!   phase     in_progress  written before any mutation
//!             complete     written after a successful checkout
//!   reference lineage the copy was produced from (refs/heads/main)
//!   commit    commit checked out
//!   scope     sparse patterns/cone, submodules, lfs
//!   history   depth, fetch_tags, filter
//! ```
//!
//! The stamp never holds credentials.

use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::settings::{FetchSettings, SubmoduleMode};
use crate::error::{FsError, SourceResult};

/// File name of the stamp inside the git directory.
pub const STAMP_FILE: &str = "source-fetch.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampPhase {
    InProgress,
    Complete,
}

/// Sparse checkout shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseProfile {
    pub patterns: Vec<String>,
    pub cone: bool,
}

/// Which parts of the repository are materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeProfile {
    pub sparse: Option<SparseProfile>,
    pub submodules: SubmoduleMode,
    pub lfs: bool,
}

impl ScopeProfile {
    #[must_use]
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            sparse: settings.is_sparse().then(|| SparseProfile {
                patterns: settings.sparse_checkout().to_vec(),
                cone: settings.sparse_checkout_cone_mode(),
            }),
            submodules: settings.submodules(),
            lfs: settings.lfs(),
        }
    }
}

/// Shape of the fetched history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryProfile {
    /// Effective shallow depth; 0 for full history.
    pub depth: u32,
    pub fetch_tags: bool,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutStamp {
    pub phase: StampPhase,
    pub reference: Option<String>,
    pub commit: Option<String>,
    pub scope: ScopeProfile,
    pub history: HistoryProfile,
}

impl CheckoutStamp {
    /// Stamp marking a checkout that has started but not finished.
    #[must_use]
    pub fn in_progress(settings: &FetchSettings, reference: Option<String>) -> Self {
        Self {
            phase: StampPhase::InProgress,
            reference,
            commit: None,
            scope: ScopeProfile::from_settings(settings),
            history: HistoryProfile {
                depth: settings.fetch_depth(),
                fetch_tags: settings.fetch_tags(),
                filter: settings.effective_filter(),
            },
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == StampPhase::Complete
    }
}

/// Result of reading the stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stamp", rename_all = "snake_case")]
pub enum StampState {
    /// No stamp: the copy was not produced by this tool.
    Missing,
    /// The stamp exists but cannot be parsed.
    Unreadable,
    Present(CheckoutStamp),
}

impl StampState {
    /// A copy with an unfinished or unparseable stamp cannot be trusted.
    #[must_use]
    pub const fn is_unreliable(&self) -> bool {
        match self {
            Self::Missing => false,
            Self::Unreadable => true,
            Self::Present(stamp) => matches!(stamp.phase, StampPhase::InProgress),
        }
    }

    #[must_use]
    pub const fn stamp(&self) -> Option<&CheckoutStamp> {
        match self {
            Self::Present(stamp) => Some(stamp),
            _ => None,
        }
    }
}

#[must_use]
pub fn stamp_path(git_dir: &Path) -> PathBuf {
    git_dir.join(STAMP_FILE)
}

/// Reads the stamp from `git_dir`.
#[must_use]
pub fn read(git_dir: &Path) -> StampState {
    let path = stamp_path(git_dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StampState::Missing,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read checkout stamp");
            return StampState::Unreadable;
        }
    };
    match serde_json::from_str(&content) {
        Ok(stamp) => StampState::Present(stamp),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid checkout stamp");
            StampState::Unreadable
        }
    }
}

/// Atomically replaces the stamp in `git_dir`.
///
/// # Errors
///
/// Returns an `FsError` if the stamp cannot be written.
pub fn write(git_dir: &Path, stamp: &CheckoutStamp) -> SourceResult<()> {
    let path = stamp_path(git_dir);
    let json = serde_json::to_vec_pretty(stamp).map_err(|e| FsError::io(&path, e.into()))?;

    let mut file = tempfile::NamedTempFile::new_in(git_dir).map_err(|e| FsError::io(git_dir, e))?;
    file.write_all(&json).map_err(|e| FsError::io(&path, e))?;
    file.persist(&path)
        .map_err(|e| FsError::io(&path, e.error))?;

    debug!(path = %path.display(), phase = ?stamp.phase, "wrote checkout stamp");
    Ok(())
}
