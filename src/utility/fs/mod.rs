// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Filesystem utilities for preparing and auditing working copies.
//!
//! ```text
//! ensure_directory()      create path (and parents), reject files
//! clear_directory()       remove every entry, keep the directory
//! remove_directory()      remove a tree, tolerate its absence
//! find_git_config_files() .git/config + .git/modules/**/config (ignore::WalkBuilder)
//! ```

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{FsError, SourceResult};

/// Creates `path` and its parents if missing.
///
/// # Errors
///
/// Returns `FsError::NotADirectory` if `path` exists as a file, or an I/O error.
pub async fn ensure_directory(path: &Path) -> SourceResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(FsError::NotADirectory(path.display().to_string()).into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| FsError::io(path, e))?;
            Ok(())
        }
        Err(e) => Err(FsError::io(path, e).into()),
    }
}

/// Removes every entry inside `path`, leaving the directory itself.
///
/// A missing `path` is created instead.
///
/// # Errors
///
/// Returns an `FsError` if an entry cannot be removed.
pub async fn clear_directory(path: &Path) -> SourceResult<()> {
    ensure_directory(path).await?;

    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| FsError::io(path, e))?;
    let mut removed = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FsError::io(path, e))?
    {
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| FsError::io(&entry_path, e))?;
        let result = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&entry_path).await
        } else {
            tokio::fs::remove_file(&entry_path).await
        };
        result.map_err(|e| FsError::io(&entry_path, e))?;
        removed += 1;
    }

    debug!(path = %path.display(), removed, "cleared directory");
    Ok(())
}

/// Removes `path` and everything below it. A missing `path` is not an error.
///
/// # Errors
///
/// Returns an `FsError` if the directory exists but cannot be removed.
pub async fn remove_directory(path: &Path) -> SourceResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FsError::io(path, e).into()),
    }
}

/// Lists the repository config file and every submodule config file under `git_dir`.
#[must_use]
pub fn find_git_config_files(git_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let main = git_dir.join("config");
    if main.is_file() {
        files.push(main);
    }

    let modules = git_dir.join("modules");
    if !modules.is_dir() {
        return files;
    }

    let walker = WalkBuilder::new(&modules)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false)
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                let is_file = entry.file_type().is_some_and(|t| t.is_file());
                if is_file && entry.file_name() == "config" {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!(error = %e, "error walking submodule git directories"),
        }
    }

    files.sort();
    files
}
