// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Git operations module.
//!
//! ```text
//!          Public API
//!      query.rs      cmd.rs
//!          |            |
//!          v            v
//!      ,------------------,
//!      | backend (traits) |
//!      '--+----------+----'
//!         |          |
//!         v          v
//!    GitQuery    GitRunner
//!   (gix, read)  (CLI, write)
//!         |          |
//!         v          v
//!    GixBackend  ShellBackend
//!    .open       .run(GitInvocation)
//!    .head
//!    .remote_url
//!    .status
//! ```
//!
//! **`GixBackend`**: pure Rust, no subprocess, read-only.
//! **`ShellBackend`**: git CLI for fetch, checkout, submodules, LFS.

pub mod backend;
pub mod cmd;
pub mod query;

#[cfg(test)]
pub(crate) mod test_utils;
