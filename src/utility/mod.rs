// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Utility modules.
//!
//! ```text
//! fs
//!   ensure_directory(), clear_directory()
//!   find_git_config_files()  .git/config + .git/modules/**/config
//! ```

pub mod fs;
