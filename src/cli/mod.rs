// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI module for source-fetch using clap derive.
//!
//! # Command Structure
//!
//! ```text
//! source-fetch [global options] <command>
//! fetch [--repository owner/name] [--ref R] [--path DIR] ...
//! inspect [--path DIR]
//! options
//! configs
//! version
//! ```

pub mod fetch;
pub mod global;

#[cfg(test)]
mod tests;

use crate::cli::fetch::{FetchArgs, InspectArgs};
use crate::cli::global::GlobalOptions;
use clap::{Parser, Subcommand};

/// Idempotent git source fetcher.
#[derive(Debug, Parser)]
#[command(
    name = "source-fetch",
    author,
    version,
    about = "Idempotent git source fetcher",
    long_about = "source-fetch Copyright (C) 2026 Romeo Ahmed\n\
                  This program comes with ABSOLUTELY NO WARRANTY\n\
                  This is free software, and you are welcome to redistribute it\n\
                  under certain conditions; see LICENSE for details.\n\n\
                  Brings a directory to a requested revision of a git repository\n\
                  with the least work that is safe. Running `source-fetch fetch`\n\
                  twice with the same inputs does no network work the second time.",
    after_help = "CONFIG FILES:\n\n\
                  source-fetch reads `source-fetch.toml` from the current directory\n\
                  when present, then every --config file in order. SOURCE_FETCH_*\n\
                  variables (e.g. SOURCE_FETCH_SOURCE__FETCH_DEPTH=0) and command\n\
                  line flags override them. Use --no-default-config to skip the\n\
                  file in the current directory."
)]
pub struct Cli {
    /// Global options shared by all commands
    #[command(flatten)]
    pub global: GlobalOptions,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shows the version.
    #[command(visible_alias = "-v")]
    Version,

    /// Lists all options and their effective values.
    Options,

    /// Lists the configuration files that were loaded.
    Configs,

    /// Fetches the requested revision into the working copy.
    Fetch(FetchArgs),

    /// Prints what is currently on disk as JSON.
    Inspect(InspectArgs),
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}

/// Tries to parse command-line arguments, returning an error on failure.
///
/// # Errors
///
/// Returns a `clap::Error` if the arguments are invalid or if help/version information
/// was requested.
pub fn try_parse() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
