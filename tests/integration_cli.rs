// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration tests for CLI parsing.
//!
//! Tests the CLI module with realistic command-line argument patterns.

use clap::Parser;
use source_fetch::cli::{Cli, Command};
use source_fetch::config::loader::ConfigLoader;
use std::path::PathBuf;

// =============================================================================
// Version and informational commands
// =============================================================================

#[test]
fn cli_version_command() {
    let cli = Cli::try_parse_from(["source-fetch", "version"]).unwrap();
    assert!(matches!(cli.command, Some(Command::Version)));
}

#[test]
fn cli_version_alias() {
    let cli = Cli::try_parse_from(["source-fetch", "-v"]).unwrap();
    assert!(matches!(cli.command, Some(Command::Version)));
}

#[test]
fn cli_no_command() {
    let cli = Cli::try_parse_from(["source-fetch"]).unwrap();
    assert!(cli.command.is_none());
}

#[test]
fn cli_configs_command() {
    let cli = Cli::try_parse_from(["source-fetch", "--no-default-config", "configs"]).unwrap();
    assert!(cli.global.no_default_config);
    assert!(matches!(cli.command, Some(Command::Configs)));
}

// =============================================================================
// Fetch command
// =============================================================================

#[test]
fn cli_fetch_minimal() {
    let cli = Cli::try_parse_from(["source-fetch", "fetch"]).unwrap();
    let Some(Command::Fetch(args)) = cli.command else {
        panic!("expected fetch");
    };
    assert!(args.sparse_checkout.is_empty());
    assert_eq!(args.timeout_secs, None);
}

#[test]
fn cli_fetch_full_flag_set() {
    let cli = Cli::try_parse_from([
        "source-fetch",
        "--log-file",
        "fetch.log",
        "fetch",
        "--repository",
        "octo/widgets",
        "--commit",
        "0123456789abcdef0123456789abcdef01234567",
        "--path",
        "/work/widgets",
        "--token",
        "ghs_secret",
        "--persist-credentials",
        "false",
        "--fetch-tags",
        "true",
        "--filter",
        "blob:none",
        "--sparse-checkout-cone-mode",
        "no",
        "--server-url",
        "https://git.example.com",
        "--timeout",
        "600",
    ])
    .unwrap();

    assert_eq!(cli.global.log_file, Some(PathBuf::from("fetch.log")));
    let Some(Command::Fetch(args)) = cli.command else {
        panic!("expected fetch");
    };

    let config = args
        .apply(ConfigLoader::new())
        .unwrap()
        .build()
        .unwrap();
    let source = &config.source;
    assert_eq!(source.repository, "octo/widgets");
    assert_eq!(source.commit, "0123456789abcdef0123456789abcdef01234567");
    assert_eq!(source.path, PathBuf::from("/work/widgets"));
    assert_eq!(source.token, "ghs_secret");
    assert!(!source.persist_credentials);
    assert!(source.fetch_tags);
    assert_eq!(source.filter, "blob:none");
    assert!(!source.sparse_checkout_cone_mode);
    assert_eq!(source.server_url, "https://git.example.com");
    assert_eq!(source.timeout_secs, 600);
}

#[test]
fn cli_fetch_invalid_depth_rejected() {
    let result = Cli::try_parse_from(["source-fetch", "fetch", "--fetch-depth", "-1"]);
    assert!(result.is_err());
}

#[test]
fn cli_fetch_invalid_bool_rejected() {
    let result = Cli::try_parse_from(["source-fetch", "fetch", "--clean", "maybe"]);
    assert!(result.is_err());
}

// =============================================================================
// Inspect command
// =============================================================================

#[test]
fn cli_inspect_without_path() {
    let cli = Cli::try_parse_from(["source-fetch", "inspect"]).unwrap();
    assert!(matches!(cli.command, Some(Command::Inspect(_))));
}
