// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::cli::{Cli, Command};
use crate::config::loader::ConfigLoader;
use crate::source::settings::SubmoduleMode;
use clap::Parser;
use std::path::PathBuf;

fn fetch_args(cli: Cli) -> crate::cli::fetch::FetchArgs {
    match cli.command {
        Some(Command::Fetch(args)) => args,
        other => panic!("expected fetch, got {other:?}"),
    }
}

#[test]
fn test_parse_version() {
    let cli = Cli::try_parse_from(["source-fetch", "version"]).expect("valid args");
    assert!(matches!(cli.command, Some(Command::Version)));
}

#[test]
fn test_parse_global_options() {
    let cli = Cli::try_parse_from([
        "source-fetch",
        "-l",
        "5",
        "--dry",
        "--config",
        "a.toml",
        "-c",
        "b.toml",
        "options",
    ])
    .expect("valid args");

    assert_eq!(cli.global.log_level, Some(5));
    assert!(cli.global.dry);
    assert_eq!(
        cli.global.configs,
        vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]
    );
    assert!(matches!(cli.command, Some(Command::Options)));
}

#[test]
fn test_log_level_out_of_range() {
    assert!(Cli::try_parse_from(["source-fetch", "-l", "7", "version"]).is_err());
}

#[test]
fn test_parse_fetch() {
    let cli = Cli::try_parse_from([
        "source-fetch",
        "fetch",
        "--repository",
        "octo/widgets",
        "--ref",
        "v2",
        "--path",
        "/work/widgets",
        "--fetch-depth",
        "0",
        "--clean",
        "false",
        "--submodules",
        "recursive",
        "--sparse-checkout",
        "src",
        "--sparse-checkout",
        "docs",
    ])
    .expect("valid args");

    let args = fetch_args(cli);
    assert_eq!(args.repository.as_deref(), Some("octo/widgets"));
    assert_eq!(args.reference.as_deref(), Some("v2"));
    assert_eq!(args.path, Some(PathBuf::from("/work/widgets")));
    assert_eq!(args.fetch_depth, Some(0));
    assert_eq!(args.clean, Some(false));
    assert_eq!(args.submodules, Some(SubmoduleMode::Recursive));
    assert_eq!(args.sparse_checkout, vec!["src", "docs"]);
    assert_eq!(args.lfs, None);
}

#[test]
fn test_parse_fetch_rejects_bad_submodules() {
    let result = Cli::try_parse_from(["source-fetch", "fetch", "--submodules", "sometimes"]);
    assert!(result.is_err());
}

#[test]
fn test_fetch_args_override_config() {
    let cli = Cli::try_parse_from([
        "source-fetch",
        "fetch",
        "--ref",
        "release",
        "--fetch-depth",
        "0",
        "--lfs",
        "yes",
        "--submodules",
        "true",
        "--sparse-checkout",
        "src",
    ])
    .expect("valid args");
    let args = fetch_args(cli);

    let loader = ConfigLoader::new().add_toml_str(
        r#"
[source]
repository = "octo/widgets"
ref = "main"
fetch_depth = 10
"#,
    );
    let config = args
        .apply(loader)
        .expect("overrides apply")
        .build()
        .expect("config builds");

    assert_eq!(config.source.repository, "octo/widgets");
    assert_eq!(config.source.reference, "release");
    assert_eq!(config.source.fetch_depth, 0);
    assert!(config.source.lfs);
    assert_eq!(config.source.submodules, SubmoduleMode::Shallow);
    assert_eq!(config.source.sparse_checkout, vec!["src"]);
    // flags that were not given keep the file or default value
    assert!(config.source.clean);
}

#[test]
fn test_global_options_apply() {
    let cli = Cli::try_parse_from(["source-fetch", "--dry", "-l", "4", "options"])
        .expect("valid args");
    let config = cli
        .global
        .apply(ConfigLoader::new())
        .expect("overrides apply")
        .build()
        .expect("config builds");

    assert!(config.global.dry);
    assert_eq!(config.global.output_log_level.as_u8(), 4);
    assert_eq!(config.global.file_log_level.as_u8(), 4);
}

#[test]
fn test_parse_inspect() {
    let cli = Cli::try_parse_from(["source-fetch", "inspect", "--path", "/work"])
        .expect("valid args");
    match cli.command {
        Some(Command::Inspect(args)) => assert_eq!(args.path, Some(PathBuf::from("/work"))),
        other => panic!("expected inspect, got {other:?}"),
    }
}
