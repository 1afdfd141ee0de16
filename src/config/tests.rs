// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{Config, ConfigLoader};
use crate::logging::LogLevel;
use crate::source::settings::SubmoduleMode;
use std::path::PathBuf;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(!config.global.dry);
    assert_eq!(config.global.output_log_level, LogLevel::INFO);
    assert_eq!(config.global.file_log_level, LogLevel::TRACE);
    assert!(config.global.log_file.as_os_str().is_empty());

    let source = &config.source;
    assert!(source.clean);
    assert!(source.persist_credentials);
    assert!(source.show_progress);
    assert!(source.sparse_checkout_cone_mode);
    assert!(source.set_safe_directory);
    assert!(!source.lfs);
    assert!(!source.fetch_tags);
    assert_eq!(source.fetch_depth, 1);
    assert_eq!(source.submodules, SubmoduleMode::None);
    assert_eq!(source.timeout_secs, 0);
}

#[test]
fn test_parse_source_section() {
    let config = Config::parse(
        r#"
[source]
repository = "octo/widgets"
ref = "v1.2.0"
path = "/work/widgets"
fetch_depth = 0
fetch_tags = true
submodules = "recursive"
sparse_checkout = ["src", "docs"]
sparse_checkout_cone_mode = false
"#,
    )
    .expect("valid config");

    let source = &config.source;
    assert_eq!(source.repository, "octo/widgets");
    assert_eq!(source.reference, "v1.2.0");
    assert_eq!(source.path, PathBuf::from("/work/widgets"));
    assert_eq!(source.fetch_depth, 0);
    assert!(source.fetch_tags);
    assert_eq!(source.submodules, SubmoduleMode::Recursive);
    assert_eq!(source.sparse_checkout, vec!["src", "docs"]);
    assert!(!source.sparse_checkout_cone_mode);
    // untouched keys keep their defaults
    assert!(source.clean);
}

#[test]
fn test_parse_submodules_bool() {
    let config = Config::parse("[source]\nsubmodules = true").expect("valid config");
    assert_eq!(config.source.submodules, SubmoduleMode::Shallow);

    let config = Config::parse("[source]\nsubmodules = false").expect("valid config");
    assert_eq!(config.source.submodules, SubmoduleMode::None);

    assert!(Config::parse("[source]\nsubmodules = \"sometimes\"").is_err());
}

#[test]
fn test_parse_rejects_unknown_keys() {
    assert!(Config::parse("[source]\nbranch = \"main\"").is_err());
    assert!(Config::parse("[paths]\nprefix = \"/x\"").is_err());
}

#[test]
fn test_parse_rejects_bad_log_level() {
    let result = Config::parse("[global]\noutput_log_level = 9");
    assert!(result.is_err(), "log level 9 is out of range");
}

#[test]
fn test_format_options_hides_token() {
    let config = Config::parse(
        r#"
[source]
repository = "octo/widgets"
path = "/work/widgets"
token = "ghs_secret"
"#,
    )
    .expect("valid config");

    let options = config.format_options();
    assert!(options.iter().any(|line| line.starts_with("source.token")
        && line.ends_with("= [hidden]")));
    assert!(options.iter().all(|line| !line.contains("ghs_secret")));
}

#[test]
fn test_format_options_aligned() {
    let config = Config::parse(
        r#"
[global]
log_file = "fetch.log"

[source]
repository = "octo/widgets"
ref = "main"
path = "/work/widgets"
"#,
    )
    .expect("valid config");
    insta::assert_snapshot!(config.format_options().join("\n"), @r"
    global.dry                 = false
    global.file_log_level      = 5
    global.log_file            = fetch.log
    global.output_log_level    = 3
    source.clean               = true
    source.fetch_depth         = 1
    source.fetch_tags          = false
    source.lfs                 = false
    source.path                = /work/widgets
    source.persist_credentials = true
    source.ref                 = main
    source.repository          = octo/widgets
    source.set_safe_directory  = true
    source.show_progress       = true
    source.submodules          = false
    ");
}

#[test]
fn test_token_not_serialized() {
    let config = Config::parse("[source]\ntoken = \"ghs_secret\"").expect("valid config");
    let json = serde_json::to_string(&config).expect("serialize");
    assert!(!json.contains("ghs_secret"));
    assert!(!format!("{:?}", config.source).contains("ghs_secret"));
}

#[test]
fn test_config_loader_add_toml_file_success() {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let mut file = NamedTempFile::new().expect("failed to create temp file");
    writeln!(
        file,
        r#"
[global]
dry = true

[source]
repository = "octo/widgets"
"#
    )
    .expect("failed to write temp file");

    let loader = ConfigLoader::new().add_toml_file(file.path());
    assert_eq!(loader.loaded_files().len(), 1);
    let config = loader.build().expect("build should succeed");

    assert!(config.global.dry);
    assert_eq!(config.source.repository, "octo/widgets");
}

#[test]
fn test_config_loader_add_toml_file_not_found() {
    let loader = ConfigLoader::new().add_toml_file("/nonexistent/path/to/config.toml");
    assert!(loader.build().is_err());
}

#[test]
fn test_config_loader_optional_file_missing() {
    let loader = ConfigLoader::new().add_toml_file_optional("/nonexistent/source-fetch.toml");
    assert!(loader.loaded_files().is_empty());
    let config = loader.build().expect("missing optional file is fine");
    assert_eq!(config.source.fetch_depth, 1);
}

#[test]
fn test_config_loader_with_env_prefix() {
    // SAFETY: the variable names are unique to this test.
    unsafe {
        std::env::set_var("SFTEST_SOURCE__FETCH_DEPTH", "0");
        std::env::set_var("SFTEST_SOURCE__SPARSE_CHECKOUT", "src,docs");
        std::env::set_var("SFTEST_GLOBAL__DRY", "true");
    }

    let result = ConfigLoader::new()
        .add_toml_str("[source]\nfetch_depth = 5")
        .with_env_prefix("SFTEST")
        .build();

    // SAFETY: same as above
    unsafe {
        std::env::remove_var("SFTEST_SOURCE__FETCH_DEPTH");
        std::env::remove_var("SFTEST_SOURCE__SPARSE_CHECKOUT");
        std::env::remove_var("SFTEST_GLOBAL__DRY");
    }

    let config = result.expect("build should succeed");
    assert_eq!(config.source.fetch_depth, 0, "env overrides TOML");
    assert_eq!(config.source.sparse_checkout, vec!["src", "docs"]);
    assert!(config.global.dry);
}

#[test]
fn test_config_loader_set_override() {
    let config = ConfigLoader::new()
        .add_toml_str("[source]\nref = \"main\"")
        .set("source.ref", "release")
        .expect("set should succeed")
        .set_some("source.fetch_depth", None::<i64>)
        .expect("absent override is a no-op")
        .set_some("source.lfs", Some(true))
        .expect("set should succeed")
        .build()
        .expect("build should succeed");

    assert_eq!(config.source.reference, "release");
    assert_eq!(config.source.fetch_depth, 1);
    assert!(config.source.lfs);
}

#[test]
fn test_format_loaded_files() {
    let loader = ConfigLoader::new()
        .add_toml_str("")
        .add_toml_str("[global]\ndry = true");
    insta::assert_debug_snapshot!(loader.format_loaded_files(), @r#"
    [
        "1. [string] <string>",
        "2. [string] <string>",
    ]
    "#);
}
