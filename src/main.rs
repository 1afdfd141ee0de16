// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Entry point.
//!
//! ```text
//! cli::parse() --> ConfigLoader --> Logging --> Command Dispatch
//!   Fetch | Inspect | Options | Configs | Version
//! ```

use std::process::ExitCode;

use anyhow::Context;
use source_fetch::cli::{self, Cli, Command};
use source_fetch::cmd::config::{run_configs_command, run_options_command};
use source_fetch::cmd::fetch::{run_fetch_command, run_inspect_command};
use source_fetch::config::loader::ConfigLoader;
use source_fetch::config::{Config, DEFAULT_CONFIG_FILE};
use source_fetch::config::types::GlobalConfig;
use source_fetch::logging::{LogConfig, init_logging};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Environment prefix for configuration overrides.
const ENV_PREFIX: &str = "SOURCE_FETCH";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    if matches!(cli.command, Some(Command::Version)) {
        handle_version_command();
        return ExitCode::SUCCESS;
    }

    let loader = match build_config_loader(&cli) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let loaded_files = loader.format_loaded_files();

    let config = match loader.build().context("failed to load configuration") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match init_logging(&build_log_config(&config.global)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    dispatch_command(&cli, &config, &loaded_files).await
}

fn build_log_config(global: &GlobalConfig) -> LogConfig {
    let log_file = Some(global.log_file.display().to_string()).filter(|p| !p.is_empty());

    LogConfig::builder()
        .with_console_level(global.output_log_level)
        .with_file_level(global.file_log_level)
        .maybe_with_log_file(log_file)
        .build()
}

async fn dispatch_command(cli: &Cli, config: &Config, loaded_files: &[String]) -> ExitCode {
    let result = match &cli.command {
        Some(Command::Version) => {
            handle_version_command();
            Ok(())
        }
        Some(Command::Options) => {
            run_options_command(config);
            Ok(())
        }
        Some(Command::Configs) => {
            run_configs_command(loaded_files);
            Ok(())
        }
        Some(Command::Fetch(_)) => run_fetch_command(config).await,
        Some(Command::Inspect(args)) => run_inspect_command(args, config),
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            Err(anyhow::anyhow!("No command specified"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn handle_version_command() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

fn build_config_loader(cli: &Cli) -> source_fetch::error::Result<ConfigLoader> {
    let mut loader = ConfigLoader::new();
    if !cli.global.no_default_config {
        loader = loader.add_toml_file_optional(DEFAULT_CONFIG_FILE);
    }
    for config_path in &cli.global.configs {
        loader = loader.add_toml_file(config_path);
    }
    loader = cli.global.apply(loader.with_env_prefix(ENV_PREFIX))?;

    if let Some(Command::Fetch(args)) = &cli.command {
        loader = args.apply(loader)?;
    }
    Ok(loader)
}
