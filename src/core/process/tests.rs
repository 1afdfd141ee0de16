// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::builder::{ProcessBuilder, ProcessFlags};
use crate::error::{ProcessError, SourceError};

#[tokio::test]
async fn test_process_echo() {
    let output = ProcessBuilder::new("echo")
        .arg("hello")
        .capture_output()
        .run()
        .await
        .expect("echo should succeed");

    assert!(output.success());
    insta::assert_snapshot!(output.stdout().trim(), @"hello");
}

#[tokio::test]
async fn test_process_exit_code_allowed() {
    let output = ProcessBuilder::new("/bin/sh")
        .args(["-c", "exit 42"])
        .flag(ProcessFlags::ALLOW_FAILURE)
        .run()
        .await
        .expect("process should complete");

    assert_eq!(output.exit_code(), 42);
    assert!(!output.success());
}

#[tokio::test]
async fn test_process_exit_code_rejected() {
    let err = ProcessBuilder::new("/bin/sh")
        .args(["-c", "exit 3"])
        .flag(ProcessFlags::QUIET_FAILURE)
        .run()
        .await
        .expect_err("non-zero exit should fail");

    assert!(matches!(
        err,
        SourceError::Process(ref e) if matches!(**e, ProcessError::NonZeroExit { code: 3, .. })
    ));
}

#[tokio::test]
async fn test_process_success_codes() {
    let output = ProcessBuilder::new("/bin/sh")
        .args(["-c", "exit 1"])
        .success_codes([0, 1])
        .run()
        .await
        .expect("exit code 1 is allowed");
    assert_eq!(output.exit_code(), 1);
}

#[tokio::test]
async fn test_process_env_is_additive() {
    let output = ProcessBuilder::new("/bin/sh")
        .args(["-c", "echo \"$TEST_VAR:${PATH:+has-path}\""])
        .env("TEST_VAR", "test_value")
        .capture_stdout()
        .run()
        .await
        .expect("process should succeed");

    insta::assert_snapshot!(output.stdout().trim(), @"test_value:has-path");
}

#[tokio::test]
async fn test_process_captures_many_lines() {
    let output = ProcessBuilder::new("/bin/sh")
        .args(["-c", "i=0; while [ $i -lt 500 ]; do echo line$i; i=$((i+1)); done"])
        .capture_stdout()
        .run()
        .await
        .expect("process should succeed");

    assert_eq!(output.stdout().lines().count(), 500);
}

#[tokio::test]
async fn test_process_timeout() {
    let err = ProcessBuilder::new("sleep")
        .arg("5")
        .timeout(Duration::from_millis(100))
        .run()
        .await
        .expect_err("sleep should time out");

    assert!(matches!(
        err,
        SourceError::Process(ref e) if matches!(**e, ProcessError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_process_cancellation() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let output = ProcessBuilder::new("sleep")
        .arg("5")
        .run_with_cancellation(token)
        .await
        .expect("cancelled process is not an error");
    assert!(output.is_interrupted());
}

#[tokio::test]
async fn test_process_already_cancelled() {
    let token = CancellationToken::new();
    token.cancel();
    let output = ProcessBuilder::new("echo")
        .run_with_cancellation(token)
        .await
        .expect("should short-circuit");
    assert!(output.is_interrupted());
    assert_eq!(output.exit_code(), -1);
}

#[test]
fn test_command_line_quotes_spaces() {
    let builder = ProcessBuilder::new("git").args(["commit", "-m", "two words"]);
    insta::assert_snapshot!(builder.command_line(), @r#"git commit -m "two words""#);
}

#[test]
fn test_executable_lookup() {
    let builder = ProcessBuilder::which("sh").expect("sh should be in PATH");
    assert!(builder.program().exists());
    assert!(ProcessBuilder::exists("sh"));
    assert_eq!(ProcessBuilder::find("sh"), Some(builder.program().clone()));
}

#[test]
fn test_executable_lookup_not_found() {
    let program = "nonexistent_program_12345";

    let err = ProcessBuilder::which(program).expect_err("should not be found");
    assert!(err.to_string().contains(program));
    assert!(!ProcessBuilder::exists(program));
    assert!(ProcessBuilder::find(program).is_none());
}
