// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scripted [`GitRunner`] for unit tests.
//!
//! Records every invocation and answers from a list of prefix rules; the
//! most recently added matching rule wins. Unmatched commands succeed with
//! empty output, or go to a fallback runner when one is set.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::backend::{GitInvocation, GitOutput, GitRunner};
use crate::error::{GitError, SourceResult};

enum Response {
    Output(String),
    Fail(String),
}

#[derive(Default)]
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<GitInvocation>>,
    rules: Mutex<Vec<(Vec<String>, Response)>>,
    fallback: Option<Arc<dyn GitRunner>>,
}

/// Drops leading `-c key=value` pairs so rules match on the subcommand.
fn command_args(invocation: &GitInvocation) -> &[String] {
    let mut args = invocation.args();
    while args.len() >= 2 && args[0] == "-c" {
        args = &args[2..];
    }
    args
}

impl ScriptedRunner {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runner that forwards unmatched commands to `fallback`.
    pub(crate) fn with_fallback(fallback: Arc<dyn GitRunner>) -> Arc<Self> {
        Arc::new(Self {
            fallback: Some(fallback),
            ..Self::default()
        })
    }

    /// Answers commands starting with `prefix` with `stdout`.
    pub(crate) fn respond(&self, prefix: &[&str], stdout: &str) {
        self.push(prefix, Response::Output(stdout.to_string()));
    }

    /// Fails commands starting with `prefix` with `message` on stderr.
    pub(crate) fn fail(&self, prefix: &[&str], message: &str) {
        self.push(prefix, Response::Fail(message.to_string()));
    }

    fn push(&self, prefix: &[&str], response: Response) {
        let prefix = prefix.iter().map(ToString::to_string).collect();
        self.rules
            .lock()
            .expect("rules lock")
            .push((prefix, response));
    }

    /// Recorded invocations, in order.
    pub(crate) fn invocations(&self) -> Vec<GitInvocation> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Recorded command lines without leading `-c` options.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(|inv| command_args(inv).join(" "))
            .collect()
    }

    /// Number of recorded commands starting with `prefix`.
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn answer(&self, invocation: &GitInvocation) -> Option<SourceResult<GitOutput>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(invocation.clone());

        let args = command_args(invocation);
        let rules = self.rules.lock().expect("rules lock");
        let rule = rules
            .iter()
            .rev()
            .find(|(prefix, _)| args.len() >= prefix.len() && args[..prefix.len()] == prefix[..]);

        let result = match rule? {
            (_, Response::Output(stdout)) => Ok(GitOutput::ok(stdout.clone())),
            (_, Response::Fail(message)) if invocation.is_failure_allowed() => Ok(GitOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: message.clone(),
            }),
            (_, Response::Fail(message)) => Err(GitError::CommandFailed {
                command: invocation.display(),
                message: message.clone(),
            }
            .into()),
        };
        Some(result)
    }
}

impl GitRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a GitInvocation,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, SourceResult<GitOutput>> {
        Box::pin(async move {
            match (self.answer(invocation), &self.fallback) {
                (Some(result), _) => result,
                (None, Some(fallback)) => fallback.run(invocation, token).await,
                (None, None) => Ok(GitOutput::ok("")),
            }
        })
    }
}
