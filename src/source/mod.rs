// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Source fetch orchestration.
//!
//! ```text
//! get_source(settings)
//!   |
//!   +-- inspect()         read-only snapshot of the working copy
//!   +-- open_global()     temp HOME credentials for ls-remote
//!   +-- resolve()         ref/commit --> ResolvedTarget
//!   +-- close_global()
//!   +-- reconcile()       Reuse | IncrementalUpdate | CleanReset | FullReclone
//!   |     dry run stops here
//!   +-- execute()         minimal git operations, stamp
//!   '-- release()         local credentials removed and verified (unless persisted)
//! ```

pub mod credentials;
pub mod execute;
pub mod inspect;
pub mod reconcile;
pub mod resolve;
pub mod settings;
pub mod stamp;

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::SourceResult;
use crate::git::backend::{GitRunner, ShellBackend};
use crate::git::cmd::GitCommandManager;
use credentials::CredentialScopeManager;
use execute::Execution;
use inspect::Observed;
use reconcile::{DecisionReason, FetchPlan, ReconcileAction};
use resolve::TargetRef;
use settings::FetchSettings;

/// Runtime collaborators of one fetch.
#[derive(Clone)]
pub struct SourceContext {
    runner: Arc<dyn GitRunner>,
    cancel_token: CancellationToken,
    dry_run: bool,
}

impl Default for SourceContext {
    fn default() -> Self {
        Self {
            runner: Arc::new(ShellBackend),
            cancel_token: CancellationToken::new(),
            dry_run: false,
        }
    }
}

impl std::fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceContext")
            .field("cancelled", &self.cancel_token.is_cancelled())
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl SourceContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the git runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn GitRunner>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Inspect, resolve and decide without touching the working copy.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// What a fetch did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub action: ReconcileAction,
    pub reason: DecisionReason,
    pub target: TargetRef,
    pub commit: String,
    pub fetch: Option<FetchPlan>,
    /// Submodule and LFS failures that did not abort the checkout.
    pub warnings: Vec<String>,
    pub dry_run: bool,
}

/// Fetches the configured revision with the default git runner.
///
/// # Errors
///
/// See [`get_source_with`].
pub async fn get_source(settings: &FetchSettings) -> SourceResult<FetchOutcome> {
    get_source_with(settings, &SourceContext::default()).await
}

/// Brings the working copy at `settings.repository_path()` to the requested
/// revision with the least work that is safe.
///
/// # Errors
///
/// Returns `GitError::RefNotResolvable` for an unknown ref,
/// `GitError::DirtyWorkingCopy` when local changes would be discarded with
/// `clean` disabled, `GitError::CredentialLeak` if credentials cannot be
/// removed, and any git, process or filesystem error that aborts the fetch.
pub async fn get_source_with(
    settings: &FetchSettings,
    ctx: &SourceContext,
) -> SourceResult<FetchOutcome> {
    let path = settings.repository_path();
    info!(
        repository = %settings.repository_url(),
        path = %path.display(),
        reference = settings.reference(),
        commit = settings.commit(),
        dry_run = ctx.dry_run,
        "getting source"
    );

    let mut git = GitCommandManager::new(ctx.runner.clone(), path, ctx.cancel_token.clone())
        .with_safe_directory(settings.set_safe_directory())
        .with_timeout(settings.timeout());
    let mut credentials = CredentialScopeManager::new(settings);

    let result = run(settings, ctx, &mut git, &mut credentials).await;
    credentials.close_global(&mut git);

    if ctx.dry_run {
        return result;
    }

    let cleanup = if settings.persist_credentials() && result.is_ok() {
        credentials.persist();
        Ok(())
    } else {
        credentials.release(&git).await
    };

    match (result, cleanup) {
        (Ok(outcome), Ok(())) => Ok(outcome),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            error!(error = %cleanup, "credential cleanup failed after error");
            Err(e)
        }
    }
}

async fn run(
    settings: &FetchSettings,
    ctx: &SourceContext,
    git: &mut GitCommandManager,
    credentials: &mut CredentialScopeManager,
) -> SourceResult<FetchOutcome> {
    let observed = inspect::inspect(settings.repository_path());
    if let Observed::NotARepository { reason } = &observed {
        info!(reason = %reason, "no reusable working copy");
    }

    credentials.open_global(git).await?;
    let target = resolve::resolve(settings, &observed, git).await?;
    credentials.close_global(git);

    let decision = reconcile::reconcile(&observed, settings, &target);
    info!(
        action = %decision.action,
        reason = ?decision.reason,
        commit = %target.commit,
        "reconciled working copy"
    );

    let warnings = if ctx.dry_run {
        Vec::new()
    } else {
        execute::execute(
            &decision,
            Execution {
                settings,
                observed: &observed,
                target: &target,
                git,
                credentials,
            },
        )
        .await?
    };

    Ok(FetchOutcome {
        action: decision.action,
        reason: decision.reason,
        target: target.target,
        commit: target.commit,
        fetch: decision.fetch,
        warnings,
        dry_run: ctx.dry_run,
    })
}
