// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Carries out a reconciliation decision.
//!
//! ```text
//! Reuse              (nothing)
//! FullReclone        clear dir, init, stamp, remote add, gc.auto 0
//! CleanReset         stamp, reset --hard, clean -ffdx, submodules, sparse off
//!                    (unwanted submodules: deinit + drop .git/modules)
//! IncrementalUpdate  stamp
//!        |
//!        v
//! credential --> fetch (plan) --> verify commit (--unshallow once)
//!   (a pinned commit the remote lacks is RefNotResolvable)
//!   --> sparse set --> checkout --> verify HEAD
//!   --> submodules, LFS   (failures become warnings)
//!   --> complete stamp
//! ```
//!
//! Any fatal error leaves the `in_progress` stamp behind, which makes the
//! next invocation start over.

use std::path::Path;

use tracing::{debug, info, warn};

use super::credentials::CredentialScopeManager;
use super::inspect::{Observed, WorkingCopyState};
use super::reconcile::{ReconcileAction, ReconciliationDecision};
use super::resolve::ResolvedTarget;
use super::settings::FetchSettings;
use super::stamp::{self, CheckoutStamp, StampPhase};
use crate::error::{GitError, SourceError, SourceResult};
use crate::git::cmd::{
    FetchDepth, FetchOptions, GitCommandManager, MINIMUM_GIT_SPARSE_CHECKOUT_VERSION,
    MINIMUM_GIT_VERSION,
};
use crate::utility::fs;

/// Resets and cleans every submodule working tree.
const SUBMODULE_CLEAN: &str = "git reset --hard HEAD && git clean -ffdx";

/// Disables automatic gc inside every submodule.
const SUBMODULE_DISABLE_GC: &str = "git config --local gc.auto 0";

/// Everything the executor needs besides the decision itself.
pub struct Execution<'a> {
    pub settings: &'a FetchSettings,
    pub observed: &'a Observed,
    pub target: &'a ResolvedTarget,
    pub git: &'a mut GitCommandManager,
    pub credentials: &'a mut CredentialScopeManager,
}

/// Applies `decision` and returns the non-fatal warnings.
///
/// # Errors
///
/// Returns `GitError::DirtyWorkingCopy` before touching anything when a
/// dirty copy must be reset but cleaning is disabled, and any git or
/// filesystem error that prevents reaching the target commit.
pub async fn execute(
    decision: &ReconciliationDecision,
    exec: Execution<'_>,
) -> SourceResult<Vec<String>> {
    let Execution {
        settings,
        observed,
        target,
        git,
        credentials,
    } = exec;
    let path = settings.repository_path();
    let state = observed.state();

    if decision.action == ReconcileAction::Reuse {
        if settings.persist_credentials()
            && credentials.is_enabled()
            && !credentials.is_configured_locally()
        {
            credentials.configure_local(git).await?;
        }
        info!(path = %path.display(), commit = %target.commit, "working copy is up to date");
        return Ok(Vec::new());
    }

    if decision.action == ReconcileAction::CleanReset
        && state.is_some_and(|s| s.dirty)
        && !settings.clean()
    {
        return Err(GitError::DirtyWorkingCopy {
            path: path.display().to_string(),
        }
        .into());
    }

    let minimum = if settings.is_sparse() {
        MINIMUM_GIT_SPARSE_CHECKOUT_VERSION
    } else {
        MINIMUM_GIT_VERSION
    };
    git.ensure_version(minimum).await?;

    let git_dir = path.join(".git");
    let in_progress = CheckoutStamp::in_progress(settings, target.target.qualified());

    match (decision.action, state) {
        (ReconcileAction::CleanReset, Some(state)) => {
            stamp::write(&git_dir, &in_progress)?;
            clean_reset(settings, state, git).await?;
        }
        (ReconcileAction::IncrementalUpdate, Some(_)) => {
            stamp::write(&git_dir, &in_progress)?;
        }
        _ => {
            info!(path = %path.display(), "recreating working copy");
            fs::clear_directory(path).await?;
            git.init().await?;
            stamp::write(&git_dir, &in_progress)?;
            git.remote_add("origin", &settings.repository_url()).await?;
            git.disable_auto_gc().await?;
        }
    }

    credentials.configure_local(git).await?;

    if let Some(plan) = &decision.fetch {
        info!(
            depth = ?plan.depth,
            refspecs = ?plan.refspecs,
            "fetching"
        );
        fetch_target(
            settings,
            target,
            git,
            &plan.refspecs,
            &plan.options(settings.show_progress()),
        )
        .await?;
    } else {
        debug!(commit = %target.commit, "target available locally, skipping fetch");
    }

    ensure_commit(settings, target, git, &git_dir).await?;

    let resets_scope = matches!(
        decision.action,
        ReconcileAction::FullReclone | ReconcileAction::CleanReset
    );
    if resets_scope && settings.is_sparse() {
        git.sparse_checkout(
            settings.sparse_checkout(),
            settings.sparse_checkout_cone_mode(),
        )
        .await?;
    }

    info!(
        commit = %target.commit,
        branch = ?target.checkout_branch(),
        "checking out"
    );
    git.checkout(
        &target.commit,
        target.checkout_branch(),
        settings.show_progress(),
    )
    .await?;
    verify_head(target, git).await?;

    let mut warnings = Vec::new();
    if settings.submodules().enabled()
        && let Err(e) = update_submodules(settings, git, credentials).await
    {
        warn!(error = %e, "submodule update failed");
        warnings.push(format!("submodules: {e}"));
    }
    if settings.lfs()
        && let Err(e) = pull_lfs(git).await
    {
        warn!(error = %e, "LFS pull failed");
        warnings.push(format!("lfs: {e}"));
    }

    let recorded_depth = state
        .and_then(|s| s.stamp.stamp())
        .map(|s| s.history.depth);
    let mut complete = in_progress;
    complete.phase = StampPhase::Complete;
    complete.commit = Some(target.commit.clone());
    complete.history.depth = effective_depth(&git_dir, decision, recorded_depth, settings);
    stamp::write(&git_dir, &complete)?;

    info!(
        action = %decision.action,
        commit = %target.commit,
        warnings = warnings.len(),
        "checkout complete"
    );
    Ok(warnings)
}

async fn clean_reset(
    settings: &FetchSettings,
    state: &WorkingCopyState,
    git: &GitCommandManager,
) -> SourceResult<()> {
    info!(path = %settings.repository_path().display(), "resetting working copy");
    if state.head_commit.is_some() {
        git.reset_hard().await?;
    }
    git.clean().await?;

    if state.submodules_initialized {
        if settings.submodules().enabled() {
            if let Err(e) = git.submodule_foreach(SUBMODULE_CLEAN, true).await {
                warn!(error = %e, "failed to clean submodules");
            }
        } else {
            git.submodule_deinit_all().await?;
            fs::remove_directory(&state.git_dir.join("modules")).await?;
        }
    }

    if state.sparse.active && !settings.is_sparse() {
        git.sparse_checkout_disable().await?;
    }
    Ok(())
}

/// Fetch errors meaning the remote has no such object.
const MISSING_OBJECT_MARKERS: &[&str] = &[
    "not our ref",
    "couldn't find remote ref",
    "unadvertised object",
    "no such remote ref",
];

/// Fetches `refspecs`, reporting a pinned commit the remote does not have
/// as unresolvable rather than as a failed command.
async fn fetch_target(
    settings: &FetchSettings,
    target: &ResolvedTarget,
    git: &GitCommandManager,
    refspecs: &[String],
    options: &FetchOptions,
) -> SourceResult<()> {
    match git.fetch(refspecs, options).await {
        Err(e) if target.explicit_commit && is_missing_object(&e) => {
            debug!(commit = %target.commit, error = %e, "remote does not have the commit");
            Err(GitError::RefNotResolvable {
                reference: target.commit.clone(),
                url: settings.repository_url(),
            }
            .into())
        }
        result => result,
    }
}

fn is_missing_object(err: &SourceError) -> bool {
    matches!(
        err.as_git(),
        Some(GitError::CommandFailed { message, .. })
            if MISSING_OBJECT_MARKERS.iter().any(|m| message.contains(m))
    )
}

/// Makes sure the target commit exists locally, widening a shallow copy once.
async fn ensure_commit(
    settings: &FetchSettings,
    target: &ResolvedTarget,
    git: &GitCommandManager,
    git_dir: &Path,
) -> SourceResult<()> {
    if git.rev_parse(&target.commit).await?.is_some() {
        return Ok(());
    }

    if git_dir.join("shallow").is_file() {
        info!(commit = %target.commit, "commit outside shallow history, unshallowing");
        let options = FetchOptions {
            depth: FetchDepth::Unshallow,
            filter: settings.effective_filter(),
            fetch_tags: settings.fetch_tags(),
            show_progress: settings.show_progress(),
        };
        fetch_target(
            settings,
            target,
            git,
            &target.full_history_refspecs(),
            &options,
        )
        .await?;
        if git.rev_parse(&target.commit).await?.is_some() {
            return Ok(());
        }
    }

    Err(GitError::RefNotResolvable {
        reference: target.commit.clone(),
        url: settings.repository_url(),
    }
    .into())
}

async fn verify_head(target: &ResolvedTarget, git: &GitCommandManager) -> SourceResult<()> {
    match git.rev_parse("HEAD").await? {
        Some(head) if head == target.commit => Ok(()),
        head => Err(GitError::CommandFailed {
            command: "git checkout".to_string(),
            message: format!(
                "HEAD is {}, expected {}",
                head.as_deref().unwrap_or("unborn"),
                target.commit
            ),
        }
        .into()),
    }
}

async fn update_submodules(
    settings: &FetchSettings,
    git: &mut GitCommandManager,
    credentials: &mut CredentialScopeManager,
) -> SourceResult<()> {
    let recursive = settings.submodules().recursive();
    let depth = (settings.fetch_depth() > 0).then_some(settings.fetch_depth());

    credentials.open_global(git).await?;
    let result = async {
        git.submodule_sync(recursive).await?;
        git.submodule_update(depth, recursive).await?;
        git.submodule_foreach(SUBMODULE_DISABLE_GC, recursive)
            .await?;
        Ok::<(), SourceError>(())
    }
    .await;
    credentials.close_global(git);
    result?;

    if settings.persist_credentials() {
        credentials.configure_submodules(git).await?;
    }
    Ok(())
}

async fn pull_lfs(git: &GitCommandManager) -> SourceResult<()> {
    git.lfs_install().await?;
    git.lfs_pull().await
}

/// Depth to record: 0 once the copy holds full history.
fn effective_depth(
    git_dir: &Path,
    decision: &ReconciliationDecision,
    recorded: Option<u32>,
    settings: &FetchSettings,
) -> u32 {
    if !git_dir.join("shallow").is_file() {
        return 0;
    }
    match decision.fetch.as_ref().map(|plan| plan.depth) {
        Some(FetchDepth::Depth(n)) => n,
        _ => recorded
            .filter(|&d| d > 0)
            .unwrap_or_else(|| settings.fetch_depth()),
    }
}
