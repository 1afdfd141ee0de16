// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Decides what to do with an existing working copy. Pure: no I/O.
//!
//! ```text
//! NotARepository | unreliable stamp | remote differs   --> FullReclone
//! dirty | no stamp | ref changed | scope changed       --> CleanReset
//! HEAD == target && history satisfied                  --> Reuse
//! otherwise                                            --> IncrementalUpdate
//! ```
//!
//! History is only ever widened: a full copy stays full, a shallow copy
//! keeps at least its recorded depth.

use serde::Serialize;

use super::inspect::{Observed, WorkingCopyState};
use super::resolve::ResolvedTarget;
use super::settings::FetchSettings;
use super::stamp::{CheckoutStamp, HistoryProfile, ScopeProfile};
use crate::git::cmd::{FetchDepth, FetchOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Leave the working copy untouched.
    Reuse,
    /// Fetch what is missing and move HEAD; untracked files survive.
    IncrementalUpdate,
    /// Discard local changes, then fetch and check out.
    CleanReset,
    /// Delete everything and start from `git init`.
    FullReclone,
}

impl ReconcileAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reuse => "reuse",
            Self::IncrementalUpdate => "incremental_update",
            Self::CleanReset => "clean_reset",
            Self::FullReclone => "full_reclone",
        }
    }
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an action was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    NotARepository,
    /// An interrupted or unparseable stamp.
    Unreliable,
    RemoteMismatch,
    Dirty,
    /// The copy was not produced by this tool.
    UnknownProvenance,
    LineageChanged,
    ScopeChanged,
    UpToDate,
    TargetMoved,
    HistoryChanged,
}

/// What to fetch before checking out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchPlan {
    pub depth: FetchDepth,
    pub refspecs: Vec<String>,
    pub fetch_tags: bool,
    pub filter: Option<String>,
}

impl FetchPlan {
    /// Options for [`crate::git::cmd::GitCommandManager::fetch`].
    #[must_use]
    pub fn options(&self, show_progress: bool) -> FetchOptions {
        FetchOptions {
            depth: self.depth,
            filter: self.filter.clone(),
            fetch_tags: self.fetch_tags,
            show_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationDecision {
    pub action: ReconcileAction,
    pub reason: DecisionReason,
    /// `None` when nothing needs to be downloaded.
    pub fetch: Option<FetchPlan>,
}

/// Returns whether the recorded history already covers what is desired.
fn history_satisfied(
    state: &WorkingCopyState,
    recorded: &HistoryProfile,
    desired: &HistoryProfile,
) -> bool {
    let depth_ok = match desired.depth {
        0 => !state.shallow,
        n => !state.shallow || (recorded.depth != 0 && recorded.depth >= n),
    };
    depth_ok
        && (!desired.fetch_tags || recorded.fetch_tags)
        && recorded.filter == desired.filter
}

/// Widened depth for a copy that already has history.
fn widened_depth(
    state: &WorkingCopyState,
    recorded: Option<&HistoryProfile>,
    desired: u32,
) -> FetchDepth {
    match (desired, state.shallow) {
        (0, true) => FetchDepth::Unshallow,
        (_, false) => FetchDepth::Full,
        (n, true) => FetchDepth::Depth(n.max(recorded.map_or(0, |h| h.depth))),
    }
}

fn plan(target: &ResolvedTarget, depth: FetchDepth, desired: &HistoryProfile) -> FetchPlan {
    let full_history = matches!(depth, FetchDepth::Full | FetchDepth::Unshallow);
    let mut refspecs = if full_history {
        target.full_history_refspecs()
    } else {
        target.specific_refspecs()
    };
    if desired.fetch_tags && !full_history {
        refspecs.push(crate::git::cmd::TAGS_REFSPEC.to_string());
    }
    FetchPlan {
        depth,
        refspecs,
        fetch_tags: desired.fetch_tags,
        filter: desired.filter.clone(),
    }
}

const fn decision(
    action: ReconcileAction,
    reason: DecisionReason,
    fetch: Option<FetchPlan>,
) -> ReconciliationDecision {
    ReconciliationDecision {
        action,
        reason,
        fetch,
    }
}

fn desired_history(settings: &FetchSettings) -> HistoryProfile {
    HistoryProfile {
        depth: settings.fetch_depth(),
        fetch_tags: settings.fetch_tags(),
        filter: settings.effective_filter(),
    }
}

/// Picks the cheapest action that reaches the desired state safely.
#[must_use]
pub fn reconcile(
    observed: &Observed,
    settings: &FetchSettings,
    target: &ResolvedTarget,
) -> ReconciliationDecision {
    let desired = desired_history(settings);

    let reclone = |reason| {
        let depth = match desired.depth {
            0 => FetchDepth::Full,
            n => FetchDepth::Depth(n),
        };
        decision(
            ReconcileAction::FullReclone,
            reason,
            Some(plan(target, depth, &desired)),
        )
    };

    let Some(state) = observed.state() else {
        return reclone(DecisionReason::NotARepository);
    };
    if state.stamp.is_unreliable() {
        return reclone(DecisionReason::Unreliable);
    }
    if state.remote_url.as_deref() != Some(settings.repository_url().as_str()) {
        return reclone(DecisionReason::RemoteMismatch);
    }

    let stamp = state.stamp.stamp();
    let recorded = stamp.map(|s| &s.history);
    let satisfied = recorded.is_some_and(|r| history_satisfied(state, r, &desired));
    let fetch_plan = || {
        let needed = !(target.locally_available && satisfied);
        needed.then(|| {
            plan(
                target,
                widened_depth(state, recorded, desired.depth),
                &desired,
            )
        })
    };

    if let Some(reason) = reset_reason(state, stamp, settings, target) {
        return decision(ReconcileAction::CleanReset, reason, fetch_plan());
    }

    let on_target = state.head_commit.as_deref() == Some(target.commit.as_str())
        && target
            .checkout_branch()
            .is_none_or(|b| state.head_branch.as_deref() == Some(b));
    if on_target && satisfied {
        return decision(ReconcileAction::Reuse, DecisionReason::UpToDate, None);
    }

    let reason = if on_target {
        DecisionReason::HistoryChanged
    } else {
        DecisionReason::TargetMoved
    };
    decision(ReconcileAction::IncrementalUpdate, reason, fetch_plan())
}

fn reset_reason(
    state: &WorkingCopyState,
    stamp: Option<&CheckoutStamp>,
    settings: &FetchSettings,
    target: &ResolvedTarget,
) -> Option<DecisionReason> {
    if state.dirty {
        return Some(DecisionReason::Dirty);
    }
    let Some(stamp) = stamp else {
        return Some(DecisionReason::UnknownProvenance);
    };
    if stamp.reference != target.target.qualified() {
        return Some(DecisionReason::LineageChanged);
    }
    let desired_scope = ScopeProfile::from_settings(settings);
    if stamp.scope != desired_scope
        || !state.sparse.matches(desired_scope.sparse.as_ref())
        || (state.submodules_initialized && !desired_scope.submodules.enabled())
    {
        return Some(DecisionReason::ScopeChanged);
    }
    None
}
