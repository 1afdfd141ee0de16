// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Resolution of the requested ref/commit to a concrete target.
//!
//! ```text
//! commit set?  --yes--> target = commit, ref only decides where it lands
//!      | no
//!      v
//! ref empty?   --yes--> ls-remote --symref HEAD  (default branch)
//!      |
//!      v
//! ls-remote <url> refs/heads/<ref> refs/tags/<ref>
//!   exact refs/... match, else heads before tags
//!   annotated tags: take the peeled ^{} entry
//!   nothing --> RefNotResolvable
//! ```

use serde::Serialize;
use tracing::{debug, info};

use super::inspect::Observed;
use super::settings::{FetchSettings, is_object_id};
use crate::error::{GitError, SourceResult};
use crate::git::cmd::{GitCommandManager, RemoteRef, TAGS_REFSPEC};
use crate::git::query;

/// Refspec covering every branch.
pub const BRANCHES_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// What kind of ref the target is, with its short or full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TargetRef {
    /// `refs/heads/<name>`
    Branch(String),
    /// `refs/tags/<name>`
    Tag(String),
    /// Full `refs/pull/...` name.
    Pull(String),
    /// Any other full `refs/...` name.
    Other(String),
    /// A bare commit with no ref.
    Commit,
}

impl TargetRef {
    /// Classifies a ref name. Unqualified names are assumed to be branches.
    #[must_use]
    pub fn classify(reference: &str) -> Self {
        if reference.is_empty() {
            Self::Commit
        } else if let Some(branch) = reference.strip_prefix("refs/heads/") {
            Self::Branch(branch.to_string())
        } else if let Some(tag) = reference.strip_prefix("refs/tags/") {
            Self::Tag(tag.to_string())
        } else if reference.starts_with("refs/pull/") {
            Self::Pull(reference.to_string())
        } else if reference.starts_with("refs/") {
            Self::Other(reference.to_string())
        } else {
            Self::Branch(reference.to_string())
        }
    }

    /// Full ref name, or `None` for a bare commit.
    #[must_use]
    pub fn qualified(&self) -> Option<String> {
        match self {
            Self::Branch(name) => Some(format!("refs/heads/{name}")),
            Self::Tag(name) => Some(format!("refs/tags/{name}")),
            Self::Pull(name) | Self::Other(name) => Some(name.clone()),
            Self::Commit => None,
        }
    }
}

/// A requested ref/commit resolved to a concrete commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub target: TargetRef,
    pub commit: String,
    /// The commit was given explicitly rather than looked up.
    pub explicit_commit: bool,
    /// The commit already exists in the local object database.
    pub locally_available: bool,
}

impl ResolvedTarget {
    /// Ref the fetched commit is stored under locally.
    #[must_use]
    pub fn local_ref(&self) -> String {
        match &self.target {
            TargetRef::Branch(name) => format!("refs/remotes/origin/{name}"),
            TargetRef::Tag(name) => format!("refs/tags/{name}"),
            TargetRef::Pull(name) => name.replacen("refs/pull/", "refs/remotes/pull/", 1),
            TargetRef::Other(name) => name.clone(),
            TargetRef::Commit => self.commit.clone(),
        }
    }

    /// Branch to (re)create at the commit; everything else is checked out detached.
    #[must_use]
    pub fn checkout_branch(&self) -> Option<&str> {
        match &self.target {
            TargetRef::Branch(name) => Some(name),
            _ => None,
        }
    }

    /// Refspecs for a fetch limited to the target.
    #[must_use]
    pub fn specific_refspecs(&self) -> Vec<String> {
        let source = match (&self.target, self.explicit_commit) {
            (TargetRef::Commit, _) => return vec![self.commit.clone()],
            (_, true) => self.commit.clone(),
            (target, false) => target.qualified().unwrap_or_else(|| self.commit.clone()),
        };
        vec![format!("+{source}:{}", self.local_ref())]
    }

    /// Refspecs for a full-history fetch: all branches and tags, plus the
    /// target when the wildcards may not cover it.
    #[must_use]
    pub fn full_history_refspecs(&self) -> Vec<String> {
        let mut specs = vec![BRANCHES_REFSPEC.to_string(), TAGS_REFSPEC.to_string()];
        let covered = matches!(
            (&self.target, self.explicit_commit),
            (TargetRef::Branch(_) | TargetRef::Tag(_), false)
        );
        if !covered {
            specs.extend(self.specific_refspecs());
        }
        specs
    }
}

/// Picks the matching remote ref: exact full name first, then heads, then tags.
/// Annotated tags resolve to their peeled commit.
fn select_ref(refs: &[RemoteRef], reference: &str) -> Option<(String, String)> {
    let candidates: Vec<String> = if reference.starts_with("refs/") {
        vec![reference.to_string()]
    } else {
        vec![
            format!("refs/heads/{reference}"),
            format!("refs/tags/{reference}"),
        ]
    };

    candidates.into_iter().find_map(|name| {
        let peeled = format!("{name}^{{}}");
        refs.iter()
            .find(|r| r.name == peeled)
            .or_else(|| refs.iter().find(|r| r.name == name))
            .map(|r| (name, r.oid.clone()))
    })
}

/// Resolves the settings' ref/commit against the remote.
///
/// # Errors
///
/// Returns `GitError::RefNotResolvable` if the ref does not exist on the
/// remote, or a `GitError` if the remote cannot be queried.
pub async fn resolve(
    settings: &FetchSettings,
    observed: &Observed,
    git: &GitCommandManager,
) -> SourceResult<ResolvedTarget> {
    let url = settings.repository_url();
    let mut reference = settings.reference().to_string();
    let mut commit = settings.commit().to_string();
    if commit.is_empty() && is_object_id(&reference) {
        commit = std::mem::take(&mut reference);
    }

    let (target, commit, explicit_commit) = if commit.is_empty() {
        if reference.is_empty() {
            reference = git
                .default_branch(&url)
                .await?
                .ok_or_else(|| GitError::RefNotResolvable {
                    reference: "HEAD".to_string(),
                    url: url.clone(),
                })?;
            debug!(reference = %reference, "remote default branch");
        }

        let patterns: Vec<String> = if reference.starts_with("refs/") {
            vec![reference.clone()]
        } else {
            vec![
                format!("refs/heads/{reference}"),
                format!("refs/tags/{reference}"),
            ]
        };
        let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
        let refs = git.ls_remote(&url, &patterns).await?;

        let (name, oid) =
            select_ref(&refs, &reference).ok_or_else(|| GitError::RefNotResolvable {
                reference: reference.clone(),
                url: url.clone(),
            })?;
        (TargetRef::classify(&name), oid, false)
    } else {
        (TargetRef::classify(&reference), commit.to_lowercase(), true)
    };

    let locally_available = matches!(observed, Observed::Present(_))
        && query::has_object(settings.repository_path(), &commit);

    info!(
        target = ?target,
        commit = %commit,
        local = locally_available,
        "resolved target"
    );
    Ok(ResolvedTarget {
        target,
        commit,
        explicit_commit,
        locally_available,
    })
}
