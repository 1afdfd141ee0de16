// source-fetch: Idempotent Git Source Fetcher
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integration tests for the fetch orchestrator.
//!
//! Every test serves a bare repository over `file://` from a temporary
//! directory laid out as `<tmp>/server/octo/widgets`, so the repository URL
//! derived from the settings points at it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use source_fetch::config::types::SourceConfig;
use source_fetch::error::{GitError, SourceResult};
use source_fetch::git::backend::{GitInvocation, GitOutput, GitRunner, ShellBackend};
use source_fetch::source::reconcile::{DecisionReason, ReconcileAction};
use source_fetch::source::settings::FetchSettings;
use source_fetch::source::stamp::{self, StampPhase, StampState};
use source_fetch::source::{FetchOutcome, SourceContext, get_source_with};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const OWNER: &str = "octo";
const NAME: &str = "widgets";
const TOKEN: &str = "ghs_integration_token";

/// Runs git in `cwd` and returns trimmed stdout, panicking on failure.
fn run_git(args: &[&str], cwd: &Path) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@test.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@test.com")
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare "server" repository plus an authoring clone that pushes to it.
struct Upstream {
    root: TempDir,
    author: PathBuf,
}

impl Upstream {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let bare = root.path().join("server").join(OWNER).join(NAME);
        fs::create_dir_all(&bare).expect("failed to create server dir");
        run_git(&["init", "--bare", "-q"], &bare);
        run_git(&["symbolic-ref", "HEAD", "refs/heads/main"], &bare);
        run_git(&["config", "uploadpack.allowAnySHA1InWant", "true"], &bare);
        run_git(&["config", "uploadpack.allowFilter", "true"], &bare);

        let author = root.path().join("author");
        fs::create_dir_all(&author).expect("failed to create author dir");
        run_git(&["init", "-q"], &author);
        run_git(&["checkout", "-q", "-b", "main"], &author);
        run_git(
            &["remote", "add", "origin", &bare.display().to_string()],
            &author,
        );

        let upstream = Self { root, author };
        upstream.commit("README.md", "# widgets\n", "initial");
        upstream.commit("src/lib.rs", "pub fn widget() {}\n", "add src");
        upstream.commit("docs/guide.md", "guide\n", "add docs");
        upstream.push("main");
        upstream
    }

    fn server_url(&self) -> String {
        format!("file://{}", self.root.path().join("server").display())
    }

    fn workspace(&self) -> PathBuf {
        self.root.path().join("workspace")
    }

    fn commit(&self, file: &str, content: &str, message: &str) -> String {
        let path = self.author.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(&path, content).expect("failed to write file");
        run_git(&["add", file], &self.author);
        run_git(&["commit", "-q", "-m", message], &self.author);
        run_git(&["rev-parse", "HEAD"], &self.author)
    }

    fn push(&self, branch: &str) {
        run_git(&["push", "-q", "-f", "origin", branch], &self.author);
    }

    fn branch(&self, name: &str) {
        run_git(&["checkout", "-q", "-b", name], &self.author);
    }

    fn switch(&self, name: &str) {
        run_git(&["checkout", "-q", name], &self.author);
    }

    fn head(&self) -> String {
        run_git(&["rev-parse", "HEAD"], &self.author)
    }

    fn settings(&self, reference: &str) -> FetchSettings {
        self.settings_with(reference, |_| {})
    }

    fn settings_with(&self, reference: &str, edit: impl FnOnce(&mut SourceConfig)) -> FetchSettings {
        let mut config = SourceConfig {
            repository: format!("{OWNER}/{NAME}"),
            reference: reference.to_string(),
            path: self.workspace(),
            show_progress: false,
            server_url: self.server_url(),
            ..SourceConfig::default()
        };
        edit(&mut config);
        FetchSettings::from_config(&config).expect("valid settings")
    }
}

/// Records every git invocation before delegating to the real CLI.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().expect("poisoned"))
    }
}

impl GitRunner for RecordingRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a GitInvocation,
        token: &'a CancellationToken,
    ) -> BoxFuture<'a, SourceResult<GitOutput>> {
        self.calls
            .lock()
            .expect("poisoned")
            .push(invocation.display());
        ShellBackend.run(invocation, token)
    }
}

async fn fetch(settings: &FetchSettings) -> FetchOutcome {
    get_source_with(settings, &SourceContext::new())
        .await
        .expect("fetch should succeed")
}

fn head_of(path: &Path) -> String {
    run_git(&["rev-parse", "HEAD"], path)
}

fn local_config(path: &Path) -> String {
    fs::read_to_string(path.join(".git").join("config")).expect("config should exist")
}

// =============================================================================
// Idempotence and reuse
// =============================================================================

#[tokio::test]
async fn second_fetch_reuses_working_copy() {
    let upstream = Upstream::new();
    let settings = upstream.settings("main");
    let runner = Arc::new(RecordingRunner::default());
    let ctx = SourceContext::new().with_runner(runner.clone());

    let first = get_source_with(&settings, &ctx).await.expect("first fetch");
    let first_calls = runner.take();
    assert_eq!(first.action, ReconcileAction::FullReclone);
    assert_eq!(first.reason, DecisionReason::NotARepository);
    assert_eq!(first.commit, upstream.head());

    let second = get_source_with(&settings, &ctx).await.expect("second fetch");
    let second_calls = runner.take();
    assert_eq!(second.action, ReconcileAction::Reuse);
    assert_eq!(second.reason, DecisionReason::UpToDate);
    assert!(second.fetch.is_none());
    assert_eq!(second.commit, first.commit);
    assert_eq!(head_of(&upstream.workspace()), first.commit);

    assert!(
        second_calls.len() <= first_calls.len(),
        "second call ran {second_calls:?}"
    );
    assert!(
        second_calls.iter().all(|c| !c.contains(" fetch ")),
        "reuse must not fetch: {second_calls:?}"
    );
}

#[tokio::test]
async fn stamp_records_completed_checkout() {
    let upstream = Upstream::new();
    let settings = upstream.settings("main");
    let outcome = fetch(&settings).await;

    let state = stamp::read(&upstream.workspace().join(".git"));
    let StampState::Present(recorded) = state else {
        panic!("expected a stamp, got {state:?}");
    };
    assert_eq!(recorded.phase, StampPhase::Complete);
    assert_eq!(recorded.reference.as_deref(), Some("refs/heads/main"));
    assert_eq!(recorded.commit.as_deref(), Some(outcome.commit.as_str()));
    assert_eq!(recorded.history.depth, 1);
}

// =============================================================================
// Untracked files, upstream changes and lineage
// =============================================================================

#[tokio::test]
async fn untracked_files_follow_the_lineage() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    let main = upstream.settings_with("main", |c| c.clean = false);

    fetch(&main).await;
    let marker = workspace.join("test-file.txt");
    fs::write(&marker, "from a previous step").expect("write marker");

    let reused = fetch(&main).await;
    assert_eq!(reused.action, ReconcileAction::Reuse);
    assert!(marker.exists(), "reuse keeps untracked files");

    let moved = upstream.commit("src/lib.rs", "pub fn widget() -> u8 { 1 }\n", "change");
    upstream.push("main");
    let updated = fetch(&main).await;
    assert_eq!(updated.action, ReconcileAction::IncrementalUpdate);
    assert_eq!(updated.reason, DecisionReason::TargetMoved);
    assert_eq!(updated.commit, moved);
    assert_eq!(head_of(&workspace), moved);
    assert!(marker.exists(), "incremental update keeps untracked files");
    assert_eq!(
        fs::read_to_string(workspace.join("src/lib.rs")).expect("read"),
        "pub fn widget() -> u8 { 1 }\n"
    );

    upstream.branch("new-branch");
    let branch_head = upstream.commit("feature.txt", "feature\n", "feature");
    upstream.push("new-branch");
    upstream.switch("main");

    let switched = fetch(&upstream.settings_with("new-branch", |c| c.clean = false)).await;
    assert_eq!(switched.action, ReconcileAction::CleanReset);
    assert_eq!(switched.reason, DecisionReason::LineageChanged);
    assert_eq!(head_of(&workspace), branch_head);
    assert!(
        !marker.exists(),
        "a ref change removes untracked files even with clean disabled"
    );
    assert!(workspace.join("feature.txt").exists());
    assert_eq!(
        run_git(&["rev-parse", "--abbrev-ref", "HEAD"], &workspace),
        "new-branch"
    );
}

#[tokio::test]
async fn pinned_commit_is_checked_out_on_branch() {
    let upstream = Upstream::new();
    let pinned = upstream.head();
    upstream.commit("later.txt", "later\n", "later");
    upstream.push("main");

    let settings = upstream.settings_with("main", |c| c.commit.clone_from(&pinned));
    let outcome = fetch(&settings).await;

    assert_eq!(outcome.commit, pinned);
    assert_eq!(head_of(&upstream.workspace()), pinned);
    assert!(!upstream.workspace().join("later.txt").exists());
}

#[tokio::test]
async fn annotated_tag_resolves_to_commit() {
    let upstream = Upstream::new();
    let tagged = upstream.head();
    run_git(&["tag", "-a", "v1.0", "-m", "release"], &upstream.author);
    run_git(&["push", "-q", "origin", "v1.0"], &upstream.author);
    upstream.commit("after-tag.txt", "after\n", "after tag");
    upstream.push("main");

    let outcome = fetch(&upstream.settings("v1.0")).await;
    assert_eq!(outcome.commit, tagged);
    assert_eq!(head_of(&upstream.workspace()), tagged);
}

#[tokio::test]
async fn default_branch_used_without_ref() {
    let upstream = Upstream::new();
    let outcome = fetch(&upstream.settings("")).await;
    assert_eq!(outcome.commit, upstream.head());
    assert_eq!(
        run_git(&["rev-parse", "--abbrev-ref", "HEAD"], &upstream.workspace()),
        "main"
    );
}

// =============================================================================
// Failures and forced reclones
// =============================================================================

#[tokio::test]
async fn unknown_ref_fails() {
    let upstream = Upstream::new();
    let err = get_source_with(&upstream.settings("no-such-branch"), &SourceContext::new())
        .await
        .expect_err("unknown ref must fail");
    assert!(
        matches!(err.as_git(), Some(GitError::RefNotResolvable { .. })),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn missing_pinned_commit_fails_as_unresolvable() {
    let upstream = Upstream::new();
    let settings = upstream.settings_with("main", |c| {
        c.commit = "0123456789abcdef0123456789abcdef01234567".to_string();
    });
    let err = get_source_with(&settings, &SourceContext::new())
        .await
        .expect_err("a commit the remote lacks must fail");
    assert!(
        matches!(err.as_git(), Some(GitError::RefNotResolvable { .. })),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn dirty_copy_without_clean_is_left_alone() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    fetch(&upstream.settings("main")).await;

    let readme = workspace.join("README.md");
    fs::write(&readme, "local edit\n").expect("edit tracked file");

    let settings = upstream.settings_with("main", |c| c.clean = false);
    let err = get_source_with(&settings, &SourceContext::new())
        .await
        .expect_err("dirty copy with clean disabled must fail");
    assert!(matches!(
        err.as_git(),
        Some(GitError::DirtyWorkingCopy { .. })
    ));
    assert_eq!(fs::read_to_string(&readme).expect("read"), "local edit\n");

    let cleaned = fetch(&upstream.settings("main")).await;
    assert_eq!(cleaned.action, ReconcileAction::CleanReset);
    assert_eq!(cleaned.reason, DecisionReason::Dirty);
    assert_eq!(fs::read_to_string(&readme).expect("read"), "# widgets\n");
}

#[tokio::test]
async fn interrupted_checkout_forces_reclone() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    let settings = upstream.settings("main");
    fetch(&settings).await;
    fs::write(workspace.join("test-file.txt"), "stale").expect("write marker");

    let git_dir = workspace.join(".git");
    let StampState::Present(mut recorded) = stamp::read(&git_dir) else {
        panic!("expected a stamp");
    };
    recorded.phase = StampPhase::InProgress;
    stamp::write(&git_dir, &recorded).expect("rewrite stamp");

    let outcome = fetch(&settings).await;
    assert_eq!(outcome.action, ReconcileAction::FullReclone);
    assert_eq!(outcome.reason, DecisionReason::Unreliable);
    assert!(!workspace.join("test-file.txt").exists());
    assert!(stamp::read(&git_dir).stamp().is_some_and(|s| s.is_complete()));
}

#[tokio::test]
async fn corrupt_stamp_forces_reclone() {
    let upstream = Upstream::new();
    let settings = upstream.settings("main");
    fetch(&settings).await;

    fs::write(stamp::stamp_path(&upstream.workspace().join(".git")), "{ not json")
        .expect("corrupt stamp");

    let outcome = fetch(&settings).await;
    assert_eq!(outcome.action, ReconcileAction::FullReclone);
    assert_eq!(outcome.reason, DecisionReason::Unreliable);
}

#[tokio::test]
async fn remote_mismatch_forces_reclone() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    let settings = upstream.settings("main");
    fetch(&settings).await;

    run_git(
        &["remote", "set-url", "origin", "file:///elsewhere/widgets"],
        &workspace,
    );
    let outcome = fetch(&settings).await;
    assert_eq!(outcome.action, ReconcileAction::FullReclone);
    assert_eq!(outcome.reason, DecisionReason::RemoteMismatch);
    assert_eq!(
        run_git(&["remote", "get-url", "origin"], &workspace),
        settings.repository_url()
    );
}

#[tokio::test]
async fn directory_that_is_not_a_repository_is_replaced() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    fs::create_dir_all(&workspace).expect("create workspace");
    fs::write(workspace.join("leftover.txt"), "junk").expect("write leftover");

    let outcome = fetch(&upstream.settings("main")).await;
    assert_eq!(outcome.action, ReconcileAction::FullReclone);
    assert!(!workspace.join("leftover.txt").exists());
    assert!(workspace.join("README.md").exists());
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn credentials_not_persisted_when_disabled() {
    let upstream = Upstream::new();
    let settings = upstream.settings_with("main", |c| {
        c.token = TOKEN.to_string();
        c.persist_credentials = false;
    });
    fetch(&settings).await;

    let config = local_config(&upstream.workspace());
    assert!(!config.contains("AUTHORIZATION"), "config:\n{config}");
    assert!(!config.contains(&settings.basic_credential()));
}

#[tokio::test]
async fn credentials_persisted_when_requested() {
    let upstream = Upstream::new();
    let settings = upstream.settings_with("main", |c| {
        c.token = TOKEN.to_string();
        c.persist_credentials = true;
    });
    fetch(&settings).await;

    let config = local_config(&upstream.workspace());
    assert!(config.contains(&format!(
        "AUTHORIZATION: basic {}",
        settings.basic_credential()
    )));
    assert!(!config.contains("***"), "placeholder must be replaced");

    // a later run without persistence strips the header again
    let release = upstream.settings_with("main", |c| {
        c.token = TOKEN.to_string();
        c.persist_credentials = false;
    });
    fetch(&release).await;
    assert!(!local_config(&upstream.workspace()).contains("AUTHORIZATION"));
}

// =============================================================================
// Scope and history
// =============================================================================

#[tokio::test]
async fn sparse_checkout_limits_tree() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    let sparse = upstream.settings_with("main", |c| {
        c.sparse_checkout = vec!["src".to_string()];
    });

    let outcome = fetch(&sparse).await;
    assert_eq!(outcome.action, ReconcileAction::FullReclone);
    assert!(workspace.join("src/lib.rs").exists());
    assert!(workspace.join("README.md").exists(), "cone mode keeps root files");
    assert!(!workspace.join("docs").exists());

    let again = fetch(&sparse).await;
    assert_eq!(again.action, ReconcileAction::Reuse);
    assert!(again.fetch.is_none());

    let full = fetch(&upstream.settings("main")).await;
    assert_eq!(full.action, ReconcileAction::CleanReset);
    assert_eq!(full.reason, DecisionReason::ScopeChanged);
    assert!(workspace.join("docs/guide.md").exists());
}

#[tokio::test]
async fn sparse_scope_edited_on_disk_is_restored() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    let sparse = upstream.settings_with("main", |c| {
        c.sparse_checkout = vec!["src".to_string()];
    });
    fetch(&sparse).await;

    run_git(&["sparse-checkout", "set", "docs"], &workspace);
    assert!(!workspace.join("src").exists());

    let restored = fetch(&sparse).await;
    assert_eq!(restored.action, ReconcileAction::CleanReset);
    assert_eq!(restored.reason, DecisionReason::ScopeChanged);
    assert!(workspace.join("src/lib.rs").exists());
    assert!(!workspace.join("docs").exists());

    let again = fetch(&sparse).await;
    assert_eq!(again.action, ReconcileAction::Reuse);
}

#[tokio::test]
async fn unwanted_submodule_state_is_reset() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    let settings = upstream.settings("main");
    fetch(&settings).await;

    let module = workspace.join(".git").join("modules").join("vendored");
    fs::create_dir_all(&module).expect("create module dir");
    fs::write(module.join("HEAD"), "ref: refs/heads/main\n").expect("write module HEAD");

    let outcome = fetch(&settings).await;
    assert_eq!(outcome.action, ReconcileAction::CleanReset);
    assert_eq!(outcome.reason, DecisionReason::ScopeChanged);
    assert!(!workspace.join(".git").join("modules").exists());

    let again = fetch(&settings).await;
    assert_eq!(again.action, ReconcileAction::Reuse);
}

#[tokio::test]
async fn full_history_after_shallow_widens() {
    let upstream = Upstream::new();
    let workspace = upstream.workspace();
    fetch(&upstream.settings("main")).await;
    assert!(workspace.join(".git/shallow").exists());

    let deep = upstream.settings_with("main", |c| c.fetch_depth = 0);
    let outcome = fetch(&deep).await;
    assert_eq!(outcome.action, ReconcileAction::IncrementalUpdate);
    assert_eq!(outcome.reason, DecisionReason::HistoryChanged);
    assert!(!workspace.join(".git/shallow").exists());
    assert_eq!(run_git(&["rev-list", "--count", "HEAD"], &workspace), "3");

    let again = fetch(&deep).await;
    assert_eq!(again.action, ReconcileAction::Reuse);
}

#[tokio::test]
async fn dry_run_leaves_directory_untouched() {
    let upstream = Upstream::new();
    let ctx = SourceContext::new().with_dry_run(true);
    let outcome = get_source_with(&upstream.settings("main"), &ctx)
        .await
        .expect("dry run succeeds");

    assert!(outcome.dry_run);
    assert_eq!(outcome.action, ReconcileAction::FullReclone);
    assert_eq!(outcome.commit, upstream.head());
    assert!(!upstream.workspace().exists());
}
