//! End-to-end batch runs against real throwaway git repositories.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn git(dir: &Path, args: &[&str]) -> String {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("running git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// Fresh repo on `main` with one commit.
fn init_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    git(root, &["init", "-b", "main"]);
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "user.name", "Test"]);
    std::fs::write(root.join("README.md"), "hello\n").unwrap();
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "init"]);
    dir
}

fn write_config(root: &Path, command: &str) {
    let config = format!(
        "[executor]\ncommand = '''{command}'''\ntimeout = 30\n"
    );
    std::fs::write(root.join(".convoy.toml"), config).unwrap();
}

fn convoy(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("convoy").unwrap();
    cmd.current_dir(root);
    cmd
}

fn checkpoint_ids(root: &Path) -> Vec<String> {
    let dir = root.join(".convoy/checkpoints");
    if !dir.exists() {
        return Vec::new();
    }
    let mut ids: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter_map(|n| n.strip_suffix(".json").map(str::to_string))
        .collect();
    ids.sort();
    ids
}

fn worktree_paths(root: &Path) -> Vec<PathBuf> {
    let dir = root.join(".convoy/worktrees");
    if !dir.exists() {
        return Vec::new();
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[test]
fn completed_batch_merges_and_cleans_up() {
    // happy path: filtering, sequential execution, merge, cleanup
    let dir = init_repo();
    let root = dir.path();
    write_config(root, r#"echo "$CONVOY_ITEM" >> done.log"#);
    std::fs::write(
        root.join("features.txt"),
        "# comment\n\nAdd X\nAdd Y\nAdd X\n",
    )
    .unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total 2  succeeded 2  failed 0"))
        .stdout(predicate::str::contains("merged as "));

    // the accumulated work landed on main
    let log = std::fs::read_to_string(root.join("done.log")).unwrap();
    assert_eq!(log, "Add X\nAdd Y\n");

    // checkpoint deleted, worktree removed
    assert!(checkpoint_ids(root).is_empty());
    assert!(worktree_paths(root).is_empty());

    // the merge is a real commit on main
    let subject = git(root, &["log", "-1", "--format=%s"]);
    assert!(subject.contains("merge convoy batch"), "got: {subject}");
}

#[test]
fn failed_item_never_halts_the_batch() {
    let dir = init_repo();
    let root = dir.path();
    write_config(
        root,
        r#"case "$CONVOY_ITEM" in *boom*) echo nope >&2; exit 3;; *) echo "$CONVOY_ITEM" >> done.log;; esac"#,
    );
    std::fs::write(root.join("features.txt"), "Add X\nboom item\nAdd Y\n").unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total 3  succeeded 2  failed 1"))
        .stdout(predicate::str::contains("boom item  FAILED (permanent"));

    let log = std::fs::read_to_string(root.join("done.log")).unwrap();
    assert_eq!(log, "Add X\nAdd Y\n");
}

#[test]
fn transient_item_is_attempted_exactly_three_times() {
    // 75 is the default transient exit code
    let dir = init_repo();
    let root = dir.path();
    write_config(root, "echo attempt >> attempts.log; exit 75");
    std::fs::write(root.join("features.txt"), "Add Y\n").unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed 1"))
        .stdout(predicate::str::contains("FAILED (transient, 3 attempt(s))"));

    // attempts.log was committed by the finalizer; count the attempts
    let attempts = std::fs::read_to_string(root.join("attempts.log")).unwrap();
    assert_eq!(attempts.lines().count(), 3);
}

#[test]
fn security_failure_is_flagged_in_the_summary() {
    let dir = init_repo();
    let root = dir.path();
    write_config(root, "exit 77");
    std::fs::write(root.join("features.txt"), "Add X\n").unwrap();

    convoy(root)
        .args(["start", "features.txt", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"security_flagged\": 1"))
        .stdout(predicate::str::contains("security-critical"));
}

#[test]
fn conflicted_merge_preserves_worktree_and_checkpoint() {
    // the worktree and main both rewrite a.py
    let dir = init_repo();
    let root = dir.path();
    std::fs::write(root.join("a.py"), "original\n").unwrap();
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "add a.py"]);

    // The executor is opaque: this one edits the worktree AND lands a
    // conflicting commit on main, so the final merge cannot fast-forward.
    write_config(
        root,
        r#"echo from-branch > a.py
cd "$CONVOY_WORKTREE/../../.."
echo from-main > a.py
git commit -am main-side"#,
    );
    std::fs::write(root.join("features.txt"), "Rewrite a.py\n").unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .failure()
        .code(4)
        .stdout(predicate::str::contains("merge CONFLICTED in: a.py"))
        .stderr(predicate::str::contains("convoy resume"));

    // deliberate halt state: everything needed for manual resolution remains
    let ids = checkpoint_ids(root);
    assert_eq!(ids.len(), 1);
    assert_eq!(worktree_paths(root).len(), 1);

    // the primary tree was restored, not force-merged
    assert_eq!(
        std::fs::read_to_string(root.join("a.py")).unwrap(),
        "from-main\n"
    );

    // the preserved checkpoint reports the conflict
    convoy(root)
        .args(["status", &ids[0]])
        .assert()
        .success()
        .stdout(predicate::str::contains("CompletedWithConflicts"));
}

#[test]
fn resume_after_manual_resolution_finalizes() {
    let dir = init_repo();
    let root = dir.path();
    std::fs::write(root.join("a.py"), "original\n").unwrap();
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "add a.py"]);
    write_config(
        root,
        r#"echo from-branch > a.py
cd "$CONVOY_WORKTREE/../../.."
echo from-main > a.py
git commit -am main-side"#,
    );
    std::fs::write(root.join("features.txt"), "Rewrite a.py\n").unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .failure()
        .code(4);

    let ids = checkpoint_ids(root);
    let worktrees = worktree_paths(root);
    assert_eq!(worktrees.len(), 1);
    let wt = &worktrees[0];

    // resolve by hand in the preserved worktree: take the branch version
    let merge = std::process::Command::new("git")
        .args(["merge", "main"])
        .current_dir(wt)
        .output()
        .unwrap();
    assert!(!merge.status.success(), "expected the conflict to reappear");
    std::fs::write(wt.join("a.py"), "resolved\n").unwrap();
    git(wt, &["add", "-A"]);
    git(wt, &["commit", "-m", "resolve conflict"]);

    // finalize-only resume: no items re-run, merge now succeeds
    convoy(root)
        .args(["resume", &ids[0]])
        .assert()
        .success()
        .stdout(predicate::str::contains("merged as "));

    assert_eq!(
        std::fs::read_to_string(root.join("a.py")).unwrap(),
        "resolved\n"
    );
    assert!(checkpoint_ids(root).is_empty());
    assert!(worktree_paths(root).is_empty());
}

#[test]
fn status_lists_preserved_batches() {
    let dir = init_repo();
    let root = dir.path();
    std::fs::write(root.join("a.py"), "original\n").unwrap();
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "add a.py"]);
    write_config(
        root,
        r#"echo from-branch > a.py
cd "$CONVOY_WORKTREE/../../.."
echo from-main > a.py
git commit -am main-side"#,
    );
    std::fs::write(root.join("features.txt"), "Rewrite a.py\n").unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .failure()
        .code(4);

    let ids = checkpoint_ids(root);
    convoy(root)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(&ids[0]))
        .stdout(predicate::str::contains("1/1"));
}

#[test]
fn missing_executor_command_fails_before_any_worktree_exists() {
    let dir = init_repo();
    let root = dir.path();
    // config present but [executor] command absent
    std::fs::write(root.join(".convoy.toml"), "[project]\ntarget_branch = 'main'\n").unwrap();
    std::fs::write(root.join("features.txt"), "Add X\n").unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("executor.command is not set"));

    assert!(worktree_paths(root).is_empty());
    assert!(checkpoint_ids(root).is_empty());
}

#[test]
fn invalid_features_file_fails_before_any_worktree_exists() {
    let dir = init_repo();
    let root = dir.path();
    write_config(root, "true");
    std::fs::write(root.join("features.txt"), "# only comments\n\n").unwrap();

    convoy(root)
        .args(["start", "features.txt"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("no work items found"));

    assert!(worktree_paths(root).is_empty());
    assert!(checkpoint_ids(root).is_empty());
}
