//! Shared fixtures for the integration tests.
//!
//! These tests use real git repositories created via tempfile to verify
//! behavior against actual git operations.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a git command in the given directory, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> Vec<String> {
    match try_git(dir, args) {
        Some(lines) => lines,
        None => panic!("git {:?} failed in {}", args, dir.display()),
    }
}

/// Run a git command that may fail; `None` on a non-zero exit.
pub fn try_git(dir: &Path, args: &[&str]) -> Option<Vec<String>> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn git");
    if !output.status.success() {
        return None;
    }
    Some(
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect(),
    )
}

/// Configure identity and signing so commits work in a bare environment.
pub fn configure(dir: &Path) {
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Test fixture wrapping a real git repository.
pub struct TestRepo {
    dir: TempDir,
    /// The default branch name of this environment's git.
    pub branch: String,
}

impl TestRepo {
    /// Create a new repository without any commits.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        git(dir.path(), &["init"]);
        configure(dir.path());
        let branch = git(dir.path(), &["branch", "--show-current"])
            .first()
            .cloned()
            .expect("no current branch in fresh repository");
        Self { dir, branch }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file and commit it, returning the new commit hash.
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> String {
        std::fs::write(self.path().join(name), content).expect("failed to write file");
        git(self.path(), &["add", name]);
        git(self.path(), &["commit", "-m", message]);
        self.head()
    }

    /// The current HEAD commit hash.
    pub fn head(&self) -> String {
        git(self.path(), &["rev-parse", "HEAD"])
            .first()
            .cloned()
            .expect("rev-parse HEAD produced no output")
    }

    /// The commit hash a reference points to.
    pub fn rev_parse(&self, reference: &str) -> String {
        git(self.path(), &["rev-parse", reference])
            .first()
            .cloned()
            .expect("rev-parse produced no output")
    }

    /// Create a branch at the given commit (or HEAD).
    pub fn create_branch(&self, name: &str, commit: Option<&str>) {
        match commit {
            Some(commit) => git(self.path(), &["branch", name, commit]),
            None => git(self.path(), &["branch", name]),
        };
    }

    /// Create a lightweight tag.
    pub fn create_tag(&self, name: &str, commit: &str) {
        git(self.path(), &["tag", "--no-sign", name, commit]);
    }
}

/// All `hash name` reference lines of a repository (empty when there are
/// no references yet).
pub fn show_refs(repo: &Path) -> BTreeSet<String> {
    try_git(repo, &["show-ref"])
        .unwrap_or_default()
        .into_iter()
        .collect()
}

/// The reference names recorded in a bundle file, via ls-remote.
pub fn bundle_ref_names(bundle: &Path) -> BTreeSet<String> {
    let dir = bundle.parent().expect("bundle has no parent directory");
    git(
        dir,
        &["ls-remote", "--heads", "--tags", bundle.to_str().expect("non-utf8 path")],
    )
    .into_iter()
    .filter(|line| !line.ends_with("^{}"))
    .filter_map(|line| line.split_whitespace().nth(1).map(str::to_string))
    .collect()
}

/// Whether a bundle verifies against a repository.
pub fn bundle_verifies(repo: &Path, bundle: &Path) -> bool {
    try_git(
        repo,
        &["bundle", "verify", bundle.to_str().expect("non-utf8 path")],
    )
    .is_some()
}

/// Assert that two repositories hold the same references and the same
/// reachable commits for each of them.
pub fn assert_repos_equal(repo1: &Path, repo2: &Path) {
    let refs1 = show_refs(repo1);
    let refs2 = show_refs(repo2);
    assert_eq!(refs1, refs2, "reference sets differ");

    for line in &refs1 {
        let name = line
            .split_whitespace()
            .nth(1)
            .expect("malformed show-ref line");
        assert_eq!(
            git(repo1, &["rev-list", name]),
            git(repo2, &["rev-list", name]),
            "history of {name} differs"
        );
    }
}

/// A scratch directory for bundles, metadata files and target repos.
pub fn scratch_dir() -> TempDir {
    TempDir::new().expect("failed to create temp dir")
}
