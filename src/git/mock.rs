//! git::mock
//!
//! Mock gateway implementation for deterministic testing.
//!
//! # Design
//!
//! `MockGit` models repositories and bundles as plain values: a commit
//! graph keyed by object id, a reference map, and the checkout state.
//! The fetch implementation reproduces the observable behavior the
//! reconciler depends on - prerequisite checking, fast-forward rules,
//! the current-branch refusal, pruning and the `refs/prefetch/` staging
//! namespace - without spawning a single process.
//!
//! Bundle creation additionally drops a small stub file at the bundle
//! path (best effort) so that callers checking for the file's existence
//! or copying it behave as they would with real bundles.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use bundlework::core::types::{Oid, RefName};
//! use bundlework::git::{Gateway, MockGit, MockRepo, RefSelector};
//!
//! let git = MockGit::new();
//! let mut repo = MockRepo::new();
//! let c1 = Oid::new("aaaa01").unwrap();
//! repo.add_commit(&c1, &[]);
//! repo.set_ref(RefName::new("refs/heads/main").unwrap(), c1);
//! git.add_repo("/repo", repo);
//!
//! let refs = git.list_refs(Path::new("/repo"), RefSelector::heads()).unwrap();
//! assert_eq!(refs.len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::types::{GitRef, Oid, RefName};

use super::traits::{
    CheckedOutBranch, CloneMode, FetchOptions, Gateway, GatewayError, RefSelector,
};

/// An in-memory repository.
#[derive(Debug, Clone)]
pub struct MockRepo {
    /// References by name.
    pub refs: BTreeMap<RefName, Oid>,
    /// Commit graph: object id to parent ids.
    pub commits: HashMap<Oid, Vec<Oid>>,
    /// The checked out branch name; `None` means detached HEAD.
    pub checked_out: Option<String>,
    /// Whether the working tree is clean (untracked files included).
    pub worktree_clean: bool,
    /// Whether the repository is bare.
    pub bare: bool,
}

impl MockRepo {
    /// An empty, clean, non-bare repository with a detached HEAD.
    pub fn new() -> Self {
        Self {
            refs: BTreeMap::new(),
            commits: HashMap::new(),
            checked_out: None,
            worktree_clean: true,
            bare: false,
        }
    }

    /// Add a commit with the given parents.
    pub fn add_commit(&mut self, oid: &Oid, parents: &[Oid]) {
        self.commits.insert(oid.clone(), parents.to_vec());
    }

    /// Point a reference at a commit.
    pub fn set_ref(&mut self, name: RefName, oid: Oid) {
        self.refs.insert(name, oid);
    }
}

impl Default for MockRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory bundle.
#[derive(Debug, Clone, Default)]
pub struct MockBundle {
    /// References recorded in the bundle.
    pub refs: BTreeMap<RefName, Oid>,
    /// The commit graph fragment the bundle carries.
    pub commits: HashMap<Oid, Vec<Oid>>,
    /// Commits that must already be present for the bundle to apply.
    pub prerequisites: HashSet<Oid>,
}

/// A recorded `create_bundle` invocation.
#[derive(Debug, Clone)]
pub struct CreatedBundle {
    /// Where the bundle was written.
    pub bundle: PathBuf,
    /// The references named for inclusion, in call order.
    pub include: Vec<RefName>,
    /// The exclusions passed, in call order.
    pub exclude: Vec<Oid>,
}

/// A recorded `fetch` invocation.
#[derive(Debug, Clone)]
pub struct FetchRecord {
    /// The target repository.
    pub repo: PathBuf,
    /// The bundle fetched from.
    pub bundle: PathBuf,
    /// The options passed.
    pub options: FetchOptions,
}

#[derive(Debug, Default)]
struct Inner {
    repos: HashMap<PathBuf, MockRepo>,
    bundles: HashMap<PathBuf, MockBundle>,
    created_bundles: Vec<CreatedBundle>,
    fetches: Vec<FetchRecord>,
    remote_updates: Vec<PathBuf>,
    fail_bundle_create: Option<String>,
}

/// Mock gateway for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping, so a clone can be
/// kept by the test while the original is borrowed as `&dyn Gateway`.
#[derive(Debug, Clone, Default)]
pub struct MockGit {
    inner: Arc<Mutex<Inner>>,
}

impl MockGit {
    /// Create an empty mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository at a path.
    pub fn add_repo(&self, path: impl Into<PathBuf>, repo: MockRepo) {
        self.inner.lock().unwrap().repos.insert(path.into(), repo);
    }

    /// Register a bundle at a path.
    pub fn add_bundle(&self, path: impl Into<PathBuf>, bundle: MockBundle) {
        self.inner
            .lock()
            .unwrap()
            .bundles
            .insert(path.into(), bundle);
    }

    /// Snapshot of a registered repository. Panics if unknown.
    pub fn repo(&self, path: impl AsRef<Path>) -> MockRepo {
        self.inner
            .lock()
            .unwrap()
            .repos
            .get(path.as_ref())
            .cloned()
            .expect("mock repository not registered")
    }

    /// Snapshot of a registered bundle, if any.
    pub fn bundle(&self, path: impl AsRef<Path>) -> Option<MockBundle> {
        self.inner.lock().unwrap().bundles.get(path.as_ref()).cloned()
    }

    /// All `create_bundle` invocations so far.
    pub fn created_bundles(&self) -> Vec<CreatedBundle> {
        self.inner.lock().unwrap().created_bundles.clone()
    }

    /// All `fetch` invocations so far.
    pub fn fetches(&self) -> Vec<FetchRecord> {
        self.inner.lock().unwrap().fetches.clone()
    }

    /// All repositories that had `update_remotes` called on them.
    pub fn remote_updates(&self) -> Vec<PathBuf> {
        self.inner.lock().unwrap().remote_updates.clone()
    }

    /// Make the next `create_bundle` call fail with the given stderr.
    pub fn fail_next_bundle_create(&self, stderr: impl Into<String>) {
        self.inner.lock().unwrap().fail_bundle_create = Some(stderr.into());
    }
}

/// All commits reachable from `starts` within `graph`, including the
/// start commits themselves. Parents outside the graph are boundary
/// markers and are not followed.
fn ancestry(graph: &HashMap<Oid, Vec<Oid>>, starts: &[Oid]) -> HashSet<Oid> {
    let mut seen = HashSet::new();
    let mut stack: Vec<Oid> = starts.to_vec();
    while let Some(oid) = stack.pop() {
        if !graph.contains_key(&oid) || !seen.insert(oid.clone()) {
            continue;
        }
        stack.extend(graph[&oid].iter().cloned());
    }
    seen
}

/// Whether `ancestor` is reachable from `descendant` (a commit reaches
/// itself).
fn is_ancestor(graph: &HashMap<Oid, Vec<Oid>>, ancestor: &Oid, descendant: &Oid) -> bool {
    ancestry(graph, std::slice::from_ref(descendant)).contains(ancestor)
}

fn call_failed(context: &str, stderr: impl Into<String>) -> GatewayError {
    GatewayError::CallFailed {
        context: context.to_string(),
        stderr: stderr.into(),
    }
}

fn not_a_repository(path: &Path) -> GatewayError {
    GatewayError::Git(format!("not a repository: {}", path.display()))
}

/// A single resolved reference update from a fetch refspec.
struct RefUpdate {
    name: RefName,
    new: Oid,
}

impl Gateway for MockGit {
    fn list_refs(&self, repo: &Path, selector: RefSelector) -> Result<Vec<GitRef>, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        Ok(repo
            .refs
            .iter()
            .filter(|(name, _)| (selector.heads && name.is_branch()) || (selector.tags && name.is_tag()))
            .map(|(name, oid)| GitRef::new(oid.clone(), name.clone()))
            .collect())
    }

    fn list_bundle_refs(
        &self,
        bundle: &Path,
        selector: RefSelector,
    ) -> Result<Vec<GitRef>, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let bundle = inner
            .bundles
            .get(bundle)
            .ok_or_else(|| call_failed("git ls-remote", "fatal: could not read bundle"))?;
        Ok(bundle
            .refs
            .iter()
            .filter(|(name, _)| (selector.heads && name.is_branch()) || (selector.tags && name.is_tag()))
            .map(|(name, oid)| GitRef::new(oid.clone(), name.clone()))
            .collect())
    }

    fn rev_list(
        &self,
        repo: &Path,
        include: &[Oid],
        exclude: &[Oid],
    ) -> Result<HashSet<Oid>, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        let included = ancestry(&repo.commits, include);
        let excluded = ancestry(&repo.commits, exclude);
        Ok(included.difference(&excluded).cloned().collect())
    }

    fn first_parent(&self, repo: &Path, commit: &Oid) -> Result<Option<Oid>, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        let parents = repo
            .commits
            .get(commit)
            .ok_or_else(|| GatewayError::Git(format!("commit not found: {commit}")))?;
        Ok(parents.first().cloned())
    }

    fn commit_exists(&self, repo: &Path, commit: &Oid) -> Result<bool, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        Ok(repo.commits.contains_key(commit))
    }

    fn create_bundle(
        &self,
        repo: &Path,
        bundle: &Path,
        include: &[RefName],
        exclude: &[Oid],
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stderr) = inner.fail_bundle_create.take() {
            return Err(call_failed("git bundle create", stderr));
        }
        let source = inner
            .repos
            .get(repo)
            .ok_or_else(|| not_a_repository(repo))?
            .clone();
        if include.is_empty() {
            return Err(call_failed(
                "git bundle create",
                "fatal: refusing to create empty bundle",
            ));
        }

        let mut refs = BTreeMap::new();
        let mut tips = Vec::new();
        for name in include {
            let oid = source.refs.get(name).ok_or_else(|| {
                call_failed("git bundle create", format!("fatal: not a valid ref: {name}"))
            })?;
            refs.insert(name.clone(), oid.clone());
            tips.push(oid.clone());
        }

        let included = ancestry(&source.commits, &tips);
        let excluded = ancestry(&source.commits, exclude);
        let commits: HashMap<Oid, Vec<Oid>> = included
            .difference(&excluded)
            .map(|oid| (oid.clone(), source.commits[oid].clone()))
            .collect();
        let prerequisites: HashSet<Oid> = commits
            .values()
            .flatten()
            .filter(|parent| !commits.contains_key(*parent))
            .cloned()
            .collect();

        inner.bundles.insert(
            bundle.to_path_buf(),
            MockBundle {
                refs,
                commits,
                prerequisites,
            },
        );
        inner.created_bundles.push(CreatedBundle {
            bundle: bundle.to_path_buf(),
            include: include.to_vec(),
            exclude: exclude.to_vec(),
        });

        // Leave a stub on disk so existence checks and copies behave
        let _ = std::fs::write(bundle, b"mock bundle\n");
        Ok(())
    }

    fn verify_bundle(&self, repo: &Path, bundle: &Path) -> Result<bool, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        let Some(bundle) = inner.bundles.get(bundle) else {
            return Ok(false);
        };
        Ok(bundle
            .prerequisites
            .iter()
            .all(|prereq| repo.commits.contains_key(prereq)))
    }

    fn fetch(
        &self,
        repo_path: &Path,
        bundle_path: &Path,
        options: &FetchOptions,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches.push(FetchRecord {
            repo: repo_path.to_path_buf(),
            bundle: bundle_path.to_path_buf(),
            options: options.clone(),
        });

        let bundle = inner
            .bundles
            .get(bundle_path)
            .cloned()
            .ok_or_else(|| call_failed("git fetch", "fatal: could not read bundle"))?;
        let mut repo = inner
            .repos
            .get(repo_path)
            .cloned()
            .ok_or_else(|| not_a_repository(repo_path))?;

        for prereq in &bundle.prerequisites {
            if !repo.commits.contains_key(prereq) {
                return Err(call_failed(
                    "git fetch",
                    format!("error: missing necessary objects: {prereq}"),
                ));
            }
        }

        // Resolve refspecs into concrete updates
        let mut updates: Vec<RefUpdate> = Vec::new();
        for spec in &options.refspecs {
            if spec == "refs/heads/*:refs/heads/*" {
                for (name, oid) in bundle.refs.iter().filter(|(name, _)| name.is_branch()) {
                    updates.push(RefUpdate {
                        name: name.clone(),
                        new: oid.clone(),
                    });
                }
                continue;
            }
            let Some((src, dst)) = spec.split_once(':') else {
                return Err(call_failed("git fetch", format!("bad refspec: {spec}")));
            };
            let src = RefName::new(src)?;
            let Some(oid) = bundle.refs.get(&src) else {
                return Err(call_failed(
                    "git fetch",
                    format!("fatal: couldn't find remote ref {src}"),
                ));
            };
            let dst = if options.prefetch {
                // --prefetch stages under refs/prefetch/
                dst.replacen("refs/", "refs/prefetch/", 1)
            } else {
                dst.to_string()
            };
            updates.push(RefUpdate {
                name: RefName::new(dst)?,
                new: oid.clone(),
            });
        }

        // The merged graph decides fast-forwardness
        let mut merged = repo.commits.clone();
        for (oid, parents) in &bundle.commits {
            merged.insert(oid.clone(), parents.clone());
        }

        if !options.prefetch {
            for update in &updates {
                let existing = repo.refs.get(&update.name);
                if let Some(existing) = existing {
                    if *existing != update.new
                        && !options.force
                        && !is_ancestor(&merged, existing, &update.new)
                    {
                        return Err(call_failed(
                            "git fetch",
                            format!("! [rejected] {} (non-fast-forward)", update.name),
                        ));
                    }
                }
                if !repo.bare && !options.update_head_ok {
                    if let Some(checked_out) = &repo.checked_out {
                        if update.name.branch_name() == Some(checked_out.as_str()) {
                            return Err(call_failed(
                                "git fetch",
                                format!(
                                    "fatal: refusing to fetch into branch refs/heads/{checked_out} \
                                     checked out"
                                ),
                            ));
                        }
                    }
                }
            }
        }

        // Pruning removes branches absent from the bundle
        let mut pruned: Vec<RefName> = Vec::new();
        if options.prune && !options.prefetch {
            for name in repo.refs.keys().filter(|name| name.is_branch()) {
                if !bundle.refs.contains_key(name) {
                    pruned.push(name.clone());
                }
            }
        }

        if options.dry_run {
            return Ok(());
        }

        // git cannot delete the currently active branch; the refusal
        // only fires when the deletion is actually performed, so a
        // dry-run passes and the caller is expected to detach first
        if let (Some(checked_out), false) = (&repo.checked_out, repo.bare) {
            if let Some(name) = pruned
                .iter()
                .find(|name| name.branch_name() == Some(checked_out.as_str()))
            {
                return Err(call_failed(
                    "git fetch",
                    format!("fatal: refusing to delete the current branch: {name}"),
                ));
            }
        }

        repo.commits = merged;
        for update in updates {
            repo.refs.insert(update.name, update.new);
        }
        for name in pruned {
            repo.refs.remove(&name);
        }
        inner.repos.insert(repo_path.to_path_buf(), repo);
        Ok(())
    }

    fn current_branch(&self, repo: &Path) -> Result<Option<CheckedOutBranch>, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        match &repo.checked_out {
            None => Ok(None),
            Some(name) => {
                let ref_name = RefName::for_branch(name)?;
                let target = repo
                    .refs
                    .get(&ref_name)
                    .map(|oid| GitRef::new(oid.clone(), ref_name.clone()));
                Ok(Some(CheckedOutBranch {
                    name: name.clone(),
                    target,
                }))
            }
        }
    }

    fn is_worktree_clean(&self, repo: &Path) -> Result<bool, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        Ok(repo.bare || repo.worktree_clean)
    }

    fn is_bare(&self, repo: &Path) -> Result<bool, GatewayError> {
        let inner = self.inner.lock().unwrap();
        let repo = inner.repos.get(repo).ok_or_else(|| not_a_repository(repo))?;
        Ok(repo.bare)
    }

    fn detach_head(&self, repo_path: &Path) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        let repo = inner
            .repos
            .get_mut(repo_path)
            .ok_or_else(|| not_a_repository(repo_path))?;
        repo.checked_out = None;
        Ok(())
    }

    fn hard_reset(&self, repo_path: &Path, commit: &Oid) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        let repo = inner
            .repos
            .get_mut(repo_path)
            .ok_or_else(|| not_a_repository(repo_path))?;
        if !repo.commits.contains_key(commit) {
            return Err(GatewayError::Git(format!("commit not found: {commit}")));
        }
        if let Some(checked_out) = repo.checked_out.clone() {
            let name = RefName::for_branch(&checked_out)?;
            repo.refs.insert(name, commit.clone());
        }
        repo.worktree_clean = true;
        Ok(())
    }

    fn delete_ref(&self, repo_path: &Path, name: &RefName) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        let repo = inner
            .repos
            .get_mut(repo_path)
            .ok_or_else(|| not_a_repository(repo_path))?;
        repo.refs
            .remove(name)
            .ok_or_else(|| GatewayError::Git(format!("ref not found: {name}")))?;
        Ok(())
    }

    fn init_repo(&self, repo: &Path, bare: bool) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.repos.insert(
            repo.to_path_buf(),
            MockRepo {
                checked_out: Some("main".to_string()),
                bare,
                ..MockRepo::new()
            },
        );
        Ok(())
    }

    fn clone_repo(
        &self,
        repo: &Path,
        remote: &str,
        mode: CloneMode,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        let mut cloned = inner
            .repos
            .get(Path::new(remote))
            .cloned()
            .ok_or_else(|| call_failed("git clone", format!("fatal: repository '{remote}' not found")))?;
        if matches!(mode, CloneMode::Mirror) {
            cloned.bare = true;
        }
        inner.repos.insert(repo.to_path_buf(), cloned);
        Ok(())
    }

    fn update_remotes(&self, repo: &Path) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.repos.contains_key(repo) {
            return Err(not_a_repository(repo));
        }
        inner.remote_updates.push(repo.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(hex: &str) -> Oid {
        Oid::new(hex).unwrap()
    }

    fn branch(name: &str) -> RefName {
        RefName::for_branch(name).unwrap()
    }

    /// A repository with a linear main history c1 <- c2 <- c3.
    fn linear_repo() -> (MockRepo, Oid, Oid, Oid) {
        let (c1, c2, c3) = (oid("aaaa01"), oid("aaaa02"), oid("aaaa03"));
        let mut repo = MockRepo::new();
        repo.add_commit(&c1, &[]);
        repo.add_commit(&c2, &[c1.clone()]);
        repo.add_commit(&c3, &[c2.clone()]);
        repo.set_ref(branch("main"), c3.clone());
        repo.checked_out = Some("main".to_string());
        (repo, c1, c2, c3)
    }

    #[test]
    fn rev_list_exclusion() {
        let git = MockGit::new();
        let (repo, c1, c2, c3) = linear_repo();
        git.add_repo("/repo", repo);

        let all = git.rev_list(Path::new("/repo"), &[c3.clone()], &[]).unwrap();
        assert_eq!(all.len(), 3);

        let delta = git.rev_list(Path::new("/repo"), &[c3.clone()], &[c2]).unwrap();
        assert_eq!(delta, HashSet::from([c3]));
        assert!(!delta.contains(&c1));
    }

    #[test]
    fn bundle_create_records_fragment_and_prerequisites() {
        let git = MockGit::new();
        let (repo, _c1, c2, c3) = linear_repo();
        git.add_repo("/repo", repo);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bundle");
        git.create_bundle(Path::new("/repo"), &path, &[branch("main")], &[c2.clone()])
            .unwrap();

        let bundle = git.bundle(&path).unwrap();
        assert_eq!(bundle.commits.len(), 1);
        assert!(bundle.commits.contains_key(&c3));
        assert_eq!(bundle.prerequisites, HashSet::from([c2]));
        assert!(path.exists());
    }

    #[test]
    fn fetch_rejects_missing_prerequisites() {
        let git = MockGit::new();
        let (repo, ..) = linear_repo();
        git.add_repo("/source", repo);
        git.add_repo("/target", MockRepo::new());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bundle");
        git.create_bundle(Path::new("/source"), &path, &[branch("main")], &[oid("aaaa02")])
            .unwrap();

        assert!(!git.verify_bundle(Path::new("/target"), &path).unwrap());
        let result = git.fetch(
            Path::new("/target"),
            &path,
            &FetchOptions {
                refspecs: vec!["refs/heads/*:refs/heads/*".to_string()],
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(GatewayError::CallFailed { .. })));
        assert!(!git.repo("/target").refs.contains_key(&branch("main")));
    }

    #[test]
    fn fetch_applies_branches_and_respects_fast_forward() {
        let git = MockGit::new();
        let (repo, _, _, _) = linear_repo();
        git.add_repo("/source", repo);
        git.add_repo("/target", MockRepo::new());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bundle");
        git.create_bundle(Path::new("/source"), &path, &[branch("main")], &[])
            .unwrap();

        git.fetch(
            Path::new("/target"),
            &path,
            &FetchOptions {
                refspecs: vec!["refs/heads/*:refs/heads/*".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(git.repo("/target").refs.get(&branch("main")), Some(&oid("aaaa03")));
    }

    #[test]
    fn fetch_refuses_checked_out_branch_without_update_head_ok() {
        let git = MockGit::new();
        let (source, _, c2, _) = linear_repo();
        let mut target = source.clone();
        target.set_ref(branch("main"), c2);
        git.add_repo("/source", source);
        git.add_repo("/target", target);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bundle");
        git.create_bundle(Path::new("/source"), &path, &[branch("main")], &[])
            .unwrap();

        let refused = git.fetch(
            Path::new("/target"),
            &path,
            &FetchOptions {
                refspecs: vec!["refs/heads/*:refs/heads/*".to_string()],
                ..Default::default()
            },
        );
        assert!(matches!(refused, Err(GatewayError::CallFailed { .. })));

        git.fetch(
            Path::new("/target"),
            &path,
            &FetchOptions {
                update_head_ok: true,
                refspecs: vec!["refs/heads/*:refs/heads/*".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn prefetch_stages_into_prefetch_namespace() {
        let git = MockGit::new();
        let (repo, _, c2, _) = linear_repo();
        let mut target = repo.clone();
        target.set_ref(branch("main"), c2);
        git.add_repo("/source", repo);
        git.add_repo("/target", target);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bundle");
        git.create_bundle(Path::new("/source"), &path, &[branch("main")], &[])
            .unwrap();

        git.fetch(
            Path::new("/target"),
            &path,
            &FetchOptions {
                prefetch: true,
                refspecs: vec!["refs/heads/main:refs/heads/main".to_string()],
                ..Default::default()
            },
        )
        .unwrap();

        let staged = RefName::new("refs/prefetch/heads/main").unwrap();
        let target = git.repo("/target");
        assert_eq!(target.refs.get(&staged), Some(&oid("aaaa03")));
        // The real branch is untouched by a prefetch
        assert_eq!(target.refs.get(&branch("main")), Some(&oid("aaaa02")));
    }

    #[test]
    fn prune_cannot_delete_the_checked_out_branch() {
        let git = MockGit::new();
        let (mut source, _, _, c3) = linear_repo();
        source.refs.remove(&branch("main"));
        source.set_ref(branch("other"), c3);
        let (target, _, _, _) = linear_repo();
        git.add_repo("/source", source);
        git.add_repo("/target", target);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.bundle");
        git.create_bundle(Path::new("/source"), &path, &[branch("other")], &[])
            .unwrap();

        let options = FetchOptions {
            force: true,
            prune: true,
            update_head_ok: true,
            refspecs: vec!["refs/heads/*:refs/heads/*".to_string()],
            ..Default::default()
        };
        let refused = git.fetch(Path::new("/target"), &path, &options);
        assert!(matches!(refused, Err(GatewayError::CallFailed { .. })));

        // After detaching, the same fetch goes through and prunes
        git.detach_head(Path::new("/target")).unwrap();
        git.fetch(Path::new("/target"), &path, &options).unwrap();
        let repo = git.repo("/target");
        assert!(!repo.refs.contains_key(&branch("main")));
        assert!(repo.refs.contains_key(&branch("other")));
    }
}
