//! git::interface
//!
//! The real [`Gateway`] implementation.
//!
//! # Architecture
//!
//! This module is the **single doorway** to git. No other module touches
//! git2 or spawns a `git` process. Repository-local queries and ref
//! surgery go through libgit2; everything involving a bundle file
//! (`bundle create`, `bundle verify`, `fetch`, `ls-remote`) plus
//! repository creation shells out to the `git` CLI, because libgit2 has
//! no bundle transport and the CLI must stay authoritative for the
//! repositories it later operates on.
//!
//! # Error Handling
//!
//! Subprocess failures carry the tool's stderr in
//! [`GatewayError::CallFailed`]; unparseable subprocess output is a
//! [`GatewayError::Protocol`] error; libgit2 failures surface as
//! [`GatewayError::Git`].

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use crate::core::types::{GitRef, Oid, RefName, HEADS_PREFIX};
use crate::ui::output;
use crate::ui::Verbosity;

use super::traits::{
    absolute_path, CheckedOutBranch, CloneMode, FetchOptions, Gateway, GatewayError, RefSelector,
};

/// The gateway to real git.
///
/// Stateless apart from the verbosity used to trace subprocess calls;
/// every operation names the repository or bundle it works on.
///
/// # Example
///
/// ```ignore
/// use bundlework::git::{Gateway, Git, RefSelector};
/// use bundlework::ui::Verbosity;
///
/// let git = Git::new(Verbosity::Normal);
/// let refs = git.list_refs(Path::new("."), RefSelector::heads())?;
/// ```
#[derive(Debug)]
pub struct Git {
    verbosity: Verbosity,
}

impl Git {
    /// Create a gateway. `verbosity` controls tracing of the underlying
    /// `git` subprocess calls.
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Open a repository with libgit2.
    fn open(&self, path: &Path) -> Result<git2::Repository, GatewayError> {
        git2::Repository::open(path).map_err(|err| {
            GatewayError::Git(format!(
                "failed to open repository {}: {}",
                path.display(),
                err.message()
            ))
        })
    }

    /// Run a `git` subprocess and return its stdout lines.
    fn run_git(&self, args: &[String], cwd: Option<&Path>) -> Result<Vec<String>, GatewayError> {
        output::debug(format!("calling: git {}", args.join(" ")), self.verbosity);

        let mut command = Command::new("git");
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let output = command.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            output::debug(format!("call failed. stderr: {stderr}"), self.verbosity);
            return Err(GatewayError::CallFailed {
                context: format!("git {}", args.join(" ")),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Collect the references matching a glob, `show-ref` style: the
    /// recorded target of the ref itself (the tag object for annotated
    /// tags), not the peeled commit.
    fn collect_glob(
        &self,
        repo: &git2::Repository,
        pattern: &str,
        out: &mut Vec<GitRef>,
    ) -> Result<(), GatewayError> {
        for reference in repo.references_glob(pattern)? {
            let reference = reference?;
            let name = reference
                .name()
                .ok_or_else(|| {
                    GatewayError::Protocol("reference name is not valid UTF-8".to_string())
                })?
                .to_string();
            let resolved = reference.resolve().unwrap_or(reference);
            let oid = resolved.target().ok_or_else(|| {
                GatewayError::Protocol(format!("reference {name} has no direct target"))
            })?;
            out.push(GitRef::new(Oid::new(oid.to_string())?, RefName::new(name)?));
        }
        Ok(())
    }
}

/// Resolve an object id to the commit it (possibly transitively) names.
///
/// Tag references record the tag object for annotated tags; ancestry
/// walks need the commit underneath.
fn peel_to_commit_id(repo: &git2::Repository, oid: &Oid) -> Result<git2::Oid, GatewayError> {
    let raw = git2::Oid::from_str(oid.as_str())?;
    let object = repo.find_object(raw, None)?;
    Ok(object.peel(git2::ObjectType::Commit)?.id())
}

/// Prepend `--not` for a rev-list style exclusion, avoiding an empty
/// `--not` clause.
fn exclusion_args(exclude: &[Oid]) -> Vec<String> {
    if exclude.is_empty() {
        return Vec::new();
    }
    std::iter::once("--not".to_string())
        .chain(exclude.iter().map(|oid| oid.as_str().to_string()))
        .collect()
}

/// Build the argument vector for a fetch from a bundle.
fn fetch_args(bundle: &Path, options: &FetchOptions) -> Vec<String> {
    let mut args = vec!["fetch".to_string()];
    if options.dry_run {
        args.push("--dry-run".to_string());
    }
    if options.prefetch {
        // A prefetch stages objects under refs/prefetch/ and must not
        // drag tag handling or atomicity into the staging namespace.
        args.push("--prefetch".to_string());
    } else {
        args.push("--atomic".to_string());
        args.push("--tags".to_string());
    }
    args.push("--no-write-fetch-head".to_string());
    if options.prune {
        args.push("--prune".to_string());
    }
    if options.force {
        args.push("--force".to_string());
    }
    if options.update_head_ok {
        args.push("--update-head-ok".to_string());
    }
    args.push(bundle.to_string_lossy().into_owned());
    args.extend(options.refspecs.iter().cloned());
    args
}

impl Gateway for Git {
    // =========================================================================
    // Reference listing
    // =========================================================================

    fn list_refs(&self, repo: &Path, selector: RefSelector) -> Result<Vec<GitRef>, GatewayError> {
        let repo = self.open(repo)?;
        let mut refs = Vec::new();
        if selector.heads {
            self.collect_glob(&repo, "refs/heads/*", &mut refs)?;
        }
        if selector.tags {
            self.collect_glob(&repo, "refs/tags/*", &mut refs)?;
        }
        refs.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(refs)
    }

    fn list_bundle_refs(
        &self,
        bundle: &Path,
        selector: RefSelector,
    ) -> Result<Vec<GitRef>, GatewayError> {
        let bundle = absolute_path(bundle)?;
        let mut args = vec!["ls-remote".to_string()];
        if selector.heads {
            args.push("--heads".to_string());
        }
        if selector.tags {
            args.push("--tags".to_string());
        }
        args.push(bundle.to_string_lossy().into_owned());

        let mut refs = Vec::new();
        for line in self.run_git(&args, None)? {
            if line.trim().is_empty() {
                continue;
            }
            // Annotated tags are listed twice; the peeled duplicate
            // carries a ^{} suffix and is not a reference.
            if line.ends_with("^{}") {
                continue;
            }
            refs.push(GitRef::from_show_ref(&line)?);
        }
        refs.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(refs)
    }

    // =========================================================================
    // Ancestry queries
    // =========================================================================

    fn rev_list(
        &self,
        repo: &Path,
        include: &[Oid],
        exclude: &[Oid],
    ) -> Result<HashSet<Oid>, GatewayError> {
        let repo = self.open(repo)?;
        let mut walk = repo.revwalk()?;
        for oid in include {
            walk.push(peel_to_commit_id(&repo, oid)?)?;
        }
        for oid in exclude {
            walk.hide(peel_to_commit_id(&repo, oid)?)?;
        }

        let mut commits = HashSet::new();
        for found in walk {
            commits.insert(Oid::new(found?.to_string())?);
        }
        Ok(commits)
    }

    fn first_parent(&self, repo: &Path, commit: &Oid) -> Result<Option<Oid>, GatewayError> {
        let repo = self.open(repo)?;
        let commit = repo.find_commit(peel_to_commit_id(&repo, commit)?)?;
        match commit.parent_id(0) {
            Ok(parent) => Ok(Some(Oid::new(parent.to_string())?)),
            Err(_) => Ok(None),
        }
    }

    fn commit_exists(&self, repo: &Path, commit: &Oid) -> Result<bool, GatewayError> {
        let repo = self.open(repo)?;
        let raw = match git2::Oid::from_str(commit.as_str()) {
            Ok(raw) => raw,
            Err(_) => return Ok(false),
        };
        let exists = repo
            .find_object(raw, None)
            .and_then(|object| object.peel(git2::ObjectType::Commit))
            .is_ok();
        Ok(exists)
    }

    // =========================================================================
    // Bundle transport
    // =========================================================================

    fn create_bundle(
        &self,
        repo: &Path,
        bundle: &Path,
        include: &[RefName],
        exclude: &[Oid],
    ) -> Result<(), GatewayError> {
        let bundle = absolute_path(bundle)?;
        let mut args = vec![
            "bundle".to_string(),
            "create".to_string(),
            bundle.to_string_lossy().into_owned(),
        ];
        // References to include must be named, not given by hash: bundles
        // are created for references, not for loose commits. Exclusions
        // may be anything rev-list accepts, so plain hashes are fine.
        args.extend(include.iter().map(|name| name.as_str().to_string()));
        args.extend(exclusion_args(exclude));

        self.run_git(&args, Some(repo))?;
        Ok(())
    }

    fn verify_bundle(&self, repo: &Path, bundle: &Path) -> Result<bool, GatewayError> {
        let bundle = absolute_path(bundle)?;
        let args = vec![
            "bundle".to_string(),
            "verify".to_string(),
            bundle.to_string_lossy().into_owned(),
        ];
        match self.run_git(&args, Some(repo)) {
            Ok(_) => Ok(true),
            Err(GatewayError::CallFailed { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn fetch(
        &self,
        repo: &Path,
        bundle: &Path,
        options: &FetchOptions,
    ) -> Result<(), GatewayError> {
        let bundle = absolute_path(bundle)?;
        self.run_git(&fetch_args(&bundle, options), Some(repo))?;
        Ok(())
    }

    // =========================================================================
    // Checkout state
    // =========================================================================

    fn current_branch(&self, repo: &Path) -> Result<Option<CheckedOutBranch>, GatewayError> {
        let repo = self.open(repo)?;
        let head = repo.find_reference("HEAD")?;
        let Some(target) = head.symbolic_target() else {
            return Ok(None); // detached
        };
        let Some(branch) = target.strip_prefix(HEADS_PREFIX) else {
            return Ok(None);
        };
        let name = branch.to_string();
        let target = target.to_string();

        let git_ref = match repo.find_reference(&target) {
            Ok(reference) => {
                let oid = reference.peel_to_commit()?.id();
                Some(GitRef::new(Oid::new(oid.to_string())?, RefName::new(target)?))
            }
            // The branch has no commits yet (freshly initialized repo)
            Err(err) if err.code() == git2::ErrorCode::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        Ok(Some(CheckedOutBranch {
            name,
            target: git_ref,
        }))
    }

    fn is_worktree_clean(&self, repo: &Path) -> Result<bool, GatewayError> {
        let repo = self.open(repo)?;
        if repo.is_bare() {
            return Ok(true);
        }
        let mut options = git2::StatusOptions::new();
        options.include_untracked(true).include_ignored(false);
        let statuses = repo.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    fn is_bare(&self, repo: &Path) -> Result<bool, GatewayError> {
        Ok(self.open(repo)?.is_bare())
    }

    fn detach_head(&self, repo: &Path) -> Result<(), GatewayError> {
        let repo = self.open(repo)?;
        let oid = repo.head()?.peel_to_commit()?.id();
        repo.set_head_detached(oid)?;
        Ok(())
    }

    fn hard_reset(&self, repo: &Path, commit: &Oid) -> Result<(), GatewayError> {
        // The CLI is authoritative for worktree mutation; it also handles
        // the unborn-branch case of a freshly initialized repository
        let args = vec![
            "reset".to_string(),
            "--hard".to_string(),
            commit.as_str().to_string(),
        ];
        self.run_git(&args, Some(repo))?;
        Ok(())
    }

    fn delete_ref(&self, repo: &Path, name: &RefName) -> Result<(), GatewayError> {
        let repo = self.open(repo)?;
        let mut reference = repo.find_reference(name.as_str())?;
        reference.delete()?;
        Ok(())
    }

    // =========================================================================
    // Repository creation
    // =========================================================================

    fn init_repo(&self, repo: &Path, bare: bool) -> Result<(), GatewayError> {
        let mut args = vec!["init".to_string()];
        if bare {
            args.push("--bare".to_string());
        }
        args.push(".".to_string());
        self.run_git(&args, Some(repo))?;
        Ok(())
    }

    fn clone_repo(
        &self,
        repo: &Path,
        remote: &str,
        mode: CloneMode,
    ) -> Result<(), GatewayError> {
        let repo = absolute_path(repo)?;
        let mode = match mode {
            // A checkout would be a waste of resources even for a
            // non-mirrored backup source
            CloneMode::Mirror => "--mirror",
            CloneMode::NoCheckout => "--no-checkout",
        };
        let args = vec![
            "clone".to_string(),
            "--no-hardlinks".to_string(),
            mode.to_string(),
            remote.to_string(),
            repo.to_string_lossy().into_owned(),
        ];
        self.run_git(&args, None)?;
        Ok(())
    }

    fn update_remotes(&self, repo: &Path) -> Result<(), GatewayError> {
        let args = vec![
            "remote".to_string(),
            "update".to_string(),
            "--prune".to_string(),
        ];
        self.run_git(&args, Some(repo))?;
        Ok(())
    }
}
