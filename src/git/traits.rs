//! git::traits
//!
//! The gateway trait: the single narrow seam to the version-control tool.
//!
//! # Design
//!
//! The backup builder and the restore reconciler never talk to git
//! directly; everything flows through [`Gateway`]. The trait is
//! synchronous - every operation is a blocking local invocation with no
//! timeout management at this layer - and object-safe, so the algorithms
//! take `&dyn Gateway` and are fully testable against
//! [`crate::git::MockGit`] without spawning processes.
//!
//! # Error Handling
//!
//! [`GatewayError`] separates two failure families that callers must tell
//! apart:
//! - [`GatewayError::CallFailed`]: git itself reported failure; carries
//!   the tool's diagnostic text. During a restore dry-run this is a
//!   normal branch of the decision procedure, not an error.
//! - [`GatewayError::Protocol`]: output from git could not be parsed into
//!   the expected shape. This is a communication failure and is never
//!   absorbed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{GitRef, Oid, RefName, TypeError};

/// Errors from gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The external tool returned a non-zero status.
    #[error("call to git failed ({context}). git reported:\n{stderr}")]
    CallFailed {
        /// The operation that was attempted
        context: String,
        /// Diagnostic output from the tool
        stderr: String,
    },

    /// Output from the tool could not be parsed into the expected shape.
    #[error("unexpected error in communication with git: {0}")]
    Protocol(String),

    /// A repository-local operation failed inside libgit2.
    #[error("git error: {0}")]
    Git(String),

    /// The tool could not be spawned, or another I/O failure occurred.
    #[error("i/o error invoking git: {0}")]
    Io(#[from] std::io::Error),
}

impl From<git2::Error> for GatewayError {
    fn from(err: git2::Error) -> Self {
        GatewayError::Git(err.message().to_string())
    }
}

impl From<TypeError> for GatewayError {
    fn from(err: TypeError) -> Self {
        GatewayError::Protocol(err.to_string())
    }
}

/// Which reference namespaces to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefSelector {
    /// Include `refs/heads/*`
    pub heads: bool,
    /// Include `refs/tags/*`
    pub tags: bool,
}

impl RefSelector {
    /// Branches only.
    pub fn heads() -> Self {
        Self {
            heads: true,
            tags: false,
        }
    }

    /// Branches and tags.
    pub fn heads_and_tags() -> Self {
        Self {
            heads: true,
            tags: true,
        }
    }

    /// Branches, plus tags when `tags` is set.
    pub fn heads_with_tags(tags: bool) -> Self {
        Self { heads: true, tags }
    }
}

/// How to clone a repository that is being bootstrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneMode {
    /// `--mirror`: a bare mirror that tracks every remote ref.
    Mirror,
    /// `--no-checkout`: a regular clone without the wasted checkout.
    NoCheckout,
}

/// Options for applying a bundle's references to a repository.
///
/// A fetch never writes `FETCH_HEAD`. A regular fetch is atomic and
/// follows tags; a prefetch rewrites its refspec destinations into
/// `refs/prefetch/` and touches nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Trial run: report what would be done without committing anything.
    pub dry_run: bool,
    /// Allow non-fast-forward reference updates.
    pub force: bool,
    /// Remove branches that are not present in the bundle.
    pub prune: bool,
    /// Allow updating the reference that is currently checked out.
    pub update_head_ok: bool,
    /// Fetch into the `refs/prefetch/` staging namespace.
    pub prefetch: bool,
    /// Explicit refspecs to apply.
    pub refspecs: Vec<String>,
}

/// The branch a repository currently has checked out.
///
/// `target` is `None` for an unborn branch (a freshly initialized
/// repository whose first commit has not been made). A detached HEAD is
/// modeled as the absence of a `CheckedOutBranch` altogether.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedOutBranch {
    /// The short branch name (e.g. `main`)
    pub name: String,
    /// The reference the branch points to, if it has any commits
    pub target: Option<GitRef>,
}

/// The gateway to the version-control tool.
///
/// Implemented for real by [`crate::git::Git`] and in-memory by
/// [`crate::git::MockGit`]. All paths are repository worktree or bundle
/// file locations; the gateway never keeps per-repository state.
pub trait Gateway {
    /// List references in a repository, restricted by `selector`.
    /// The result is ordered by reference name.
    fn list_refs(&self, repo: &Path, selector: RefSelector) -> Result<Vec<GitRef>, GatewayError>;

    /// List the references recorded in a bundle file, restricted by
    /// `selector`. The result is ordered by reference name.
    fn list_bundle_refs(
        &self,
        bundle: &Path,
        selector: RefSelector,
    ) -> Result<Vec<GitRef>, GatewayError>;

    /// Commits reachable from `include` but not from `exclude`.
    fn rev_list(
        &self,
        repo: &Path,
        include: &[Oid],
        exclude: &[Oid],
    ) -> Result<HashSet<Oid>, GatewayError>;

    /// The immediate first parent of a commit, if it has one.
    fn first_parent(&self, repo: &Path, commit: &Oid) -> Result<Option<Oid>, GatewayError>;

    /// Whether a commit is present in the repository.
    fn commit_exists(&self, repo: &Path, commit: &Oid) -> Result<bool, GatewayError>;

    /// Create a bundle holding the named references and the commits
    /// reachable from them, minus everything reachable from `exclude`.
    ///
    /// References are passed by name, never by hash: bundles are created
    /// for references, not for loose commits.
    fn create_bundle(
        &self,
        repo: &Path,
        bundle: &Path,
        include: &[RefName],
        exclude: &[Oid],
    ) -> Result<(), GatewayError>;

    /// Whether the bundle's prerequisites are satisfied by the
    /// repository, i.e. whether applying it could succeed.
    fn verify_bundle(&self, repo: &Path, bundle: &Path) -> Result<bool, GatewayError>;

    /// Apply (or trial-apply) a bundle's references to a repository.
    fn fetch(
        &self,
        repo: &Path,
        bundle: &Path,
        options: &FetchOptions,
    ) -> Result<(), GatewayError>;

    /// The currently checked out branch, or `None` for a detached HEAD.
    fn current_branch(&self, repo: &Path) -> Result<Option<CheckedOutBranch>, GatewayError>;

    /// Whether the working tree has no changes at all, untracked files
    /// included. Bare repositories are always clean.
    fn is_worktree_clean(&self, repo: &Path) -> Result<bool, GatewayError>;

    /// Whether the repository is bare.
    fn is_bare(&self, repo: &Path) -> Result<bool, GatewayError>;

    /// Detach HEAD at its current commit.
    fn detach_head(&self, repo: &Path) -> Result<(), GatewayError>;

    /// Hard-reset the checked out branch and working tree to a commit.
    fn hard_reset(&self, repo: &Path, commit: &Oid) -> Result<(), GatewayError>;

    /// Delete a reference.
    fn delete_ref(&self, repo: &Path, name: &RefName) -> Result<(), GatewayError>;

    /// Initialize a new repository at `repo`, which must be an existing
    /// directory.
    fn init_repo(&self, repo: &Path, bare: bool) -> Result<(), GatewayError>;

    /// Clone `remote` into `repo`.
    fn clone_repo(&self, repo: &Path, remote: &str, mode: CloneMode)
        -> Result<(), GatewayError>;

    /// Update (and prune) all remotes of a mirror repository.
    fn update_remotes(&self, repo: &Path) -> Result<(), GatewayError>;
}

/// Absolutize a path without requiring it to exist.
///
/// Bundle paths are handed to git with the repository as working
/// directory, so they must not stay relative to the caller's directory.
pub fn absolute_path(path: &Path) -> Result<PathBuf, GatewayError> {
    Ok(std::path::absolute(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_constructors() {
        assert_eq!(
            RefSelector::heads(),
            RefSelector {
                heads: true,
                tags: false
            }
        );
        assert_eq!(
            RefSelector::heads_and_tags(),
            RefSelector {
                heads: true,
                tags: true
            }
        );
        assert_eq!(RefSelector::heads_with_tags(true), RefSelector::heads_and_tags());
        assert_eq!(RefSelector::heads_with_tags(false), RefSelector::heads());
    }

    #[test]
    fn gateway_error_display() {
        let err = GatewayError::CallFailed {
            context: "fetch".to_string(),
            stderr: "fatal: bad object".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("fetch"));
        assert!(rendered.contains("fatal: bad object"));
    }

    #[test]
    fn type_errors_become_protocol_errors() {
        let err: GatewayError = TypeError::UnparseableRefLine("garbage".to_string()).into();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }
}
