//! restore
//!
//! The restore reconciler.
//!
//! # Per-bundle decision procedure
//!
//! For each candidate bundle file:
//!
//! 1. **Already satisfied**: if every commit the bundle references is
//!    present in the target, the bundle counts as restored without being
//!    applied - unless the operator forces a single explicitly named
//!    file, which re-applies it so reference pointers get corrected.
//! 2. **Checked-out-branch safety**: an update or deletion of the
//!    currently checked out branch is refused unless forced, except when
//!    the working tree is clean (a clean advance is always safe). The
//!    checkout state is captured once at construction, so this check is
//!    deterministic and independent of application order.
//! 3. **Head detach**: forcing a deletion of the checked out branch
//!    requires detaching HEAD first; git cannot delete the active branch.
//! 4. **Safe advance**: a clean non-forced update of the checked out
//!    branch is applied by prefetching the bundle into `refs/prefetch/`,
//!    hard-resetting the branch to the target commit, and cleaning the
//!    staging ref - the general fetch refuses to touch the active branch.
//! 5. **Dry-run validation**: missing ancestry (retry after other
//!    bundles land) is told apart from a non-fast-forward rejection
//!    (warn, skip) by retrying the failed dry-run with force.
//! 6. **Commit**: reset, detach if needed, then the real fetch.
//!
//! # Directory convergence
//!
//! Bundle files in a directory are unordered; filename order is only an
//! optimization hint. The reconciler sweeps all not-yet-skipped files in
//! filename order and repeats full sweeps until one makes no progress.
//! Termination is guaranteed: every successful restore permanently
//! removes one file from the worklist, and a sweep that restores nothing
//! proves no further sweep can. Strict-order mode disables the repeat
//! sweeps: files are attempted exactly once, in filename order, with
//! forced application, and the first failure halts the batch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{GitRef, Oid, RefName};
use crate::git::{CheckedOutBranch, FetchOptions, Gateway, GatewayError, RefSelector};
use crate::ui::output;
use crate::ui::Verbosity;

/// Errors from a restore invocation.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Not a single bundle could be restored.
    #[error("restoring bundles to the repository failed: no bundles were restored")]
    NothingRestored,

    /// An internal invariant was violated.
    #[error("an internal inconsistency has been detected: {0}")]
    Inconsistency(String),

    /// A gateway call failed.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// Filesystem work around the bundle files failed.
    #[error("restore i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for a restore run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Create a bare repository if the target must be created.
    pub bare: bool,
    /// Update references even when the update is not a fast-forward or
    /// touches the checked out branch.
    pub force: bool,
    /// Remove branches that are not present in the bundle.
    pub prune: bool,
    /// Delete bundle files once their data has been restored.
    pub delete_files: bool,
}

/// Context object for restoring one or more bundles to a repository.
///
/// # Example
///
/// ```ignore
/// use bundlework::restore::{Restoration, RestoreOptions};
///
/// let mut restoration =
///     Restoration::new(&gateway, repo, RestoreOptions::default(), verbosity)?;
/// let found = restoration.restore_bundles(bundle_dir, false)?;
/// if restoration.restored_count() == 0 {
///     return Err(RestoreError::NothingRestored.into());
/// }
/// ```
pub struct Restoration<'a> {
    gateway: &'a dyn Gateway,
    repo: PathBuf,
    force: bool,
    prune: bool,
    delete_files: bool,

    /// Bundles that will not be attempted again this run.
    skip_bundles: HashSet<PathBuf>,
    restored_count: usize,

    /// Checkout state, captured once; decisions must not depend on the
    /// order in which bundles happen to be applied.
    current_branch: Option<CheckedOutBranch>,
    repo_is_bare: bool,
    verbosity: Verbosity,
}

impl<'a> Restoration<'a> {
    /// Create a restoration context for a target repository, initializing
    /// the repository first if the path is missing or empty.
    pub fn new(
        gateway: &'a dyn Gateway,
        repo: &Path,
        options: RestoreOptions,
        verbosity: Verbosity,
    ) -> Result<Self, RestoreError> {
        let repo = repo.to_path_buf();
        Self::ensure_target_is_repo(gateway, &repo, options.bare, verbosity)?;

        let repo_is_bare = gateway.is_bare(&repo)?;
        let current_branch = gateway.current_branch(&repo)?;

        Ok(Self {
            gateway,
            repo,
            force: options.force,
            prune: options.prune,
            delete_files: options.delete_files,
            skip_bundles: HashSet::new(),
            restored_count: 0,
            current_branch,
            repo_is_bare,
            verbosity,
        })
    }

    /// Create the target repository if it currently does not exist or is
    /// an empty directory. In all other cases the path is assumed to be
    /// a git repository; gateway calls will fail later if it isn't.
    fn ensure_target_is_repo(
        gateway: &dyn Gateway,
        repo: &Path,
        bare: bool,
        verbosity: Verbosity,
    ) -> Result<(), RestoreError> {
        if repo.exists() && repo.read_dir()?.next().is_some() {
            return Ok(());
        }
        output::print(
            format!("Creating new repository in {}", repo.display()),
            verbosity,
        );
        std::fs::create_dir_all(repo)?;
        gateway.init_repo(repo, bare)?;
        Ok(())
    }

    /// How many bundles have been restored so far.
    pub fn restored_count(&self) -> usize {
        self.restored_count
    }

    /// Restore data from one or more bundles.
    ///
    /// If `bundle` is a directory, all `*.bundle` files in it are
    /// attempted, repeatedly, until a full pass restores nothing more.
    /// With `strict_order` the files are processed exactly once in
    /// filename order, each forced as if passed individually, and the
    /// first failure halts the batch.
    ///
    /// Returns the total number of bundle files found.
    pub fn restore_bundles(
        &mut self,
        bundle: &Path,
        strict_order: bool,
    ) -> Result<usize, RestoreError> {
        let bundles = Self::list_bundles(bundle)?;
        output::print(
            format!("Found {} bundles to restore.", bundles.len()),
            self.verbosity,
        );

        // The references in each bundle do not change during the run
        let mut references: HashMap<PathBuf, Vec<GitRef>> = HashMap::new();
        for path in &bundles {
            references.insert(
                path.clone(),
                self.gateway
                    .list_bundle_refs(path, RefSelector::heads_and_tags())?,
            );
        }

        let mut restore_more_bundles = true;
        while restore_more_bundles {
            restore_more_bundles = false;

            for current_bundle in &bundles {
                if self.skip_bundles.contains(current_bundle) {
                    continue;
                }
                let refs = &references[current_bundle];

                // An already-available bundle is "restored" without git
                // complaining about non-fast-forward branches. A negative
                // result can't be cached: restoring bundle B may make
                // bundle A available on the next sweep.
                //
                // A single file can be force-restored to correct
                // reference pointers; strict order extends that to every
                // file in a directory.
                let apply_force = self.force && (strict_order || bundle.is_file());
                if !apply_force && self.all_available(refs)? {
                    output::warn(
                        format!(
                            "Bundle {} has already been restored",
                            current_bundle.display()
                        ),
                        self.verbosity,
                    );
                    restore_more_bundles |= self.mark_bundle_restored(current_bundle, true)?;
                    continue;
                }

                if self.is_bad_head_update(refs)? {
                    output::warn(
                        format!(
                            "Bundle {} can't be restored: it would update the currently checked \
                             out branch. This is only allowed with --force.",
                            current_bundle.display()
                        ),
                        self.verbosity,
                    );
                    // This issue remains no matter how many other bundles
                    // are restored
                    self.skip_bundles.insert(current_bundle.clone());
                    if strict_order {
                        break;
                    }
                    continue;
                }

                let detach_head = self.need_detach_head_first(refs);
                let (reset_current_branch_to, force_update_head) =
                    self.explicitly_update_current_head(refs)?;

                if !self.perform_bundle_restore(
                    current_bundle,
                    refs,
                    force_update_head,
                    detach_head,
                    reset_current_branch_to,
                )? {
                    if strict_order {
                        break;
                    }
                    continue;
                }

                restore_more_bundles |= self.mark_bundle_restored(current_bundle, false)?;
            }

            // Strict order never cycles back over the directory
            if strict_order {
                restore_more_bundles = false;
            }
        }

        Ok(bundles.len())
    }

    /// List the bundle files to attempt: the file itself, or all
    /// `*.bundle` files in a directory, sorted by filename.
    fn list_bundles(bundle: &Path) -> Result<Vec<PathBuf>, RestoreError> {
        let mut bundles = if bundle.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(bundle)? {
                let path = entry?.path();
                if path.is_file()
                    && path
                        .extension()
                        .map(|extension| extension == "bundle")
                        .unwrap_or(false)
                {
                    found.push(path);
                }
            }
            found
        } else {
            vec![bundle.to_path_buf()]
        };
        bundles.sort();
        Ok(bundles)
    }

    /// Whether every commit the bundle references is already present.
    fn all_available(&self, refs: &[GitRef]) -> Result<bool, RestoreError> {
        for git_ref in refs {
            if !self.gateway.commit_exists(&self.repo, git_ref.oid())? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The bundle's reference for the currently checked out branch.
    fn new_ref_for_current_branch<'r>(&self, refs: &'r [GitRef]) -> Option<&'r GitRef> {
        let current = self.current_branch.as_ref()?;
        refs.iter()
            .find(|git_ref| git_ref.name().branch_name() == Some(current.name.as_str()))
    }

    /// Whether applying these references would touch the checked out
    /// branch in an impermissible way. Warns with guidance when it would.
    fn is_bad_head_update(&self, refs: &[GitRef]) -> Result<bool, RestoreError> {
        let Some(current) = &self.current_branch else {
            return Ok(false);
        };

        match self.new_ref_for_current_branch(refs) {
            Some(new_ref) => {
                if self.force || self.repo_is_bare {
                    // Updating HEAD in a bare repo or with force is always OK
                    return Ok(false);
                }
                if let Some(target) = &current.target {
                    if target.oid() == new_ref.oid() {
                        // The checked out branch will not actually move
                        return Ok(false);
                    }
                }
                if self.gateway.is_worktree_clean(&self.repo)? {
                    // A clean worktree can be advanced without destroying
                    // data (this also covers a freshly created repository)
                    return Ok(false);
                }
                output::warn(
                    "The currently checked out branch would be updated. Please stash your \
                     changes and clean your worktree (also remove untracked files) or use \
                     --force to force your current branch to be updated nonetheless (THIS WILL \
                     DELETE ALL UNCOMMITTED CHANGES!).",
                    self.verbosity,
                );
                Ok(true)
            }
            None => {
                if self.force {
                    return Ok(false);
                }
                output::warn(
                    "The currently checked out branch would be deleted. Please change to a \
                     different branch or use --force to force your current branch to be removed \
                     nonetheless (this will leave you with a detached HEAD).",
                    self.verbosity,
                );
                Ok(true)
            }
        }
    }

    /// Whether HEAD must be detached before the fetch so the checked out
    /// branch can be deleted.
    fn need_detach_head_first(&self, refs: &[GitRef]) -> bool {
        self.current_branch.is_some()
            && self.force
            && self.new_ref_for_current_branch(refs).is_none()
    }

    /// Whether the checked out branch needs an explicit advance.
    ///
    /// Returns the commit to reset the branch to, if needed, and whether
    /// the fetch must be allowed to touch the checked out reference.
    fn explicitly_update_current_head(
        &self,
        refs: &[GitRef],
    ) -> Result<(Option<Oid>, bool), RestoreError> {
        if let Some(current) = &self.current_branch {
            if let Some(new_ref) = self.new_ref_for_current_branch(refs) {
                if !self.force && !self.repo_is_bare {
                    if let Some(target) = &current.target {
                        if target.oid() == new_ref.oid() {
                            // No actual movement; git might still complain,
                            // so explicitly allow it to do nothing
                            return Ok((None, true));
                        }
                    }
                    if self.gateway.is_worktree_clean(&self.repo)? {
                        return Ok((Some(new_ref.oid().clone()), true));
                    }
                }
            }
        }
        Ok((None, false))
    }

    /// Attempt a dry run, distinguishing missing data from a
    /// non-fast-forward rejection.
    ///
    /// Returns whether the dry run passed. A rejection that disappears
    /// when retried with force is a forcing requirement and is surfaced
    /// as a warning; the caller is not told which case occurred.
    fn dry_run_fetch(&self, bundle: &Path, options: &FetchOptions) -> Result<bool, RestoreError> {
        match self.gateway.fetch(&self.repo, bundle, options) {
            Ok(()) => Ok(true),
            Err(GatewayError::CallFailed { .. }) => {
                if !self.force {
                    // Updates to HEAD were handled before this point, so a
                    // forced retry passing means the rejection was a
                    // non-fast-forward update
                    let forced = FetchOptions {
                        force: true,
                        ..options.clone()
                    };
                    match self.gateway.fetch(&self.repo, bundle, &forced) {
                        Ok(()) => output::warn(
                            format!(
                                "Bundle {} can't be restored. Updates to references that are \
                                 not fast-forward are only allowed with --force.",
                                bundle.display()
                            ),
                            self.verbosity,
                        ),
                        Err(GatewayError::CallFailed { .. }) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Perform the actual bundle restore.
    ///
    /// Returns whether the bundle was fully restored. A verification or
    /// dry-run failure is not an error: the bundle may simply need other
    /// bundles to land first, and must stay available for a later sweep.
    fn perform_bundle_restore(
        &mut self,
        bundle: &Path,
        new_refs: &[GitRef],
        force_update_head: bool,
        detach_head: bool,
        reset_current_branch_to: Option<Oid>,
    ) -> Result<bool, RestoreError> {
        let mut refspecs = vec!["refs/heads/*:refs/heads/*".to_string()];
        // Tags can't use refs/tags/*:refs/tags/* - that would start
        // purging tags even without --prune-tags (see git fetch,
        // section Pruning)
        refspecs.extend(
            new_refs
                .iter()
                .filter(|git_ref| git_ref.name().is_tag())
                .map(|git_ref| format!("{}:{}", git_ref.name(), git_ref.name())),
        );

        let options = FetchOptions {
            dry_run: false,
            force: self.force,
            prune: self.prune,
            // git would complain about fetching into the current branch
            // even when nothing moves; bypass the check when the branch
            // is handled explicitly
            update_head_ok: self.force || force_update_head,
            prefetch: false,
            refspecs,
        };

        output::print(
            format!("Attempting to restore {}", bundle.display()),
            self.verbosity,
        );

        // Checks and a dry run first: changes are only made once the
        // entire bundle is known to apply. This keeps a partially
        // applicable bundle available for a later attempt instead of
        // being mistaken for fully restored.
        if !self.gateway.verify_bundle(&self.repo, bundle)? {
            return Ok(false);
        }
        // The manual current-branch steps can't run inside a dry run;
        // the only observable difference is the HEAD update check, so
        // that check is disabled for the trial when a detach is planned
        let dry_options = FetchOptions {
            dry_run: true,
            update_head_ok: options.update_head_ok || detach_head,
            ..options.clone()
        };
        if !self.dry_run_fetch(bundle, &dry_options)? {
            return Ok(false);
        }

        // After the checks above, the real restore is expected to succeed
        if let Some(reset_to) = &reset_current_branch_to {
            let Some(current) = self.current_branch.clone() else {
                return Err(RestoreError::Inconsistency(
                    "a current-branch reset was computed, but no branch is checked out".to_string(),
                ));
            };
            let branch_ref =
                RefName::for_branch(&current.name).map_err(GatewayError::from)?;
            self.gateway.fetch(
                &self.repo,
                bundle,
                &FetchOptions {
                    prefetch: true,
                    refspecs: vec![format!("{branch_ref}:{branch_ref}")],
                    ..Default::default()
                },
            )?;
            self.gateway.hard_reset(&self.repo, reset_to)?;
            let staging_ref = RefName::new(format!("refs/prefetch/heads/{}", current.name))
                .map_err(GatewayError::from)?;
            self.gateway.delete_ref(&self.repo, &staging_ref)?;
        }

        if detach_head {
            self.gateway.detach_head(&self.repo)?;
        }

        self.gateway.fetch(&self.repo, bundle, &options)?;

        output::print(
            format!("Restored bundle {}", bundle.display()),
            self.verbosity,
        );
        Ok(true)
    }

    /// Mark a bundle as restored.
    ///
    /// Returns whether this warrants another sweep over the bundles that
    /// have not been restored yet.
    fn mark_bundle_restored(
        &mut self,
        bundle: &Path,
        was_already_restored: bool,
    ) -> Result<bool, RestoreError> {
        self.skip_bundles.insert(bundle.to_path_buf());

        if self.delete_files {
            std::fs::remove_file(bundle)?;
        }

        if !was_already_restored {
            // A fresh restore may have supplied the ancestry another
            // bundle was waiting for; sweep again
            self.restored_count += 1;
            return Ok(true);
        }

        if self.delete_files {
            self.restored_count += 1;
        }

        Ok(false)
    }
}
