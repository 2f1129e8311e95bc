//! backup
//!
//! The incremental bundle builder.
//!
//! # Algorithm
//!
//! A backup bundles every local reference plus the commits that are new
//! compared to the previous bundle:
//!
//! 1. Enumerate all branch references, and tag references when a
//!    metadata record is in use (no metadata, no tags).
//! 2. Drop references already recorded as known tags; tags are
//!    write-once by Git convention, so re-bundling them is wasted work.
//! 3. List the previous bundle's references; their commits form the
//!    frontier the new bundle is computed against.
//! 4. The incremental payload is everything reachable from the
//!    references to include but not from the frontier.
//! 5. Tighten the exclusion set: a candidate exclusion (frontier commit
//!    or an included reference's first parent) is only usable when its
//!    full ancestry is disjoint from the commits that must be included.
//!    Blindly excluding every frontier commit could cut required history
//!    when references overlap or were rewound.
//! 6. Materialize the bundle by naming the references explicitly, then
//!    merge newly seen tag names into the metadata.
//!
//! # Atomicity
//!
//! Nothing is persisted until the bundle file is confirmed written: the
//! previous-bundle copy and the metadata file are only touched
//! afterwards, so a failed backup leaves the chain exactly as it was.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use crate::core::metadata::{Metadata, MetadataError};
use crate::core::types::{GitRef, Oid, RefName};
use crate::git::{CloneMode, Gateway, GatewayError, RefSelector};
use crate::ui::output;
use crate::ui::Verbosity;

/// Errors from a backup attempt.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The source repository must be created, but no remote was given.
    #[error(
        "repository {} does not yet exist, but no remote to clone from was given",
        .0.display()
    )]
    MissingRemote(PathBuf),

    /// The metadata file failed validation.
    #[error("{0}")]
    Metadata(#[from] MetadataError),

    /// A gateway call failed.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// Filesystem work around the bundle failed.
    #[error("backup i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a backup invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A bundle file was written at this path.
    Written {
        /// The bundle that was created (timestamped if requested)
        bundle: PathBuf,
    },
    /// Nothing changed and `skip_unchanged` was requested.
    Unchanged,
}

/// Context object for creating a backup bundle from a repository.
///
/// # Example
///
/// ```ignore
/// use bundlework::backup::Backup;
/// use bundlework::git::Git;
/// use bundlework::ui::Verbosity;
///
/// let gateway = Git::new(Verbosity::Normal);
/// let backup = Backup::new(&gateway, repo, None, false, Verbosity::Normal)?;
/// backup.perform(bundle, bundle, Some(metadata), false, true)?;
/// ```
pub struct Backup<'a> {
    gateway: &'a dyn Gateway,
    repo: PathBuf,
    mirror: bool,
    verbosity: Verbosity,
}

impl<'a> Backup<'a> {
    /// Create a backup context for a source repository.
    ///
    /// If the repository path does not exist or is an empty directory it
    /// is cloned from `remote` first (a mirror clone in mirror mode, a
    /// checkout-less clone otherwise).
    ///
    /// # Errors
    ///
    /// - [`BackupError::MissingRemote`] when the repository must be
    ///   created but no remote was given
    pub fn new(
        gateway: &'a dyn Gateway,
        repo: &Path,
        remote: Option<&str>,
        mirror: bool,
        verbosity: Verbosity,
    ) -> Result<Self, BackupError> {
        let backup = Self {
            gateway,
            repo: repo.to_path_buf(),
            mirror,
            verbosity,
        };
        backup.ensure_source_is_repo(remote)?;
        Ok(backup)
    }

    /// Create the source repository if it doesn't exist or is empty.
    ///
    /// In all other cases the path is assumed to be a git repository;
    /// gateway calls will fail later if it isn't.
    fn ensure_source_is_repo(&self, remote: Option<&str>) -> Result<(), BackupError> {
        if self.repo.exists() && self.repo.read_dir()?.next().is_some() {
            return Ok(());
        }
        let Some(remote) = remote else {
            return Err(BackupError::MissingRemote(self.repo.clone()));
        };

        output::print(
            format!(
                "Cloning {} into new repository {}",
                remote,
                self.repo.display()
            ),
            self.verbosity,
        );
        std::fs::create_dir_all(&self.repo)?;
        let mode = if self.mirror {
            CloneMode::Mirror
        } else {
            CloneMode::NoCheckout
        };
        self.gateway.clone_repo(&self.repo, remote, mode)?;
        Ok(())
    }

    /// Create a new backup bundle.
    ///
    /// `stored_bundle` is the reference point for the previous backup; a
    /// freshly written bundle is copied there afterwards (unless both
    /// paths are the same file). When `metadata_file` is given, tags are
    /// included and the metadata is persisted after the bundle - and only
    /// then, so no metadata is ever recorded for a backup that never
    /// happened.
    ///
    /// Returns [`BackupOutcome::Unchanged`] when `skip_unchanged` is set
    /// and neither commits nor references changed.
    pub fn perform(
        &self,
        bundle: &Path,
        stored_bundle: &Path,
        metadata_file: Option<&Path>,
        timestamped: bool,
        skip_unchanged: bool,
    ) -> Result<BackupOutcome, BackupError> {
        // In mirror mode the repository follows its remotes; refresh first
        if self.mirror {
            self.gateway.update_remotes(&self.repo)?;
        }

        let bundle = if timestamped {
            let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            timestamped_path(bundle, &timestamp)
        } else {
            bundle.to_path_buf()
        };
        let bundle = std::path::absolute(&bundle)?;
        let stored_bundle = std::path::absolute(stored_bundle)?;

        let Some(metadata) =
            self.create_incremental_bundle(&bundle, &stored_bundle, metadata_file, skip_unchanged)?
        else {
            return Ok(BackupOutcome::Unchanged);
        };

        // Save the bundle and its metadata as reference points for the
        // next incremental backup
        if bundle != stored_bundle {
            std::fs::copy(&bundle, &stored_bundle)?;
        }
        if let Some(metadata_file) = metadata_file {
            metadata.store(metadata_file)?;
            output::print(
                format!("Written backup metadata to {}", metadata_file.display()),
                self.verbosity,
            );
        }

        Ok(BackupOutcome::Written { bundle })
    }

    /// Compute and write the incremental bundle.
    ///
    /// Returns the metadata to persist, or `None` when nothing was
    /// written because nothing changed.
    fn create_incremental_bundle(
        &self,
        bundle: &Path,
        stored_bundle: &Path,
        metadata_file: Option<&Path>,
        skip_unchanged: bool,
    ) -> Result<Option<Metadata>, BackupError> {
        let metadata = self.load_metadata(metadata_file)?;

        // Every local reference goes into the bundle. This not only adds
        // all commits reachable since the previous backup, it records
        // *all* references, so a restore can correctly update branch
        // pointers that moved without new commits. Tag backup is gated
        // entirely on metadata participation.
        let selector = RefSelector::heads_with_tags(metadata.is_some());
        let mut refs_to_include = self.gateway.list_refs(&self.repo, selector)?;

        // Tags are write-once (see `git tag`, "On Retagging"), so only
        // new tags are included. The filter looks at all references, but
        // recording anything except tags in the metadata would be a bug.
        if let Some(metadata) = &metadata {
            refs_to_include.retain(|git_ref| !metadata.knows_tag(git_ref.name()));
        }

        // The previous bundle's references are the frontier the new
        // bundle is incremental against
        let previous_refs = if stored_bundle.exists() {
            self.gateway.list_bundle_refs(stored_bundle, selector)?
        } else {
            Vec::new()
        };
        let frontier: Vec<Oid> = previous_refs.iter().map(|r| r.oid().clone()).collect();

        let include_oids: Vec<Oid> = refs_to_include.iter().map(|r| r.oid().clone()).collect();
        let new_commits = self
            .gateway
            .rev_list(&self.repo, &include_oids, &frontier)?;

        if new_commits.is_empty() {
            if skip_unchanged {
                // No new commits. If the reference set is unchanged too,
                // there is nothing worth writing.
                let previous: HashSet<&GitRef> = previous_refs.iter().collect();
                let current: HashSet<&GitRef> = refs_to_include.iter().collect();
                if previous == current {
                    output::print(
                        "No changes detected. Not creating a new bundle, as requested.",
                        self.verbosity,
                    );
                    return Ok(None);
                }
            } else {
                // A references-only bundle is valid but easy to misuse:
                // restoring it without special handling is a no-op.
                output::warn(
                    format!(
                        "Bundle {} will not contain any new commits. Restoring this bundle will \
                         be a no-op and will not update any references. To force restoring the \
                         bundle anyway, pass the filename of the exact bundle (as opposed to the \
                         directory containing it) and --force when restoring.",
                        bundle.display()
                    ),
                    self.verbosity,
                );
            }
        }

        // Each included reference's own commit must be present as well,
        // or the reference could not be recorded in the bundle
        let mut all_commits_to_include = new_commits;
        all_commits_to_include.extend(include_oids.iter().cloned());

        // Candidate exclusions: the frontier, plus the first parent of
        // every included reference's commit. Keep a candidate only if its
        // full ancestry is disjoint from the commits to include - the
        // tightest restriction that never cuts required history.
        let mut candidates: Vec<Oid> = Vec::new();
        let mut seen: HashSet<Oid> = HashSet::new();
        for oid in frontier {
            if seen.insert(oid.clone()) {
                candidates.push(oid);
            }
        }
        for git_ref in &refs_to_include {
            if let Some(parent) = self.gateway.first_parent(&self.repo, git_ref.oid())? {
                if seen.insert(parent.clone()) {
                    candidates.push(parent);
                }
            }
        }

        let mut exclusions: Vec<Oid> = Vec::new();
        for candidate in candidates {
            let reachable =
                self.gateway
                    .rev_list(&self.repo, std::slice::from_ref(&candidate), &[])?;
            if reachable.is_disjoint(&all_commits_to_include) {
                exclusions.push(candidate);
            }
        }

        if let Some(parent) = bundle.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let include_names: Vec<RefName> = refs_to_include
            .iter()
            .map(|r| r.name().clone())
            .collect();
        self.gateway
            .create_bundle(&self.repo, bundle, &include_names, &exclusions)?;

        let mut metadata = metadata.unwrap_or_default();
        metadata.record_tags(
            refs_to_include
                .iter()
                .filter(|r| r.name().is_tag())
                .map(|r| r.name().clone()),
        );
        Ok(Some(metadata))
    }

    /// Read the metadata file, defaulting to an empty record when the
    /// file does not exist yet. `None` means metadata is not in use.
    fn load_metadata(
        &self,
        metadata_file: Option<&Path>,
    ) -> Result<Option<Metadata>, BackupError> {
        let Some(path) = metadata_file else {
            return Ok(None);
        };
        match Metadata::load(path)? {
            Some(metadata) => {
                output::print(
                    format!("Using previous backup metadata from {}.", path.display()),
                    self.verbosity,
                );
                Ok(Some(metadata))
            }
            None => {
                output::print(
                    format!(
                        "No previous backup metadata found at {}. Using empty metadata.",
                        path.display()
                    ),
                    self.verbosity,
                );
                Ok(Some(Metadata::new()))
            }
        }
    }
}

/// Insert a timestamp before the final filename suffix, producing a
/// unique, sortable series of bundle files.
fn timestamped_path(bundle: &Path, timestamp: &str) -> PathBuf {
    let stem = bundle
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("backup");
    let name = match bundle.extension().and_then(|ext| ext.to_str()) {
        Some(extension) => format!("{stem}.{timestamp}.{extension}"),
        None => format!("{stem}.{timestamp}"),
    };
    bundle.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{MockGit, MockRepo};

    fn oid(hex: &str) -> Oid {
        Oid::new(hex).unwrap()
    }

    fn branch(name: &str) -> RefName {
        RefName::for_branch(name).unwrap()
    }

    fn tag(name: &str) -> RefName {
        RefName::new(format!("refs/tags/{name}")).unwrap()
    }

    /// A workspace directory that exists and is non-empty, so the
    /// source-bootstrap check accepts it, plus a bundle path inside it.
    struct Workspace {
        dir: tempfile::TempDir,
        repo: PathBuf,
        bundle: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let repo = dir.path().join("repo");
            std::fs::create_dir(&repo).unwrap();
            std::fs::write(repo.join(".git"), "gitdir: elsewhere\n").unwrap();
            let bundle = dir.path().join("backup.bundle");
            Self { dir, repo, bundle }
        }

        fn metadata_file(&self) -> PathBuf {
            self.dir.path().join("backup.metadata")
        }
    }

    /// main at c3 over the linear history c1 <- c2 <- c3.
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

    fn backup<'a>(git: &'a MockGit, workspace: &Workspace) -> Backup<'a> {
        Backup::new(git, &workspace.repo, None, false, Verbosity::Quiet).unwrap()
    }

    #[test]
    fn full_backup_includes_all_references_without_exclusions() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (mut repo, c1, _, _) = linear_repo();
        repo.set_ref(branch("stale"), c1);
        git.add_repo(&workspace.repo, repo);

        let outcome = backup(&git, &workspace)
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();
        assert!(matches!(outcome, BackupOutcome::Written { .. }));

        let created = git.created_bundles();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].include, vec![branch("main"), branch("stale")]);
        // Nothing can be excluded: every candidate ancestry overlaps the
        // commits that must be included
        assert!(created[0].exclude.is_empty());

        let bundle = git.bundle(created[0].bundle.clone()).unwrap();
        assert_eq!(bundle.commits.len(), 3);
        assert!(bundle.prerequisites.is_empty());
    }

    #[test]
    fn incremental_backup_excludes_the_frontier() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (repo, _, _, c3) = linear_repo();
        git.add_repo(&workspace.repo, repo);
        let builder = backup(&git, &workspace);

        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();

        // New commit c4 on main
        let c4 = oid("aaaa04");
        let mut repo = git.repo(&workspace.repo);
        repo.add_commit(&c4, &[c3.clone()]);
        repo.set_ref(branch("main"), c4.clone());
        git.add_repo(&workspace.repo, repo);

        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();

        let created = git.created_bundles();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].exclude, vec![c3.clone()]);

        let bundle = git.bundle(created[1].bundle.clone()).unwrap();
        assert_eq!(bundle.commits.keys().collect::<Vec<_>>(), vec![&c4]);
        assert_eq!(bundle.prerequisites, HashSet::from([c3]));
    }

    #[test]
    fn unchanged_references_are_still_included() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (mut repo, c1, _, c3) = linear_repo();
        repo.set_ref(branch("stale"), c1);
        git.add_repo(&workspace.repo, repo);
        let builder = backup(&git, &workspace);

        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();

        let c4 = oid("aaaa04");
        let mut repo = git.repo(&workspace.repo);
        repo.add_commit(&c4, &[c3]);
        repo.set_ref(branch("main"), c4);
        git.add_repo(&workspace.repo, repo);

        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();

        // The untouched branch is still named in the incremental bundle
        let created = git.created_bundles();
        assert!(created[1].include.contains(&branch("stale")));
        assert!(created[1].include.contains(&branch("main")));
    }

    #[test]
    fn rewound_references_never_cut_required_history() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (repo, c1, c2, c3) = linear_repo();
        git.add_repo(&workspace.repo, repo);
        let builder = backup(&git, &workspace);

        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();

        // A new branch appears at an *old* commit; no new commits exist
        let mut repo = git.repo(&workspace.repo);
        repo.set_ref(branch("dev"), c2.clone());
        git.add_repo(&workspace.repo, repo);

        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();

        // Excluding the frontier (c3) or dev's parent (c1's child c2)
        // would cut commits the new reference needs; only c1 is safe
        let created = git.created_bundles();
        assert_eq!(created[1].exclude, vec![c1]);
        let bundle = git.bundle(created[1].bundle.clone()).unwrap();
        let mut contained: Vec<&Oid> = bundle.commits.keys().collect();
        contained.sort();
        assert_eq!(contained, vec![&c2, &c3]);
    }

    #[test]
    fn tags_are_only_backed_up_with_metadata() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (mut repo, _, _, c3) = linear_repo();
        repo.set_ref(tag("v1"), c3);
        git.add_repo(&workspace.repo, repo);
        let builder = backup(&git, &workspace);

        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();
        assert_eq!(git.created_bundles()[0].include, vec![branch("main")]);

        let metadata_file = workspace.metadata_file();
        builder
            .perform(
                &workspace.bundle,
                &workspace.bundle,
                Some(&metadata_file),
                false,
                false,
            )
            .unwrap();
        let include = &git.created_bundles()[1].include;
        assert!(include.contains(&tag("v1")));

        let metadata = Metadata::load(&metadata_file).unwrap().unwrap();
        assert!(metadata.knows_tag(&tag("v1")));
    }

    #[test]
    fn known_tags_are_never_reevaluated() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (mut repo, _, _, c3) = linear_repo();
        repo.set_ref(tag("v1"), c3.clone());
        git.add_repo(&workspace.repo, repo);
        let builder = backup(&git, &workspace);
        let metadata_file = workspace.metadata_file();

        builder
            .perform(
                &workspace.bundle,
                &workspace.bundle,
                Some(&metadata_file),
                false,
                false,
            )
            .unwrap();

        // New commits reachable from the tag do not bring it back
        let c4 = oid("aaaa04");
        let mut repo = git.repo(&workspace.repo);
        repo.add_commit(&c4, &[c3]);
        repo.set_ref(branch("main"), c4);
        git.add_repo(&workspace.repo, repo);

        builder
            .perform(
                &workspace.bundle,
                &workspace.bundle,
                Some(&metadata_file),
                false,
                false,
            )
            .unwrap();
        let include = &git.created_bundles()[1].include;
        assert!(!include.iter().any(|name| name.is_tag()));
    }

    mod skip_unchanged {
        use super::*;

        fn run(builder: &Backup<'_>, workspace: &Workspace, metadata: Option<&Path>) -> BackupOutcome {
            builder
                .perform(&workspace.bundle, &workspace.bundle, metadata, false, true)
                .unwrap()
        }

        #[test]
        fn identical_state_writes_nothing() {
            let workspace = Workspace::new();
            let git = MockGit::new();
            let (repo, ..) = linear_repo();
            git.add_repo(&workspace.repo, repo);
            let builder = backup(&git, &workspace);

            assert!(matches!(
                run(&builder, &workspace, None),
                BackupOutcome::Written { .. }
            ));
            assert_eq!(run(&builder, &workspace, None), BackupOutcome::Unchanged);
            assert_eq!(git.created_bundles().len(), 1);
        }

        #[test]
        fn new_commit_breaks_the_noop() {
            let workspace = Workspace::new();
            let git = MockGit::new();
            let (repo, _, _, c3) = linear_repo();
            git.add_repo(&workspace.repo, repo);
            let builder = backup(&git, &workspace);
            run(&builder, &workspace, None);

            let c4 = oid("aaaa04");
            let mut repo = git.repo(&workspace.repo);
            repo.add_commit(&c4, &[c3]);
            repo.set_ref(branch("main"), c4);
            git.add_repo(&workspace.repo, repo);

            assert!(matches!(
                run(&builder, &workspace, None),
                BackupOutcome::Written { .. }
            ));
        }

        #[test]
        fn new_branch_at_old_commit_breaks_the_noop() {
            let workspace = Workspace::new();
            let git = MockGit::new();
            let (repo, _, c2, _) = linear_repo();
            git.add_repo(&workspace.repo, repo);
            let builder = backup(&git, &workspace);
            run(&builder, &workspace, None);

            let mut repo = git.repo(&workspace.repo);
            repo.set_ref(branch("dev"), c2);
            git.add_repo(&workspace.repo, repo);

            assert!(matches!(
                run(&builder, &workspace, None),
                BackupOutcome::Written { .. }
            ));
        }

        #[test]
        fn rewound_branch_breaks_the_noop() {
            let workspace = Workspace::new();
            let git = MockGit::new();
            let (repo, _, c2, _) = linear_repo();
            git.add_repo(&workspace.repo, repo);
            let builder = backup(&git, &workspace);
            run(&builder, &workspace, None);

            let mut repo = git.repo(&workspace.repo);
            repo.set_ref(branch("main"), c2);
            git.add_repo(&workspace.repo, repo);

            assert!(matches!(
                run(&builder, &workspace, None),
                BackupOutcome::Written { .. }
            ));
        }

        #[test]
        fn removed_branch_breaks_the_noop() {
            let workspace = Workspace::new();
            let git = MockGit::new();
            let (mut repo, _, _, c3) = linear_repo();
            repo.set_ref(branch("dev"), c3);
            git.add_repo(&workspace.repo, repo);
            let builder = backup(&git, &workspace);
            run(&builder, &workspace, None);

            let mut repo = git.repo(&workspace.repo);
            repo.refs.remove(&branch("dev"));
            git.add_repo(&workspace.repo, repo);

            assert!(matches!(
                run(&builder, &workspace, None),
                BackupOutcome::Written { .. }
            ));
        }

        #[test]
        fn new_tag_breaks_the_noop_only_under_metadata() {
            let workspace = Workspace::new();
            let git = MockGit::new();
            let (repo, _, _, c3) = linear_repo();
            git.add_repo(&workspace.repo, repo);
            let builder = backup(&git, &workspace);
            let metadata_file = workspace.metadata_file();

            run(&builder, &workspace, Some(&metadata_file));

            let mut repo = git.repo(&workspace.repo);
            repo.set_ref(tag("v1"), c3);
            git.add_repo(&workspace.repo, repo);

            // Without metadata the tag is invisible and nothing changed
            assert_eq!(run(&builder, &workspace, None), BackupOutcome::Unchanged);
            // With metadata the new tag forces a bundle
            assert!(matches!(
                run(&builder, &workspace, Some(&metadata_file)),
                BackupOutcome::Written { .. }
            ));
        }
    }

    #[test]
    fn failed_bundle_creation_persists_nothing() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (mut repo, _, _, c3) = linear_repo();
        repo.set_ref(tag("v1"), c3);
        git.add_repo(&workspace.repo, repo);
        let builder = backup(&git, &workspace);
        let metadata_file = workspace.metadata_file();
        let stored = workspace.dir.path().join("stored.bundle");

        git.fail_next_bundle_create("fatal: disk full");
        let result = builder.perform(
            &workspace.bundle,
            &stored,
            Some(&metadata_file),
            false,
            false,
        );
        assert!(matches!(result, Err(BackupError::Gateway(_))));
        assert!(!metadata_file.exists());
        assert!(!stored.exists());
    }

    #[test]
    fn written_bundle_is_copied_to_the_stored_location() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (repo, ..) = linear_repo();
        git.add_repo(&workspace.repo, repo);
        let builder = backup(&git, &workspace);
        let stored = workspace.dir.path().join("stored.bundle");

        builder
            .perform(&workspace.bundle, &stored, None, false, false)
            .unwrap();
        assert!(workspace.bundle.exists());
        assert!(stored.exists());
    }

    #[test]
    fn mirror_mode_updates_remotes_first() {
        let workspace = Workspace::new();
        let git = MockGit::new();
        let (repo, ..) = linear_repo();
        git.add_repo(&workspace.repo, repo);

        let builder = Backup::new(&git, &workspace.repo, None, true, Verbosity::Quiet).unwrap();
        builder
            .perform(&workspace.bundle, &workspace.bundle, None, false, false)
            .unwrap();
        assert_eq!(git.remote_updates(), vec![workspace.repo.clone()]);
    }

    #[test]
    fn missing_source_without_remote_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let git = MockGit::new();
        let missing = dir.path().join("not-there");

        let result = Backup::new(&git, &missing, None, false, Verbosity::Quiet);
        assert!(matches!(result, Err(BackupError::MissingRemote(_))));
    }

    #[test]
    fn missing_source_is_cloned_from_the_remote() {
        let dir = tempfile::tempdir().unwrap();
        let git = MockGit::new();
        let (repo, ..) = linear_repo();
        let remote = dir.path().join("origin");
        git.add_repo(&remote, repo);

        let target = dir.path().join("repo");
        let remote_str = remote.to_string_lossy().into_owned();
        Backup::new(&git, &target, Some(&remote_str), false, Verbosity::Quiet).unwrap();
        assert!(git.repo(&target).refs.contains_key(&branch("main")));
    }

    #[test]
    fn timestamp_is_inserted_before_the_suffix() {
        let path = timestamped_path(Path::new("/backups/repo.bundle"), "2026-08-07T12:00:00Z");
        assert_eq!(
            path,
            Path::new("/backups/repo.2026-08-07T12:00:00Z.bundle")
        );

        let bare = timestamped_path(Path::new("/backups/repo"), "2026-08-07T12:00:00Z");
        assert_eq!(bare, Path::new("/backups/repo.2026-08-07T12:00:00Z"));
    }
}
