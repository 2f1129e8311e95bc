//! restore command - apply one or more bundles to a repository

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::lock::{LockError, RestoreLock};
use crate::git::Git;
use crate::restore::{Restoration, RestoreError, RestoreOptions};
use crate::ui::output;

/// Arguments of the restore command.
#[derive(Debug)]
pub struct RestoreArgs {
    pub repo: PathBuf,
    pub bundle: PathBuf,
    pub bare: bool,
    pub force: bool,
    pub strict_order: bool,
    pub prune: bool,
    pub delete_files: bool,
    pub lock_file: Option<PathBuf>,
}

/// Restore bundles into a repository, optionally guarded by a lock file.
pub fn restore(ctx: &Context, args: RestoreArgs) -> Result<()> {
    match &args.lock_file {
        Some(lock_path) => match RestoreLock::acquire(lock_path) {
            Ok(_lock) => run_restore(ctx, &args),
            Err(LockError::AlreadyHeld { path }) => {
                // Another restore is running against this repository;
                // backing off politely is the correct outcome
                output::warn(
                    format!(
                        "Could not obtain lock file {}. Not restoring anything.",
                        path.display()
                    ),
                    ctx.verbosity,
                );
                Ok(())
            }
            Err(err) => Err(err).context("Failed to create the lock file"),
        },
        None => run_restore(ctx, &args),
    }
}

fn run_restore(ctx: &Context, args: &RestoreArgs) -> Result<()> {
    let gateway = Git::new(ctx.verbosity);
    let options = RestoreOptions {
        bare: args.bare,
        force: args.force,
        prune: args.prune,
        delete_files: args.delete_files,
    };

    let mut restoration = Restoration::new(&gateway, &args.repo, options, ctx.verbosity)
        .context("Failed to prepare the target repository")?;
    let found = restoration
        .restore_bundles(&args.bundle, args.strict_order)
        .context("Failed while restoring bundles")?;
    let restored = restoration.restored_count();

    if restored == 0 {
        return Err(RestoreError::NothingRestored.into());
    }
    if restored != found {
        output::warn(
            format!("{} bundles could not be restored.", found - restored),
            ctx.verbosity,
        );
    }
    output::print(format!("Restored {restored} bundles"), ctx.verbosity);
    Ok(())
}
