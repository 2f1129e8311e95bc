//! create command - build an (incremental) backup bundle

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::backup::{Backup, BackupOutcome};
use crate::cli::Context;
use crate::git::Git;
use crate::ui::output;

/// Arguments of the create command.
#[derive(Debug)]
pub struct CreateArgs {
    pub repo: PathBuf,
    pub bundle: PathBuf,
    pub remote: Option<String>,
    pub previous_bundle_location: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub mirror: bool,
    pub timestamp: bool,
    pub skip_unchanged: bool,
}

/// Create a backup bundle from a repository.
pub fn create(ctx: &Context, args: CreateArgs) -> Result<()> {
    let gateway = Git::new(ctx.verbosity);

    let backup = Backup::new(
        &gateway,
        &args.repo,
        args.remote.as_deref(),
        args.mirror,
        ctx.verbosity,
    )
    .context("Failed to prepare the source repository")?;

    let stored_bundle = args
        .previous_bundle_location
        .clone()
        .unwrap_or_else(|| args.bundle.clone());

    let outcome = backup
        .perform(
            &args.bundle,
            &stored_bundle,
            args.metadata.as_deref(),
            args.timestamp,
            args.skip_unchanged,
        )
        .context("Failed to create the backup bundle")?;

    if let BackupOutcome::Written { bundle } = outcome {
        output::print(
            format!("Created backup bundle {}", bundle.display()),
            ctx.verbosity,
        );
    }
    Ok(())
}
