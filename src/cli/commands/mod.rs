//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Builds the real gateway and the backup/restore context objects
//! 3. Formats and displays output
//!
//! Handlers do NOT talk to git directly; all repository work flows
//! through [`crate::git::Gateway`].

mod completion;
mod create;
mod restore;

pub use completion::completion;
pub use create::{create, CreateArgs};
pub use restore::{restore, RestoreArgs};

use anyhow::Result;

use crate::cli::args::Command;
use crate::cli::Context;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Create {
            repo,
            bundle,
            remote,
            previous_bundle_location,
            metadata,
            mirror,
            timestamp,
            skip_unchanged,
        } => create(
            ctx,
            CreateArgs {
                repo,
                bundle,
                remote,
                previous_bundle_location,
                metadata,
                mirror,
                timestamp,
                skip_unchanged,
            },
        ),
        Command::Restore {
            repo,
            bundle,
            bare,
            force,
            strict_order,
            prune,
            delete_files,
            lock_file,
        } => restore(
            ctx,
            RestoreArgs {
                repo,
                bundle,
                bare,
                force,
                strict_order,
                prune,
                delete_files,
                lock_file,
            },
        ),
        Command::Completion { shell } => completion(shell),
    }
}
