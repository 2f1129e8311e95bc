//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Map the typed error chain onto process exit codes
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! the backup builder or restore reconciler; it performs no repository
//! work of its own.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::Result;

use crate::backup::BackupError;
use crate::git::GatewayError;
use crate::restore::RestoreError;
use crate::ui::Verbosity;

/// Shared context for command handlers.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    /// Output verbosity, threaded into everything that reports progress
    pub verbosity: Verbosity,
}

/// Defined non-zero process exit codes.
///
/// Argument errors exit with 2, which clap uses on its own for usage
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// No bundles could be restored.
    NothingRestored = 3,
    /// A remote repository to clone the source from was required.
    MissingRemote = 4,
    /// An unexpected error occurred in communication with git.
    GitCommunication = 5,
    /// A call to git failed.
    GitCallFailed = 6,
    /// An unexpected error occurred.
    Unexpected = 100,
}

/// Map an error chain onto the exit code of its most specific cause.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(restore) = cause.downcast_ref::<RestoreError>() {
            if matches!(restore, RestoreError::NothingRestored) {
                return ExitCode::NothingRestored;
            }
        }
        if let Some(backup) = cause.downcast_ref::<BackupError>() {
            if matches!(backup, BackupError::MissingRemote(_)) {
                return ExitCode::MissingRemote;
            }
        }
        if let Some(gateway) = cause.downcast_ref::<GatewayError>() {
            return match gateway {
                GatewayError::Protocol(_) => ExitCode::GitCommunication,
                GatewayError::CallFailed { .. } => ExitCode::GitCallFailed,
                _ => ExitCode::Unexpected,
            };
        }
    }
    ExitCode::Unexpected
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let ctx = Context {
        verbosity: Verbosity::from_flags(cli.quiet, cli.verbose),
    };

    commands::dispatch(cli.command, &ctx)
}
