//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `-v` / `--verbose`: Debug-level output, including underlying git calls
//! - `-q` / `--quiet`: Minimal output

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Perform git backups using git bundle.
#[derive(Parser, Debug)]
#[command(name = "bb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Provide debug-level output, including the underlying calls to git
    /// and the output of any such calls that failed
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an (incremental) backup of a repository to a bundle file
    #[command(
        name = "create",
        long_about = "Create an (incremental) backup of a repository to a bundle file.\n\n\
            The bundle contains every branch of the repository plus all commits that are \
            new compared to the previous bundle, so that a chain of bundles reconstructs \
            the repository exactly. Tags are included when a metadata file is used.",
        after_help = "\
WORKFLOW EXAMPLES:
    # One-shot full backup
    bb create ./repo backup.bundle

    # Incremental series with timestamped filenames and tag tracking
    bb create ./repo backups/repo.bundle \\
        -p latest.bundle -m backup.metadata -t -s

    # Back up a mirror that follows a remote
    bb create ./mirror backup.bundle -r https://example.com/repo.git -M"
    )]
    Create {
        /// The repository to backup from
        repo: PathBuf,

        /// The bundle file to create
        bundle: PathBuf,

        /// The remote repository to clone if the repository points to an
        /// empty or non-existent directory
        #[arg(short, long)]
        remote: Option<String>,

        /// The location to store the latest bundle, used as the reference
        /// point for incremental backups (defaults to the created bundle)
        #[arg(short = 'p', long)]
        previous_bundle_location: Option<PathBuf>,

        /// Read and write backup metadata at this file; in particular,
        /// tags will only be backed up if a metadata file is used
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Assume the repository to be a mirror clone and update its
        /// remotes (with pruning) before creating the backup
        #[arg(short = 'M', long)]
        mirror: bool,

        /// Add a timestamp (second resolution) to the name of the created
        /// bundle file
        #[arg(short, long)]
        timestamp: bool,

        /// Do not create a bundle if it would contain no changes. A
        /// bundle with changed references but no new commits is still
        /// created, without a warning
        #[arg(short, long)]
        skip_unchanged: bool,
    },

    /// Restore the contents of one or more bundle files to a repository
    #[command(
        name = "restore",
        long_about = "Restore the contents of one or more bundle files to a repository.\n\n\
            When a directory is given, all *.bundle files in it are attempted repeatedly \
            until no further bundle can be restored, so the filename order of an \
            incremental chain does not matter. Bundles that would rewind branches or \
            touch a dirty checkout are refused unless --force is given.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Restore a whole directory of incremental bundles
    bb restore ./repo ./bundles

    # Continuous mirroring driven from cron
    bb restore ./repo ./incoming -s -f -d -l restore.lock

    # Recover a single bundle, correcting reference pointers
    bb restore ./repo exact.bundle -f"
    )]
    Restore {
        /// The repository to restore data to
        repo: PathBuf,

        /// The bundle file to restore. May be a directory containing
        /// bundle files (*.bundle)
        bundle: PathBuf,

        /// If a repository is created to restore to, make it a bare
        /// repository
        #[arg(short, long)]
        bare: bool,

        /// Force updates to all branches, even non-fast-forward updates
        /// or updates to the checked out branch. With a single bundle
        /// file, also re-apply a bundle whose commits are all present
        #[arg(short, long)]
        force: bool,

        /// Process the bundles of a directory strictly in filename
        /// order, stopping at the first failure and applying --force per
        /// bundle as if each file was passed directly
        #[arg(short, long)]
        strict_order: bool,

        /// Remove any branches that are not in the bundle
        #[arg(short, long)]
        prune: bool,

        /// Delete bundle files from which data has been restored
        #[arg(short, long)]
        delete_files: bool,

        /// Create a lock file while restoring. If the lock file already
        /// exists, exit with exit code 0 instead
        #[arg(short, long)]
        lock_file: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completion {
        /// The shell to generate completions for
        shell: Shell,
    },
}

/// Shells supported by the completion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
