//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Diagnostics are an explicit value, not ambient state: a [`Verbosity`]
//! is built once from the command-line flags and handed into whatever
//! needs to report progress. Progress goes to stdout; warnings, errors
//! and call traces go to stderr, so piped bundle listings stay clean.

use std::fmt::Display;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Minimal output: errors only
    Quiet,
    /// Standard progress output
    Normal,
    /// Verbose output including underlying git calls
    Debug,
}

impl Verbosity {
    /// Derive the verbosity from the global command-line flags. Quiet
    /// wins over verbose when both are given.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Debug,
            (false, false) => Verbosity::Normal,
        }
    }

    fn shows_progress(self) -> bool {
        self > Verbosity::Quiet
    }

    fn shows_debug(self) -> bool {
        self == Verbosity::Debug
    }
}

/// Print a progress message (suppressed in quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_progress() {
        println!("{message}");
    }
}

/// Print a debug trace (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_debug() {
        eprintln!("[debug] {message}");
    }
}

/// Print a warning (suppressed in quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_progress() {
        eprintln!("warning: {message}");
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {message}");
}
