//! Bundlework - incremental git backups using git bundle
//!
//! Bundlework creates and restores incremental backups of git
//! repositories as portable bundle files. The primary use case is
//! environments with strictly separated networks, where data can be
//! carried from one side to the other but not back: every bundle is
//! self-contained, restorable independently, and a directory of bundles
//! converges to the full repository no matter in which order they were
//! produced or named.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates)
//! - [`backup`] - Incremental bundle builder
//! - [`restore`] - Restore reconciler with fixed-point directory sweeps
//! - [`core`] - Domain types, metadata record, restore lock
//! - [`git`] - Single gateway for all git operations
//! - [`ui`] - Output utilities and the explicit verbosity sink
//!
//! # Correctness Invariants
//!
//! 1. A bundle always names every reference of its repository, so a
//!    restore can reconcile branch pointers even without new commits
//! 2. Exclusions never cut history a recorded reference still needs
//! 3. Metadata is persisted only after its bundle is confirmed written
//! 4. A restore never destroys working-tree data unless forced

pub mod backup;
pub mod cli;
pub mod core;
pub mod git;
pub mod restore;
pub mod ui;
