//! git
//!
//! Single interface for all git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to the version-control tool. The
//! backup builder and restore reconciler depend on the [`Gateway`] trait
//! alone; [`Git`] implements it for real (libgit2 for repository-local
//! work, the `git` CLI for bundle transport) and [`MockGit`] implements
//! it in memory for tests.
//!
//! # Responsibilities
//!
//! - Reference listing for repositories and bundle files
//! - Ancestry-exclusion queries, parent and membership lookups
//! - Bundle creation, verification and (dry-run) application
//! - Checkout state: current branch, worktree cleanliness, detach, reset
//! - Repository bootstrap: init, clone, mirror remote update

mod interface;
mod mock;
mod traits;

pub use interface::Git;
pub use mock::{CreatedBundle, FetchRecord, MockBundle, MockGit, MockRepo};
pub use traits::{
    absolute_path, CheckedOutBranch, CloneMode, FetchOptions, Gateway, GatewayError, RefSelector,
};
