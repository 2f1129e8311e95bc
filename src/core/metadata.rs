//! core::metadata
//!
//! The persisted record accompanying a backup chain.
//!
//! # Design
//!
//! The metadata file is the only cross-invocation state the backup side
//! keeps: a version number and the set of tag references that have already
//! been captured. Tags are write-once by Git convention (see `git tag`,
//! "On Retagging"), so a tag that has been backed up once never needs to be
//! looked at again.
//!
//! # Versioning
//!
//! Only [`Metadata::CURRENT_VERSION`] is accepted. Any other version, and
//! any malformed shape, is rejected outright - interpreting data written by
//! a different version of this tool is how backups get silently corrupted,
//! so validation fails closed with no migration attempted.
//!
//! # Lifecycle
//!
//! Read (or defaulted to empty) at the start of a backup, grown in memory
//! while the bundle is computed, written back only after the bundle file
//! itself is confirmed on disk.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::RefName;

/// Errors from reading or writing a metadata file.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The file exists but does not parse as a metadata record.
    #[error("the metadata file is invalid: {0}")]
    Malformed(String),

    /// The file parses but carries an unsupported version.
    #[error("the metadata file is invalid: only version {supported} is supported, found {found}")]
    UnsupportedVersion {
        /// The version found in the file
        found: u32,
        /// The single supported version
        supported: u32,
    },

    /// The file could not be read or written.
    #[error("metadata i/o error: {0}")]
    Io(#[from] io::Error),
}

/// The contents of a metadata file.
///
/// # Example
///
/// ```
/// use bundlework::core::metadata::Metadata;
/// use bundlework::core::types::RefName;
///
/// let mut metadata = Metadata::new();
/// let tag = RefName::new("refs/tags/v1").unwrap();
/// assert!(!metadata.knows_tag(&tag));
///
/// metadata.record_tags([tag.clone()]);
/// assert!(metadata.knows_tag(&tag));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    version: u32,

    #[serde(default)]
    known_tag_refs: BTreeSet<RefName>,
}

impl Metadata {
    /// The single supported version of the metadata file.
    pub const CURRENT_VERSION: u32 = 1;

    /// Create an empty metadata record at the current version.
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            known_tag_refs: BTreeSet::new(),
        }
    }

    /// Read a metadata record from a file.
    ///
    /// Returns `Ok(None)` if the file does not exist; absence is
    /// equivalent to an empty record.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::Malformed`] if the contents do not parse
    /// - [`MetadataError::UnsupportedVersion`] on a version mismatch
    pub fn load(path: &Path) -> Result<Option<Self>, MetadataError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let metadata: Self =
            serde_json::from_str(&contents).map_err(|err| MetadataError::Malformed(err.to_string()))?;

        if metadata.version != Self::CURRENT_VERSION {
            return Err(MetadataError::UnsupportedVersion {
                found: metadata.version,
                supported: Self::CURRENT_VERSION,
            });
        }

        Ok(Some(metadata))
    }

    /// Write the metadata record to a file.
    pub fn store(&self, path: &Path) -> Result<(), MetadataError> {
        let contents =
            serde_json::to_string(self).map_err(|err| MetadataError::Malformed(err.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Whether a tag reference has already been captured by an earlier
    /// backup.
    pub fn knows_tag(&self, name: &RefName) -> bool {
        self.known_tag_refs.contains(name)
    }

    /// Record tag references as captured. The known set only ever grows.
    pub fn record_tags(&mut self, tags: impl IntoIterator<Item = RefName>) {
        self.known_tag_refs.extend(tags);
    }

    /// The set of tag references captured so far.
    pub fn known_tag_refs(&self) -> &BTreeSet<RefName> {
        &self.known_tag_refs
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
