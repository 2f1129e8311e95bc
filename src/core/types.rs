//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated fully qualified Git reference name
//! - [`GitRef`] - An immutable `(oid, name)` reference snapshot
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use bundlework::core::types::{GitRef, Oid, RefName};
//!
//! // Valid constructions
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let name = RefName::new("refs/heads/main").unwrap();
//! let git_ref = GitRef::new(oid, name);
//! assert!(git_ref.name().is_branch());
//!
//! // Invalid constructions fail at creation time
//! assert!(Oid::new("not-a-sha").is_err());
//! assert!(RefName::new("refs/heads/bad..name").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of branch references.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Prefix of tag references.
pub const TAGS_PREFIX: &str = "refs/tags/";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("unparseable reference line: {0}")]
    UnparseableRefLine(String),
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency. Abbreviated ids are
/// accepted (down to 4 hex digits), since the gateway may hand back
/// shortened forms in diagnostics.
///
/// # Example
///
/// ```
/// use bundlework::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the value is not 4-64 hex digits.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_lowercase();
        if oid.len() < 4 || oid.len() > 64 {
            return Err(TypeError::InvalidOid(format!(
                "object id must be 4-64 hex digits, got {} characters",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(format!(
                "object id must be hexadecimal: {oid}"
            )));
        }
        Ok(Self(oid))
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get an abbreviated form of the object id.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, fully qualified Git reference name.
///
/// Reference names must live under `refs/` and conform to Git's refname
/// rules (see `git check-ref-format`):
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - No component may start with `.` or end with `.lock`
/// - Cannot end with `/` or `.`
///
/// # Example
///
/// ```
/// use bundlework::core::types::RefName;
///
/// let branch = RefName::new("refs/heads/feature/login").unwrap();
/// assert!(branch.is_branch());
/// assert_eq!(branch.branch_name(), Some("feature/login"));
///
/// let tag = RefName::new("refs/tags/v1.0").unwrap();
/// assert!(tag.is_tag());
///
/// assert!(RefName::new("main").is_err());
/// assert!(RefName::new("refs/heads/has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated reference name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's
    /// refname rules or does not live under `refs/`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Build the branch reference name for a short branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` for invalid branch names.
    pub fn for_branch(branch: &str) -> Result<Self, TypeError> {
        Self::new(format!("{HEADS_PREFIX}{branch}"))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if !name.starts_with("refs/") {
            return Err(TypeError::InvalidRefName(format!(
                "reference name must start with 'refs/': {name}"
            )));
        }
        if name.ends_with('/') || name.ends_with('.') {
            return Err(TypeError::InvalidRefName(
                "reference name cannot end with '/' or '.'".into(),
            ));
        }
        if name.contains("..") || name.contains("@{") || name.contains("//") {
            return Err(TypeError::InvalidRefName(format!(
                "reference name cannot contain '..', '@{{' or '//': {name}"
            )));
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidRefName(format!(
                    "reference name cannot contain '{c}'"
                )));
            }
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidRefName(
                "reference name cannot contain control characters".into(),
            ));
        }

        for component in name.split('/') {
            if component.is_empty() {
                // "//" is already caught above
                continue;
            }
            if component.starts_with('.') {
                return Err(TypeError::InvalidRefName(
                    "path component cannot start with '.'".into(),
                ));
            }
            if component.ends_with(".lock") {
                return Err(TypeError::InvalidRefName(
                    "path component cannot end with '.lock'".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get the reference name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a branch reference (`refs/heads/...`).
    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    /// Whether this is a tag reference (`refs/tags/...`).
    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAGS_PREFIX)
    }

    /// The short branch name, if this is a branch reference.
    pub fn branch_name(&self) -> Option<&str> {
        self.0.strip_prefix(HEADS_PREFIX)
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named pointer to a commit, frozen at the moment it was listed.
///
/// A `GitRef` value never changes; a branch "moving" is modeled as one
/// value being replaced by another with the same name and a different
/// object id. Equality and set membership are by the `(oid, name)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitRef {
    oid: Oid,
    name: RefName,
}

impl GitRef {
    /// Create a new reference snapshot.
    pub fn new(oid: Oid, name: RefName) -> Self {
        Self { oid, name }
    }

    /// Parse a `show-ref`/`ls-remote` style output line: an object id and
    /// a reference name separated by whitespace.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::UnparseableRefLine` if the line does not split
    /// into two fields, and the underlying validation error if either
    /// field is invalid.
    pub fn from_show_ref(line: &str) -> Result<Self, TypeError> {
        let mut fields = line.split_whitespace();
        let (oid, name) = match (fields.next(), fields.next(), fields.next()) {
            (Some(oid), Some(name), None) => (oid, name),
            _ => return Err(TypeError::UnparseableRefLine(line.to_string())),
        };
        Ok(Self {
            oid: Oid::new(oid)?,
            name: RefName::new(name)?,
        })
    }

    /// The object id this reference points to.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// The fully qualified reference name.
    pub fn name(&self) -> &RefName {
        &self.name
    }
}

impl std::fmt::Display for GitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.oid)
    }
}
