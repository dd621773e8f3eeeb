//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Content hash
// ============================================================================

/// Deterministic identifier derived from a file's bytes
///
/// The value is opaque to the domain: it is produced by the content hasher
/// in the sync crate and only ever compared for equality. Two files with the
/// same bytes always carry the same `ContentHash`, whatever their names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already-computed hash value
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHash` if the value is empty or contains
    /// characters that cannot appear in a storage object name.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty()
            || value
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == '.')
        {
            return Err(DomainError::InvalidHash(value));
        }
        Ok(Self(value))
    }

    /// Hash rendered from a name-based UUID; always valid
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    /// Get the hash as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier of a state document
///
/// Regenerated on every remote save, so it doubles as a coarse version stamp.
/// The nil value marks an empty (never provisioned) document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(Uuid);

impl StateId {
    /// Create a new random StateId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a nil (all zeros) StateId
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true for the nil identifier of an empty document
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for StateId {
    fn default() -> Self {
        Self::nil()
    }
}

impl Display for StateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for Album entities, generated once and never changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(Uuid);

impl AlbumId {
    /// Create a new random AlbumId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlbumId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AlbumId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlbumId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

// ============================================================================
// Lake name
// ============================================================================

/// Name of the remote storage container backing one workspace
///
/// Lakes are named `<prefix>-<uuid>`; the prefix is what lets a provider
/// recognise the lake belonging to this tool among unrelated containers.
/// The default value is the empty name of a document that has no lake yet.
///
/// A lake name becomes a single path component or URL segment in storage
/// providers, so only ASCII letters, digits, `-` and `_` are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LakeName(String);

impl LakeName {
    /// Mint a fresh lake name under the given prefix
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4()))
    }

    /// Parse an existing lake name, requiring the `<prefix>-<suffix>` form
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLakeName` when the name does not start
    /// with `prefix-` or has nothing after it.
    pub fn parse(prefix: &str, value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if Self::matches_prefix(prefix, &value) && Self::is_safe(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidLakeName(value))
        }
    }

    fn is_safe(name: &str) -> bool {
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Returns true if `name` follows the naming convention for `prefix`
    #[must_use]
    pub fn matches_prefix(prefix: &str, name: &str) -> bool {
        name.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|suffix| !suffix.is_empty())
    }

    /// Get the lake name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty name
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for LakeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts the empty name of a fresh document or any safe name
impl TryFrom<String> for LakeName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_safe(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidLakeName(value))
        }
    }
}

impl From<LakeName> for String {
    fn from(lake: LakeName) -> Self {
        lake.0
    }
}
