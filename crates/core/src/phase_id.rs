//! Phase identifiers.
//!
//! A phase id is a slash-separated path such as `/masters/node1/kubernetes`.
//! Paths group related phases for reporting; they carry no dependency meaning.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors from constructing a [`PhaseId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseIdError {
    /// The input was empty.
    #[error("phase id cannot be empty")]
    Empty,
    /// The path does not start with `/`.
    #[error("phase id `{0}` must start with '/'")]
    NotAbsolute(String),
    /// The path contains `//` or ends with `/`.
    #[error("phase id `{0}` contains an empty segment")]
    EmptySegment(String),
    /// The path contains whitespace.
    #[error("phase id `{0}` contains whitespace")]
    Whitespace(String),
}

/// A validated, human-readable phase path.
///
/// # Examples
///
/// ```
/// use gantry_core::PhaseId;
///
/// let id: PhaseId = "/masters/node1/kubernetes".parse().unwrap();
/// assert_eq!(id.segments().collect::<Vec<_>>(), ["masters", "node1", "kubernetes"]);
/// assert_eq!(id.parent().unwrap().as_str(), "/masters/node1");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhaseId(String);

impl PhaseId {
    /// Validate and wrap a phase path.
    pub fn new(raw: impl Into<String>) -> Result<Self, PhaseIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(PhaseIdError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(PhaseIdError::NotAbsolute(raw));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(PhaseIdError::Whitespace(raw));
        }
        if raw[1..].split('/').any(str::is_empty) {
            return Err(PhaseIdError::EmptySegment(raw));
        }
        Ok(Self(raw))
    }

    /// The path as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, without the leading slash.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// The enclosing path, or `None` for a top-level phase.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let idx = self.0.rfind('/')?;
        (idx > 0).then(|| Self(self.0[..idx].to_owned()))
    }

    /// Whether `other` lies strictly below this path.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PhaseId {
    type Err = PhaseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PhaseId {
    type Error = PhaseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PhaseId {
    type Error = PhaseIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PhaseId> for String {
    fn from(id: PhaseId) -> Self {
        id.0
    }
}

impl AsRef<str> for PhaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
