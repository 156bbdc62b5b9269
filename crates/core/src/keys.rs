//! Dispatch keys: [`ActionKind`] for phase handlers and [`ResourceKind`] for
//! cluster object upserts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum allowed length for an [`ActionKind`].
const ACTION_KIND_MAX_LEN: usize = 64;

/// Errors from constructing a dispatch key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The input was empty or contained only whitespace.
    #[error("key cannot be empty")]
    Empty,
    /// The key contains characters outside the allowed set.
    #[error("key `{0}` contains invalid characters")]
    InvalidCharacters(String),
    /// The key exceeds the maximum length.
    #[error("key exceeds maximum length of {ACTION_KIND_MAX_LEN} characters")]
    TooLong,
}

/// Discriminant selecting a phase handler, e.g. `command` or `resources`.
///
/// Lowercased on construction; allowed characters are `a-z`, `0-9`, `.`, `-`, `_`.
///
/// ```
/// use gantry_core::ActionKind;
///
/// let kind: ActionKind = "Images".parse().unwrap();
/// assert_eq!(kind.as_str(), "images");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionKind(String);

impl ActionKind {
    /// Normalize and validate an action kind.
    pub fn new(raw: &str) -> Result<Self, KeyError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(KeyError::Empty);
        }
        if normalized.len() > ACTION_KIND_MAX_LEN {
            return Err(KeyError::TooLong);
        }
        if !normalized
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'_'))
        {
            return Err(KeyError::InvalidCharacters(normalized));
        }
        Ok(Self(normalized))
    }

    /// The key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Kind of a cluster object, e.g. `ClusterRole`. Case is preserved.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKind(String);

impl ResourceKind {
    /// Validate a resource kind: non-empty ASCII alphanumerics.
    pub fn new(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::Empty);
        }
        if !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(KeyError::InvalidCharacters(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The kind as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_key_impls {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = KeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = KeyError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(&value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = KeyError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(key: $ty) -> Self {
                key.0
            }
        }
    };
}

string_key_impls!(ActionKind);
string_key_impls!(ResourceKind);
