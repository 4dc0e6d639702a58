//! Validated file name newtype.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasons a requested file name is rejected before any I/O happens.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,
    #[error("file name is absolute")]
    Absolute,
    #[error("file name contains a path traversal component")]
    Traversal,
    #[error("file name contains an illegal byte")]
    IllegalByte,
}

/// An opaque file identifier, validated at construction.
///
/// A `FileName` in hand is safe to join onto the storage directory and to
/// interpolate into peer URLs: it is non-empty, relative, free of `..`
/// components, backslashes, and NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileName(String);

impl FileName {
    pub fn new(raw: impl Into<String>) -> Result<Self, NameError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        if raw.starts_with('/') {
            return Err(NameError::Absolute);
        }
        if raw.contains('\\') || raw.bytes().any(|b| b == 0) {
            return Err(NameError::IllegalByte);
        }
        if raw.split('/').any(|component| component == "..") {
            return Err(NameError::Traversal);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FileName {
    type Error = NameError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<FileName> for String {
    fn from(name: FileName) -> Self {
        name.0
    }
}
