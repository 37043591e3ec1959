//! Error types for contentmodel
//!
//! This module defines the crate-level error type. Structural violations
//! found while validating a node tree are not errors in this sense: they
//! live in [`crate::validators::exceptions`] and are collected rather than
//! returned early.

use std::fmt;
use thiserror::Error;

/// Result type alias using the contentmodel Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for contentmodel operations
#[derive(Error, Debug)]
pub enum Error {
    /// Grammar compilation error (unsupported or ill-formed construct)
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Compact schema encoding could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Name error (invalid tag or attribute name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Category of a grammar construct the compiler refuses to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Interleave nested inside another construct
    NestedInterleave,
    /// A definition refers back to itself
    CyclicReference,
    /// A reference names no definition
    UnresolvedReference,
    /// A repetition or group that has no sensible meaning
    IllFormed,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompileErrorKind::NestedInterleave => "nested interleave",
            CompileErrorKind::CyclicReference => "cyclic reference",
            CompileErrorKind::UnresolvedReference => "unresolved reference",
            CompileErrorKind::IllFormed => "ill-formed construct",
        };
        f.write_str(label)
    }
}

/// Grammar compilation error
///
/// Compilation errors are fatal: no usable partial schema remains once one
/// is raised.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// What went wrong
    pub kind: CompileErrorKind,
    /// Error message
    pub message: String,
    /// Element or definition being compiled
    pub location: Option<String>,
}

impl CompileError {
    /// Create a new compile error
    pub fn new(kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Shorthand for an ill-formed construct
    pub fn ill_formed(message: impl Into<String>) -> Self {
        Self::new(CompileErrorKind::IllFormed, message)
    }

    /// Set the location (element or definition name)
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::new(
            CompileErrorKind::NestedInterleave,
            "interleave blocks must not contain interleave",
        )
        .with_location("section");

        let msg = format!("{}", err);
        assert!(msg.contains("nested interleave"));
        assert!(msg.contains("Location: section"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = CompileError::ill_formed("x").into();
        assert!(matches!(err, Error::Compile(_)));
    }
}
