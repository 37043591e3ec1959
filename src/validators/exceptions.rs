//! Structural validation errors
//!
//! Violations are values, not control flow: the expression layer records
//! them in its state, the batch validator accumulates them and the
//! incremental iterator logs them before defusing the offending node.

use std::fmt;

use super::ast::Token;

/// Category of a structural violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// The token is never allowed anywhere in the content model
    NotAllowed,
    /// The token is allowed by the content model, but not at this position
    Misplaced,
    /// Children are exhausted while the content model is unfinished
    Incomplete,
    /// The element has no declaration in the schema
    UnknownElement,
    /// The attribute is not declared for the element
    UnknownAttribute,
    /// The tree nests deeper than the configured limit
    TooDeep,
}

impl ViolationKind {
    /// Whether the violation is about a single child token
    pub fn is_structural(&self) -> bool {
        matches!(self, ViolationKind::NotAllowed | ViolationKind::Misplaced)
    }
}

/// Validation error when a node tree doesn't conform to the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Violation category
    pub kind: ViolationKind,
    /// The error message
    message: String,
    /// Path to the element whose content failed validation
    path: Option<String>,
    /// The tag of the element whose content failed validation
    pub element_tag: Option<String>,
    /// The offending child token
    pub token: Option<Token>,
    /// Position of the offending child among its siblings
    pub index: Option<usize>,
    /// Tokens that would have been accepted instead
    pub expected: Vec<Token>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            element_tag: None,
            token: None,
            index: None,
            expected: Vec::new(),
        }
    }

    /// Create an error for a child token rejected by the content model
    pub fn unexpected_child(kind: ViolationKind, token: &Token, index: usize) -> Self {
        let message = match kind {
            ViolationKind::NotAllowed => format!(
                "{} is not allowed in this content model (position {})",
                token.describe(),
                index + 1
            ),
            _ => format!(
                "{} is allowed in this content model, but not at position {}",
                token.describe(),
                index + 1
            ),
        };
        let mut err = Self::new(kind, message);
        err.token = Some(token.clone());
        err.index = Some(index);
        err
    }

    /// Create an error for content that ended too early
    pub fn incomplete_content(consumed: usize) -> Self {
        let mut err = Self::new(
            ViolationKind::Incomplete,
            format!("content is not complete after {} children", consumed),
        );
        err.index = Some(consumed);
        err
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the path to the error location (if available)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Set the path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the element tag
    pub fn with_element(mut self, tag: impl Into<String>) -> Self {
        self.element_tag = Some(tag.into());
        self
    }

    /// Set the expected tokens
    pub fn with_expected(mut self, expected: Vec<Token>) -> Self {
        self.expected = expected;
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref tag) = self.element_tag {
            write!(f, "<{}>: ", tag)?;
        }
        write!(f, "{}", self.message)?;

        if !self.expected.is_empty() {
            if self.expected.len() == 1 {
                write!(f, ". Token {} expected.", self.expected[0])?;
            } else {
                let tags: Vec<_> = self.expected.iter().map(|t| t.to_string()).collect();
                write!(f, ". Tokens ({}) expected.", tags.join(" | "))?;
            }
        }

        if let Some(ref path) = self.path {
            write!(f, "\nPath: {}", path)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_child_messages() {
        let token = Token::element("x");
        let never = ValidationError::unexpected_child(ViolationKind::NotAllowed, &token, 0);
        assert!(never.message().contains("not allowed"));
        assert_eq!(never.index, Some(0));

        let misplaced = ValidationError::unexpected_child(ViolationKind::Misplaced, &token, 2);
        assert!(misplaced.message().contains("not at position 3"));
        assert!(misplaced.kind.is_structural());
    }

    #[test]
    fn test_display_with_context() {
        let err = ValidationError::incomplete_content(1)
            .with_element("section")
            .with_path("/doc/section")
            .with_expected(vec![Token::element("title"), Token::Text]);

        let msg = err.to_string();
        assert!(msg.starts_with("<section>: "));
        assert!(msg.contains("('title' | #text)"));
        assert!(msg.contains("Path: /doc/section"));
        assert!(!err.kind.is_structural());
    }
}
