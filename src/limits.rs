//! Limits and constraints for schema compilation and validation
//!
//! Grammars come from outside the crate and documents come from users, so
//! both compilation and tree walking are bounded.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting depth of a document walked by the batch validator
    pub max_document_depth: usize,

    /// Maximum nesting depth of a content pattern
    pub max_pattern_depth: usize,

    /// Maximum number of states in a single compiled automaton
    pub max_automaton_states: usize,

    /// Maximum number of blocks in an interleave
    pub max_interleave_blocks: usize,

    /// Maximum number of element declarations in a schema
    pub max_elements: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_depth: 1000,
            max_pattern_depth: 100,
            max_automaton_states: 100_000,
            max_interleave_blocks: 64,
            max_elements: 100_000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_document_depth: 100,
            max_pattern_depth: 20,
            max_automaton_states: 10_000,
            max_interleave_blocks: 16,
            max_elements: 10_000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_document_depth: 10_000,
            max_pattern_depth: 1000,
            max_automaton_states: 1_000_000,
            max_interleave_blocks: 1024,
            max_elements: 1_000_000,
        }
    }

    /// Check if document depth is within limits
    pub fn check_document_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_document_depth {
            Err(Error::LimitExceeded(format!(
                "Document depth {} exceeds maximum {}",
                depth, self.max_document_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if pattern depth is within limits
    pub fn check_pattern_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_pattern_depth {
            Err(Error::LimitExceeded(format!(
                "Pattern depth {} exceeds maximum {}",
                depth, self.max_pattern_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if an automaton's state count is within limits
    pub fn check_automaton_states(&self, count: usize) -> Result<()> {
        if count > self.max_automaton_states {
            Err(Error::LimitExceeded(format!(
                "Automaton state count {} exceeds maximum {}",
                count, self.max_automaton_states
            )))
        } else {
            Ok(())
        }
    }

    /// Check if an interleave's block count is within limits
    pub fn check_interleave_blocks(&self, count: usize) -> Result<()> {
        if count > self.max_interleave_blocks {
            Err(Error::LimitExceeded(format!(
                "Interleave block count {} exceeds maximum {}",
                count, self.max_interleave_blocks
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of element declarations is within limits
    pub fn check_elements(&self, count: usize) -> Result<()> {
        if count > self.max_elements {
            Err(Error::LimitExceeded(format!(
                "Element count {} exceeds maximum {}",
                count, self.max_elements
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_document_depth, 1000);
        assert!(limits.check_document_depth(500).is_ok());
        assert!(limits.check_document_depth(1500).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_pattern_depth < Limits::default().max_pattern_depth);
        assert!(limits.check_pattern_depth(21).is_err());
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_automaton_states > Limits::default().max_automaton_states);
        assert!(limits.check_automaton_states(500_000).is_ok());
    }

    #[test]
    fn test_check_interleave_blocks() {
        let limits = Limits::default();
        assert!(limits.check_interleave_blocks(4).is_ok());
        assert!(limits.check_interleave_blocks(65).is_err());
        assert!(matches!(
            limits.check_elements(200_000),
            Err(Error::LimitExceeded(_))
        ));
    }
}
