//! # contentmodel
//!
//! Content-model compiler and structural validator for ordered node trees.
//!
//! A [`Grammar`] declares, for every element, which children may appear in
//! which order (sequences, choices, repetitions, interleaves and named
//! definitions). It is compiled once into a [`Schema`] of deterministic
//! automata, which then answers:
//!
//! - batch validation of a whole subtree ([`Validator`])
//! - incremental validation while children are consumed, with invalid
//!   children replaced by comments ([`ValidatingChildIter`])
//! - where a new child may be inserted ([`ElementSchema::find_first_valid_pos`])
//! - static design checks over the grammar ([`Checker`])
//!
//! Compiled schemas can be shipped in a compact JSON encoding ([`compact`]).
//!
//! ## Example
//!
//! ```rust
//! use contentmodel::{Document, ElementDecl, Grammar, Limits, Pattern, Schema, Validator};
//!
//! let grammar = Grammar::new()
//!     .start("list")
//!     .element("list", ElementDecl::new(Pattern::plus(Pattern::token("item"))))
//!     .element("item", ElementDecl::new(Pattern::text()));
//! let schema = Schema::from_grammar(&grammar, Limits::default())?;
//!
//! let doc = Document::from_string("<list><item>a</item><item>b</item></list>")?;
//! assert!(Validator::new(&schema).validate_document(&doc).is_ok());
//!
//! let list = schema.element_schema("list").unwrap();
//! assert_eq!(list.find_last_valid_pos(&doc.root.children, "item"), Some(2));
//! # Ok::<(), contentmodel::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compact;
pub mod documents;
pub mod error;
pub mod limits;
pub mod names;
pub mod validators;

// Re-exports for convenience
pub use documents::{Document, Element, Node};
pub use error::{CompileError, CompileErrorKind, Error, Result};
pub use limits::Limits;
pub use validators::{
    Checker, ElementDecl, ElementKind, ElementSchema, Expression, Finding, Grammar, InsertSide,
    Pattern, Schema, SchemaAnalyzer, Token, ValidatingChildIter, ValidationError, ValidationMode,
    Validator, ViolationKind,
};

/// Version of the contentmodel library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
