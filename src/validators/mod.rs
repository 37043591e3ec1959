//! Content-model validators
//!
//! Grammar patterns are lowered ([`ast`]), compiled into deterministic
//! automata ([`compiler`], [`automaton`]) and wrapped into expressions
//! ([`expressions`]) that the batch [`validation`] walk and the incremental
//! [`iterators`] drive one token at a time.

pub mod analysis;
pub mod ast;
pub mod automaton;
pub mod checker;
pub mod compiler;
pub mod elements;
pub mod exceptions;
pub mod expressions;
pub mod iterators;
pub mod schemas;
pub mod validation;

// Re-exports
pub use analysis::SchemaAnalyzer;
pub use ast::{ContentModel, Pattern, Term, Token};
pub use automaton::{Automaton, Label, State};
pub use checker::{Checker, Finding, Rule};
pub use compiler::{CompileWarning, CompiledModel, Compiler};
pub use elements::{ElementKind, ElementSchema};
pub use exceptions::{ValidationError, ViolationKind};
pub use expressions::{
    Candidate, Consumed, Cursor, DfaExpr, ExprState, Expression, FirstMatch, InsertSide,
    InterleaveExpr, PreferUnfinished, TieBreak,
};
pub use iterators::ValidatingChildIter;
pub use schemas::{ElementDecl, Grammar, Schema};
pub use validation::{ValidationContext, ValidationMode, Validator};
