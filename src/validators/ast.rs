//! Content-model patterns
//!
//! This module defines the two shapes a content model goes through before
//! compilation:
//! - [`Pattern`]: the raw tree handed over by a grammar front-end
//!   (RelaxNG or XSD readers, or JSON), serde-deserializable
//! - [`ContentModel`] / [`Term`]: the normalized, lowered form the compiler
//!   matches on. Interleave is only representable at the root, so nested
//!   interleaves are rejected while lowering rather than while compiling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileErrorKind, Result};
use crate::limits::Limits;
use crate::names::{is_text_token, TEXT_TOKEN};

/// Atomic grammar symbol: an element tag name or character data
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    /// Character data
    Text,
    /// Element with the given tag name
    Element(String),
}

impl Token {
    /// Create an element token
    pub fn element(name: impl Into<String>) -> Self {
        Token::Element(name.into())
    }

    /// Create a token from a grammar name, mapping the reserved text symbol
    pub fn from_name(name: &str) -> Self {
        if is_text_token(name) {
            Token::Text
        } else {
            Token::Element(name.to_string())
        }
    }

    /// Grammar name of the token
    pub fn name(&self) -> &str {
        match self {
            Token::Text => TEXT_TOKEN,
            Token::Element(name) => name,
        }
    }

    /// Check if this is the text token
    pub fn is_text(&self) -> bool {
        matches!(self, Token::Text)
    }

    /// Human readable description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Token::Text => "text".to_string(),
            Token::Element(name) => format!("element '{}'", name),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text => f.write_str(TEXT_TOKEN),
            Token::Element(name) => write!(f, "'{}'", name),
        }
    }
}

/// Raw content pattern as produced by a grammar front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    /// Leaf symbol; `#text` is character data
    Token {
        /// Tag name or `#text`
        name: String,
    },
    /// Ordered concatenation
    Sequence {
        /// Blocks in order
        blocks: Vec<Pattern>,
    },
    /// Exactly one alternative
    Choice {
        /// Alternatives
        blocks: Vec<Pattern>,
    },
    /// Every block matched in full, in any relative order
    Interleave {
        /// Blocks
        blocks: Vec<Pattern>,
    },
    /// Zero or one
    Optional {
        /// Repeated block
        block: Box<Pattern>,
    },
    /// Zero or more
    Kleene {
        /// Repeated block
        block: Box<Pattern>,
    },
    /// One or more
    Plus {
        /// Repeated block
        block: Box<Pattern>,
    },
    /// Reference to a named grammar definition
    Ref {
        /// Definition name
        name: String,
    },
}

impl Pattern {
    /// Element token pattern
    pub fn token(name: impl Into<String>) -> Self {
        Pattern::Token { name: name.into() }
    }

    /// Character data pattern
    pub fn text() -> Self {
        Pattern::Token {
            name: TEXT_TOKEN.to_string(),
        }
    }

    /// The empty content model
    pub fn empty() -> Self {
        Pattern::Sequence { blocks: Vec::new() }
    }

    /// Sequence pattern
    pub fn sequence(blocks: Vec<Pattern>) -> Self {
        Pattern::Sequence { blocks }
    }

    /// Choice pattern
    pub fn choice(blocks: Vec<Pattern>) -> Self {
        Pattern::Choice { blocks }
    }

    /// Interleave pattern
    pub fn interleave(blocks: Vec<Pattern>) -> Self {
        Pattern::Interleave { blocks }
    }

    /// Optional pattern
    pub fn optional(block: Pattern) -> Self {
        Pattern::Optional {
            block: Box::new(block),
        }
    }

    /// Zero-or-more pattern
    pub fn kleene(block: Pattern) -> Self {
        Pattern::Kleene {
            block: Box::new(block),
        }
    }

    /// One-or-more pattern
    pub fn plus(block: Pattern) -> Self {
        Pattern::Plus {
            block: Box::new(block),
        }
    }

    /// Reference pattern
    pub fn reference(name: impl Into<String>) -> Self {
        Pattern::Ref { name: name.into() }
    }

    /// Check if an interleave occurs anywhere in this pattern
    pub fn contains_interleave(&self) -> bool {
        match self {
            Pattern::Interleave { .. } => true,
            Pattern::Sequence { blocks } | Pattern::Choice { blocks } => {
                blocks.iter().any(Pattern::contains_interleave)
            }
            Pattern::Optional { block } | Pattern::Kleene { block } | Pattern::Plus { block } => {
                block.contains_interleave()
            }
            Pattern::Token { .. } | Pattern::Ref { .. } => false,
        }
    }

    /// Normalize the pattern
    ///
    /// Flattens Sequence-in-Sequence and Choice-in-Choice, unwraps
    /// single-block groups, and collapses redundant repetitions. Repetitions
    /// that have no sensible meaning (`(x?)+`, `(x*)+`, `(x*)?`) are
    /// rejected, as are empty choices and interleaves whose blocks contain
    /// another interleave. Normalizing a normalized pattern returns it
    /// unchanged.
    pub fn normalize(self) -> std::result::Result<Pattern, CompileError> {
        match self {
            Pattern::Token { .. } | Pattern::Ref { .. } => Ok(self),
            Pattern::Sequence { blocks } => {
                let mut flat = Self::normalize_blocks(blocks, |p| match p {
                    Pattern::Sequence { blocks } => Ok(blocks),
                    other => Ok(vec![other]),
                })?;
                if flat.len() == 1 {
                    return Ok(flat.remove(0));
                }
                Ok(Pattern::Sequence { blocks: flat })
            }
            Pattern::Choice { blocks } => {
                let mut flat = Self::normalize_blocks(blocks, |p| match p {
                    Pattern::Choice { blocks } => Ok(blocks),
                    other => Ok(vec![other]),
                })?;
                match flat.len() {
                    0 => Err(CompileError::ill_formed("choice without alternatives")),
                    1 => Ok(flat.remove(0)),
                    _ => Ok(Pattern::Choice { blocks: flat }),
                }
            }
            Pattern::Interleave { blocks } => {
                let mut flat = Self::normalize_blocks(blocks, |p| {
                    if p.contains_interleave() {
                        Err(CompileError::new(
                            CompileErrorKind::NestedInterleave,
                            "interleave blocks must not contain an interleave",
                        ))
                    } else {
                        Ok(vec![p])
                    }
                })?;
                match flat.len() {
                    0 => Err(CompileError::ill_formed("interleave without blocks")),
                    1 => Ok(flat.remove(0)),
                    _ => Ok(Pattern::Interleave { blocks: flat }),
                }
            }
            Pattern::Optional { block } => match block.normalize()? {
                inner @ Pattern::Optional { .. } => Ok(inner),
                Pattern::Kleene { .. } => Err(CompileError::ill_formed(
                    "optional of a zero-or-more repetition",
                )),
                inner => Ok(Pattern::optional(inner)),
            },
            Pattern::Kleene { block } => {
                let mut inner = block.normalize()?;
                loop {
                    match inner {
                        Pattern::Kleene { block }
                        | Pattern::Optional { block }
                        | Pattern::Plus { block } => inner = *block,
                        other => return Ok(Pattern::kleene(other)),
                    }
                }
            }
            Pattern::Plus { block } => match block.normalize()? {
                inner @ Pattern::Plus { .. } => Ok(inner),
                Pattern::Optional { .. } => Err(CompileError::ill_formed(
                    "one-or-more repetition of an optional block",
                )),
                Pattern::Kleene { .. } => Err(CompileError::ill_formed(
                    "one-or-more repetition of a zero-or-more block",
                )),
                inner => Ok(Pattern::plus(inner)),
            },
        }
    }

    fn normalize_blocks<F>(
        blocks: Vec<Pattern>,
        mut splice: F,
    ) -> std::result::Result<Vec<Pattern>, CompileError>
    where
        F: FnMut(Pattern) -> std::result::Result<Vec<Pattern>, CompileError>,
    {
        let mut flat = Vec::with_capacity(blocks.len());
        for block in blocks {
            flat.extend(splice(block.normalize()?)?);
        }
        Ok(flat)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Token { name } => f.write_str(name),
            Pattern::Ref { name } => write!(f, "%{}", name),
            Pattern::Sequence { blocks } => write_group(f, blocks, ", "),
            Pattern::Choice { blocks } => write_group(f, blocks, " | "),
            Pattern::Interleave { blocks } => write_group(f, blocks, " & "),
            Pattern::Optional { block } => write!(f, "{}?", block),
            Pattern::Kleene { block } => write!(f, "{}*", block),
            Pattern::Plus { block } => write!(f, "{}+", block),
        }
    }
}

fn write_group<T: fmt::Display>(f: &mut fmt::Formatter<'_>, blocks: &[T], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", block)?;
    }
    f.write_str(")")
}

/// Lowered content term; the closed union the compiler dispatches on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Single token
    Token(Token),
    /// Ordered concatenation
    Sequence(Vec<Term>),
    /// Exactly one alternative
    Choice(Vec<Term>),
    /// Zero or one
    Optional(Box<Term>),
    /// Zero or more
    Kleene(Box<Term>),
    /// One or more
    Plus(Box<Term>),
    /// Named definition
    Ref(String),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Token(Token::Text) => f.write_str(TEXT_TOKEN),
            Term::Token(Token::Element(name)) => f.write_str(name),
            Term::Ref(name) => write!(f, "%{}", name),
            Term::Sequence(blocks) => write_group(f, blocks, ", "),
            Term::Choice(blocks) => write_group(f, blocks, " | "),
            Term::Optional(block) => write!(f, "{}?", block),
            Term::Kleene(block) => write!(f, "{}*", block),
            Term::Plus(block) => write!(f, "{}+", block),
        }
    }
}

/// Normalized content model of one element or definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModel {
    /// Regular content compiled to a single automaton
    Term(Term),
    /// Unordered blocks, each compiled to its own automaton
    Interleave(Vec<Term>),
}

impl ContentModel {
    /// Normalize and lower a raw pattern
    pub fn from_pattern(pattern: Pattern, limits: &Limits) -> Result<Self> {
        match pattern.normalize()? {
            Pattern::Interleave { blocks } => {
                limits.check_interleave_blocks(blocks.len())?;
                let terms = blocks
                    .into_iter()
                    .map(|block| lower(block, 1, limits))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ContentModel::Interleave(terms))
            }
            other => Ok(ContentModel::Term(lower(other, 0, limits)?)),
        }
    }

    /// Check if this is an interleave model
    pub fn is_interleave(&self) -> bool {
        matches!(self, ContentModel::Interleave(_))
    }
}

impl fmt::Display for ContentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentModel::Term(term) => write!(f, "{}", term),
            ContentModel::Interleave(blocks) => write_group(f, blocks, " & "),
        }
    }
}

fn lower(pattern: Pattern, depth: usize, limits: &Limits) -> Result<Term> {
    limits.check_pattern_depth(depth)?;
    let lower_all = |blocks: Vec<Pattern>| {
        blocks
            .into_iter()
            .map(|block| lower(block, depth + 1, limits))
            .collect::<Result<Vec<_>>>()
    };
    let term = match pattern {
        Pattern::Token { name } => Term::Token(Token::from_name(&name)),
        Pattern::Ref { name } => Term::Ref(name),
        Pattern::Sequence { blocks } => Term::Sequence(lower_all(blocks)?),
        Pattern::Choice { blocks } => Term::Choice(lower_all(blocks)?),
        Pattern::Optional { block } => Term::Optional(Box::new(lower(*block, depth + 1, limits)?)),
        Pattern::Kleene { block } => Term::Kleene(Box::new(lower(*block, depth + 1, limits)?)),
        Pattern::Plus { block } => Term::Plus(Box::new(lower(*block, depth + 1, limits)?)),
        Pattern::Interleave { .. } => {
            return Err(CompileError::new(
                CompileErrorKind::NestedInterleave,
                "interleave is only supported as the whole content of an element",
            )
            .into())
        }
    };
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn t(name: &str) -> Pattern {
        Pattern::token(name)
    }

    #[test]
    fn test_token_from_name() {
        assert_eq!(Token::from_name("#text"), Token::Text);
        assert_eq!(Token::from_name("p"), Token::element("p"));
        assert_eq!(Token::element("p").name(), "p");
        assert_eq!(Token::Text.to_string(), "#text");
        assert_eq!(Token::element("p").to_string(), "'p'");
    }

    #[test]
    fn test_flatten_sequences_and_choices() {
        let p = Pattern::sequence(vec![
            t("a"),
            Pattern::sequence(vec![t("b"), Pattern::sequence(vec![t("c")])]),
        ]);
        assert_eq!(
            p.normalize().unwrap(),
            Pattern::sequence(vec![t("a"), t("b"), t("c")])
        );

        let p = Pattern::choice(vec![Pattern::choice(vec![t("a"), t("b")]), t("c")]);
        assert_eq!(
            p.normalize().unwrap(),
            Pattern::choice(vec![t("a"), t("b"), t("c")])
        );
    }

    #[test]
    fn test_single_block_groups_unwrap() {
        assert_eq!(Pattern::sequence(vec![t("a")]).normalize().unwrap(), t("a"));
        assert_eq!(Pattern::choice(vec![t("a")]).normalize().unwrap(), t("a"));
        assert_eq!(Pattern::interleave(vec![t("a")]).normalize().unwrap(), t("a"));
        assert_eq!(Pattern::empty().normalize().unwrap(), Pattern::empty());
    }

    #[test]
    fn test_collapse_repetitions() {
        let p = Pattern::optional(Pattern::optional(t("a")));
        assert_eq!(p.normalize().unwrap(), Pattern::optional(t("a")));

        let p = Pattern::kleene(Pattern::optional(Pattern::plus(t("a"))));
        assert_eq!(p.normalize().unwrap(), Pattern::kleene(t("a")));

        let p = Pattern::plus(Pattern::plus(t("a")));
        assert_eq!(p.normalize().unwrap(), Pattern::plus(t("a")));
    }

    #[test]
    fn test_reject_ill_formed_repetitions() {
        for p in [
            Pattern::plus(Pattern::optional(t("a"))),
            Pattern::plus(Pattern::kleene(t("a"))),
            Pattern::optional(Pattern::kleene(t("a"))),
            Pattern::choice(vec![]),
        ] {
            let err = p.normalize().unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::IllFormed);
        }
    }

    #[test]
    fn test_reject_nested_interleave() {
        let p = Pattern::interleave(vec![
            t("a"),
            Pattern::sequence(vec![t("b"), Pattern::interleave(vec![t("c"), t("d")])]),
        ]);
        let err = p.normalize().unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::NestedInterleave);
    }

    #[test]
    fn test_lower_interleave_only_at_root() {
        let limits = Limits::default();
        let model =
            ContentModel::from_pattern(Pattern::interleave(vec![t("a"), t("b")]), &limits).unwrap();
        assert!(model.is_interleave());

        let nested = Pattern::sequence(vec![t("x"), Pattern::interleave(vec![t("a"), t("b")])]);
        match ContentModel::from_pattern(nested, &limits) {
            Err(Error::Compile(err)) => assert_eq!(err.kind, CompileErrorKind::NestedInterleave),
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_lower_depth_limit() {
        let mut p = t("a");
        for _ in 0..30 {
            p = Pattern::sequence(vec![t("x"), Pattern::choice(vec![p, t("y")])]);
        }
        let result = ContentModel::from_pattern(p, &Limits::strict());
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_display() {
        let p = Pattern::sequence(vec![
            t("a"),
            Pattern::optional(t("b")),
            Pattern::plus(Pattern::choice(vec![t("c"), Pattern::text()])),
        ]);
        assert_eq!(p.to_string(), "(a, b?, (c | #text)+)");

        let model = ContentModel::from_pattern(p, &Limits::default()).unwrap();
        assert_eq!(model.to_string(), "(a, b?, (c | #text)+)");
    }

    #[test]
    fn test_pattern_json() {
        let json = r##"{"kind":"sequence","blocks":[{"kind":"token","name":"a"},{"kind":"optional","block":{"kind":"token","name":"#text"}}]}"##;
        let p: Pattern = serde_json::from_str(json).unwrap();
        assert_eq!(
            p,
            Pattern::sequence(vec![t("a"), Pattern::optional(Pattern::text())])
        );
    }
}
