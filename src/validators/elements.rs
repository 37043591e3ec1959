//! Element declarations
//!
//! An [`ElementSchema`] binds a tag name to its declared kind, its allowed
//! attribute names and the compiled [`Expression`] of its content.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::documents::{tokenize, ChildToken, Node};
use crate::error::Error;

use super::ast::Token;
use super::expressions::{Expression, InsertSide, TieBreak};

/// Declared role of an element
///
/// Kinds do not change validation; they feed the design checker and
/// editors deciding how to present an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    /// Character data only
    Text,
    /// Child elements only
    Element,
    /// Text mixed with inline elements
    Hybrid,
    /// Out-of-flow note attached to surrounding content
    Annotation,
    /// Element used inside running text
    InlineElement,
    /// Empty marker element
    Anchor,
    /// Structural grouping of other elements
    Container,
    /// Content owned by another schema
    External,
}

impl ElementKind {
    /// All kinds in wire-code order
    pub const ALL: [ElementKind; 8] = [
        ElementKind::Text,
        ElementKind::Element,
        ElementKind::Hybrid,
        ElementKind::Annotation,
        ElementKind::InlineElement,
        ElementKind::Anchor,
        ElementKind::Container,
        ElementKind::External,
    ];

    /// Numeric code used by the compact encoding
    pub fn code(self) -> u8 {
        match self {
            ElementKind::Text => 0,
            ElementKind::Element => 1,
            ElementKind::Hybrid => 2,
            ElementKind::Annotation => 3,
            ElementKind::InlineElement => 4,
            ElementKind::Anchor => 5,
            ElementKind::Container => 6,
            ElementKind::External => 7,
        }
    }

    /// Kind for a compact-encoding code
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| u64::from(kind.code()) == code)
    }

    /// Kind implied by the content model alone
    ///
    /// Text together with elements is hybrid, text alone is text,
    /// anything else is element. The other kinds are only ever declared.
    pub fn infer(expr: &Expression) -> Self {
        let text = expr.is_text_allowed();
        let elements = expr.allowed_tokens().iter().any(|t| !t.is_text());
        match (text, elements) {
            (true, true) => ElementKind::Hybrid,
            (true, false) => ElementKind::Text,
            _ => ElementKind::Element,
        }
    }

    /// Name used in grammars
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Element => "element",
            ElementKind::Hybrid => "hybrid",
            ElementKind::Annotation => "annotation",
            ElementKind::InlineElement => "inline-element",
            ElementKind::Anchor => "anchor",
            ElementKind::Container => "container",
            ElementKind::External => "external",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Other(format!("Unknown element kind '{}'", s)))
    }
}

/// Compiled declaration of one element
#[derive(Debug, Clone)]
pub struct ElementSchema {
    name: String,
    kind: ElementKind,
    attributes: IndexSet<String>,
    expr: Expression,
}

impl ElementSchema {
    /// Create a declaration
    pub fn new(
        name: impl Into<String>,
        kind: ElementKind,
        attributes: IndexSet<String>,
        expr: Expression,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes,
            expr,
        }
    }

    /// Use another interleave tie-break (builder style)
    pub fn with_tie_break(mut self, strategy: Arc<dyn TieBreak>) -> Self {
        self.expr = self.expr.with_tie_break(strategy);
        self
    }

    /// Tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared or inferred kind
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Allowed attribute names
    pub fn attributes(&self) -> &IndexSet<String> {
        &self.attributes
    }

    /// Check if an attribute is declared
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    /// Compiled content expression
    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    /// Check if a child tag (or `#text`) may appear anywhere in the content
    pub fn is_allowed(&self, tag: &str) -> bool {
        self.expr.is_allowed(&Token::from_name(tag))
    }

    /// Check if character data may appear anywhere in the content
    pub fn is_text_allowed(&self) -> bool {
        self.expr.is_text_allowed()
    }

    /// Lowest child index where `tag` can be inserted keeping the content valid
    pub fn find_first_valid_pos(&self, children: &[Node], tag: &str) -> Option<usize> {
        self.find_valid_pos(children, tag, InsertSide::First)
    }

    /// Highest child index where `tag` can be inserted keeping the content valid
    pub fn find_last_valid_pos(&self, children: &[Node], tag: &str) -> Option<usize> {
        self.find_valid_pos(children, tag, InsertSide::Last)
    }

    /// Search over child nodes
    ///
    /// Comments are skipped, as is whitespace-only text when the content
    /// never allows text. A text run split by comments is never split
    /// further. The result is an index into `children`.
    pub fn find_valid_pos(&self, children: &[Node], tag: &str, side: InsertSide) -> Option<usize> {
        let text_allowed = self.is_text_allowed();
        let slots: Vec<ChildToken> = tokenize(children)
            .into_iter()
            .filter(|slot| text_allowed || !slot.blank)
            .collect();
        let tokens: Vec<Token> = slots.iter().map(|slot| slot.token.clone()).collect();

        let pos = self
            .expr
            .find_insert_pos(&tokens, &Token::from_name(tag), side)?;
        Some(match side {
            InsertSide::First if pos == 0 => 0,
            InsertSide::First => slots[pos - 1].last + 1,
            InsertSide::Last if pos == tokens.len() => children.len(),
            InsertSide::Last => slots[pos].index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Element;
    use crate::limits::Limits;
    use crate::validators::ast::Pattern;
    use crate::validators::compiler::Compiler;
    use indexmap::IndexMap;

    fn expr(pattern: Pattern) -> Expression {
        let defs = IndexMap::new();
        let mut compiler = Compiler::new(&defs, Limits::default());
        Expression::from(compiler.compile_pattern(&pattern).unwrap())
    }

    fn schema(pattern: Pattern) -> ElementSchema {
        let expr = expr(pattern);
        let kind = ElementKind::infer(&expr);
        ElementSchema::new("parent", kind, IndexSet::new(), expr)
    }

    fn el(name: &str) -> Node {
        Node::Element(Element::new(name))
    }

    #[test]
    fn test_kind_codes() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_code(u64::from(kind.code())), Some(kind));
            assert_eq!(kind.as_str().parse::<ElementKind>().unwrap(), kind);
        }
        assert_eq!(ElementKind::from_code(8), None);
        assert!("paragraph".parse::<ElementKind>().is_err());
    }

    #[test]
    fn test_kind_inference() {
        let text = Pattern::text();
        let mixed = Pattern::kleene(Pattern::choice(vec![Pattern::text(), Pattern::token("em")]));
        let structured = Pattern::sequence(vec![Pattern::token("h"), Pattern::token("p")]);

        assert_eq!(schema(text).kind(), ElementKind::Text);
        assert_eq!(schema(mixed).kind(), ElementKind::Hybrid);
        assert_eq!(schema(structured).kind(), ElementKind::Element);
        assert_eq!(schema(Pattern::empty()).kind(), ElementKind::Element);
    }

    #[test]
    fn test_is_allowed() {
        let s = schema(Pattern::sequence(vec![
            Pattern::token("title"),
            Pattern::kleene(Pattern::token("para")),
        ]));
        assert!(s.is_allowed("title"));
        assert!(s.is_allowed("para"));
        assert!(!s.is_allowed("list"));
        assert!(!s.is_allowed("#text"));
        assert!(!s.is_text_allowed());
    }

    #[test]
    fn test_find_valid_pos_maps_node_indices() {
        let s = schema(Pattern::sequence(vec![
            Pattern::token("A"),
            Pattern::token("B"),
            Pattern::token("C"),
        ]));
        let children = vec![
            Node::text("\n  "),
            el("A"),
            Node::comment("keep"),
            Node::text("\n  "),
            el("C"),
        ];
        assert_eq!(s.find_first_valid_pos(&children, "B"), Some(2));
        assert_eq!(s.find_last_valid_pos(&children, "B"), Some(4));
        assert_eq!(s.find_first_valid_pos(&children, "D"), None);
    }

    #[test]
    fn test_find_valid_pos_empty_children() {
        let s = schema(Pattern::optional(Pattern::token("A")));
        assert_eq!(s.find_first_valid_pos(&[], "A"), Some(0));
        assert_eq!(s.find_last_valid_pos(&[], "A"), Some(0));
        assert_eq!(s.find_first_valid_pos(&[el("A")], "A"), None);
    }
}
