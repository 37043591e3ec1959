//! Grammars and compiled schemas
//!
//! A [`Grammar`] is the serde-facing description of a document type: element
//! declarations with their content patterns and attributes, shared named
//! definitions, kind overrides and a start element. [`Schema::from_grammar`]
//! compiles it once into an immutable registry of [`ElementSchema`]s that
//! can be shared across threads.

use std::path::Path;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::documents::Element;
use crate::error::{CompileError, CompileErrorKind, Error, Result};
use crate::limits::Limits;
use crate::names::{validate_attribute_name, validate_tag_name};

use super::ast::Pattern;
use super::compiler::{CompileWarning, Compiler};
use super::elements::{ElementKind, ElementSchema};
use super::expressions::{Expression, TieBreak};
use super::iterators::ValidatingChildIter;

/// Declaration of one element in a grammar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDecl {
    /// Content pattern
    pub content: Pattern,
    /// Allowed attribute names
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl ElementDecl {
    /// Declaration without attributes
    pub fn new(content: Pattern) -> Self {
        Self {
            content,
            attributes: Vec::new(),
        }
    }

    /// Add allowed attributes (builder style)
    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Source description of a schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grammar {
    /// Root element of conforming documents
    pub start: Option<String>,
    /// Element declarations by tag name
    pub elements: IndexMap<String, ElementDecl>,
    /// Named patterns usable through `ref`
    pub definitions: IndexMap<String, Pattern>,
    /// Declared kinds overriding inference
    #[serde(alias = "types")]
    pub kinds: IndexMap<String, ElementKind>,
}

impl Grammar {
    /// Create an empty grammar
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a grammar from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Declare an element (builder style)
    pub fn element(mut self, name: impl Into<String>, decl: ElementDecl) -> Self {
        self.elements.insert(name.into(), decl);
        self
    }

    /// Add a named definition (builder style)
    pub fn definition(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.definitions.insert(name.into(), pattern);
        self
    }

    /// Override an element kind (builder style)
    pub fn kind(mut self, name: impl Into<String>, kind: ElementKind) -> Self {
        self.kinds.insert(name.into(), kind);
        self
    }

    /// Set the start element (builder style)
    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }
}

/// Compiled registry of element declarations
#[derive(Debug, Clone, Default)]
pub struct Schema {
    elements: IndexMap<String, ElementSchema>,
    start: Option<String>,
    warnings: Vec<CompileWarning>,
    limits: Limits,
}

impl Schema {
    /// Assemble a schema from compiled declarations
    pub fn new(elements: IndexMap<String, ElementSchema>, start: Option<String>) -> Self {
        Self {
            elements,
            start,
            warnings: Vec::new(),
            limits: Limits::default(),
        }
    }

    /// Compile a grammar
    pub fn from_grammar(grammar: &Grammar, limits: Limits) -> Result<Self> {
        limits.check_elements(grammar.elements.len())?;
        if let Some(start) = &grammar.start {
            if !grammar.elements.contains_key(start) {
                return Err(CompileError::new(
                    CompileErrorKind::UnresolvedReference,
                    format!("start element '{}' is not declared", start),
                )
                .into());
            }
        }
        for name in grammar.kinds.keys() {
            if !grammar.elements.contains_key(name) {
                return Err(CompileError::new(
                    CompileErrorKind::UnresolvedReference,
                    format!("kind override for undeclared element '{}'", name),
                )
                .into());
            }
        }

        let mut compiler = Compiler::new(&grammar.definitions, limits.clone());
        let mut elements = IndexMap::with_capacity(grammar.elements.len());

        for (name, decl) in &grammar.elements {
            validate_tag_name(name)?;
            let mut attributes = IndexSet::with_capacity(decl.attributes.len());
            for attribute in &decl.attributes {
                validate_attribute_name(attribute)?;
                attributes.insert(attribute.clone());
            }

            compiler.set_location(Some(name.clone()));
            let expr = Expression::from(compiler.compile_pattern(&decl.content)?);
            for token in expr.allowed_tokens().iter().filter(|t| !t.is_text()) {
                validate_tag_name(token.name())?;
            }

            let kind = grammar
                .kinds
                .get(name)
                .copied()
                .unwrap_or_else(|| ElementKind::infer(&expr));
            debug!(element = %name, %kind, "compiled element");
            elements.insert(name.clone(), ElementSchema::new(name.clone(), kind, attributes, expr));
        }

        let warnings = compiler.take_warnings();
        info!(
            elements = elements.len(),
            warnings = warnings.len(),
            "schema compiled"
        );
        Ok(Self {
            elements,
            start: grammar.start.clone(),
            warnings,
            limits,
        })
    }

    /// Load a schema from JSON, either a grammar or the compact encoding
    pub fn from_json(json: &str, limits: Limits) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.is_array() {
            crate::compact::decode_value(&value).map(|schema| schema.with_limits(limits))
        } else {
            let grammar: Grammar = serde_json::from_value(value)?;
            Self::from_grammar(&grammar, limits)
        }
    }

    /// Read a schema file (grammar or compact JSON)
    pub fn from_file(path: impl AsRef<Path>, limits: Limits) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, limits)
    }

    /// Replace the limits used by validation (builder style)
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Use another interleave tie-break for every element (builder style)
    pub fn with_tie_break(mut self, strategy: Arc<dyn TieBreak>) -> Self {
        self.elements = std::mem::take(&mut self.elements)
            .into_iter()
            .map(|(name, schema)| (name, schema.with_tie_break(Arc::clone(&strategy))))
            .collect();
        self
    }

    /// Declaration for a tag
    pub fn element_schema(&self, tag: &str) -> Option<&ElementSchema> {
        self.elements.get(tag)
    }

    /// Declaration for a tag, as an error when undeclared
    pub fn require(&self, tag: &str) -> Result<&ElementSchema> {
        self.element_schema(tag)
            .ok_or_else(|| Error::Name(format!("Element '{}' is not declared", tag)))
    }

    /// All declarations in declaration order
    pub fn elements(&self) -> impl Iterator<Item = &ElementSchema> + '_ {
        self.elements.values()
    }

    /// Declared tag names in declaration order
    pub fn element_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.elements.keys().map(String::as_str)
    }

    /// Check if a tag is declared
    pub fn contains(&self, tag: &str) -> bool {
        self.elements.contains_key(tag)
    }

    /// Number of declarations
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if nothing is declared
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Start element name
    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    /// Start element declaration
    pub fn start_schema(&self) -> Option<&ElementSchema> {
        self.start.as_deref().and_then(|name| self.element_schema(name))
    }

    /// Ambiguities resolved while compiling
    pub fn compile_warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    /// Limits applied by validation
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Incrementally validate the children of `element`
    ///
    /// `None` when the element is not declared.
    pub fn validating_children<'a>(&'a self, element: &'a Element) -> Option<ValidatingChildIter<'a>> {
        self.element_schema(&element.name)
            .map(|schema| ValidatingChildIter::new(schema, &element.children))
    }
}
