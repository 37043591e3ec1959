//! Whole-schema static analysis
//!
//! Answers structural questions about a compiled [`Schema`] without any
//! document at hand: which tokens can open an element's content, which
//! elements contain which, where an element is used inline (next to text)
//! or structurally, and what the start element can reach.

use indexmap::{IndexMap, IndexSet};

use super::ast::Token;
use super::automaton::{Label, State};
use super::elements::ElementSchema;
use super::expressions::Expression;
use super::schemas::Schema;

/// Analysis over one schema
#[derive(Debug, Clone)]
pub struct SchemaAnalyzer<'s> {
    schema: &'s Schema,
    children: IndexMap<&'s str, IndexSet<String>>,
    parents: IndexMap<String, IndexSet<&'s str>>,
}

impl<'s> SchemaAnalyzer<'s> {
    /// Index the parent/child relations of a schema
    pub fn new(schema: &'s Schema) -> Self {
        let mut children = IndexMap::new();
        let mut parents: IndexMap<String, IndexSet<&'s str>> = IndexMap::new();
        for element in schema.elements() {
            let names: IndexSet<String> = element
                .expression()
                .allowed_tokens()
                .iter()
                .filter(|t| !t.is_text())
                .map(|t| t.name().to_string())
                .collect();
            for name in &names {
                parents.entry(name.clone()).or_default().insert(element.name());
            }
            children.insert(element.name(), names);
        }
        Self {
            schema,
            children,
            parents,
        }
    }

    /// Analyzed schema
    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Tokens that can open the content of `tag`, one group per branch
    ///
    /// Interleaves give one group per block. Otherwise the transitions
    /// leaving the start state are grouped by the state they lead to.
    pub fn first_tokens(&self, tag: &str) -> Vec<IndexSet<Token>> {
        let Some(element) = self.schema.element_schema(tag) else {
            return Vec::new();
        };
        match element.expression() {
            Expression::Interleave(expr) => expr
                .components()
                .iter()
                .map(|automaton| automaton.expected(State::Start).into_iter().collect())
                .collect(),
            Expression::Dfa(expr) => {
                let mut branches: IndexMap<State, IndexSet<Token>> = IndexMap::new();
                if let Some(edges) = expr.automaton().edges(State::Start) {
                    for (label, target) in edges {
                        if let Label::Token(token) = label {
                            branches.entry(*target).or_default().insert(token.clone());
                        }
                    }
                }
                branches.into_values().collect()
            }
        }
    }

    /// Check if some path through the content of `tag` allows text
    ///
    /// Not exclusive with [`is_structured`](Self::is_structured): mixed
    /// content is both.
    pub fn is_text(&self, tag: &str) -> bool {
        self.schema
            .element_schema(tag)
            .is_some_and(ElementSchema::is_text_allowed)
    }

    /// Check if some path through the content of `tag` allows elements
    pub fn is_structured(&self, tag: &str) -> bool {
        self.schema.contains(tag) && !self.children(tag).is_empty()
    }

    /// Check if the content of `tag` is necessarily empty
    pub fn is_empty(&self, tag: &str) -> bool {
        self.schema
            .element_schema(tag)
            .is_some_and(|e| e.expression().allowed_tokens().is_empty())
    }

    /// Elements allowed directly inside `tag`
    pub fn children(&self, tag: &str) -> IndexSet<&str> {
        self.children
            .get(tag)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Elements allowing `tag` directly inside them
    pub fn parents(&self, tag: &str) -> IndexSet<&'s str> {
        self.parents.get(tag).cloned().unwrap_or_default()
    }

    /// Elements reachable below `tag` at any depth
    pub fn descendants(&self, tag: &str) -> IndexSet<String> {
        let mut found: IndexSet<String> = IndexSet::new();
        let mut stack: Vec<String> = self.children(tag).into_iter().map(str::to_string).collect();
        while let Some(name) = stack.pop() {
            if found.insert(name.clone()) {
                stack.extend(self.children(&name).into_iter().map(str::to_string));
            }
        }
        found
    }

    /// Elements containing `tag` at any depth
    pub fn ancestors(&self, tag: &str) -> IndexSet<&'s str> {
        let mut found: IndexSet<&'s str> = IndexSet::new();
        let mut stack: Vec<&'s str> = self.parents(tag).into_iter().collect();
        while let Some(name) = stack.pop() {
            if found.insert(name) {
                stack.extend(self.parents(name));
            }
        }
        found
    }

    /// Parents of `tag` whose content also allows text
    pub fn used_inline_by(&self, tag: &str) -> IndexSet<&'s str> {
        self.parents_where(tag, |parent| parent.is_text_allowed())
    }

    /// Parents of `tag` whose content does not allow text
    pub fn used_structured_by(&self, tag: &str) -> IndexSet<&'s str> {
        self.parents_where(tag, |parent| !parent.is_text_allowed())
    }

    /// Start element and everything below it; empty without a start element
    pub fn reachable_from_start(&self) -> IndexSet<String> {
        let Some(start) = self.schema.start() else {
            return IndexSet::new();
        };
        let mut reachable = IndexSet::from([start.to_string()]);
        reachable.extend(self.descendants(start));
        reachable
    }

    /// Child names used in content models but never declared, with the
    /// elements using them
    pub fn undeclared_references(&self) -> Vec<(&'s str, String)> {
        let mut missing = Vec::new();
        for (parent, names) in &self.children {
            for name in names {
                if !self.schema.contains(name) {
                    missing.push((*parent, name.clone()));
                }
            }
        }
        missing
    }

    fn parents_where<F>(&self, tag: &str, predicate: F) -> IndexSet<&'s str>
    where
        F: Fn(&ElementSchema) -> bool,
    {
        self.parents(tag)
            .into_iter()
            .filter(|name| self.schema.element_schema(name).is_some_and(&predicate))
            .collect()
    }
}
