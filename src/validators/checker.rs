//! Design checks over a compiled schema
//!
//! The checker compares what each element is declared to be (its
//! [`ElementKind`]) with what its content model and its uses actually
//! allow. Findings are advisory: a schema with findings still compiles and
//! validates.

use std::fmt;

use tracing::debug;

use super::analysis::SchemaAnalyzer;
use super::elements::{ElementKind, ElementSchema};
use super::schemas::Schema;

/// Design rule a finding violates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// A text element appears next to character data in some parent
    TextElementUsedInline,
    /// An element-kind element allows character data
    ElementAllowsText,
    /// A hybrid element does not allow both text and elements
    HybridNotMixed,
    /// An inline element is never used next to character data
    InlineNeverInline,
    /// An anchor allows content
    AnchorNotEmpty,
    /// A container allows character data
    ContainerAllowsText,
    /// The element cannot be reached from the start element
    Unreachable,
    /// A content model refers to an element that is not declared
    UndeclaredElement,
}

impl Rule {
    /// Short identifier of the rule
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::TextElementUsedInline => "text-used-inline",
            Rule::ElementAllowsText => "element-allows-text",
            Rule::HybridNotMixed => "hybrid-not-mixed",
            Rule::InlineNeverInline => "inline-never-inline",
            Rule::AnchorNotEmpty => "anchor-not-empty",
            Rule::ContainerAllowsText => "container-allows-text",
            Rule::Unreachable => "unreachable",
            Rule::UndeclaredElement => "undeclared-element",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory design inconsistency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Violated rule
    pub rule: Rule,
    /// Element the finding is about
    pub element: String,
    /// Human readable explanation
    pub message: String,
}

impl Finding {
    fn new(rule: Rule, element: &str, message: impl Into<String>) -> Self {
        Self {
            rule,
            element: element.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] <{}>: {}", self.rule, self.element, self.message)
    }
}

/// Rule set keyed by declared element kind
#[derive(Debug, Clone)]
pub struct Checker<'s> {
    analyzer: SchemaAnalyzer<'s>,
}

impl<'s> Checker<'s> {
    /// Prepare checks for a schema
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            analyzer: SchemaAnalyzer::new(schema),
        }
    }

    /// Analyzer the checks run on
    pub fn analyzer(&self) -> &SchemaAnalyzer<'s> {
        &self.analyzer
    }

    /// Run every rule and return the findings in declaration order
    pub fn check(&self) -> Vec<Finding> {
        let schema = self.analyzer.schema();
        let mut findings = Vec::new();

        for element in schema.elements() {
            self.check_kind(element, &mut findings);
        }

        if schema.start().is_some() {
            let reachable = self.analyzer.reachable_from_start();
            for name in schema.element_names() {
                if !reachable.contains(name) {
                    findings.push(Finding::new(
                        Rule::Unreachable,
                        name,
                        "not reachable from the start element",
                    ));
                }
            }
        }

        for (parent, name) in self.analyzer.undeclared_references() {
            findings.push(Finding::new(
                Rule::UndeclaredElement,
                parent,
                format!("content refers to undeclared element '{}'", name),
            ));
        }

        debug!(findings = findings.len(), "schema checked");
        findings
    }

    fn check_kind(&self, element: &ElementSchema, findings: &mut Vec<Finding>) {
        let name = element.name();
        let analyzer = &self.analyzer;
        match element.kind() {
            ElementKind::Text => {
                let inline = analyzer.used_inline_by(name);
                if !inline.is_empty() {
                    let parents: Vec<&str> = inline.into_iter().collect();
                    findings.push(Finding::new(
                        Rule::TextElementUsedInline,
                        name,
                        format!("text element used inline by {}", parents.join(", ")),
                    ));
                }
            }
            ElementKind::Element if element.is_text_allowed() => {
                findings.push(Finding::new(
                    Rule::ElementAllowsText,
                    name,
                    "declared as element but its content allows text",
                ));
            }
            ElementKind::Hybrid if !(analyzer.is_text(name) && analyzer.is_structured(name)) => {
                findings.push(Finding::new(
                    Rule::HybridNotMixed,
                    name,
                    "declared as hybrid but its content does not mix text and elements",
                ));
            }
            ElementKind::InlineElement if analyzer.used_inline_by(name).is_empty() => {
                findings.push(Finding::new(
                    Rule::InlineNeverInline,
                    name,
                    "declared as inline element but never used next to text",
                ));
            }
            ElementKind::Anchor if !analyzer.is_empty(name) => {
                findings.push(Finding::new(
                    Rule::AnchorNotEmpty,
                    name,
                    "declared as anchor but its content is not empty",
                ));
            }
            ElementKind::Container if element.is_text_allowed() => {
                findings.push(Finding::new(
                    Rule::ContainerAllowsText,
                    name,
                    "declared as container but its content allows text",
                ));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::validators::ast::Pattern;
    use crate::validators::schemas::{ElementDecl, Grammar};

    fn rules(findings: &[Finding]) -> Vec<(Rule, &str)> {
        findings.iter().map(|f| (f.rule, f.element.as_str())).collect()
    }

    #[test]
    fn test_clean_schema() {
        let grammar = Grammar::new()
            .start("doc")
            .element("doc", ElementDecl::new(Pattern::plus(Pattern::token("p"))))
            .element(
                "p",
                ElementDecl::new(Pattern::kleene(Pattern::choice(vec![
                    Pattern::text(),
                    Pattern::token("em"),
                    Pattern::token("br"),
                ]))),
            )
            .element("em", ElementDecl::new(Pattern::text()))
            .element("br", ElementDecl::new(Pattern::empty()))
            .kind("doc", ElementKind::Container)
            .kind("em", ElementKind::InlineElement)
            .kind("br", ElementKind::Anchor);
        let schema = Schema::from_grammar(&grammar, Limits::default()).unwrap();
        assert!(Checker::new(&schema).check().is_empty());
    }

    #[test]
    fn test_kind_rules() {
        let grammar = Grammar::new()
            .element(
                "section",
                ElementDecl::new(Pattern::sequence(vec![
                    Pattern::token("title"),
                    Pattern::kleene(Pattern::token("para")),
                ])),
            )
            .element(
                "para",
                ElementDecl::new(Pattern::kleene(Pattern::choice(vec![
                    Pattern::text(),
                    Pattern::token("title"),
                    Pattern::token("mark"),
                ]))),
            )
            .element("title", ElementDecl::new(Pattern::text()))
            .element("mark", ElementDecl::new(Pattern::token("title")))
            .element("box", ElementDecl::new(Pattern::text()))
            .element("note", ElementDecl::new(Pattern::token("para")))
            .kind("section", ElementKind::Hybrid)
            .kind("para", ElementKind::Element)
            .kind("mark", ElementKind::Anchor)
            .kind("box", ElementKind::Container)
            .kind("note", ElementKind::InlineElement);
        let schema = Schema::from_grammar(&grammar, Limits::default()).unwrap();
        let findings = Checker::new(&schema).check();

        assert_eq!(
            rules(&findings),
            vec![
                (Rule::HybridNotMixed, "section"),
                (Rule::ElementAllowsText, "para"),
                (Rule::TextElementUsedInline, "title"),
                (Rule::AnchorNotEmpty, "mark"),
                (Rule::ContainerAllowsText, "box"),
                (Rule::InlineNeverInline, "note"),
            ]
        );
        assert!(findings[2].message.contains("para"));
    }

    #[test]
    fn test_hybrid_rule_accepts_mixed_content() {
        let grammar = Grammar::new()
            .element(
                "mixed",
                ElementDecl::new(Pattern::kleene(Pattern::choice(vec![
                    Pattern::text(),
                    Pattern::token("em"),
                ]))),
            )
            .element("plain", ElementDecl::new(Pattern::text()))
            .element("em", ElementDecl::new(Pattern::empty()))
            .kind("mixed", ElementKind::Hybrid)
            .kind("plain", ElementKind::Hybrid)
            .kind("em", ElementKind::Anchor);
        let schema = Schema::from_grammar(&grammar, Limits::default()).unwrap();
        let findings = Checker::new(&schema).check();
        assert_eq!(rules(&findings), vec![(Rule::HybridNotMixed, "plain")]);
    }

    #[test]
    fn test_reachability_rules() {
        let grammar = Grammar::new()
            .start("doc")
            .element("doc", ElementDecl::new(Pattern::kleene(Pattern::token("item"))))
            .element("spare", ElementDecl::new(Pattern::empty()));
        let schema = Schema::from_grammar(&grammar, Limits::default()).unwrap();
        let findings = Checker::new(&schema).check();
        assert_eq!(
            rules(&findings),
            vec![(Rule::Unreachable, "spare"), (Rule::UndeclaredElement, "doc")]
        );
        assert_eq!(
            findings[1].to_string(),
            "[undeclared-element] <doc>: content refers to undeclared element 'item'"
        );
    }
}
