//! Batch validation
//!
//! [`Validator`] walks a subtree breadth-first and replays the children of
//! every element through a fresh expression state. Nothing stops the walk:
//! every violation found is collected and returned at once.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::documents::{tokenize, Document, Element, Node};
use crate::error::Error;
use crate::limits::Limits;

use super::exceptions::{ValidationError, ViolationKind};
use super::expressions::Consumed;
use super::schemas::Schema;

/// How undeclared names are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Undeclared elements and attributes are violations
    #[default]
    Strict,
    /// Undeclared elements are skipped with their subtree, undeclared
    /// attributes are ignored
    Lax,
    /// No validation is performed
    Skip,
}

impl ValidationMode {
    /// Get the mode as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::Strict => "strict",
            ValidationMode::Lax => "lax",
            ValidationMode::Skip => "skip",
        }
    }
}

impl FromStr for ValidationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(ValidationMode::Strict),
            "lax" => Ok(ValidationMode::Lax),
            "skip" => Ok(ValidationMode::Skip),
            _ => Err(Error::Other(format!(
                "Invalid validation mode: '{}'. Must be 'strict', 'lax', or 'skip'",
                s
            ))),
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation context for one run
///
/// Carries the configuration and collects violations as the walk
/// proceeds.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Current validation mode
    pub mode: ValidationMode,
    /// Resource limits
    pub limits: Limits,
    /// Collected validation errors
    pub errors: Vec<ValidationError>,
    /// Number of elements visited
    pub visited: usize,
}

impl ValidationContext {
    /// Create a new validation context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with a specific mode
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Create a context with specific limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get the error count
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Add a validation error located at `path`
    pub fn add_error(&mut self, error: ValidationError, path: &str) {
        self.errors.push(error.with_path(path));
    }

    /// Clear the context for reuse
    pub fn clear(&mut self) {
        self.errors.clear();
        self.visited = 0;
    }

    /// Turn the collected errors into a result
    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Breadth-first validator over node trees
#[derive(Debug, Clone)]
pub struct Validator<'s> {
    schema: &'s Schema,
    mode: ValidationMode,
    limits: Limits,
}

impl<'s> Validator<'s> {
    /// Validator using the schema's limits in strict mode
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            mode: ValidationMode::Strict,
            limits: schema.limits().clone(),
        }
    }

    /// Set the mode (builder style)
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the limits (builder style)
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Validate a subtree rooted at `root`
    pub fn validate(&self, root: &Element) -> Result<(), Vec<ValidationError>> {
        let mut context = self.context();
        self.validate_with(root, &mut context);
        context.into_result()
    }

    /// Validate a whole document, checking the root against the start element
    pub fn validate_document(&self, document: &Document) -> Result<(), Vec<ValidationError>> {
        let mut context = self.context();
        if self.mode != ValidationMode::Skip {
            if let Some(start) = self.schema.start() {
                if document.root.name != start {
                    context.add_error(
                        ValidationError::new(
                            ViolationKind::NotAllowed,
                            format!("root element '{}' is not the start element '{}'", document.root.name, start),
                        )
                        .with_element(document.root.name.as_str()),
                        "/",
                    );
                }
            }
        }
        self.validate_with(&document.root, &mut context);
        context.into_result()
    }

    /// Validate into an existing context
    pub fn validate_with(&self, root: &Element, context: &mut ValidationContext) {
        if context.mode == ValidationMode::Skip {
            return;
        }

        let mut queue = VecDeque::from([(root, format!("/{}", root.name), 1usize)]);
        while let Some((element, path, depth)) = queue.pop_front() {
            context.visited += 1;
            if context.limits.check_document_depth(depth).is_err() {
                context.add_error(
                    ValidationError::new(
                        ViolationKind::TooDeep,
                        format!(
                            "element nests deeper than {} levels",
                            context.limits.max_document_depth
                        ),
                    )
                    .with_element(element.name.as_str()),
                    &path,
                );
                continue;
            }

            let Some(schema) = self.schema.element_schema(&element.name) else {
                if context.mode == ValidationMode::Strict {
                    context.add_error(
                        ValidationError::new(
                            ViolationKind::UnknownElement,
                            format!("element '{}' is not declared", element.name),
                        )
                        .with_element(element.name.as_str()),
                        &path,
                    );
                } else {
                    debug!(%path, "skipping undeclared element");
                }
                continue;
            };

            if context.mode == ValidationMode::Strict {
                for name in element.attributes.keys() {
                    if is_namespace_declaration(name) || schema.has_attribute(name) {
                        continue;
                    }
                    context.add_error(
                        ValidationError::new(
                            ViolationKind::UnknownAttribute,
                            format!("attribute '{}' is not declared", name),
                        )
                        .with_element(element.name.as_str()),
                        &path,
                    );
                }
            }

            let expr = schema.expression();
            let mut state = expr.initial_state();
            for slot in tokenize(&element.children) {
                match expr.consume(&state, &slot.token) {
                    Consumed::Accepted(next) => state = next,
                    Consumed::Rejected(_) if slot.blank => {}
                    Consumed::Rejected(next) => {
                        if let Some(error) = next.errors().last() {
                            let mut error = error.clone().with_element(element.name.as_str());
                            error.index = Some(slot.index);
                            context.add_error(error, &path);
                        }
                        state = next;
                    }
                }
            }
            if let Some(error) = expr.finish(&state) {
                context.add_error(error.with_element(element.name.as_str()), &path);
            }

            let mut seen: Vec<(&str, usize)> = Vec::new();
            for child in element.children.iter().filter_map(Node::as_element) {
                let position = match seen.iter_mut().find(|(name, _)| *name == child.name) {
                    Some((_, count)) => {
                        *count += 1;
                        *count
                    }
                    None => {
                        seen.push((child.name.as_str(), 1));
                        1
                    }
                };
                queue.push_back((child, format!("{}/{}[{}]", path, child.name, position), depth + 1));
            }
        }
    }

    fn context(&self) -> ValidationContext {
        ValidationContext::new()
            .with_mode(self.mode)
            .with_limits(self.limits.clone())
    }
}

fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::ast::{Pattern, Token};
    use crate::validators::schemas::{ElementDecl, Grammar};

    fn schema() -> Schema {
        let grammar = Grammar::new()
            .start("list")
            .element(
                "list",
                ElementDecl::new(Pattern::sequence(vec![
                    Pattern::optional(Pattern::token("head")),
                    Pattern::plus(Pattern::token("item")),
                ]))
                .with_attributes(["type"]),
            )
            .element("head", ElementDecl::new(Pattern::text()))
            .element(
                "item",
                ElementDecl::new(Pattern::kleene(Pattern::choice(vec![
                    Pattern::text(),
                    Pattern::token("list"),
                ]))),
            );
        Schema::from_grammar(&grammar, Limits::default()).unwrap()
    }

    fn parse(xml: &str) -> Document {
        Document::from_string(xml).unwrap()
    }

    #[test]
    fn test_valid_document() {
        let schema = schema();
        let doc = parse("<list type=\"1\">\n  <head>H</head>\n  <item>a <list><item/></list></item>\n</list>");
        assert_eq!(Validator::new(&schema).validate_document(&doc), Ok(()));
    }

    #[test]
    fn test_collects_every_violation() {
        let schema = schema();
        let doc = parse("<list><item/><head>h</head><item><list/></item></list>");
        let errors = Validator::new(&schema).validate(&doc.root).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, ViolationKind::Misplaced);
        assert_eq!(errors[0].token, Some(Token::element("head")));
        assert_eq!(errors[0].index, Some(1));
        assert_eq!(errors[0].path(), Some("/list"));
        assert_eq!(errors[1].kind, ViolationKind::Incomplete);
        assert_eq!(errors[1].path(), Some("/list/item[2]/list[1]"));
        assert_eq!(errors[1].expected, vec![Token::element("head"), Token::element("item")]);
    }

    #[test]
    fn test_modes() {
        let schema = schema();
        let doc = parse("<list id=\"x\"><item><para/></item></list>");

        let errors = Validator::new(&schema).validate(&doc.root).unwrap_err();
        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::UnknownAttribute,
                ViolationKind::NotAllowed,
                ViolationKind::UnknownElement
            ]
        );

        let lax = Validator::new(&schema).with_mode(ValidationMode::Lax);
        let errors = lax.validate(&doc.root).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::NotAllowed);

        let skip = Validator::new(&schema).with_mode(ValidationMode::Skip);
        assert!(skip.validate(&doc.root).is_ok());
    }

    #[test]
    fn test_wrong_root() {
        let schema = schema();
        let doc = parse("<item/>");
        let errors = Validator::new(&schema).validate_document(&doc).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::NotAllowed);
        assert!(Validator::new(&schema).validate(&doc.root).is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let schema = schema();
        let doc = parse("<list><item><list><item/></list></item></list>");
        let mut limits = Limits::default();
        limits.max_document_depth = 3;
        let errors = Validator::new(&schema)
            .with_limits(limits)
            .validate(&doc.root)
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::TooDeep);
        assert_eq!(errors[0].path(), Some("/list/item[1]/list[1]/item[1]"));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("lax".parse::<ValidationMode>().unwrap(), ValidationMode::Lax);
        assert!("loose".parse::<ValidationMode>().is_err());
        assert_eq!(ValidationMode::default().to_string(), "strict");
    }
}
