//! Incremental child validation
//!
//! [`ValidatingChildIter`] walks the children of one element while they are
//! being consumed (by a renderer or an editor). Invalid children do not stop
//! the walk: they are logged and handed back wrapped in a comment, so the
//! caller always receives something it can emit.

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::documents::{tokenize, ChildToken, Node};

use super::elements::ElementSchema;
use super::exceptions::{ValidationError, ViolationKind};
use super::expressions::{Consumed, ExprState};

#[derive(Debug, Clone)]
struct Snapshot {
    state: ExprState,
    errors: usize,
}

/// Iterator validating children one at a time
#[derive(Debug, Clone)]
pub struct ValidatingChildIter<'a> {
    schema: &'a ElementSchema,
    children: &'a [Node],
    slots: Vec<Option<ChildToken>>,
    position: usize,
    state: ExprState,
    history: Vec<Snapshot>,
    errors: Vec<ValidationError>,
}

impl<'a> ValidatingChildIter<'a> {
    /// Start validating `children` against `schema`
    pub fn new(schema: &'a ElementSchema, children: &'a [Node]) -> Self {
        let mut slots = vec![None; children.len()];
        for slot in tokenize(children) {
            let index = slot.index;
            slots[index] = Some(slot);
        }
        Self {
            schema,
            children,
            slots,
            position: 0,
            state: schema.expression().initial_state(),
            history: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Declaration the children are validated against
    pub fn schema(&self) -> &'a ElementSchema {
        self.schema
    }

    /// Current validation state
    pub fn state(&self) -> &ExprState {
        &self.state
    }

    /// Index of the next child to be returned
    pub fn position(&self) -> usize {
        self.position
    }

    /// Violations recorded so far, with child indices
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Undo the latest `next()`
    ///
    /// Returns false when nothing has been consumed yet.
    pub fn back(&mut self) -> bool {
        match self.history.pop() {
            Some(snapshot) => {
                self.state = snapshot.state;
                self.errors.truncate(snapshot.errors);
                self.position -= 1;
                true
            }
            None => false,
        }
    }

    /// Check the content seen so far is complete
    pub fn finish(&self) -> Option<ValidationError> {
        self.schema
            .expression()
            .finish(&self.state)
            .map(|error| error.with_element(self.schema.name()))
    }

    /// Drain the remaining children and return every violation
    pub fn into_errors(mut self) -> Vec<ValidationError> {
        while self.next().is_some() {}
        let incomplete = self.finish();
        self.errors.extend(incomplete);
        self.errors
    }
}

impl<'a> Iterator for ValidatingChildIter<'a> {
    type Item = Cow<'a, Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let children = self.children;
        let node = children.get(self.position)?;
        let index = self.position;
        self.history.push(Snapshot {
            state: self.state.clone(),
            errors: self.errors.len(),
        });
        self.position += 1;

        // comments and the tail of a text run carry no token
        let (token, blank) = match &self.slots[index] {
            Some(slot) => (slot.token.clone(), slot.blank),
            None => return Some(Cow::Borrowed(node)),
        };

        match self.schema.expression().consume(&self.state, &token) {
            Consumed::Accepted(state) => {
                self.state = state;
                Some(Cow::Borrowed(node))
            }
            Consumed::Rejected(_) if blank => {
                debug!(element = self.schema.name(), index, "ignoring whitespace");
                Some(Cow::Borrowed(node))
            }
            Consumed::Rejected(state) => {
                let mut error = state
                    .errors()
                    .last()
                    .cloned()
                    .unwrap_or_else(|| {
                        ValidationError::unexpected_child(ViolationKind::NotAllowed, &token, index)
                    })
                    .with_element(self.schema.name());
                error.index = Some(index);
                warn!(error = %error, "replacing invalid child with a comment");
                self.errors.push(error);
                self.state = state;
                Some(Cow::Owned(defuse(node)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.children.len() - self.position;
        (remaining, Some(remaining))
    }
}

/// Wrap a node's markup in a comment
fn defuse(node: &Node) -> Node {
    let mut text = node.to_xml();
    while text.contains("--") {
        text = text.replace("--", "- -");
    }
    if text.ends_with('-') {
        text.push(' ');
    }
    Node::Comment(text)
}
