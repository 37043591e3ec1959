//! Content expressions
//!
//! An [`Expression`] wraps compiled automata behind one
//! validation-state-machine interface:
//! - [`DfaExpr`]: a single automaton
//! - [`InterleaveExpr`]: one automaton per interleave block, advanced in
//!   parallel
//!
//! Expressions are immutable and shareable. All progress lives in an
//! [`ExprState`] value owned by the caller; [`Expression::consume`] takes a
//! state by reference and returns the next one, so snapshots are plain
//! clones.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use super::ast::Token;
use super::automaton::{Automaton, State};
use super::compiler::CompiledModel;
use super::exceptions::{ValidationError, ViolationKind};

/// Where an insertion-position search starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertSide {
    /// Lowest valid index
    #[default]
    First,
    /// Highest valid index
    Last,
}

/// Interleave component able to accept a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Component index
    pub index: usize,
    /// Whether the component was already finished before the token
    pub finished: bool,
}

/// Strategy picking the interleave component that consumes a token
///
/// When a token is legal in more than one block the grammar does not say
/// which block owns it. Strategies are heuristics; none is guaranteed to
/// find an accepting assignment when one exists.
pub trait TieBreak: fmt::Debug + Send + Sync {
    /// Pick one of the candidates (never empty), by component index
    fn choose(&self, token: &Token, candidates: &[Candidate]) -> Option<usize>;
}

/// Commit to the leftmost component able to accept the token
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl TieBreak for FirstMatch {
    fn choose(&self, _token: &Token, candidates: &[Candidate]) -> Option<usize> {
        candidates.first().map(|c| c.index)
    }
}

/// Prefer the leftmost component that is not finished yet
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferUnfinished;

impl TieBreak for PreferUnfinished {
    fn choose(&self, _token: &Token, candidates: &[Candidate]) -> Option<usize> {
        candidates
            .iter()
            .find(|c| !c.finished)
            .or_else(|| candidates.first())
            .map(|c| c.index)
    }
}

/// Position inside an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// Position of a single automaton
    Single(State),
    /// One position per interleave component
    Interleaved(Vec<State>),
}

/// Caller-owned validation progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprState {
    cursor: Cursor,
    trace: Vec<Token>,
    offered: usize,
    errors: Vec<ValidationError>,
}

impl ExprState {
    fn new(cursor: Cursor) -> Self {
        Self {
            cursor,
            trace: Vec::new(),
            offered: 0,
            errors: Vec::new(),
        }
    }

    /// Current position
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Tokens accepted so far
    pub fn trace(&self) -> &[Token] {
        &self.trace
    }

    /// Number of tokens offered so far, accepted or not
    pub fn offered(&self) -> usize {
        self.offered
    }

    /// Violations recorded so far
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Check if any violation was recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take the recorded violations, keeping the position
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

/// Outcome of offering one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumed {
    /// The token was accepted; the state has advanced
    Accepted(ExprState),
    /// The token was rejected; the position is unchanged and a violation
    /// has been recorded
    Rejected(ExprState),
}

impl Consumed {
    /// Check if the token was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Consumed::Accepted(_))
    }

    /// Resulting state
    pub fn state(&self) -> &ExprState {
        match self {
            Consumed::Accepted(state) | Consumed::Rejected(state) => state,
        }
    }

    /// Take the resulting state
    pub fn into_state(self) -> ExprState {
        match self {
            Consumed::Accepted(state) | Consumed::Rejected(state) => state,
        }
    }
}

/// Expression over a single automaton
#[derive(Debug, Clone)]
pub struct DfaExpr {
    automaton: Automaton,
    allowed: IndexSet<Token>,
    unconstrained: bool,
}

impl DfaExpr {
    /// Wrap an automaton
    pub fn new(automaton: Automaton) -> Self {
        let allowed = automaton.reachable_tokens();
        let unconstrained = is_unconstrained(&automaton, &allowed);
        Self {
            automaton,
            allowed,
            unconstrained,
        }
    }

    /// Underlying automaton
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }
}

/// Expression over parallel interleave components
#[derive(Debug, Clone)]
pub struct InterleaveExpr {
    components: Vec<Automaton>,
    allowed: IndexSet<Token>,
    tie_break: Arc<dyn TieBreak>,
}

impl InterleaveExpr {
    /// Wrap interleave components with the default tie-break
    pub fn new(components: Vec<Automaton>) -> Self {
        let allowed = components
            .iter()
            .flat_map(|a| a.reachable_tokens())
            .collect();
        Self {
            components,
            allowed,
            tie_break: Arc::new(FirstMatch),
        }
    }

    /// Underlying automata, one per block
    pub fn components(&self) -> &[Automaton] {
        &self.components
    }

    /// Tie-break strategy in use
    pub fn tie_break(&self) -> &Arc<dyn TieBreak> {
        &self.tie_break
    }
}

/// Compiled content expression of one element
#[derive(Debug, Clone)]
pub enum Expression {
    /// Single automaton
    Dfa(DfaExpr),
    /// Parallel automata
    Interleave(InterleaveExpr),
}

impl From<CompiledModel> for Expression {
    fn from(model: CompiledModel) -> Self {
        match model {
            CompiledModel::Single(automaton) => Expression::Dfa(DfaExpr::new(automaton)),
            CompiledModel::Interleave(components) => {
                Expression::Interleave(InterleaveExpr::new(components))
            }
        }
    }
}

impl Expression {
    /// Expression over a single automaton
    pub fn dfa(automaton: Automaton) -> Self {
        Expression::Dfa(DfaExpr::new(automaton))
    }

    /// Expression over interleave components
    pub fn interleave(components: Vec<Automaton>) -> Self {
        Expression::Interleave(InterleaveExpr::new(components))
    }

    /// Replace the interleave tie-break strategy (no effect on DFA expressions)
    pub fn with_tie_break(mut self, strategy: Arc<dyn TieBreak>) -> Self {
        if let Expression::Interleave(ref mut expr) = self {
            expr.tie_break = strategy;
        }
        self
    }

    /// Check if this is an interleave expression
    pub fn is_interleave(&self) -> bool {
        matches!(self, Expression::Interleave(_))
    }

    /// Compiled automata (one for DFA expressions)
    pub fn automata(&self) -> &[Automaton] {
        match self {
            Expression::Dfa(expr) => std::slice::from_ref(&expr.automaton),
            Expression::Interleave(expr) => &expr.components,
        }
    }

    /// State before any token
    pub fn initial_state(&self) -> ExprState {
        match self {
            Expression::Dfa(_) => ExprState::new(Cursor::Single(State::Start)),
            Expression::Interleave(expr) => {
                ExprState::new(Cursor::Interleaved(vec![State::Start; expr.components.len()]))
            }
        }
    }

    /// Tokens reachable anywhere in the content model
    pub fn allowed_tokens(&self) -> &IndexSet<Token> {
        match self {
            Expression::Dfa(expr) => &expr.allowed,
            Expression::Interleave(expr) => &expr.allowed,
        }
    }

    /// Check if a token may appear anywhere in the content model
    pub fn is_allowed(&self, token: &Token) -> bool {
        self.allowed_tokens().contains(token)
    }

    /// Check if character data may appear anywhere in the content model
    pub fn is_text_allowed(&self) -> bool {
        self.is_allowed(&Token::Text)
    }

    /// Check if the expression accepts any sequence of allowed tokens
    ///
    /// True for repetitions of single-token alternatives, like
    /// `(a | b | #text)*`. Insertion searches short-circuit on such
    /// expressions since every boundary is valid.
    pub fn is_unconstrained(&self) -> bool {
        match self {
            Expression::Dfa(expr) => expr.unconstrained,
            Expression::Interleave(_) => false,
        }
    }

    /// Offer one token
    pub fn consume(&self, state: &ExprState, token: &Token) -> Consumed {
        let mut next = state.clone();
        let index = next.offered;
        next.offered += 1;

        match self.advance(&state.cursor, token) {
            Some(cursor) => {
                next.cursor = cursor;
                next.trace.push(token.clone());
                Consumed::Accepted(next)
            }
            None => {
                let kind = if self.is_allowed(token) {
                    ViolationKind::Misplaced
                } else {
                    ViolationKind::NotAllowed
                };
                next.errors.push(
                    ValidationError::unexpected_child(kind, token, index)
                        .with_expected(self.expected(state)),
                );
                Consumed::Rejected(next)
            }
        }
    }

    /// Check if the content seen so far is complete
    pub fn is_finished(&self, state: &ExprState) -> bool {
        self.cursor_finished(&state.cursor)
    }

    /// Violation for unfinished content, if any
    pub fn finish(&self, state: &ExprState) -> Option<ValidationError> {
        if self.is_finished(state) {
            None
        } else {
            Some(
                ValidationError::incomplete_content(state.offered)
                    .with_expected(self.expected(state)),
            )
        }
    }

    /// Tokens acceptable at the current position
    pub fn expected(&self, state: &ExprState) -> Vec<Token> {
        match (self, &state.cursor) {
            (Expression::Dfa(expr), Cursor::Single(s)) => expr.automaton.expected(*s),
            (Expression::Interleave(expr), Cursor::Interleaved(states)) => {
                let mut expected = IndexSet::new();
                for (automaton, s) in expr.components.iter().zip(states) {
                    expected.extend(automaton.expected(*s));
                }
                expected.into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Check if a whole token sequence is accepted
    pub fn accepts<'a, I>(&self, tokens: I) -> bool
    where
        I: IntoIterator<Item = &'a Token>,
    {
        let mut cursor = self.initial_state().cursor;
        for token in tokens {
            match self.advance(&cursor, token) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
        self.cursor_finished(&cursor)
    }

    /// Replay a token sequence, collecting every violation
    ///
    /// Rejected tokens are skipped and validation continues with the next
    /// one; an unfinished model adds a final `Incomplete` violation.
    pub fn validate<'a, I>(&self, tokens: I) -> Vec<ValidationError>
    where
        I: IntoIterator<Item = &'a Token>,
    {
        let mut state = self.initial_state();
        for token in tokens {
            state = self.consume(&state, token).into_state();
        }
        let incomplete = self.finish(&state);
        let mut errors = state.into_errors();
        errors.extend(incomplete);
        errors
    }

    /// Find where `token` may be inserted among `children`
    ///
    /// Tries every boundary, starting from the requested side, and returns
    /// the first index whose hypothetical child list validates in full.
    /// Worst case is quadratic in the number of children.
    pub fn find_insert_pos(&self, children: &[Token], token: &Token, side: InsertSide) -> Option<usize> {
        if !self.is_allowed(token) {
            return None;
        }
        if self.is_unconstrained() {
            return Some(match side {
                InsertSide::First => 0,
                InsertSide::Last => children.len(),
            });
        }

        let order: Vec<usize> = match side {
            InsertSide::First => (0..=children.len()).collect(),
            InsertSide::Last => (0..=children.len()).rev().collect(),
        };
        order.into_iter().find(|&i| {
            let hypothetical = children[..i]
                .iter()
                .chain(std::iter::once(token))
                .chain(children[i..].iter());
            self.accepts(hypothetical)
        })
    }

    fn advance(&self, cursor: &Cursor, token: &Token) -> Option<Cursor> {
        match (self, cursor) {
            (Expression::Dfa(expr), Cursor::Single(s)) => {
                expr.automaton.consume(*s, token).map(Cursor::Single)
            }
            (Expression::Interleave(expr), Cursor::Interleaved(states)) => {
                let mut targets = Vec::new();
                let mut candidates = Vec::new();
                for (index, (automaton, s)) in expr.components.iter().zip(states).enumerate() {
                    if let Some(target) = automaton.consume(*s, token) {
                        candidates.push(Candidate {
                            index,
                            finished: automaton.is_finished(*s),
                        });
                        targets.push(target);
                    }
                }
                if candidates.is_empty() {
                    return None;
                }
                let chosen = expr.tie_break.choose(token, &candidates)?;
                let slot = candidates.iter().position(|c| c.index == chosen)?;
                let mut next = states.clone();
                next[chosen] = targets[slot];
                Some(Cursor::Interleaved(next))
            }
            // a state from another expression; nothing can be consumed
            _ => None,
        }
    }

    fn cursor_finished(&self, cursor: &Cursor) -> bool {
        match (self, cursor) {
            (Expression::Dfa(expr), Cursor::Single(s)) => expr.automaton.is_finished(*s),
            (Expression::Interleave(expr), Cursor::Interleaved(states)) => expr
                .components
                .iter()
                .zip(states)
                .all(|(automaton, s)| automaton.is_finished(*s)),
            _ => false,
        }
    }
}

/// Check that every state reached after a token is accepting and that
/// every reachable state accepts every allowed token
fn is_unconstrained(automaton: &Automaton, allowed: &IndexSet<Token>) -> bool {
    if allowed.is_empty() {
        return false;
    }
    let mut seen = IndexSet::new();
    let mut queue = VecDeque::from([State::Start]);
    seen.insert(State::Start);
    while let Some(state) = queue.pop_front() {
        if state != State::Start && !automaton.is_finished(state) {
            return false;
        }
        for token in allowed {
            match automaton.consume(state, token) {
                Some(next) => {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
                None => return false,
            }
        }
    }
    true
}
