//! Deterministic content automata
//!
//! An [`Automaton`] is a transition table over [`State`]s labelled with
//! [`Label`]s. Two sentinel states, [`State::Start`] and [`State::End`],
//! bracket every automaton:
//!
//! - nothing ever targets `Start` and `End` has no outgoing edges
//! - every state has at most one epsilon edge
//! - the only epsilon edge leaving `Start` goes straight to `End`, meaning
//!   "the whole expression may match zero tokens"
//!
//! Every other optionality is realized by duplicating edges while
//! composing (see [`super::compiler`]), so [`Automaton::consume`] is a
//! short epsilon walk instead of a subset construction.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use super::ast::Token;

/// Automaton state identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    /// Initial sentinel
    Start,
    /// Accepting sentinel
    End,
    /// Intermediate state
    Id(u32),
}

impl State {
    /// Check if this is one of the two sentinels
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, State::Id(_))
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Start => f.write_str("START"),
            State::End => f.write_str("END"),
            State::Id(id) => write!(f, "s{}", id),
        }
    }
}

/// Edge label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// Consumes one token
    Token(Token),
    /// Consumes nothing
    Epsilon,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Token(token) => write!(f, "{}", token),
            Label::Epsilon => f.write_str("ε"),
        }
    }
}

/// Outgoing edges of one state
pub type Edges = IndexMap<Label, State>;

/// Deterministic transition table with epsilon edges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Automaton {
    transitions: IndexMap<State, Edges>,
}

impl Automaton {
    /// Create an automaton with no edges (accepts nothing)
    pub fn new() -> Self {
        Self::default()
    }

    /// Automaton accepting only the empty sequence
    pub fn empty() -> Self {
        let mut automaton = Self::new();
        automaton.insert(State::Start, Label::Epsilon, State::End);
        automaton
    }

    /// Build an automaton from raw edges
    ///
    /// Later edges with the same source and label overwrite earlier ones.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (State, Label, State)>,
    {
        let mut automaton = Self::new();
        for (from, label, to) in edges {
            automaton.insert(from, label, to);
        }
        automaton
    }

    /// Transition table
    pub fn transitions(&self) -> &IndexMap<State, Edges> {
        &self.transitions
    }

    /// Outgoing edges of a state
    pub fn edges(&self, state: State) -> Option<&Edges> {
        self.transitions.get(&state)
    }

    /// Iterate over all edges as `(from, label, to)`
    pub fn iter_edges(&self) -> impl Iterator<Item = (State, &Label, State)> + '_ {
        self.transitions
            .iter()
            .flat_map(|(from, edges)| edges.iter().map(move |(label, to)| (*from, label, *to)))
    }

    /// Target of a labelled edge
    pub fn target(&self, state: State, label: &Label) -> Option<State> {
        self.transitions.get(&state).and_then(|edges| edges.get(label)).copied()
    }

    /// Epsilon successor of a state
    pub fn epsilon(&self, state: State) -> Option<State> {
        self.target(state, &Label::Epsilon)
    }

    /// Check if `to` is reached from `from` through epsilon edges alone
    pub fn epsilon_reaches(&self, from: State, to: State) -> bool {
        let mut current = from;
        for _ in 0..=self.transitions.len() {
            match self.epsilon(current) {
                Some(next) if next == to => return true,
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    /// Insert or overwrite an edge, returning the previous target
    pub fn insert(&mut self, from: State, label: Label, to: State) -> Option<State> {
        self.transitions.entry(from).or_default().insert(label, to)
    }

    /// Remove an edge, returning its target
    pub fn remove(&mut self, from: State, label: &Label) -> Option<State> {
        let edges = self.transitions.get_mut(&from)?;
        let removed = edges.shift_remove(label);
        if edges.is_empty() {
            self.transitions.shift_remove(&from);
        }
        removed
    }

    /// Redirect every edge targeting `from` to `to`
    pub fn redirect_targets(&mut self, from: State, to: State) {
        for edges in self.transitions.values_mut() {
            for target in edges.values_mut() {
                if *target == from {
                    *target = to;
                }
            }
        }
    }

    /// Consume a token from `state`
    ///
    /// Takes the direct edge if one exists, otherwise follows the epsilon
    /// edge and retries. Returns `None` when the token is rejected.
    pub fn consume(&self, state: State, token: &Token) -> Option<State> {
        let label = Label::Token(token.clone());
        let mut current = state;
        // epsilon chains are acyclic; the bound only guards hand-built tables
        for _ in 0..=self.transitions.len() {
            if let Some(next) = self.target(current, &label) {
                return Some(next);
            }
            current = self.epsilon(current)?;
        }
        None
    }

    /// Check if `state` can consume `token`
    pub fn can_consume(&self, state: State, token: &Token) -> bool {
        self.consume(state, token).is_some()
    }

    /// Check if `state` is accepting, directly or through epsilon edges
    pub fn is_finished(&self, state: State) -> bool {
        let mut current = state;
        for _ in 0..=self.transitions.len() {
            if current == State::End {
                return true;
            }
            match self.epsilon(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    /// Check if the automaton accepts the empty sequence
    pub fn is_nullable(&self) -> bool {
        self.is_finished(State::Start)
    }

    /// Check if the automaton accepts a whole token sequence
    pub fn accepts<'a, I>(&self, tokens: I) -> bool
    where
        I: IntoIterator<Item = &'a Token>,
    {
        let mut state = State::Start;
        for token in tokens {
            match self.consume(state, token) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.is_finished(state)
    }

    /// Tokens consumable from `state`, in table order
    pub fn expected(&self, state: State) -> Vec<Token> {
        let mut expected = IndexSet::new();
        let mut current = Some(state);
        let mut guard = 0;
        while let Some(s) = current {
            if guard > self.transitions.len() {
                break;
            }
            guard += 1;
            if let Some(edges) = self.transitions.get(&s) {
                for label in edges.keys() {
                    if let Label::Token(token) = label {
                        expected.insert(token.clone());
                    }
                }
            }
            current = self.epsilon(s);
        }
        expected.into_iter().collect()
    }

    /// States reachable from `Start` through any edge
    pub fn reachable_states(&self) -> IndexSet<State> {
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::from([State::Start]);
        seen.insert(State::Start);
        while let Some(state) = queue.pop_front() {
            if let Some(edges) = self.transitions.get(&state) {
                for target in edges.values() {
                    if seen.insert(*target) {
                        queue.push_back(*target);
                    }
                }
            }
        }
        seen
    }

    /// Tokens labelling edges reachable from `Start`, in discovery order
    pub fn reachable_tokens(&self) -> IndexSet<Token> {
        let mut tokens = IndexSet::new();
        for state in self.reachable_states() {
            if let Some(edges) = self.transitions.get(&state) {
                for label in edges.keys() {
                    if let Label::Token(token) = label {
                        tokens.insert(token.clone());
                    }
                }
            }
        }
        tokens
    }

    /// All states mentioned in the table, sentinels included
    pub fn states(&self) -> IndexSet<State> {
        let mut states = IndexSet::new();
        states.insert(State::Start);
        states.insert(State::End);
        for (from, _, to) in self.iter_edges() {
            states.insert(from);
            states.insert(to);
        }
        states
    }

    /// Number of states, sentinels included
    pub fn state_count(&self) -> usize {
        self.states().len()
    }

    /// Check the structural invariants of the table
    ///
    /// Returns a description of every violation found.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(edges) = self.transitions.get(&State::End) {
            if !edges.is_empty() {
                problems.push("END has outgoing edges".to_string());
            }
        }
        for (from, label, to) in self.iter_edges() {
            if to == State::Start {
                problems.push(format!("{} --{}--> START", from, label));
            }
            if from == State::Start && *label == Label::Epsilon && to != State::End {
                problems.push(format!("START epsilon targets {} instead of END", to));
            }
        }
        let mut visited = HashSet::new();
        for state in self.states() {
            visited.clear();
            let mut current = state;
            while let Some(next) = self.epsilon(current) {
                if !visited.insert(current) {
                    problems.push(format!("epsilon cycle through {}", state));
                    break;
                }
                current = next;
            }
        }
        problems
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (from, label, to) in self.iter_edges() {
            writeln!(f, "{} --{}--> {}", from, label, to)?;
        }
        Ok(())
    }
}
