//! Content-model compiler
//!
//! Turns lowered content models into [`Automaton`]s using a small algebra
//! of operators. Every operator copies its operands and returns a fresh
//! automaton; state ids are drawn from one counter per [`Compiler`] so
//! automata built by the same compiler never alias each other.
//!
//! Named definitions are compiled once and memoized in a table owned by
//! the compiler; each use site receives a [`Compiler::copy`] so that
//! independent occurrences never share states.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{CompileError, CompileErrorKind, Result};
use crate::limits::Limits;

use super::ast::{ContentModel, Pattern, Term, Token};
use super::automaton::{Automaton, Label, State};

/// Non-fatal finding raised while composing automata
///
/// A choice whose branches map the same token to different targets cannot
/// be represented deterministically. The first branch wins and the
/// collision is recorded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
    /// Element or definition being compiled
    pub location: Option<String>,
    /// State holding the colliding edges
    pub state: State,
    /// Colliding label
    pub label: Label,
    /// Target that was kept
    pub kept: State,
    /// Target that was dropped
    pub dropped: State,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref loc) = self.location {
            write!(f, "<{}>: ", loc)?;
        }
        write!(
            f,
            "ambiguous transition on {} from {}: kept {}, dropped {}",
            self.label, self.state, self.kept, self.dropped
        )
    }
}

/// Compiled form of one content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledModel {
    /// One automaton for regular content
    Single(Automaton),
    /// One automaton per interleave block
    Interleave(Vec<Automaton>),
}

/// Compilation context
#[derive(Debug)]
pub struct Compiler<'g> {
    definitions: &'g IndexMap<String, Pattern>,
    limits: Limits,
    memo: HashMap<String, Automaton>,
    in_progress: Vec<String>,
    next_id: u32,
    location: Option<String>,
    warnings: Vec<CompileWarning>,
}

impl<'g> Compiler<'g> {
    /// Create a compiler over a table of named definitions
    pub fn new(definitions: &'g IndexMap<String, Pattern>, limits: Limits) -> Self {
        Self {
            definitions,
            limits,
            memo: HashMap::new(),
            in_progress: Vec::new(),
            next_id: 0,
            location: None,
            warnings: Vec::new(),
        }
    }

    /// Set the element or definition name attached to warnings and errors
    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    /// Warnings collected so far
    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    /// Take the collected warnings, leaving none behind
    pub fn take_warnings(&mut self) -> Vec<CompileWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn fresh(&mut self) -> State {
        self.next_id += 1;
        State::Id(self.next_id)
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    /// `START --t--> END`
    pub fn single_token(&mut self, token: Token) -> Automaton {
        Automaton::from_edges([(State::Start, Label::Token(token), State::End)])
    }

    /// Regenerate every intermediate state id
    pub fn copy(&mut self, automaton: &Automaton) -> Automaton {
        let mut mapping: HashMap<State, State> = HashMap::new();
        let mut result = Automaton::new();
        for (from, label, to) in automaton.iter_edges() {
            let from = self.remap(&mut mapping, from);
            let to = self.remap(&mut mapping, to);
            result.insert(from, label.clone(), to);
        }
        result
    }

    fn remap(&mut self, mapping: &mut HashMap<State, State>, state: State) -> State {
        if state.is_sentinel() {
            return state;
        }
        if let Some(mapped) = mapping.get(&state) {
            return *mapped;
        }
        let mapped = self.fresh();
        mapping.insert(state, mapped);
        mapped
    }

    /// Copy `b` unless its intermediate states are disjoint from `a`'s
    fn disjoint(&mut self, a: &Automaton, b: &Automaton) -> Automaton {
        let ids: HashSet<State> = a.states().into_iter().filter(|s| !s.is_sentinel()).collect();
        if b.states().iter().any(|s| ids.contains(s)) {
            self.copy(b)
        } else {
            b.clone()
        }
    }

    /// Insert an edge, keeping the existing target on collision
    fn insert_first_wins(&mut self, automaton: &mut Automaton, from: State, label: Label, to: State) {
        match automaton.target(from, &label) {
            None => {
                automaton.insert(from, label, to);
            }
            Some(kept) if kept == to => {}
            Some(kept) => {
                let warning = CompileWarning {
                    location: self.location.clone(),
                    state: from,
                    label,
                    kept,
                    dropped: to,
                };
                warn!(%warning, "content model is not deterministic");
                self.warnings.push(warning);
            }
        }
    }

    /// Sequence: `a` followed by `b`
    pub fn append(&mut self, a: &Automaton, b: &Automaton) -> Automaton {
        let mut result = a.clone();
        let right = self.disjoint(&result, b);
        let join = self.fresh();

        // A nullable left side must not leave a second epsilon on START
        let left_nullable = result.remove(State::Start, &Label::Epsilon).is_some();
        result.redirect_targets(State::End, join);
        let join_reachable = result.iter_edges().any(|(_, _, to)| to == join);

        let right_start: Vec<(Label, State)> = right
            .edges(State::Start)
            .map(|edges| edges.iter().map(|(l, s)| (l.clone(), *s)).collect())
            .unwrap_or_default();

        // States that finish through epsilon edges only reach `join` when
        // they have no direct edge for the token, so `b`'s first tokens are
        // copied onto them and any clash is reported
        let feeders: Vec<State> = result
            .states()
            .into_iter()
            .filter(|&s| s != join && result.epsilon_reaches(s, join))
            .collect();
        for from in feeders {
            for (label, to) in &right_start {
                if *label != Label::Epsilon {
                    self.insert_first_wins(&mut result, from, label.clone(), *to);
                }
            }
        }

        for (from, label, to) in right.iter_edges() {
            if from != State::Start {
                result.insert(from, label.clone(), to);
            }
        }
        if join_reachable {
            for (label, to) in &right_start {
                result.insert(join, label.clone(), *to);
            }
        }
        if left_nullable {
            for (label, to) in right_start {
                self.insert_first_wins(&mut result, State::Start, label, to);
            }
        }
        result
    }

    /// Choice: `a` or `b`
    pub fn merge(&mut self, a: &Automaton, b: &Automaton) -> Automaton {
        let mut result = a.clone();
        let right = self.disjoint(&result, b);
        for (from, label, to) in right.iter_edges() {
            self.insert_first_wins(&mut result, from, label.clone(), to);
        }
        result
    }

    /// Zero or one `a`
    pub fn optional(&mut self, a: &Automaton) -> Automaton {
        let mut result = a.clone();
        result.insert(State::Start, Label::Epsilon, State::End);
        result
    }

    /// One or more `a`
    pub fn plus(&mut self, a: &Automaton) -> Automaton {
        let mut result = a.clone();
        let nullable = result.remove(State::Start, &Label::Epsilon).is_some();
        let repeat = self.fresh();
        result.redirect_targets(State::End, repeat);

        let start_edges: Vec<(Label, State)> = result
            .edges(State::Start)
            .map(|edges| edges.iter().map(|(l, s)| (l.clone(), *s)).collect())
            .unwrap_or_default();
        for (label, to) in start_edges {
            result.insert(repeat, label, to);
        }
        result.insert(repeat, Label::Epsilon, State::End);

        if nullable {
            result.insert(State::Start, Label::Epsilon, State::End);
        }
        result
    }

    /// Zero or more `a`
    pub fn kleene(&mut self, a: &Automaton) -> Automaton {
        let repeated = self.plus(a);
        self.optional(&repeated)
    }

    // ------------------------------------------------------------------
    // Terms and models
    // ------------------------------------------------------------------

    /// Compile a lowered term
    pub fn compile_term(&mut self, term: &Term) -> Result<Automaton> {
        let automaton = match term {
            Term::Token(token) => self.single_token(token.clone()),
            Term::Sequence(blocks) => {
                let mut iter = blocks.iter();
                match iter.next() {
                    None => Automaton::empty(),
                    Some(first) => {
                        let mut acc = self.compile_term(first)?;
                        for block in iter {
                            let next = self.compile_term(block)?;
                            acc = self.append(&acc, &next);
                        }
                        acc
                    }
                }
            }
            Term::Choice(blocks) => {
                let mut iter = blocks.iter();
                let first = iter.next().ok_or_else(|| self.error_here(
                    CompileError::ill_formed("choice without alternatives"),
                ))?;
                let mut acc = self.compile_term(first)?;
                for block in iter {
                    let next = self.compile_term(block)?;
                    acc = self.merge(&acc, &next);
                }
                acc
            }
            Term::Optional(block) => {
                let inner = self.compile_term(block)?;
                self.optional(&inner)
            }
            Term::Kleene(block) => {
                let inner = self.compile_term(block)?;
                self.kleene(&inner)
            }
            Term::Plus(block) => {
                let inner = self.compile_term(block)?;
                self.plus(&inner)
            }
            Term::Ref(name) => self.resolve(name)?,
        };
        Ok(automaton)
    }

    /// Compile a lowered content model
    pub fn compile_model(&mut self, model: &ContentModel) -> Result<CompiledModel> {
        let compiled = match model {
            ContentModel::Term(term) => {
                let automaton = self.compile_term(term)?;
                self.limits.check_automaton_states(automaton.state_count())?;
                CompiledModel::Single(automaton)
            }
            ContentModel::Interleave(blocks) => {
                let mut automata = Vec::with_capacity(blocks.len());
                for block in blocks {
                    let automaton = self.compile_term(block)?;
                    self.limits.check_automaton_states(automaton.state_count())?;
                    automata.push(automaton);
                }
                CompiledModel::Interleave(automata)
            }
        };
        Ok(compiled)
    }

    /// Normalize, lower and compile a raw pattern
    ///
    /// A pattern that is nothing but a reference to a definition takes the
    /// definition's content model, interleave included.
    pub fn compile_pattern(&mut self, pattern: &Pattern) -> Result<CompiledModel> {
        let mut current = pattern.clone().normalize().map_err(|e| self.error_here(e))?;
        let mut followed: Vec<String> = Vec::new();
        while let Pattern::Ref { name } = &current {
            let name = name.clone();
            if followed.contains(&name) {
                return Err(self.cycle_error(&name, &followed).into());
            }
            let body = self.definition(&name)?;
            followed.push(name);
            match body.normalize().map_err(|e| self.error_here(e))? {
                inner @ (Pattern::Ref { .. } | Pattern::Interleave { .. }) => current = inner,
                // keep the reference so the definition is memoized
                _ => break,
            }
        }
        let model = ContentModel::from_pattern(current, &self.limits)?;
        debug!(location = ?self.location, %model, "compiling content model");
        self.compile_model(&model)
    }

    fn definition(&self, name: &str) -> std::result::Result<Pattern, CompileError> {
        self.definitions.get(name).cloned().ok_or_else(|| {
            self.error_here(CompileError::new(
                CompileErrorKind::UnresolvedReference,
                format!("no definition named '{}'", name),
            ))
        })
    }

    fn resolve(&mut self, name: &str) -> Result<Automaton> {
        if let Some(cached) = self.memo.get(name).cloned() {
            return Ok(self.copy(&cached));
        }
        if self.in_progress.iter().any(|n| n == name) {
            let path = self.in_progress.clone();
            return Err(self.cycle_error(name, &path).into());
        }

        let pattern = self.definition(name)?;
        self.in_progress.push(name.to_string());
        let model = ContentModel::from_pattern(pattern, &self.limits)?;
        let automaton = match model {
            ContentModel::Term(term) => self.compile_term(&term)?,
            ContentModel::Interleave(_) => {
                return Err(self
                    .error_here(CompileError::new(
                        CompileErrorKind::NestedInterleave,
                        format!(
                            "definition '{}' is an interleave and can only be used as an element's whole content",
                            name
                        ),
                    ))
                    .into())
            }
        };
        self.in_progress.pop();

        debug!(definition = name, states = automaton.state_count(), "memoized definition");
        self.memo.insert(name.to_string(), automaton.clone());
        Ok(automaton)
    }

    fn cycle_error(&self, name: &str, path: &[String]) -> CompileError {
        let mut cycle: Vec<&str> = path.iter().map(String::as_str).collect();
        cycle.push(name);
        self.error_here(CompileError::new(
            CompileErrorKind::CyclicReference,
            format!("reference cycle: {}", cycle.join(" -> ")),
        ))
    }

    fn error_here(&self, err: CompileError) -> CompileError {
        match (&err.location, &self.location) {
            (None, Some(loc)) => err.with_location(loc.clone()),
            _ => err,
        }
    }
}
