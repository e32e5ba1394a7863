//! Finite-state acceptor over machine sequences.
//!
//! Transitions are tried in insertion order and the first matching one is
//! taken, so the automaton is deterministic even when matchers overlap.

use defgraph_core::{MachineId, MachineStore};

use crate::matcher::Matcher;

pub type StateId = usize;

#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub matcher: Matcher,
    pub from: StateId,
    pub to: StateId,
}

#[derive(Debug, Clone, Default)]
pub struct Fsa {
    states: Vec<State>,
    init: Option<StateId>,
    transitions: Vec<Transition>,
}

impl Fsa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, name: impl Into<String>, is_init: bool, is_final: bool) -> StateId {
        let id = self.states.len();
        self.states.push(State {
            name: name.into(),
            is_final,
        });
        if is_init {
            self.init = Some(id);
        }
        id
    }

    pub fn add_transition(&mut self, matcher: Matcher, from: StateId, to: StateId) -> usize {
        debug_assert!(from < self.states.len() && to < self.states.len());
        self.transitions.push(Transition { matcher, from, to });
        self.transitions.len() - 1
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn transition(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    fn step(&self, state: StateId, store: &MachineStore, machine: MachineId) -> Option<usize> {
        self.transitions
            .iter()
            .position(|t| t.from == state && t.matcher.matches(store, machine))
    }

    /// Indices of the transitions taken while reading `seq`, or `None` if the
    /// automaton gets stuck or does not end in a final state.
    pub fn run(&self, store: &MachineStore, seq: &[MachineId]) -> Option<Vec<usize>> {
        let mut state = self.init?;
        let mut path = Vec::with_capacity(seq.len());
        for machine in seq {
            let t = self.step(state, store, *machine)?;
            path.push(t);
            state = self.transitions[t].to;
        }
        self.states[state].is_final.then_some(path)
    }

    pub fn accepts(&self, store: &MachineStore, seq: &[MachineId]) -> bool {
        self.run(store, seq).is_some()
    }

    pub fn to_dot(&self) -> String {
        let mut lines = vec!["digraph fsa {".to_string(), "\trankdir=LR;".to_string()];
        for (i, s) in self.states.iter().enumerate() {
            let shape = if s.is_final { "doublecircle" } else { "circle" };
            lines.push(format!("\tnode [shape = {}]; s{} [ label = \"{}\" ];", shape, i, s.name));
        }
        for t in &self.transitions {
            lines.push(format!(
                "\ts{} -> s{} [ label = \"{}\" ];",
                t.from,
                t.to,
                t.matcher.pattern()
            ));
        }
        lines.push("}".to_string());
        lines.join("\n")
    }
}
