//! Constructions rewrite a sequence of active machines into a (usually
//! shorter) one, e.g. `ADJ NOUN -> NOUN[ADJ]`.
//!
//! Each construction owns an FSA over the sequence. `check` must not change
//! anything; `act` does the rewriting and returns the machines that replace
//! the consumed ones, or `None` if it declined.

use std::collections::{BTreeMap, BTreeSet};

use defgraph_core::{DefgraphError, MachineId, Result};
use defgraph_parser::{ConstructionRule, RuleCommand};

use crate::fsa::Fsa;
use crate::lexicon::Lexicon;
use crate::matcher::Matcher;

pub use crate::avm::{Avm, AvmConstruction, AvmSlot};
pub use crate::verb::VerbConstruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionKind {
    Semantic,
    Chunk,
    Avm,
}

pub trait Construction: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> ConstructionKind;

    /// Whether the construction's automaton accepts `seq`. Never mutates.
    fn check(&self, lexicon: &Lexicon, seq: &[MachineId]) -> bool;

    /// Extra conditions evaluated after `check` succeeded.
    fn last_check(&self, _lexicon: &Lexicon, _seq: &[MachineId]) -> bool {
        true
    }

    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>>;

    /// `act` if both checks pass.
    fn run(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        if self.check(lexicon, seq) && self.last_check(lexicon, seq) {
            self.act(lexicon, seq)
        } else {
            Ok(None)
        }
    }
}

/// States `0..=n` with one transition per matcher; only `n` is final.
pub(crate) fn linear_fsa(matchers: &[Matcher]) -> Fsa {
    let mut fsa = Fsa::new();
    let mut prev = fsa.add_state("0", true, matchers.is_empty());
    for (i, m) in matchers.iter().enumerate() {
        let next = fsa.add_state((i + 1).to_string(), false, i + 1 == matchers.len());
        fsa.add_transition(m.clone(), prev, next);
        prev = next;
    }
    fsa
}

// ─── Rule constructions ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Append {
        into: usize,
        what: usize,
        partition: usize,
    },
    Keep {
        stay: usize,
    },
    Verb,
}

/// A chunking construction read from the rules file.
#[derive(Debug, Clone)]
pub struct RuleConstruction {
    name: String,
    matchers: Vec<Matcher>,
    fsa: Fsa,
    command: Command,
}

fn pattern_index(rule: &ConstructionRule, pattern: &str) -> Result<usize> {
    rule.patterns
        .iter()
        .position(|p| p == pattern)
        .ok_or_else(|| DefgraphError::InvalidPattern {
            pattern: pattern.to_string(),
            message: format!("not a pattern of construction '{}'", rule.name),
        })
}

impl RuleConstruction {
    pub fn from_rule(rule: &ConstructionRule) -> Result<Self> {
        let matchers = rule
            .patterns
            .iter()
            .map(|p| Matcher::pos(p))
            .collect::<Result<Vec<_>>>()?;
        let command = match &rule.command {
            RuleCommand::Append { into, what } => Command::Append {
                into: pattern_index(rule, into)?,
                what: pattern_index(rule, what)?,
                partition: 0,
            },
            RuleCommand::Keep { stay } => Command::Keep {
                stay: pattern_index(rule, stay)?,
            },
            RuleCommand::Verb => Command::Verb,
        };
        Ok(Self {
            name: rule.name.clone(),
            fsa: linear_fsa(&matchers),
            matchers,
            command,
        })
    }

    pub fn fsa(&self) -> &Fsa {
        &self.fsa
    }
}

impl Construction for RuleConstruction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstructionKind {
        ConstructionKind::Chunk
    }

    fn check(&self, lexicon: &Lexicon, seq: &[MachineId]) -> bool {
        self.fsa.accepts(lexicon.store(), seq)
    }

    /// Every `@variable` must be bound to the same value across the sequence.
    fn last_check(&self, lexicon: &Lexicon, seq: &[MachineId]) -> bool {
        if seq.len() != self.matchers.len() {
            return false;
        }
        let mut values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (m, id) in self.matchers.iter().zip(seq) {
            match m.bindings(lexicon.store(), *id) {
                Some(bindings) => {
                    for (var, value) in bindings {
                        values.entry(var).or_default().insert(value);
                    }
                }
                None => return false,
            }
        }
        values.values().all(|v| v.len() <= 1)
    }

    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        if seq.len() != self.matchers.len() {
            return Ok(None);
        }
        match self.command {
            Command::Append {
                into,
                what,
                partition,
            } => {
                lexicon.store_mut().append(seq[into], seq[what], partition)?;
                Ok(Some(vec![seq[into]]))
            }
            Command::Keep { stay } => Ok(Some(vec![seq[stay]])),
            Command::Verb => Ok(None),
        }
    }
}

/// One boxed construction per rule, in file order.
pub fn rule_constructions(rules: &[ConstructionRule]) -> Result<Vec<Box<dyn Construction>>> {
    rules
        .iter()
        .map(|r| Ok(Box::new(RuleConstruction::from_rule(r)?) as Box<dyn Construction>))
        .collect()
}
