//! Default construction for verbs.
//!
//! The verb's definition is searched for argument slots: deep cases
//! (`=AGT`, `=PAT`, ...) become noun matchers in the corresponding
//! grammatical case, `$`-prefixed names take a caller-supplied matcher. The
//! control is a hypercube: state 1 is reached on the verb, and each
//! argument sets one bit, so the arguments may come in any order and the
//! final state is `2^n`.

use std::collections::{BTreeSet, HashMap};

use defgraph_core::{
    deep_case_to_grammatical_case, DefgraphError, MachineId, MachineStore, Result, SUPP_PRE,
};
use tracing::{debug, info, warn};

use crate::construction::{Construction, ConstructionKind};
use crate::fsa::Fsa;
use crate::lexicon::Lexicon;
use crate::matcher::Matcher;

/// More arguments than this would blow up the hypercube.
pub const MAX_VERB_ARGUMENTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Expand,
    Fill(usize),
}

#[derive(Debug, Clone)]
pub struct VerbConstruction {
    name: String,
    arguments: Vec<(String, Matcher)>,
    fsa: Fsa,
    /// What to do for each transition, indexed like the FSA's transitions.
    steps: Vec<Step>,
    max_depth: usize,
    activated: bool,
}

impl VerbConstruction {
    pub fn new(
        name: &str,
        lexicon: &Lexicon,
        supplementary: &HashMap<String, Matcher>,
        max_depth: usize,
    ) -> Result<Self> {
        let root = lexicon
            .definition(name)
            .ok_or_else(|| DefgraphError::UnknownWord(name.to_string()))?;

        let mut arguments = Vec::new();
        let mut traversed = BTreeSet::new();
        discover_arguments(
            lexicon.store(),
            root,
            supplementary,
            max_depth,
            0,
            &mut traversed,
            &mut arguments,
        )?;
        if arguments.len() > MAX_VERB_ARGUMENTS {
            warn!(
                "verb '{}' has {} arguments, keeping the first {}",
                name,
                arguments.len(),
                MAX_VERB_ARGUMENTS
            );
            arguments.truncate(MAX_VERB_ARGUMENTS);
        }

        let verb = Matcher::All(vec![
            Matcher::printname(&regex::escape(name))?,
            Matcher::pos("VERB")?,
        ]);
        let (fsa, steps) = hypercube(verb, &arguments);
        info!(
            "VerbConstruction {} created, arguments: {:?}",
            name,
            arguments.iter().map(|(a, _)| a.as_str()).collect::<Vec<_>>()
        );

        Ok(Self {
            name: name.to_string(),
            arguments,
            fsa,
            steps,
            max_depth,
            activated: false,
        })
    }

    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().map(|(a, _)| a.as_str())
    }

    pub fn fsa(&self) -> &Fsa {
        &self.fsa
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Replace every `case` slot of the verb's structure with `noun`.
    fn fill(&self, lexicon: &mut Lexicon, verb: MachineId, case: &str, noun: MachineId) -> Result<()> {
        let slots = find_slots(lexicon.store(), verb, case, self.max_depth)?;
        if slots.is_empty() {
            debug!("no '{}' slot left in {}", case, verb);
        }
        let store = lexicon.store_mut();
        for slot in slots {
            let parents: Vec<(MachineId, usize)> =
                store.get(slot)?.parents().iter().copied().collect();
            for (parent, partition) in parents {
                store.remove(parent, slot, Some(partition))?;
                store.append(parent, noun, partition)?;
            }
        }
        debug!("filled {} of {} with {}", case, verb, noun);
        Ok(())
    }
}

fn discover_arguments(
    store: &MachineStore,
    machine: MachineId,
    supplementary: &HashMap<String, Matcher>,
    max_depth: usize,
    depth: usize,
    traversed: &mut BTreeSet<MachineId>,
    arguments: &mut Vec<(String, Matcher)>,
) -> Result<()> {
    if depth > max_depth {
        return Ok(());
    }
    for part in store.get(machine)?.partitions() {
        for child in part {
            if !traversed.insert(*child) {
                continue;
            }
            let m = store.get(*child)?;
            let pn = m.printname();
            let known = arguments.iter().any(|(a, _)| a == pn);
            if !known && m.deep_case() {
                let case = deep_case_to_grammatical_case(pn);
                arguments.push((pn.to_string(), Matcher::pos(&format!("NOUN<CAS<{}>>", case))?));
            } else if !known && pn.starts_with(SUPP_PRE) {
                match supplementary.get(pn) {
                    Some(matcher) => arguments.push((pn.to_string(), matcher.clone())),
                    None => warn!("no matcher supplied for argument {}", pn),
                }
            }
            discover_arguments(store, *child, supplementary, max_depth, depth + 1, traversed, arguments)?;
        }
    }
    Ok(())
}

fn hypercube(verb: Matcher, arguments: &[(String, Matcher)]) -> (Fsa, Vec<Step>) {
    let n = arguments.len();
    let last = 1usize << n;
    let mut fsa = Fsa::new();
    for s in 0..=last {
        fsa.add_state(s.to_string(), s == 0, s == last);
    }

    let mut steps = vec![Step::Expand];
    fsa.add_transition(verb, 0, 1);

    // state s holds the bit mask s - 1 of the arguments filled so far
    for state in 1..last {
        let mask = state - 1;
        for (j, (_, matcher)) in arguments.iter().enumerate() {
            if mask & (1 << j) == 0 {
                fsa.add_transition(matcher.clone(), state, state + (1 << j));
                steps.push(Step::Fill(j));
            }
        }
    }
    (fsa, steps)
}

/// Machines called `name` inside the verb's own structure. Relation and
/// fancy machines are looked through, other words are not.
fn find_slots(store: &MachineStore, verb: MachineId, name: &str, max_depth: usize) -> Result<Vec<MachineId>> {
    let mut found = Vec::new();
    let mut seen = BTreeSet::new();
    let mut stack = vec![(verb, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for child in store.get(id)?.partitions().iter().flatten() {
            let m = store.get(*child)?;
            if m.printname() == name {
                found.push(*child);
            } else if (m.fancy() || m.binary()) && depth < max_depth {
                stack.push((*child, depth + 1));
            }
        }
    }
    Ok(found)
}

impl Construction for VerbConstruction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstructionKind {
        ConstructionKind::Semantic
    }

    fn check(&self, lexicon: &Lexicon, seq: &[MachineId]) -> bool {
        !self.activated && self.fsa.accepts(lexicon.store(), seq)
    }

    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        let path = match self.fsa.run(lexicon.store(), seq) {
            Some(path) if !self.activated => path,
            _ => return Ok(None),
        };
        let verb = seq[0];
        for (k, t) in path.into_iter().enumerate() {
            match self.steps[t] {
                Step::Expand => lexicon.expand(verb)?,
                Step::Fill(j) => {
                    let case = self.arguments[j].0.clone();
                    self.fill(lexicon, verb, &case, seq[k])?;
                }
            }
        }
        self.activated = true;
        info!("verb construction {} linked {} argument(s)", self.name, seq.len() - 1);
        Ok(Some(vec![verb]))
    }
}
