//! Spreading activation over the lexicon.
//!
//! Each round expands the unexpanded active machines, runs the
//! constructions over the sentence, links machines sharing a deep-case
//! linker and lets the lexicon activate new headwords. It stops when
//! nothing is left to expand or a round activates nothing.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use defgraph_core::{Control, MachineId, PluginMessage, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::construction::Construction;
use crate::lexicon::Lexicon;
use crate::matcher::Matcher;
use crate::verb::VerbConstruction;

#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    pub messages: Vec<PluginMessage>,
    /// Printnames of what is left of the sentence after constructions.
    pub sentence: Vec<String>,
    pub iterations: usize,
    pub active: usize,
}

pub struct SpreadingActivation {
    lexicon: Lexicon,
    constructions: Vec<Box<dyn Construction>>,
}

impl SpreadingActivation {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            lexicon,
            constructions: Vec::new(),
        }
    }

    pub fn with_constructions(mut self, constructions: Vec<Box<dyn Construction>>) -> Self {
        self.constructions.extend(constructions);
        self
    }

    pub fn add_construction(&mut self, construction: Box<dyn Construction>) {
        self.constructions.push(construction);
    }

    pub fn constructions(&self) -> impl Iterator<Item = &dyn Construction> {
        self.constructions.iter().map(|c| c.as_ref())
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn lexicon_mut(&mut self) -> &mut Lexicon {
        &mut self.lexicon
    }

    pub fn into_lexicon(self) -> Lexicon {
        self.lexicon
    }

    /// Add a verb construction for every active, not yet expanded verb that
    /// has a definition. Returns how many were added.
    pub fn add_verb_constructions(&mut self, supplementary: &HashMap<String, Matcher>) -> Result<usize> {
        let mut verbs = BTreeSet::new();
        for id in self.lexicon.get_unexpanded() {
            let m = self.lexicon.store().get(id)?;
            let is_verb = matches!(m.control(), Some(Control::Pos(p)) if p.pos.starts_with("VERB"));
            if is_verb && self.lexicon.definition(m.printname()).is_some() {
                verbs.insert(m.printname().to_string());
            }
        }
        let depth = self.lexicon.params().expand_depth;
        for verb in &verbs {
            let c = VerbConstruction::new(verb, &self.lexicon, supplementary, depth)?;
            self.constructions.push(Box::new(c));
        }
        Ok(verbs.len())
    }

    pub fn activation_loop(&mut self) -> Result<ActivationReport> {
        let params = self.lexicon.params().clone();
        let mut last_active = self.lexicon.active_count();
        let mut unexpanded = self.lexicon.get_unexpanded();
        let mut sentence = unexpanded.clone();
        let mut linking: BTreeMap<String, BTreeSet<MachineId>> = BTreeMap::new();
        let mut iterations = 0;

        while !unexpanded.is_empty() && iterations < params.max_iterations {
            iterations += 1;
            debug!(
                "LOOP {}: {} active, {} to expand",
                iterations,
                last_active,
                unexpanded.len()
            );

            // expansion
            for machine in &unexpanded {
                self.lexicon.expand(*machine)?;
                let store = self.lexicon.store();
                for part in store.get(*machine)?.partitions().iter().skip(1) {
                    for sub in part {
                        if self.lexicon.is_deep_case(*sub) {
                            linking
                                .entry(store.printname(*sub)?.to_string())
                                .or_default()
                                .insert(*machine);
                        }
                    }
                }
            }

            self.apply_constructions(&mut sentence, params.max_sequence_len)?;

            // linking
            let ready: Vec<String> = linking
                .iter()
                .filter(|(_, machines)| machines.len() > 1)
                .map(|(linker, _)| linker.clone())
                .collect();
            for linker in ready {
                if let Some(machines) = linking.remove(&linker) {
                    self.link(&linker, &machines)?;
                }
            }

            self.lexicon.activate()?;
            unexpanded = self.lexicon.get_unexpanded();
            let active = self.lexicon.active_count();
            if active == last_active {
                break;
            }
            last_active = active;
        }

        let messages = self.lexicon.plugin_messages()?;
        debug!("returning {} plugin message(s)", messages.len());
        let sentence = sentence
            .iter()
            .map(|id| Ok(self.lexicon.store().printname(*id)?.to_string()))
            .collect::<Result<Vec<_>>>()?;
        Ok(ActivationReport {
            messages,
            sentence,
            iterations,
            active: self.lexicon.active_count(),
        })
    }

    /// Offer every ordering of up to `max_len` sentence machines to each
    /// construction. The longest accepted sequence that the construction acts
    /// on is replaced by the construction's result.
    fn apply_constructions(&mut self, sentence: &mut Vec<MachineId>, max_len: usize) -> Result<()> {
        for c in self.constructions.iter_mut() {
            let mut accepted = Vec::new();
            for len in 1..=sentence.len().min(max_len) {
                for seq in permutations(sentence, len) {
                    if c.check(&self.lexicon, &seq) && c.last_check(&self.lexicon, &seq) {
                        accepted.push(seq);
                    }
                }
            }
            accepted.sort_by_key(|seq| Reverse(seq.len()));

            for seq in accepted {
                if let Some(result) = c.act(&mut self.lexicon, &seq)? {
                    info!("construction {} matched {:?}", c.name(), seq);
                    sentence.retain(|m| !seq.contains(m));
                    for m in result {
                        if !sentence.contains(&m) {
                            sentence.push(m);
                        }
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Replace `linker` in each machine by the other machines sharing it.
    fn link(&mut self, linker: &str, machines: &BTreeSet<MachineId>) -> Result<()> {
        debug!("linking {:?} along {}", machines, linker);
        let store = self.lexicon.store_mut();
        for machine in machines {
            for (partition, sub) in store.find(*machine, linker)? {
                store.remove(*machine, sub, Some(partition))?;
                for other in machines.iter().filter(|m| *m != machine) {
                    store.append(*machine, *other, partition)?;
                }
            }
        }
        Ok(())
    }
}

/// All orderings of `len` distinct elements of `items`.
fn permutations(items: &[MachineId], len: usize) -> Vec<Vec<MachineId>> {
    fn go(
        items: &[MachineId],
        len: usize,
        used: &mut Vec<bool>,
        current: &mut Vec<MachineId>,
        out: &mut Vec<Vec<MachineId>>,
    ) {
        if current.len() == len {
            out.push(current.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            current.push(items[i]);
            go(items, len, used, current, out);
            current.pop();
            used[i] = false;
        }
    }

    let mut out = Vec::new();
    if len <= items.len() {
        go(items, len, &mut vec![false; items.len()], &mut Vec::new(), &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avm::{Avm, AvmConstruction};
    use crate::construction::rule_constructions;
    use crate::fixtures::sample_lexicon;
    use defgraph_parser::parse_constructions;

    #[test]
    fn permutation_counts() {
        let ids: Vec<MachineId> = (0..4).map(MachineId).collect();
        assert_eq!(permutations(&ids, 1).len(), 4);
        assert_eq!(permutations(&ids, 2).len(), 12);
        assert_eq!(permutations(&ids, 3).len(), 24);
        assert!(permutations(&ids, 5).is_empty());
        assert_eq!(permutations(&ids, 2)[0], vec![MachineId(0), MachineId(1)]);
    }

    #[test]
    fn links_machines_sharing_a_deep_case() {
        let mut lexicon = sample_lexicon(1.0);
        let see = lexicon.activate_word("see", None);
        let bark = lexicon.activate_word("bark", None);
        let mut sa = SpreadingActivation::new(lexicon);
        let report = sa.activation_loop().unwrap();

        let store = sa.lexicon().store();
        assert_eq!(store.get(see).unwrap().partitions()[1], vec![bark]);
        assert_eq!(store.get(bark).unwrap().partitions()[1], vec![see]);
        // =PAT has only one owner, so it stays
        assert_eq!(store.find(see, "=PAT").unwrap().len(), 1);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.sentence, vec!["see", "bark"]);
    }

    #[test]
    fn spreads_through_active_words_only() {
        // part activates tail; only then does tail count towards cat
        let mut lexicon = sample_lexicon(0.5);
        lexicon.activate_word("dog", None);
        lexicon.activate_word("part", None);
        let mut sa = SpreadingActivation::new(lexicon);
        let report = sa.activation_loop().unwrap();

        let lexicon = sa.lexicon();
        assert_eq!(lexicon.instances("tail").len(), 1);
        assert!(lexicon.is_active(lexicon.instances("tail")[0]));
        let cats = lexicon.instances("cat");
        assert_eq!(cats.len(), 1);
        assert!(lexicon.is_active(cats[0]));
        assert!(!lexicon.is_active(lexicon.instances("animal")[0]));
        assert_eq!(report.active, 4);
        assert_eq!(report.iterations, 3);
        assert!(lexicon.get_unexpanded().is_empty());
    }

    #[test]
    fn expansion_alone_activates_nothing() {
        let mut lexicon = sample_lexicon(1.0);
        lexicon.activate_word("dog", None);
        let mut sa = SpreadingActivation::new(lexicon);
        let report = sa.activation_loop().unwrap();
        assert!(sa.lexicon().instances("cat").is_empty());
        assert_eq!(report.active, 1);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn verb_construction_fills_arguments() {
        let mut lexicon = sample_lexicon(1.0);
        let dog = lexicon.activate_word("dog", Some(Control::pos("NOUN<CAS<NOM>>")));
        let see = lexicon.activate_word("see", Some(Control::pos("VERB")));
        let cat = lexicon.activate_word("cat", Some(Control::pos("NOUN<CAS<ACC>>")));
        let mut sa = SpreadingActivation::new(lexicon);
        assert_eq!(sa.add_verb_constructions(&HashMap::new()).unwrap(), 1);

        let report = sa.activation_loop().unwrap();
        let parts = sa.lexicon().store().get(see).unwrap().partitions().to_vec();
        assert_eq!(parts[1], vec![dog]);
        assert_eq!(parts[2], vec![cat]);
        assert_eq!(report.sentence, vec!["see"]);
    }

    #[test]
    fn rule_constructions_shrink_the_sentence() {
        let mut lexicon = sample_lexicon(1.0);
        let the = lexicon.activate_word("the", Some(Control::pos("DET")));
        let big = lexicon.activate_word("big", Some(Control::pos("ADJ")));
        let dog = lexicon.activate_word("dog", None);
        let rules = parse_constructions("adj_noun\tADJ NOUN\tNOUN[ADJ]\ndet_noun\tDET NOUN\tNOUN\n").unwrap();
        let mut sa = SpreadingActivation::new(lexicon).with_constructions(rule_constructions(&rules).unwrap());

        let report = sa.activation_loop().unwrap();
        assert_eq!(report.sentence, vec!["dog"]);
        let store = sa.lexicon().store();
        assert!(store.get(dog).unwrap().partitions()[0].contains(&big));
        assert!(!store.get(dog).unwrap().partitions()[0].contains(&the));
    }

    #[test]
    fn avm_construction_takes_over_the_sentence() {
        let mut lexicon = sample_lexicon(1.0);
        let city = lexicon.activate_word("budapest", Some(Control::pos("NOUN<CAS<INE>>")));
        let today = lexicon.activate_word("today", Some(Control::pos("ADV<TIME>")));
        let avm = Avm::new("weather")
            .with_slot("location", Matcher::pos("NOUN<CAS<INE>>").unwrap(), false, None)
            .with_slot("time", Matcher::pos("ADV<TIME>").unwrap(), true, None);
        let c = AvmConstruction::new(avm, &mut lexicon).unwrap();
        let machine = c.machine();
        let mut sa = SpreadingActivation::new(lexicon);
        sa.add_construction(Box::new(c));

        let report = sa.activation_loop().unwrap();
        assert_eq!(report.sentence, vec!["#weather"]);
        let parts = sa.lexicon().store().get(machine).unwrap().partitions().to_vec();
        assert_eq!(parts[0], vec![city]);
        assert_eq!(parts[1], vec![today]);
    }

    #[test]
    fn plugin_messages_are_returned() {
        let mut lexicon = sample_lexicon(1.0);
        lexicon.add_plugin("weather");
        lexicon.activate_word("weather", None);
        let report = SpreadingActivation::new(lexicon).activation_loop().unwrap();
        assert_eq!(report.messages.len(), 1);
        assert_eq!(report.messages[0].word, "weather");
    }

    #[test]
    fn iterations_are_bounded() {
        let mut lexicon = Lexicon::new(defgraph_parser::ActivationParams {
            max_iterations: 0,
            ..Default::default()
        });
        lexicon.activate_word("dog", None);
        let report = SpreadingActivation::new(lexicon).activation_loop().unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.messages.is_empty());
    }
}
