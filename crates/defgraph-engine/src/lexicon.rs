//! The lexicon: static definition graphs plus the working graph built
//! from them during activation.
//!
//! Both live in one `MachineStore`. Definition roots are never modified;
//! expansion copies them into working machines ("instances"). An instance is
//! *active* once it takes part in activation, otherwise it is a passive
//! placeholder for a word mentioned in some definition.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use defgraph_core::{Control, MachineId, MachineStore, PluginMessage, Result};
use defgraph_parser::{ActivationParams, MachineConfig, Token};
use defgraph_store::GraphFile;
use rayon::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    store: MachineStore,
    definitions: BTreeMap<String, MachineId>,
    instances: BTreeMap<String, Vec<MachineId>>,
    active: BTreeSet<MachineId>,
    expanded: BTreeSet<MachineId>,
    plugins: HashSet<String>,
    params: ActivationParams,
    conflicts: usize,
}

impl Lexicon {
    pub fn new(params: ActivationParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Validate `config` and load every configured graph, in order.
    pub fn from_config(config: &MachineConfig) -> Result<Self> {
        config.validate()?;
        let mut lexicon = Self::new(config.activation.clone());
        lexicon.plugins = config.plugins.iter().cloned().collect();
        for graph in config.resolved_graphs() {
            let file = GraphFile::load(&graph.path)?;
            let added = lexicon.merge_graph(file)?;
            tracing::info!("Graph '{}': {} headword(s) added", graph.name, added);
        }
        if lexicon.conflicts > 0 {
            tracing::info!(
                "{} headword(s) defined by more than one graph, first definition kept",
                lexicon.conflicts
            );
        }
        Ok(lexicon)
    }

    /// Add a graph's definitions. Headwords already defined keep their
    /// existing definition. Returns the number of headwords added.
    pub fn merge_graph(&mut self, graph: GraphFile) -> Result<usize> {
        let source = graph.source.clone();
        let (store, definitions) = graph.into_parts()?;
        let offset = self.store.merge(store);
        let mut added = 0;
        for (word, root) in definitions {
            if self.definitions.contains_key(&word) {
                tracing::debug!("'{}' from {} shadowed by an earlier graph", word, source);
                self.conflicts += 1;
                continue;
            }
            self.definitions.insert(word, MachineId(root.0 + offset));
            added += 1;
        }
        Ok(added)
    }

    /// Snapshot the static definitions as a graph file.
    pub fn to_graph_file(&self, source: &str) -> Result<GraphFile> {
        GraphFile::from_store(source, &self.store, &self.definitions)
    }

    // ─── Accessors ───────────────────────────────────────────────

    pub fn store(&self) -> &MachineStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MachineStore {
        &mut self.store
    }

    pub fn params(&self) -> &ActivationParams {
        &self.params
    }

    pub fn add_plugin(&mut self, word: impl Into<String>) {
        self.plugins.insert(word.into());
    }

    /// Register `root` as the definition of `word`, returning any previous one.
    pub fn add_definition(&mut self, word: impl Into<String>, root: MachineId) -> Option<MachineId> {
        self.definitions.insert(word.into(), root)
    }

    pub fn definition(&self, word: &str) -> Option<MachineId> {
        self.definitions.get(word).copied()
    }

    pub fn definitions(&self) -> &BTreeMap<String, MachineId> {
        &self.definitions
    }

    /// Headwords skipped because an earlier graph already defined them.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    pub fn is_deep_case(&self, id: MachineId) -> bool {
        self.store.get(id).map_or(false, |m| m.deep_case())
    }

    pub fn is_active(&self, id: MachineId) -> bool {
        self.active.contains(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn instances(&self, word: &str) -> &[MachineId] {
        self.instances.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_unexpanded(&self) -> Vec<MachineId> {
        self.active
            .iter()
            .filter(|id| !self.expanded.contains(*id))
            .copied()
            .collect()
    }

    pub fn get_expanded(&self) -> Vec<MachineId> {
        self.expanded.iter().copied().collect()
    }

    // ─── Activation ──────────────────────────────────────────────

    fn default_control(&self, word: &str) -> Option<Control> {
        if self.plugins.contains(word) {
            return Some(Control::plugin(word));
        }
        self.definition(word)
            .and_then(|root| self.store.get(root).ok())
            .and_then(|m| m.control().cloned())
    }

    fn new_instance(&mut self, word: &str, control: Option<Control>) -> MachineId {
        let id = self.store.create(word, control, 1);
        self.instances.entry(word.to_string()).or_default().push(id);
        id
    }

    /// Create a fresh active machine for `word`. Plugin words always get
    /// their plugin control; otherwise `control` falls back to the control of
    /// the word's definition.
    pub fn activate_word(&mut self, word: &str, control: Option<Control>) -> MachineId {
        let control = if self.plugins.contains(word) {
            Some(Control::plugin(word))
        } else {
            control.or_else(|| self.default_control(word))
        };
        let id = self.new_instance(word, control);
        self.active.insert(id);
        tracing::debug!("activated {} as {}", word, id);
        id
    }

    /// An active machine for `word`, activating one only if none is active.
    pub fn get_or_activate(&mut self, word: &str) -> MachineId {
        let active = self
            .instances(word)
            .iter()
            .find(|id| self.active.contains(*id))
            .copied();
        active.unwrap_or_else(|| self.activate_word(word, None))
    }

    pub fn activate_token(&mut self, token: &Token) -> MachineId {
        self.activate_word(&token.stem, token.pos.clone().map(Control::pos))
    }

    /// Activate a passive instance of `word` if there is one, else a new machine.
    fn promote(&mut self, word: &str) -> MachineId {
        let passive = self
            .instances(word)
            .iter()
            .find(|id| !self.active.contains(*id))
            .copied();
        match passive {
            Some(id) => {
                self.active.insert(id);
                tracing::debug!("promoted passive {} ({})", word, id);
                id
            }
            None => self.activate_word(word, None),
        }
    }

    /// Words a definition mentions: plain machines under the root, looking
    /// through relation and fancy machines up to `expand_depth`.
    pub fn definition_words(&self, root: MachineId) -> Result<BTreeSet<String>> {
        let root_name = self.store.printname(root)?;
        let mut words = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<(MachineId, usize)> =
            self.store.children(root)?.into_iter().map(|c| (c, 1)).collect();
        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let m = self.store.get(id)?;
            if m.fancy() || m.binary() {
                if depth < self.params.expand_depth {
                    stack.extend(m.partitions().iter().flatten().map(|c| (*c, depth + 1)));
                }
            } else if m.printname() != root_name {
                words.insert(m.printname().to_string());
            }
        }
        Ok(words)
    }

    /// Activate every inactive headword whose definition words are active
    /// in at least `threshold` proportion. Passive instances do not count.
    pub fn activate(&mut self) -> Result<usize> {
        let mut candidates: Vec<String> = {
            let active_words: HashSet<&str> = self
                .active
                .iter()
                .filter_map(|id| self.store.printname(*id).ok())
                .collect();
            let threshold = self.params.threshold;

            self.definitions
                .par_iter()
                .filter(|(word, _)| !active_words.contains(word.as_str()))
                .filter_map(|(word, root)| {
                    let words = self.definition_words(*root).ok()?;
                    if words.is_empty() {
                        return None;
                    }
                    let hits = words.iter().filter(|w| active_words.contains(w.as_str())).count();
                    (hits as f64 / words.len() as f64 >= threshold).then(|| word.clone())
                })
                .collect()
        };
        candidates.sort();

        for word in &candidates {
            self.promote(word);
        }
        if !candidates.is_empty() {
            tracing::debug!("activation added {:?}", candidates);
        }
        Ok(candidates.len())
    }

    // ─── Expansion ───────────────────────────────────────────────

    /// Copy the definition of `id`'s printname into it. Plain words link to
    /// existing instances (or new passive ones); relation and fancy machines
    /// are copied per expansion, down to `expand_depth`.
    pub fn expand(&mut self, id: MachineId) -> Result<()> {
        if !self.expanded.insert(id) {
            return Ok(());
        }
        let word = self.store.printname(id)?.to_string();
        let root = match self.definition(&word) {
            Some(root) if root != id => root,
            _ => {
                tracing::debug!("nothing to expand for {}", word);
                return Ok(());
            }
        };

        let partitions = self.store.get(root)?.partitions().to_vec();
        for (i, part) in partitions.iter().enumerate() {
            for child in part {
                let target = self.instantiate(*child, id, &word, 1)?;
                self.store.append(id, target, i)?;
            }
        }
        tracing::debug!("expanded {} ({})", word, id);
        Ok(())
    }

    fn instantiate(
        &mut self,
        def_child: MachineId,
        owner: MachineId,
        owner_word: &str,
        depth: usize,
    ) -> Result<MachineId> {
        let m = self.store.get(def_child)?;
        let word = m.printname().to_string();
        let control = m.control().cloned();
        let part_num = m.partitions().len();
        let structural = m.fancy() || m.binary();

        if !structural {
            if word == owner_word {
                return Ok(owner);
            }
            let existing = {
                let ids = self.instances(&word);
                ids.iter()
                    .find(|i| self.active.contains(*i))
                    .or_else(|| ids.first())
                    .copied()
            };
            return Ok(match existing {
                Some(existing) => existing,
                None => {
                    let control = self.default_control(&word);
                    self.new_instance(&word, control)
                }
            });
        }

        let copy = self.store.create(word, control, part_num);
        if depth < self.params.expand_depth {
            let partitions = self.store.get(def_child)?.partitions().to_vec();
            for (i, part) in partitions.iter().enumerate() {
                for child in part {
                    let target = self.instantiate(*child, owner, owner_word, depth + 1)?;
                    self.store.append(copy, target, i)?;
                }
            }
        }
        Ok(copy)
    }

    // ─── Plugins ─────────────────────────────────────────────────

    pub fn plugin_messages(&self) -> Result<Vec<PluginMessage>> {
        let mut messages = Vec::new();
        for id in &self.expanded {
            let m = self.store.get(*id)?;
            if let Some(Control::Plugin(p)) = m.control() {
                let mut arguments = Vec::with_capacity(m.partitions().len());
                for part in m.partitions() {
                    let names = part
                        .iter()
                        .map(|c| Ok(self.store.printname(*c)?.to_string()))
                        .collect::<Result<Vec<_>>>()?;
                    arguments.push(names);
                }
                messages.push(PluginMessage {
                    plugin: p.plugin.clone(),
                    word: m.printname().to_string(),
                    arguments,
                });
            }
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{define, sample_lexicon};

    #[test]
    fn expand_links_words_and_copies_relations() {
        let mut lexicon = sample_lexicon(1.0);
        let dog = lexicon.activate_word("dog", None);
        lexicon.expand(dog).unwrap();

        let store = lexicon.store();
        let animal = store.find(dog, "animal").unwrap();
        assert_eq!(animal.len(), 1);
        assert!(!lexicon.is_active(animal[0].1), "definition words start passive");

        let has = store.find(dog, "HAS").unwrap()[0].1;
        let def_has = store.find(lexicon.definition("dog").unwrap(), "HAS").unwrap()[0].1;
        assert_ne!(has, def_has, "relations are copied per expansion");
        assert_eq!(store.get(has).unwrap().partitions()[0], vec![dog]);
        assert_eq!(store.printname(store.get(has).unwrap().partitions()[1][0]).unwrap(), "tail");
        assert_eq!(store.get(dog).unwrap().control(), Some(&Control::pos("NOUN")));
    }

    #[test]
    fn expand_is_idempotent() {
        let mut lexicon = sample_lexicon(1.0);
        let dog = lexicon.activate_word("dog", None);
        lexicon.expand(dog).unwrap();
        let len = lexicon.store().len();
        lexicon.expand(dog).unwrap();
        assert_eq!(lexicon.store().len(), len);
        assert!(lexicon.get_unexpanded().is_empty());
        assert_eq!(lexicon.get_expanded(), vec![dog]);
    }

    #[test]
    fn expansion_reuses_existing_instances() {
        let mut lexicon = sample_lexicon(1.0);
        let dog = lexicon.activate_word("dog", None);
        let cat = lexicon.activate_word("cat", None);
        lexicon.expand(dog).unwrap();
        lexicon.expand(cat).unwrap();
        assert_eq!(lexicon.instances("animal").len(), 1);
        let a1 = lexicon.store().find(dog, "animal").unwrap()[0].1;
        let a2 = lexicon.store().find(cat, "animal").unwrap()[0].1;
        assert_eq!(a1, a2);
    }

    #[test]
    fn activate_respects_threshold() {
        // puppy: dog, young. Only dog is present.
        let mut strict = sample_lexicon(1.0);
        define(&mut strict, "puppy", Some("NOUN"), &["dog", "young"]);
        strict.activate_word("dog", None);
        assert_eq!(strict.activate().unwrap(), 0);

        let mut loose = sample_lexicon(0.5);
        define(&mut loose, "puppy", Some("NOUN"), &["dog", "young"]);
        loose.activate_word("dog", None);
        assert_eq!(loose.activate().unwrap(), 1);
        assert_eq!(loose.instances("puppy").len(), 1);
        assert!(loose.is_active(loose.instances("puppy")[0]));
    }

    #[test]
    fn passive_words_do_not_activate_headwords() {
        // cat is defined by animal and tail, which dog's expansion only adds passively
        let mut lexicon = sample_lexicon(1.0);
        let dog = lexicon.activate_word("dog", None);
        lexicon.expand(dog).unwrap();
        assert!(!lexicon.is_active(lexicon.instances("animal")[0]));
        assert!(!lexicon.is_active(lexicon.instances("tail")[0]));

        assert_eq!(lexicon.activate().unwrap(), 0);
        assert!(lexicon.instances("cat").is_empty());
        assert_eq!(lexicon.active_count(), 1);
    }

    #[test]
    fn activate_promotes_passive_instances() {
        let mut lexicon = sample_lexicon(1.0);
        let dog = lexicon.activate_word("dog", None);
        lexicon.expand(dog).unwrap();
        // tail: part. Bring "part" into the graph, then tail should activate.
        lexicon.activate_word("part", None);
        let before = lexicon.instances("tail").to_vec();
        lexicon.activate().unwrap();
        assert_eq!(lexicon.instances("tail"), before.as_slice());
        assert!(lexicon.is_active(before[0]));
    }

    #[test]
    fn get_or_activate_reuses_active_machine() {
        let mut lexicon = sample_lexicon(1.0);
        let dog = lexicon.get_or_activate("dog");
        assert_eq!(lexicon.get_or_activate("dog"), dog);
        assert_eq!(lexicon.active_count(), 1);
    }

    #[test]
    fn definition_words_look_through_relations() {
        let lexicon = sample_lexicon(1.0);
        let words = lexicon.definition_words(lexicon.definition("dog").unwrap()).unwrap();
        assert_eq!(
            words.into_iter().collect::<Vec<_>>(),
            vec!["animal".to_string(), "tail".to_string()]
        );
    }

    #[test]
    fn plugin_words_report_messages() {
        let mut lexicon = sample_lexicon(1.0);
        lexicon.add_plugin("weather");
        let w = lexicon.activate_word("weather", Some(Control::pos("NOUN")));
        assert_eq!(lexicon.store().get(w).unwrap().control(), Some(&Control::plugin("weather")));
        lexicon.expand(w).unwrap();
        let messages = lexicon.plugin_messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].plugin, "weather");
        assert_eq!(messages[0].arguments, vec![vec!["rain".to_string()]]);
    }

    #[test]
    fn merge_keeps_first_definition() {
        let first = sample_lexicon(1.0).to_graph_file("4lang").unwrap();
        let mut second_lex = Lexicon::new(ActivationParams::default());
        define(&mut second_lex, "dog", Some("NOUN"), &["hound"]);
        define(&mut second_lex, "hound", Some("NOUN"), &["dog"]);
        let second = second_lex.to_graph_file("longman").unwrap();

        let mut lexicon = Lexicon::new(ActivationParams::default());
        let added_first = lexicon.merge_graph(first).unwrap();
        assert_eq!(lexicon.merge_graph(second).unwrap(), 1);
        assert_eq!(lexicon.definitions().len(), added_first + 1);
        assert_eq!(lexicon.conflicts(), 1);

        let dog = lexicon.definition("dog").unwrap();
        assert!(!lexicon.store().find(dog, "animal").unwrap().is_empty());
    }

    #[test]
    fn from_config_loads_graph_files() {
        let dir = tempfile::tempdir().unwrap();
        sample_lexicon(1.0)
            .to_graph_file("4lang")
            .unwrap()
            .save(dir.path().join("4lang.bin.gz"))
            .unwrap();
        let cfg = dir.path().join("machine.cfg");
        std::fs::write(&cfg, "[machine]\ndefinitions_binary = 4lang.bin.gz\nplugins = weather\n").unwrap();

        let config = defgraph_parser::load_config(&cfg).unwrap();
        let mut lexicon = Lexicon::from_config(&config).unwrap();
        assert!(lexicon.definition("dog").is_some());
        let w = lexicon.activate_word("weather", None);
        assert_eq!(lexicon.store().get(w).unwrap().control(), Some(&Control::plugin("weather")));
    }
}
